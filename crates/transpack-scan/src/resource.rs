//! Resource graph capability and concrete node types.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

/// Where a resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A file on the local filesystem; fingerprinted when visited.
    LocalFile,
    /// A local directory; contributes to the common ancestor but has no content.
    LocalDirectory,
    /// Any other scheme; never fingerprinted, but its references are followed.
    Remote,
}

impl Origin {
    /// Check if the resource is on the local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalFile | Self::LocalDirectory)
    }
}

/// A node of the resource graph.
///
/// The graph is owned by whoever builds it; traversal only reads. Identity is
/// the URL: two nodes with equal URLs are the same resource.
pub trait ResourceNode: Send + Sync {
    /// Scheme-qualified identity of the resource.
    fn identity_url(&self) -> &Url;

    /// Where the resource lives.
    fn origin(&self) -> Origin;

    /// Resources this one refers to, in document order.
    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceNode>>>;

    /// Open the resource bytes. Only meaningful for [`Origin::LocalFile`].
    fn open_content(&self) -> io::Result<Box<dyn Read>>;

    /// Filesystem location, for local resources.
    fn local_path(&self) -> Option<PathBuf> {
        if self.origin().is_local() {
            self.identity_url().to_file_path().ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for dyn ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("url", &self.identity_url().as_str())
            .field("origin", &self.origin())
            .finish()
    }
}

/// Build a `file:` URL for a path, resolving it against the working directory if relative.
pub fn file_url(path: &Path) -> io::Result<Url> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute).map_err(|()| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Cannot express {} as a file URL", absolute.display()),
        )
    })
}

fn not_a_file(url: &Url) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{url} has no readable content"),
    )
}

/// A local file, optionally referring to other resources.
#[derive(Clone)]
pub struct LocalFileNode {
    url: Url,
    path: PathBuf,
    references: Vec<Arc<dyn ResourceNode>>,
}

impl LocalFileNode {
    /// Create a node for the file at `path`.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let url = file_url(path.as_ref())?;
        let path = std::path::absolute(path.as_ref())?;
        Ok(Self {
            url,
            path,
            references: Vec::new(),
        })
    }

    /// Identify a sub-part of the document, e.g. `topic.dita#intro`.
    ///
    /// The fragment makes this a distinct resource with the same content.
    pub fn with_fragment(mut self, fragment: &str) -> Self {
        self.url.set_fragment(Some(fragment));
        self
    }

    /// Set the resources this file refers to.
    pub fn with_references(mut self, references: Vec<Arc<dyn ResourceNode>>) -> Self {
        self.references = references;
        self
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResourceNode for LocalFileNode {
    fn identity_url(&self) -> &Url {
        &self.url
    }

    fn origin(&self) -> Origin {
        Origin::LocalFile
    }

    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceNode>>> {
        Ok(self.references.clone())
    }

    fn open_content(&self) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn local_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// A resource reached through a non-file scheme.
#[derive(Clone)]
pub struct RemoteNode {
    url: Url,
    references: Vec<Arc<dyn ResourceNode>>,
}

impl RemoteNode {
    /// Create a remote node.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            references: Vec::new(),
        }
    }

    /// Set the resources this one refers to.
    pub fn with_references(mut self, references: Vec<Arc<dyn ResourceNode>>) -> Self {
        self.references = references;
        self
    }
}

impl ResourceNode for RemoteNode {
    fn identity_url(&self) -> &Url {
        &self.url
    }

    fn origin(&self) -> Origin {
        Origin::Remote
    }

    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceNode>>> {
        Ok(self.references.clone())
    }

    fn open_content(&self) -> io::Result<Box<dyn Read>> {
        Err(not_a_file(&self.url))
    }
}

/// A directory on disk whose children are its entries.
///
/// Entries are listed lazily on every [`ResourceNode::children`] call and
/// returned sorted by name, so repeated walks see the same order.
///
/// Symlinks are skipped unless [`with_follow_symlinks`](Self::with_follow_symlinks)
/// enables them. Followed links are identified by their canonical target, so a
/// link back to an ancestor resolves to a resource the walker has already seen.
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    url: Url,
    path: PathBuf,
    exclude: Arc<[String]>,
    follow_symlinks: bool,
}

impl DirectoryNode {
    /// Create a node for the directory at `path`.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Not a directory: {}", path.display()),
            ));
        }
        Ok(Self {
            url: file_url(&path)?,
            path,
            exclude: Arc::from(Vec::<String>::new()),
            follow_symlinks: false,
        })
    }

    /// Follow symlinked entries. The directory itself is then identified by
    /// its canonical path.
    pub fn with_follow_symlinks(mut self, follow: bool) -> io::Result<Self> {
        if follow {
            self.path = fs::canonicalize(&self.path)?;
            self.url = file_url(&self.path)?;
        }
        self.follow_symlinks = follow;
        Ok(self)
    }

    /// Skip entries with these names at every depth.
    pub fn with_exclusions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.exclude = Arc::from(names);
        self
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|excluded| excluded == name)
    }
}

impl ResourceNode for DirectoryNode {
    fn identity_url(&self) -> &Url {
        &self.url
    }

    fn origin(&self) -> Origin {
        Origin::LocalDirectory
    }

    fn children(&self) -> io::Result<Vec<Arc<dyn ResourceNode>>> {
        let mut entries: Vec<(String, PathBuf)> = fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| (entry.file_name().to_string_lossy().to_string(), entry.path()))
            .filter(|(name, _)| !self.is_excluded(name))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut children: Vec<Arc<dyn ResourceNode>> = Vec::with_capacity(entries.len());
        for (_, path) in entries {
            let Ok(link_metadata) = fs::symlink_metadata(&path) else {
                tracing::debug!(path = %path.display(), "skipping entry without metadata");
                continue;
            };

            let (path, metadata) = if link_metadata.file_type().is_symlink() {
                if !self.follow_symlinks {
                    tracing::debug!(path = %path.display(), "skipping symlink");
                    continue;
                }
                // Dangling links are skipped.
                match fs::canonicalize(&path).and_then(|target| {
                    let metadata = fs::metadata(&target)?;
                    Ok((target, metadata))
                }) {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "skipping broken symlink");
                        continue;
                    }
                }
            } else {
                (path, link_metadata)
            };

            if metadata.is_dir() {
                children.push(Arc::new(DirectoryNode {
                    url: file_url(&path)?,
                    path,
                    exclude: Arc::clone(&self.exclude),
                    follow_symlinks: self.follow_symlinks,
                }));
            } else if metadata.is_file() {
                children.push(Arc::new(LocalFileNode {
                    url: file_url(&path)?,
                    path,
                    references: Vec::new(),
                }));
            }
        }

        Ok(children)
    }

    fn open_content(&self) -> io::Result<Box<dyn Read>> {
        Err(not_a_file(&self.url))
    }

    fn local_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}
