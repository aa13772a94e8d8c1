//! Depth-first resource graph walker.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::vec;

use transpack_core::{
    Canceled, ContentHash, FingerprintError, Fingerprinter, Inventory, ProgressChannel,
    ResourceIdentity, WalkWarning,
};

use crate::resource::{Origin, ResourceNode};
use crate::visited::VisitedSet;

/// A fingerprinted local file, before its path is made relative.
struct Found {
    path: PathBuf,
    fragment: Option<String>,
    hash: ContentHash,
}

/// Walks a resource graph and fingerprints every reachable local file.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraphWalker {
    fingerprinter: Fingerprinter,
}

impl ResourceGraphWalker {
    /// Create a walker that hashes with the given fingerprinter.
    pub fn new(fingerprinter: Fingerprinter) -> Self {
        Self { fingerprinter }
    }

    /// The fingerprinter used for local files.
    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Walk everything reachable from `root`, excluding the root itself.
    ///
    /// Traversal is depth-first pre-order. Each resource is visited at most
    /// once, so cycles terminate. Cancellation is polled before every child;
    /// when it fires the partial inventory is discarded.
    pub fn walk(
        &self,
        root: &dyn ResourceNode,
        channel: &ProgressChannel,
    ) -> Result<Inventory, Canceled> {
        let mut visited = VisitedSet::new();
        visited.track(root.identity_url());

        let mut anchors: Vec<PathBuf> = anchor_of(root).into_iter().collect();
        let mut found: Vec<Found> = Vec::new();
        let mut warnings: Vec<WalkWarning> = Vec::new();
        let mut stack: Vec<vec::IntoIter<Arc<dyn ResourceNode>>> = Vec::new();

        match root.children() {
            Ok(children) => stack.push(children.into_iter()),
            Err(e) => {
                tracing::warn!(url = %root.identity_url(), error = %e, "cannot list references");
                warnings.push(WalkWarning::children(root.identity_url().as_str(), &e));
            }
        }

        while let Some(pending) = stack.last_mut() {
            let Some(node) = pending.next() else {
                stack.pop();
                continue;
            };

            channel.check()?;

            if !visited.track(node.identity_url()) {
                continue;
            }

            if let Some(anchor) = anchor_of(node.as_ref()) {
                anchors.push(anchor);
            }

            if node.origin() == Origin::LocalFile {
                match self.fingerprint(node.as_ref()) {
                    Ok(Some(item)) => found.push(item),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(url = %node.identity_url(), error = %e, "skipping resource");
                        warnings.push(WalkWarning::fingerprint(node.identity_url().as_str(), &e));
                    }
                }
            }

            match node.children() {
                Ok(children) if !children.is_empty() => stack.push(children.into_iter()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(url = %node.identity_url(), error = %e, "cannot list references");
                    warnings.push(WalkWarning::children(node.identity_url().as_str(), &e));
                }
            }
        }

        let base = Self::common_ancestor(&anchors);
        tracing::debug!(
            visited = visited.len(),
            entries = found.len(),
            warnings = warnings.len(),
            base = ?base,
            "walk complete"
        );

        let entries = found
            .into_iter()
            .map(|item| {
                let mut relative = Self::inventory_path(&item.path, base.as_deref());
                if let Some(fragment) = item.fragment {
                    relative.push('#');
                    relative.push_str(&fragment);
                }
                ResourceIdentity::new(item.hash, relative)
            })
            .collect();

        Ok(Inventory {
            base,
            entries,
            warnings,
        })
    }

    fn fingerprint(&self, node: &dyn ResourceNode) -> Result<Option<Found>, FingerprintError> {
        let Some(path) = node.local_path() else {
            return Ok(None);
        };
        let reader = node.open_content()?;
        let hash = self.fingerprinter.fingerprint_reader(reader)?;
        Ok(Some(Found {
            path,
            fragment: node.identity_url().fragment().map(str::to_string),
            hash,
        }))
    }

    /// Longest directory shared by every path, compared component by component.
    ///
    /// Returns `None` for an empty slice or when the paths share nothing.
    pub fn common_ancestor(paths: &[PathBuf]) -> Option<PathBuf> {
        let (first, rest) = paths.split_first()?;
        let mut shared: Vec<Component<'_>> = first.components().collect();

        for path in rest {
            let matching = shared
                .iter()
                .zip(path.components())
                .take_while(|(a, b)| **a == *b)
                .count();
            shared.truncate(matching);
            if shared.is_empty() {
                return None;
            }
        }

        Some(shared.iter().collect())
    }

    /// Express `path` relative to `base` with `/` separators.
    ///
    /// A path outside `base` is returned whole.
    pub fn relative_path(path: &Path, base: &Path) -> String {
        match path.strip_prefix(base) {
            Ok(relative) => to_slash(relative),
            Err(_) => to_slash(path),
        }
    }

    /// Path recorded in an inventory: relative to `base` when there is one,
    /// otherwise the whole path. Always `/`-separated.
    pub fn inventory_path(path: &Path, base: Option<&Path>) -> String {
        match base {
            Some(base) => Self::relative_path(path, base),
            None => to_slash(path),
        }
    }
}

/// Directory a local resource contributes to the common ancestor.
fn anchor_of(node: &dyn ResourceNode) -> Option<PathBuf> {
    match node.origin() {
        Origin::LocalFile => node.local_path()?.parent().map(Path::to_path_buf),
        Origin::LocalDirectory => node.local_path(),
        Origin::Remote => None,
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
