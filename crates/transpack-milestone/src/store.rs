//! Milestone persistence.
//!
//! A milestone is an XML document stored next to the root document it
//! describes:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <resources date="2023-01-01T00:00:00+00:00">
//!   <info-resource>
//!     <md5>5d41402abc4b2a76b9719d911017c592</md5>
//!     <relativePath>dirA/file.txt</relativePath>
//!   </info-resource>
//! </resources>
//! ```

use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;
use tempfile::NamedTempFile;

use transpack_core::{
    ContentHash, ResourceIdentity, Snapshot, SnapshotError, TranspackConfig, MILESTONE_SUFFIX,
};

const ROOT_ELEMENT: &str = "resources";
const ENTRY_ELEMENT: &str = "info-resource";
const HASH_ELEMENT: &str = "md5";
const PATH_ELEMENT: &str = "relativePath";

#[derive(Debug, Deserialize)]
#[serde(rename = "resources")]
struct ResourcesDocument {
    #[serde(rename = "@date")]
    date: String,
    #[serde(rename = "info-resource", default)]
    entries: Vec<InfoResource>,
}

#[derive(Debug, Deserialize)]
struct InfoResource {
    md5: String,
    #[serde(rename = "relativePath", default)]
    relative_path: String,
}

/// Reads and writes milestone documents.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    suffix: String,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(MILESTONE_SUFFIX)
    }
}

impl SnapshotStore {
    /// Create a store that names milestones with the given suffix.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Create a store using the configured suffix.
    pub fn from_config(config: &TranspackConfig) -> Self {
        Self::new(config.milestone_suffix.clone())
    }

    /// Suffix appended to the root document's stem.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Milestone file name for a root document: its stem plus the suffix.
    ///
    /// `guide.ditamap` becomes `guide_translation_milestone.xml` with the
    /// default suffix.
    pub fn canonical_file_name(&self, root_document_name: &str) -> String {
        let stem = Path::new(root_document_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{stem}{}", self.suffix)
    }

    /// Location of the milestone for `root_path`, a sibling of it.
    pub fn snapshot_path(&self, root_path: &Path) -> PathBuf {
        let name = root_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        root_path.with_file_name(self.canonical_file_name(&name))
    }

    /// Load the milestone stored for `root_path`.
    pub fn load(&self, root_path: &Path) -> Result<Snapshot, SnapshotError> {
        self.load_file(&self.snapshot_path(root_path))
    }

    /// Load a milestone from an explicit path.
    pub fn load_file(&self, path: &Path) -> Result<Snapshot, SnapshotError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SnapshotError::NoSnapshot {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(SnapshotError::corrupt(path, e)),
        };

        let document: ResourcesDocument =
            quick_xml::de::from_str(&content).map_err(|e| SnapshotError::corrupt(path, e))?;

        let created_at = DateTime::parse_from_rfc3339(document.date.trim())
            .map_err(|e| SnapshotError::corrupt(path, format!("invalid date: {e}")))?
            .with_timezone(&Utc);

        let entries = document
            .entries
            .into_iter()
            .map(|entry| {
                let hash = ContentHash::from_hex(entry.md5.trim()).map_err(|e| {
                    SnapshotError::corrupt(path, format!("invalid hash {:?}: {e}", entry.md5))
                })?;
                Ok(ResourceIdentity::new(hash, entry.relative_path))
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        tracing::debug!(path = %path.display(), entries = entries.len(), "loaded milestone");
        Ok(Snapshot::new(created_at, entries))
    }

    /// Store `snapshot` as the milestone for `root_path`, replacing any previous one.
    ///
    /// The document is written to a temporary file in the same directory and
    /// renamed into place, so readers see either the old or the new milestone.
    pub fn store(&self, snapshot: &Snapshot, root_path: &Path) -> Result<PathBuf, SnapshotError> {
        let path = self.snapshot_path(root_path);
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let document = render(snapshot).map_err(|e| SnapshotError::write(&path, e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| SnapshotError::write(&path, e))?;
        temp.write_all(&document)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| SnapshotError::write(&path, e))?;
        temp.persist(&path)
            .map_err(|e| SnapshotError::write(&path, e.error))?;

        tracing::info!(path = %path.display(), entries = snapshot.len(), "milestone stored");
        Ok(path)
    }

    /// When the milestone for `root_path` was generated.
    pub fn created_at(&self, root_path: &Path) -> Result<DateTime<Utc>, SnapshotError> {
        self.load(root_path).map(|snapshot| snapshot.created_at)
    }
}

fn render(snapshot: &Snapshot) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io::Error::other)?;

    let date = snapshot.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
    let mut root = BytesStart::new(ROOT_ELEMENT);
    root.push_attribute(("date", date.as_str()));
    writer
        .write_event(Event::Start(root))
        .map_err(io::Error::other)?;

    for entry in &snapshot.entries {
        writer
            .write_event(Event::Start(BytesStart::new(ENTRY_ELEMENT)))
            .map_err(io::Error::other)?;
        write_text_element(&mut writer, HASH_ELEMENT, &entry.content_hash().to_hex())?;
        write_text_element(&mut writer, PATH_ELEMENT, entry.relative_path())?;
        writer
            .write_event(Event::End(BytesEnd::new(ENTRY_ELEMENT)))
            .map_err(io::Error::other)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))
        .map_err(io::Error::other)?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> io::Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(io::Error::other)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(io::Error::other)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(io::Error::other)?;
    Ok(())
}
