//! Resource identities, snapshots and change sets.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalkWarning;

/// 128-bit content digest of a resource's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentHash(pub [u8; 16]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hash from its hex form.
    pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(value, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for ContentHash {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// The state of one local resource: what its bytes hash to and where it lives.
///
/// Two identities are the same resource state only if both the hash and the
/// relative path match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    #[serde(rename = "hash")]
    content_hash: ContentHash,
    relative_path: String,
}

impl ResourceIdentity {
    /// Create a new identity. Backslashes in the path are normalized to `/`.
    pub fn new(content_hash: ContentHash, relative_path: impl Into<String>) -> Self {
        let relative_path: String = relative_path.into();
        let relative_path = if relative_path.contains('\\') {
            relative_path.replace('\\', "/")
        } else {
            relative_path
        };
        Self {
            content_hash,
            relative_path,
        }
    }

    /// Digest of the resource content.
    pub fn content_hash(&self) -> ContentHash {
        self.content_hash
    }

    /// Path relative to the common ancestor, `/`-separated. May carry a `#fragment`.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }
}

/// A persisted inventory captured at one point in time (a milestone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the milestone was generated.
    pub created_at: DateTime<Utc>,
    /// Inventory entries in discovery order.
    pub entries: Vec<ResourceIdentity>,
}

impl Snapshot {
    /// Create a snapshot of the given entries.
    pub fn new(created_at: DateTime<Utc>, entries: Vec<ResourceIdentity>) -> Self {
        Self {
            created_at,
            entries,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as a set, for membership tests.
    pub fn entry_set(&self) -> HashSet<&ResourceIdentity> {
        self.entries.iter().collect()
    }
}

/// Result of walking a resource graph.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Common ancestor the relative paths are expressed against.
    pub base: Option<PathBuf>,
    /// Identities of the local resources, in discovery order.
    pub entries: Vec<ResourceIdentity>,
    /// Resources skipped because they could not be fingerprinted or listed.
    pub warnings: Vec<WalkWarning>,
}

impl Inventory {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the inventory holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resources whose identity is absent from the last snapshot.
///
/// Only added and modified resources appear here. Resources that exist only
/// in the old snapshot (deleted files) are not reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Directory the relative paths resolve against.
    pub base: Option<PathBuf>,
    /// Changed resources, in inventory order.
    pub entries: Vec<ResourceIdentity>,
    /// Number of inventory entries examined.
    pub examined: usize,
}

impl ChangeSet {
    /// Number of changed resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Relative paths of the changed resources.
    pub fn relative_paths(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.relative_path().to_string())
            .collect()
    }
}
