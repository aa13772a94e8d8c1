//! Core types and traits for transpack.
//!
//! This crate provides the pieces shared by every other transpack crate:
//! content fingerprints, resource identities, snapshots and change sets,
//! the progress/cancellation protocol, error types and configuration.

mod config;
mod error;
mod fingerprint;
mod identity;
mod progress;

pub use config::{ArchiveCompression, TranspackConfig, TranspackConfigBuilder};
pub use error::{
    Canceled, ChangeError, ConfigError, FingerprintError, SnapshotError, WalkWarning, WarningKind,
};
pub use fingerprint::{DigestAlgorithm, Fingerprinter, MIN_BUFFER_SIZE};
pub use identity::{ChangeSet, ContentHash, Inventory, ResourceIdentity, Snapshot};
pub use progress::{NoProgress, ProgressChannel, ProgressEvent, ProgressSink, ProgressUpdate};

/// Default suffix appended to a root document's stem to name its milestone file.
pub const MILESTONE_SUFFIX: &str = "_translation_milestone.xml";

/// Default name of the staging directory created under the source root while packing.
pub const DEFAULT_STAGING_DIR: &str = ".transpack-staging";

/// Default read/write buffer size for archive copies.
pub const DEFAULT_COPY_BUFFER: usize = 4096;
