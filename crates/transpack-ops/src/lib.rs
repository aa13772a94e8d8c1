//! Staging, packing and extraction for transpack.
//!
//! Changed files are copied into a staging tree under the source root, the
//! tree is compressed into a zip archive, and the staging tree is removed.
//! Extraction reverses the process. Every operation reports progress and
//! observes cancellation through a [`ProgressChannel`](transpack_core::ProgressChannel).

mod archive;
mod copy;
mod error;
mod staging;

pub use archive::{ArchiveBuilder, ArchiveEntry, PackResult};
pub use copy::{copy_stream, copy_tree};
pub use error::ArchiveError;
pub use staging::StagingDir;
pub use transpack_core::{DEFAULT_COPY_BUFFER, DEFAULT_STAGING_DIR};
