//! Archive error types.

use std::path::PathBuf;

use thiserror::Error;
use transpack_core::Canceled;

/// Errors from staging, packing, extracting and copying.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Operation was canceled.
    #[error("Operation canceled by user")]
    Canceled,

    /// I/O error with path context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip container could not be read or written.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ArchiveError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<Canceled> for ArchiveError {
    fn from(_: Canceled) -> Self {
        Self::Canceled
    }
}
