//! Scoped staging directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ArchiveError;

/// A directory that exists for the lifetime of this guard.
///
/// Any directory already at the path is removed on creation, and the
/// directory is removed again when the guard drops, whether the operation
/// succeeded, failed or was canceled.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create a fresh, empty directory at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        if path.exists() {
            tracing::debug!(path = %path.display(), "removing stale staging directory");
            fs::remove_dir_all(&path).map_err(|e| ArchiveError::io(&path, e))?;
        }
        fs::create_dir_all(&path).map_err(|e| ArchiveError::io(&path, e))?;
        Ok(Self { path })
    }

    /// Location of the staging directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staging directory");
            }
        }
    }
}
