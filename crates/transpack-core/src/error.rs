//! Error types shared across transpack crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The user asked for the running operation to stop.
///
/// Observed only at poll points; work already in flight finishes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Operation canceled by user")]
pub struct Canceled;

/// Errors produced while computing a content fingerprint.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The requested digest primitive is not available.
    #[error("Digest algorithm unavailable: {algorithm}")]
    DigestUnavailable { algorithm: String },

    /// The byte stream could not be fully consumed.
    #[error("Failed to read content: {source}")]
    ReadFailure {
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for FingerprintError {
    fn from(source: std::io::Error) -> Self {
        Self::ReadFailure { source }
    }
}

/// Errors from loading or storing a milestone snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No milestone has been generated for this root yet.
    #[error("No milestone was created: {path}")]
    NoSnapshot { path: PathBuf },

    /// The milestone exists but cannot be parsed.
    #[error("Corrupt milestone {path}: {message}")]
    CorruptSnapshot { path: PathBuf, message: String },

    /// The milestone could not be written.
    #[error("Failed to write milestone {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    /// Create a corrupt-snapshot error with path context.
    pub fn corrupt(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::CorruptSnapshot {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a write failure with path context.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }
}

/// Errors from generating milestones and collecting changes.
#[derive(Debug, Error)]
pub enum ChangeError {
    /// Operation was canceled.
    #[error("Operation canceled by user")]
    Canceled,

    /// Milestones live next to the root document, so the root must be a local file.
    #[error("Root resource is not a local file: {url}")]
    RootNotLocal { url: String },

    /// The root document itself could not be fingerprinted.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// Loading or storing the milestone failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl From<Canceled> for ChangeError {
    fn from(_: Canceled) -> Self {
        Self::Canceled
    }
}

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value failed validation.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Kind of walk warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Content of a local resource could not be read.
    ReadError,
    /// The digest primitive could not be initialized.
    DigestUnavailable,
    /// The references of a resource could not be enumerated.
    ChildrenUnavailable,
}

/// Non-fatal problem with a single resource; the walk continues without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkWarning {
    /// Identity URL of the resource.
    pub url: String,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl WalkWarning {
    /// Create a new walk warning.
    pub fn new(url: impl Into<String>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a resource that failed to fingerprint.
    pub fn fingerprint(url: impl Into<String>, error: &FingerprintError) -> Self {
        let kind = match error {
            FingerprintError::DigestUnavailable { .. } => WarningKind::DigestUnavailable,
            FingerprintError::ReadFailure { .. } => WarningKind::ReadError,
        };
        Self {
            url: url.into(),
            message: error.to_string(),
            kind,
        }
    }

    /// Create a warning for a resource whose references could not be listed.
    pub fn children(url: impl Into<String>, error: &std::io::Error) -> Self {
        Self {
            url: url.into(),
            message: format!("Cannot list references: {error}"),
            kind: WarningKind::ChildrenUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceled_converts() {
        let err: ChangeError = Canceled.into();
        assert!(matches!(err, ChangeError::Canceled));
    }

    #[test]
    fn test_fingerprint_warning_kind() {
        let err = FingerprintError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let warning = WalkWarning::fingerprint("file:///a.txt", &err);
        assert_eq!(warning.kind, WarningKind::ReadError);
        assert!(warning.message.contains("denied"));

        let err = FingerprintError::DigestUnavailable {
            algorithm: "sha3".to_string(),
        };
        let warning = WalkWarning::fingerprint("file:///a.txt", &err);
        assert_eq!(warning.kind, WarningKind::DigestUnavailable);
    }

    #[test]
    fn test_snapshot_error_display() {
        let err = SnapshotError::corrupt("/tmp/m.xml", "unexpected eof");
        assert_eq!(err.to_string(), "Corrupt milestone /tmp/m.xml: unexpected eof");
    }
}
