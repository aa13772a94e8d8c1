//! Configuration for milestones, fingerprinting and packaging.

use std::path::{Component, Path};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_COPY_BUFFER, DEFAULT_STAGING_DIR, MILESTONE_SUFFIX};
use crate::error::ConfigError;
use crate::fingerprint::MIN_BUFFER_SIZE;

/// Compression used for archive file entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    /// Deflate (standard zip).
    #[default]
    Deflated,
    /// No compression.
    Stored,
}

/// Configuration shared by the change detector and the archive builder.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct TranspackConfig {
    /// Suffix appended to the root document's stem to name its milestone.
    #[builder(default = "MILESTONE_SUFFIX.to_string()")]
    #[serde(default = "default_milestone_suffix")]
    pub milestone_suffix: String,

    /// Digest algorithm used for fingerprints.
    #[builder(default = "\"md5\".to_string()")]
    #[serde(default = "default_digest_algorithm")]
    pub digest_algorithm: String,

    /// Read buffer size while hashing.
    #[builder(default = "8192")]
    #[serde(default = "default_hash_buffer_size")]
    pub hash_buffer_size: usize,

    /// Read/write buffer size while archiving.
    #[builder(default = "DEFAULT_COPY_BUFFER")]
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,

    /// Name of the staging directory created under the source root while packing.
    #[builder(default = "DEFAULT_STAGING_DIR.to_string()")]
    #[serde(default = "default_staging_dir_name")]
    pub staging_dir_name: String,

    /// Compression for archive file entries.
    #[builder(default)]
    #[serde(default)]
    pub compression: ArchiveCompression,

    /// Descend into symlinked directories and files when walking a directory root.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_milestone_suffix() -> String {
    MILESTONE_SUFFIX.to_string()
}

fn default_digest_algorithm() -> String {
    "md5".to_string()
}

fn default_hash_buffer_size() -> usize {
    8192
}

fn default_copy_buffer_size() -> usize {
    DEFAULT_COPY_BUFFER
}

fn default_staging_dir_name() -> String {
    DEFAULT_STAGING_DIR.to_string()
}

impl TranspackConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref suffix) = self.milestone_suffix {
            check_suffix(suffix)?;
        }
        if let Some(size) = self.hash_buffer_size {
            check_hash_buffer(size)?;
        }
        if let Some(size) = self.copy_buffer_size {
            check_copy_buffer(size)?;
        }
        if let Some(ref name) = self.staging_dir_name {
            check_staging_name(name)?;
        }
        Ok(())
    }
}

fn check_suffix(suffix: &str) -> Result<(), String> {
    if suffix.is_empty() {
        return Err("Milestone suffix cannot be empty".to_string());
    }
    if suffix.contains(['/', '\\']) {
        return Err("Milestone suffix cannot contain path separators".to_string());
    }
    Ok(())
}

fn check_hash_buffer(size: usize) -> Result<(), String> {
    if size < MIN_BUFFER_SIZE {
        return Err(format!("Hash buffer must be at least {MIN_BUFFER_SIZE} bytes"));
    }
    Ok(())
}

fn check_copy_buffer(size: usize) -> Result<(), String> {
    if size == 0 {
        return Err("Copy buffer cannot be empty".to_string());
    }
    Ok(())
}

fn check_staging_name(name: &str) -> Result<(), String> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(format!("Staging directory must be a single name: {name}")),
    }
}

impl TranspackConfig {
    /// Create a new config builder.
    pub fn builder() -> TranspackConfigBuilder {
        TranspackConfigBuilder::default()
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&content)
    }

    /// Check every value against the same rules the builder applies.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_suffix(&self.milestone_suffix)
            .and_then(|_| check_hash_buffer(self.hash_buffer_size))
            .and_then(|_| check_copy_buffer(self.copy_buffer_size))
            .and_then(|_| check_staging_name(&self.staging_dir_name))
            .map_err(|message| ConfigError::Invalid { message })
    }
}

impl Default for TranspackConfig {
    fn default() -> Self {
        Self {
            milestone_suffix: default_milestone_suffix(),
            digest_algorithm: default_digest_algorithm(),
            hash_buffer_size: default_hash_buffer_size(),
            copy_buffer_size: default_copy_buffer_size(),
            staging_dir_name: default_staging_dir_name(),
            compression: ArchiveCompression::default(),
            follow_symlinks: false,
        }
    }
}
