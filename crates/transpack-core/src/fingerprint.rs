//! Streaming content fingerprints.
//!
//! A fingerprint is a pure function of bytes: timestamps, permissions and
//! paths never feed the digest, so identical content matches wherever and
//! whenever it was read.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

use md5::{Digest, Md5};

use crate::config::TranspackConfig;
use crate::error::FingerprintError;
use crate::identity::ContentHash;

/// Smallest read buffer used while hashing.
pub const MIN_BUFFER_SIZE: usize = 4096;

/// Digest primitives available for fingerprinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// 128-bit MD5.
    #[default]
    Md5,
}

impl DigestAlgorithm {
    /// Name as written in configuration and milestone documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" | "md-5" => Ok(Self::Md5),
            _ => Err(FingerprintError::DigestUnavailable {
                algorithm: s.to_string(),
            }),
        }
    }
}

/// Computes content hashes by streaming bounded chunks.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    algorithm: DigestAlgorithm,
    buffer_size: usize,
}

impl Fingerprinter {
    /// Create a fingerprinter. Buffers smaller than [`MIN_BUFFER_SIZE`] are raised to it.
    pub fn new(algorithm: DigestAlgorithm, buffer_size: usize) -> Self {
        Self {
            algorithm,
            buffer_size: buffer_size.max(MIN_BUFFER_SIZE),
        }
    }

    /// Create a fingerprinter from configuration.
    ///
    /// Fails with [`FingerprintError::DigestUnavailable`] if the configured
    /// algorithm is unknown.
    pub fn from_config(config: &TranspackConfig) -> Result<Self, FingerprintError> {
        let algorithm = config.digest_algorithm.parse()?;
        Ok(Self::new(algorithm, config.hash_buffer_size))
    }

    /// The digest algorithm in use.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Hash everything the reader yields.
    pub fn fingerprint_reader<R: Read>(&self, mut reader: R) -> Result<ContentHash, FingerprintError> {
        match self.algorithm {
            DigestAlgorithm::Md5 => {
                let mut hasher = Md5::new();
                let mut buffer = vec![0u8; self.buffer_size];

                loop {
                    let bytes_read = match reader.read(&mut buffer) {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(FingerprintError::ReadFailure { source: e }),
                    };
                    hasher.update(&buffer[..bytes_read]);
                }

                Ok(to_content_hash(&hasher.finalize()))
            }
        }
    }

    /// Hash the contents of a file on disk.
    pub fn fingerprint_file(&self, path: &Path) -> Result<ContentHash, FingerprintError> {
        let file = File::open(path)?;
        self.fingerprint_reader(file)
    }

    /// Hash an in-memory byte slice.
    pub fn fingerprint_bytes(&self, bytes: &[u8]) -> ContentHash {
        match self.algorithm {
            DigestAlgorithm::Md5 => to_content_hash(&Md5::digest(bytes)),
        }
    }
}

fn to_content_hash(digest: &[u8]) -> ContentHash {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(digest);
    ContentHash::new(bytes)
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Md5, 8 * 1024)
    }
}
