//! Packing changed files into a zip archive and extracting it again.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use jwalk::{Parallelism, WalkDir};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use transpack_core::{
    ArchiveCompression, DEFAULT_COPY_BUFFER, DEFAULT_STAGING_DIR, ProgressChannel, ProgressEvent,
    TranspackConfig,
};

use crate::copy::{copy_file, copy_stream, copy_tree};
use crate::staging::StagingDir;
use crate::ArchiveError;

/// Outcome of a pack operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackResult {
    /// Number of entries staged and archived.
    pub packaged: usize,
    /// Entries that could not be copied into the staging tree.
    pub uncopyable: Vec<String>,
}

impl PackResult {
    /// Check if every entry was packaged.
    pub fn is_complete(&self) -> bool {
        self.uncopyable.is_empty()
    }

    /// One-line description for display.
    pub fn summary(&self) -> String {
        if self.uncopyable.is_empty() {
            format!("Packaged {} file(s)", self.packaged)
        } else {
            format!(
                "Packaged {} file(s); {} could not be copied: {}",
                self.packaged,
                self.uncopyable.len(),
                self.uncopyable.join(", ")
            )
        }
    }
}

/// One entry of an archive, as written or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// `/`-separated path inside the archive, without a trailing slash.
    pub relative_path: String,
    /// Directory entries carry no content.
    pub is_directory: bool,
    /// Uncompressed size in bytes.
    pub byte_length: u64,
}

/// Builds and extracts translation archives.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    copy_buffer_size: usize,
    staging_dir_name: String,
    compression: ArchiveCompression,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self {
            copy_buffer_size: DEFAULT_COPY_BUFFER,
            staging_dir_name: DEFAULT_STAGING_DIR.to_string(),
            compression: ArchiveCompression::default(),
        }
    }
}

impl ArchiveBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from configuration.
    pub fn from_config(config: &TranspackConfig) -> Self {
        Self {
            copy_buffer_size: config.copy_buffer_size,
            staging_dir_name: config.staging_dir_name.clone(),
            compression: config.compression,
        }
    }

    /// Set the compression used for file entries.
    pub fn with_compression(mut self, compression: ArchiveCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Name of the staging directory created under the source root.
    pub fn staging_dir_name(&self) -> &str {
        &self.staging_dir_name
    }

    /// Buffer size used for every copy.
    pub fn copy_buffer_size(&self) -> usize {
        self.copy_buffer_size
    }

    /// Mirror the tree under `source` into `destination` with this builder's buffer size.
    pub fn copy_tree(
        &self,
        source: &Path,
        destination: &Path,
        channel: &ProgressChannel,
    ) -> Result<usize, ArchiveError> {
        copy_tree(source, destination, self.copy_buffer_size, channel)
    }

    /// Copy `entries` from `source_dir` into a staging tree and archive it at `destination`.
    ///
    /// Entries are `/`-separated paths relative to `source_dir`; a trailing
    /// `#fragment` is ignored. Entries that cannot be copied are reported in
    /// [`PackResult::uncopyable`] and the rest are still packed. On
    /// cancellation or failure no archive is left at `destination` and the
    /// staging directory is removed.
    pub fn pack<S: AsRef<str>>(
        &self,
        source_dir: &Path,
        entries: &[S],
        destination: &Path,
        channel: &ProgressChannel,
    ) -> Result<PackResult, ArchiveError> {
        let mut result = PackResult::default();
        if entries.is_empty() {
            tracing::debug!("nothing to pack");
            channel.done();
            return Ok(result);
        }

        let total = entries.len() * 2;
        let mut counter = 0usize;
        let staging = StagingDir::create(source_dir.join(&self.staging_dir_name))?;

        for entry in entries {
            let entry = entry.as_ref();
            match self.stage(source_dir, staging.path(), entry) {
                Ok(()) => result.packaged += 1,
                Err(reason) => {
                    tracing::warn!(entry, %reason, "cannot copy entry");
                    result.uncopyable.push(entry.to_string());
                }
            }

            channel.check()?;
            counter += 1;
            channel.progress(ProgressEvent::counted(
                counter,
                Some(total),
                format!("Staged {entry}"),
            ));
        }

        self.compress(staging.path(), destination, channel, &mut counter, total)?;
        drop(staging);

        tracing::info!(
            archive = %destination.display(),
            packaged = result.packaged,
            uncopyable = result.uncopyable.len(),
            "archive written"
        );
        channel.done();
        Ok(result)
    }

    fn stage(&self, source_dir: &Path, staging: &Path, entry: &str) -> Result<(), String> {
        let relative = sanitize_entry(entry).ok_or_else(|| "unsafe path".to_string())?;
        copy_file(
            &source_dir.join(&relative),
            &staging.join(&relative),
            self.copy_buffer_size,
        )
        .map(|_| ())
        .map_err(|e| e.to_string())
    }

    fn compress(
        &self,
        staging: &Path,
        destination: &Path,
        channel: &ProgressChannel,
        counter: &mut usize,
        total: usize,
    ) -> Result<(), ArchiveError> {
        let staged = staged_entries(staging)?;

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))?;
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| ArchiveError::io(destination, e))?;

        let method = match self.compression {
            ArchiveCompression::Deflated => CompressionMethod::Deflated,
            ArchiveCompression::Stored => CompressionMethod::Stored,
        };
        let file_options = SimpleFileOptions::default().compression_method(method);
        let dir_options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        {
            let mut zip = ZipWriter::new(temp.as_file_mut());

            for (source, entry) in &staged {
                if entry.is_directory {
                    zip.add_directory(format!("{}/", entry.relative_path), dir_options)?;
                    continue;
                }

                zip.start_file(entry.relative_path.clone(), file_options)?;
                let mut reader = File::open(source).map_err(|e| ArchiveError::io(source, e))?;
                copy_stream(&mut reader, &mut zip, self.copy_buffer_size)
                    .map_err(|e| ArchiveError::io(source, e))?;

                channel.check()?;
                *counter += 1;
                channel.progress(ProgressEvent::counted(
                    *counter,
                    Some(total),
                    format!("Compressed {}", entry.relative_path),
                ));
            }

            zip.finish()?;
        }

        temp.persist(destination)
            .map_err(|e| ArchiveError::io(destination, e.error))?;
        Ok(())
    }

    /// Extract every entry of `archive` into `destination`.
    ///
    /// Failure to open the archive or read its directory is reported through
    /// [`ProgressChannel::failed`] and the call returns the (empty) list.
    /// Entries whose names would escape `destination` and entries that fail
    /// to extract are skipped with a warning.
    ///
    /// Returns the relative paths of the extracted files.
    pub fn unpack(
        &self,
        archive: &Path,
        destination: &Path,
        channel: &ProgressChannel,
    ) -> Result<Vec<String>, ArchiveError> {
        let mut extracted = Vec::new();

        let mut zip = match open_archive(archive) {
            Ok(zip) => zip,
            Err(e) => {
                tracing::warn!(archive = %archive.display(), error = %e, "cannot open archive");
                channel.failed(&e);
                return Ok(extracted);
            }
        };

        let total = zip.len();
        for index in 0..total {
            match self.extract_entry(&mut zip, index, destination) {
                Ok(Some(entry)) => {
                    if !entry.is_directory {
                        extracted.push(entry.relative_path);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping archive entry");
                }
            }

            channel.check()?;
            channel.progress(ProgressEvent::counted(
                index + 1,
                Some(total),
                format!("Extracted entry {} of {total}", index + 1),
            ));
        }

        tracing::debug!(
            archive = %archive.display(),
            files = extracted.len(),
            "archive extracted"
        );
        channel.done();
        Ok(extracted)
    }

    fn extract_entry(
        &self,
        zip: &mut ZipArchive<File>,
        index: usize,
        destination: &Path,
    ) -> Result<Option<ArchiveEntry>, ArchiveError> {
        let mut file = zip.by_index(index)?;

        let Some(enclosed) = file.enclosed_name() else {
            tracing::warn!(name = file.name(), "skipping entry outside the destination");
            return Ok(None);
        };
        let target = destination.join(&enclosed);
        let entry = ArchiveEntry {
            relative_path: to_slash(&enclosed),
            is_directory: file.is_dir(),
            byte_length: file.size(),
        };

        if entry.is_directory {
            fs::create_dir_all(&target).map_err(|e| ArchiveError::io(&target, e))?;
            return Ok(Some(entry));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut writer = File::create(&target).map_err(|e| ArchiveError::io(&target, e))?;
        copy_stream(&mut file, &mut writer, self.copy_buffer_size)
            .map_err(|e| ArchiveError::io(&target, e))?;

        Ok(Some(entry))
    }

    /// List the entries of an archive in stored order.
    pub fn list(&self, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut zip = open_archive(archive)?;
        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let file = zip.by_index(index)?;
            entries.push(ArchiveEntry {
                relative_path: file.name().trim_end_matches('/').to_string(),
                is_directory: file.is_dir(),
                byte_length: file.size(),
            });
        }
        Ok(entries)
    }
}

fn open_archive(archive: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let file = File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;
    Ok(ZipArchive::new(file)?)
}

/// Strip the fragment and reject anything that is not a plain relative path.
fn sanitize_entry(entry: &str) -> Option<PathBuf> {
    let path = entry.split('#').next().unwrap_or_default();
    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// Everything under the staging root, in sorted depth-first order.
fn staged_entries(staging: &Path) -> Result<Vec<(PathBuf, ArchiveEntry)>, ArchiveError> {
    let walker = WalkDir::new(staging)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .sort(true)
        .min_depth(1);

    let mut entries = Vec::new();
    for entry_result in walker {
        let entry = entry_result.map_err(|err| {
            let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| staging.to_path_buf());
            ArchiveError::io(path, io::Error::other(err.to_string()))
        })?;

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(staging) else {
            continue;
        };
        let is_directory = entry.file_type().is_dir();
        let byte_length = if is_directory {
            0
        } else {
            entry
                .metadata()
                .map(|m| m.len())
                .map_err(|err| ArchiveError::io(&path, io::Error::other(err.to_string())))?
        };

        entries.push((
            path.clone(),
            ArchiveEntry {
                relative_path: to_slash(relative),
                is_directory,
                byte_length,
            },
        ));
    }
    Ok(entries)
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
