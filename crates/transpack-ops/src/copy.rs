//! Buffered file copies and directory mirroring.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use jwalk::{Parallelism, WalkDir};
use transpack_core::{ProgressChannel, ProgressEvent};

use crate::ArchiveError;

/// Copy `reader` into `writer` through a buffer of `buffer_size` bytes.
///
/// Returns the number of bytes copied.
pub fn copy_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> io::Result<u64> {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        copied += n as u64;
    }

    writer.flush()?;
    Ok(copied)
}

/// Copy one file, creating the destination's parent directories.
pub(crate) fn copy_file(source: &Path, dest: &Path, buffer_size: usize) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut reader = File::open(source)?;
    let mut writer = File::create(dest)?;
    copy_stream(&mut reader, &mut writer, buffer_size)
}

/// Mirror the tree under `source` into `destination`, file by file, through
/// a buffer of `buffer_size` bytes.
///
/// Directories are created as they are reached, in sorted order. After every
/// file cancellation is polled and a progress event (without total) is
/// emitted. Any copy failure stops the operation.
///
/// Returns the number of files copied.
pub fn copy_tree(
    source: &Path,
    destination: &Path,
    buffer_size: usize,
    channel: &ProgressChannel,
) -> Result<usize, ArchiveError> {
    let metadata = fs::metadata(source).map_err(|e| ArchiveError::io(source, e))?;
    if !metadata.is_dir() {
        return Err(ArchiveError::io(
            source,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    fs::create_dir_all(destination).map_err(|e| ArchiveError::io(destination, e))?;

    let walker = WalkDir::new(source)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .sort(true)
        .min_depth(1);

    let mut copied = 0usize;

    for entry_result in walker {
        let entry = entry_result.map_err(|err| {
            let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
            ArchiveError::io(path, io::Error::other(err.to_string()))
        })?;

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| ArchiveError::io(&target, e))?;
            continue;
        }

        copy_file(&path, &target, buffer_size).map_err(|e| ArchiveError::io(&path, e))?;
        copied += 1;

        channel.check()?;
        channel.progress(ProgressEvent::counted(
            copied,
            None,
            format!("Copied {}", relative.display()),
        ));
    }

    tracing::debug!(
        source = %source.display(),
        destination = %destination.display(),
        files = copied,
        "tree copied"
    );
    Ok(copied)
}
