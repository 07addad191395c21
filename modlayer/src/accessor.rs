//! Data accessors: opaque capabilities to open an asset's byte stream.
//!
//! An accessor describes where a record's bytes live without holding any
//! open handle: a whole file, a sub-range (offset + length) of a backing
//! file or shared blob, or an entry inside a zip archive read on demand.
//!
//! Opening a file shortly after a change notification can race the writer
//! still holding the file locked; reads retry briefly (default window 2 s)
//! before surfacing [`AccessError::Unavailable`].

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;

/// Default retry window for transiently locked backing files.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(2);

/// Sleep between retry attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Errors surfaced when reading through a data accessor.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The record carries no data (directory records).
    #[error("record at {path} has no data")]
    NoData { path: String },

    /// The backing file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The backing file stayed locked past the retry window.
    #[error("{path} still unavailable after {waited_ms} ms")]
    Unavailable { path: String, waited_ms: u64 },

    /// The archive or archive entry could not be read.
    #[error("archive entry {entry} in {archive}: {reason}")]
    Archive {
        archive: PathBuf,
        entry: String,
        reason: String,
    },

    /// A sub-range accessor points outside its backing store.
    #[error("range {offset}+{len} out of bounds for {path} ({actual} bytes)")]
    OutOfRange {
        path: String,
        offset: u64,
        len: u64,
        actual: u64,
    },
}

/// Where a record's bytes live.
#[derive(Debug, Clone)]
pub enum DataAccessor {
    /// No data behind this record (directories).
    None,

    /// A whole file on the real filesystem.
    File { path: PathBuf },

    /// A sub-range of a larger backing file.
    FileRange {
        path: PathBuf,
        offset: u64,
        len: u64,
    },

    /// A shared in-memory blob (resource bundles).
    Memory { blob: Bytes },

    /// A sub-range of a shared in-memory blob.
    MemoryRange {
        blob: Bytes,
        offset: u64,
        len: u64,
    },

    /// An entry inside a zip archive, opened on demand.
    ArchiveEntry { archive: PathBuf, entry: String },
}

impl DataAccessor {
    /// Read the full byte content with the default retry window.
    pub fn read_bytes(&self) -> Result<Bytes, AccessError> {
        self.read_bytes_with_retry(DEFAULT_RETRY_WINDOW)
    }

    /// Read the full byte content, retrying transiently locked files for
    /// up to `window`.
    pub fn read_bytes_with_retry(&self, window: Duration) -> Result<Bytes, AccessError> {
        match self {
            DataAccessor::None => Err(AccessError::NoData {
                path: "<directory>".to_string(),
            }),
            DataAccessor::File { path } => read_file_retrying(path, None, window),
            DataAccessor::FileRange { path, offset, len } => {
                read_file_retrying(path, Some((*offset, *len)), window)
            }
            DataAccessor::Memory { blob } => Ok(blob.clone()),
            DataAccessor::MemoryRange { blob, offset, len } => {
                let end = offset.checked_add(*len);
                match end {
                    Some(end) if end <= blob.len() as u64 => {
                        Ok(blob.slice(*offset as usize..end as usize))
                    }
                    _ => Err(AccessError::OutOfRange {
                        path: "<memory>".to_string(),
                        offset: *offset,
                        len: *len,
                        actual: blob.len() as u64,
                    }),
                }
            }
            DataAccessor::ArchiveEntry { archive, entry } => {
                read_archive_entry(archive, entry, window)
            }
        }
    }

    /// Cheap size hint where the accessor already knows its length.
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            DataAccessor::FileRange { len, .. } | DataAccessor::MemoryRange { len, .. } => {
                Some(*len)
            }
            DataAccessor::Memory { blob } => Some(blob.len() as u64),
            _ => None,
        }
    }
}

/// Whether an I/O error is worth retrying: the OS may briefly deny access
/// to a file the writer has not finished replacing.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn open_retrying(path: &Path, window: Duration) -> Result<File, AccessError> {
    let start = Instant::now();
    loop {
        match File::open(path) {
            Ok(file) => return Ok(file),
            Err(err) if is_transient(&err) => {
                if start.elapsed() >= window {
                    return Err(AccessError::Unavailable {
                        path: path.display().to_string(),
                        waited_ms: start.elapsed().as_millis() as u64,
                    });
                }
                std::thread::sleep(RETRY_INTERVAL);
            }
            Err(err) => {
                return Err(AccessError::Io {
                    path: path.display().to_string(),
                    source: err,
                })
            }
        }
    }
}

fn read_file_retrying(
    path: &Path,
    range: Option<(u64, u64)>,
    window: Duration,
) -> Result<Bytes, AccessError> {
    let mut file = open_retrying(path, window)?;
    let io_err = |source| AccessError::Io {
        path: path.display().to_string(),
        source,
    };

    match range {
        None => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).map_err(io_err)?;
            Ok(Bytes::from(buf))
        }
        Some((offset, len)) => {
            let actual = file.metadata().map_err(io_err)?.len();
            let end = offset.checked_add(len);
            if end.is_none() || end.unwrap_or(u64::MAX) > actual {
                return Err(AccessError::OutOfRange {
                    path: path.display().to_string(),
                    offset,
                    len,
                    actual,
                });
            }
            file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
            let mut buf = vec![0u8; len as usize];
            file.read_exact(&mut buf).map_err(io_err)?;
            Ok(Bytes::from(buf))
        }
    }
}

fn read_archive_entry(
    archive_path: &Path,
    entry_name: &str,
    window: Duration,
) -> Result<Bytes, AccessError> {
    let file = open_retrying(archive_path, window)?;
    let archive_err = |reason: String| AccessError::Archive {
        archive: archive_path.to_path_buf(),
        entry: entry_name.to_string(),
        reason,
    };

    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_err(e.to_string()))?;
    let mut entry = archive
        .by_name(entry_name)
        .map_err(|e| archive_err(e.to_string()))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .map_err(|e| archive_err(e.to_string()))?;
    Ok(Bytes::from(buf))
}
