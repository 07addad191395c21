//! Directory-backed content source.
//!
//! Crawls a real filesystem tree recursively, mapping each file to a virtual
//! path relative to the source root. Hidden names (leading `.`) are skipped
//! at any depth. This is the only source variant that supports watching and
//! single-path probing.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::{
    is_hidden_name, ContentSource, CrawlStats, ProbeOutcome, SourceError,
};
use crate::accessor::DataAccessor;
use crate::record::{AssetRecord, SourceId};
use crate::vpath::VirtualPath;

/// A content source rooted at a real directory (e.g. an unpacked mod).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    id: SourceId,
    name: String,
    root: PathBuf,
}

impl DirectorySource {
    /// Create a source for the given root directory.
    ///
    /// The display name defaults to the final path component.
    pub fn new(id: SourceId, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self { id, name, root }
    }

    /// The source root on the real filesystem.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a real path under the root to its virtual path.
    ///
    /// Returns `None` for paths outside the root or with a hidden component
    /// below it.
    pub fn virtual_path_for(&self, real: &Path) -> Option<VirtualPath> {
        let relative = real.strip_prefix(&self.root).ok()?;
        for component in relative.components() {
            if is_hidden_name(&component.as_os_str().to_string_lossy()) {
                return None;
            }
        }
        Some(VirtualPath::from_fs(relative))
    }

    fn record_for(&self, real: &Path, virt: VirtualPath) -> AssetRecord {
        AssetRecord::new(
            virt,
            self.id.clone(),
            DataAccessor::File {
                path: real.to_path_buf(),
            },
        )
    }

    /// Recursive crawl of one real directory into the emit callback.
    fn crawl_dir(
        &self,
        real_dir: &Path,
        virt_dir: &VirtualPath,
        emit: &mut dyn FnMut(AssetRecord),
        stats: &mut CrawlStats,
    ) {
        let reader = match std::fs::read_dir(real_dir) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(
                    source = %self.id,
                    path = %real_dir.display(),
                    error = %err,
                    "skipping unreadable directory during crawl"
                );
                stats.skipped += 1;
                return;
            }
        };

        for entry in reader {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        source = %self.id,
                        path = %real_dir.display(),
                        error = %err,
                        "skipping unreadable entry during crawl"
                    );
                    stats.skipped += 1;
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden_name(&name) {
                continue;
            }

            let real_path = entry.path();
            let virt_path = virt_dir.join(&name);
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(err) => {
                    warn!(
                        source = %self.id,
                        path = %real_path.display(),
                        error = %err,
                        "skipping entry with unreadable metadata"
                    );
                    stats.skipped += 1;
                    continue;
                }
            };

            if file_type.is_dir() {
                self.crawl_dir(&real_path, &virt_path, emit, stats);
            } else {
                emit(self.record_for(&real_path, virt_path));
                stats.entries += 1;
            }
        }
    }
}

impl ContentSource for DirectorySource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn crawl(&self, emit: &mut dyn FnMut(AssetRecord)) -> Result<CrawlStats, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::Io {
                path: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "source root is not a directory",
                ),
            });
        }
        let mut stats = CrawlStats::default();
        self.crawl_dir(&self.root, &VirtualPath::root(), emit, &mut stats);
        Ok(stats)
    }

    fn probe(&self, path: &VirtualPath) -> Result<ProbeOutcome, SourceError> {
        if super::has_hidden_component(path) {
            return Ok(ProbeOutcome::Absent);
        }
        let real = self.root.join(path.as_str());
        match std::fs::metadata(&real) {
            Ok(md) if md.is_dir() => {
                let mut records = Vec::new();
                let mut stats = CrawlStats::default();
                self.crawl_dir(&real, path, &mut |record| records.push(record), &mut stats);
                Ok(ProbeOutcome::Directory(records))
            }
            Ok(_) => Ok(ProbeOutcome::File(self.record_for(&real, path.clone()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ProbeOutcome::Absent),
            Err(err) => Err(SourceError::Io {
                path: real,
                source: err,
            }),
        }
    }

    fn watch_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
