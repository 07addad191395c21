//! Zip-archive-backed content source.
//!
//! Crawls the central directory of a zip container once per crawl; entry
//! data is read lazily through [`DataAccessor::ArchiveEntry`]. Directory
//! entries inside the archive are ignored (the catalog synthesizes its own
//! directory nodes).

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{has_hidden_component, ContentSource, CrawlStats, SourceError};
use crate::accessor::DataAccessor;
use crate::record::{AssetRecord, SourceId};
use crate::vpath::VirtualPath;

/// A content source backed by a zip archive (e.g. a packaged mod).
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    id: SourceId,
    name: String,
    path: PathBuf,
}

impl ArchiveSource {
    /// Create a source for the given archive file.
    pub fn new(id: SourceId, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { id, name, path }
    }

    /// The archive file on the real filesystem.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for ArchiveSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn crawl(&self, emit: &mut dyn FnMut(AssetRecord)) -> Result<CrawlStats, SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| SourceError::Archive {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let mut stats = CrawlStats::default();
        for index in 0..archive.len() {
            let entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        source = %self.id,
                        archive = %self.path.display(),
                        index,
                        error = %err,
                        "skipping unreadable archive entry during crawl"
                    );
                    stats.skipped += 1;
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }

            let entry_name = entry.name().to_string();
            let virt = VirtualPath::new(&entry_name);
            if virt.is_root() || has_hidden_component(&virt) {
                continue;
            }

            emit(AssetRecord::new(
                virt,
                self.id.clone(),
                DataAccessor::ArchiveEntry {
                    archive: self.path.clone(),
                    entry: entry_name,
                },
            ));
            stats.entries += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_archive(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("pack.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_crawl_emits_file_entries() {
        let temp = TempDir::new().unwrap();
        let path = write_archive(
            temp.path(),
            &[
                ("sprites/a.png", b"png".as_slice()),
                ("dialog/en.txt", b"hi".as_slice()),
            ],
        );
        let source = ArchiveSource::new(SourceId::new("pack"), &path);

        let mut paths = Vec::new();
        let stats = source
            .crawl(&mut |record| paths.push(record.path.as_str().to_string()))
            .unwrap();
        paths.sort();

        assert_eq!(paths, vec!["dialog/en.txt", "sprites/a.png"]);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_crawl_skips_hidden_entries() {
        let temp = TempDir::new().unwrap();
        let path = write_archive(
            temp.path(),
            &[
                ("sprites/a.png", b"png".as_slice()),
                (".meta/index", b"x".as_slice()),
                ("sprites/.thumb.png", b"x".as_slice()),
            ],
        );
        let source = ArchiveSource::new(SourceId::new("pack"), &path);

        let mut paths = Vec::new();
        source
            .crawl(&mut |record| paths.push(record.path.as_str().to_string()))
            .unwrap();
        assert_eq!(paths, vec!["sprites/a.png"]);
    }

    #[test]
    fn test_entry_data_readable_through_accessor() {
        let temp = TempDir::new().unwrap();
        let path = write_archive(temp.path(), &[("data/items.json", b"{}".as_slice())]);
        let source = ArchiveSource::new(SourceId::new("pack"), &path);

        let mut records = Vec::new();
        source.crawl(&mut |record| records.push(record)).unwrap();
        assert_eq!(records.len(), 1);
        let bytes = records[0].accessor.read_bytes().unwrap();
        assert_eq!(&bytes[..], b"{}");
    }

    #[test]
    fn test_missing_archive_is_error() {
        let source = ArchiveSource::new(SourceId::new("pack"), "/no/such/pack.zip");
        let err = source.crawl(&mut |_| {}).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn test_corrupt_archive_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.zip");
        std::fs::write(&path, b"this is not a zip file").unwrap();

        let source = ArchiveSource::new(SourceId::new("pack"), &path);
        let err = source.crawl(&mut |_| {}).unwrap_err();
        assert!(matches!(err, SourceError::Archive { .. }));
    }
}
