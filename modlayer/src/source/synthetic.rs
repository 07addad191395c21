//! Synthetic content sources: procedurally generated entries.
//!
//! A synthetic source wraps a generator function invoked on every crawl.
//! The bundled [`SyntheticSource::from_glob`] constructor covers the common
//! case of scanning a directory for files matching a fixed naming rule and
//! mounting them under a virtual prefix with a pre-assigned kind.

use std::path::PathBuf;

use glob::Pattern;
use tracing::warn;

use super::{is_hidden_name, ContentSource, CrawlStats, SourceError};
use crate::accessor::DataAccessor;
use crate::classify::AssetKind;
use crate::record::{AssetRecord, SourceId};
use crate::vpath::VirtualPath;

type GeneratorFn =
    dyn Fn(&mut dyn FnMut(AssetRecord)) -> Result<CrawlStats, SourceError> + Send + Sync;

/// A content source whose entries are produced by a generator function.
pub struct SyntheticSource {
    id: SourceId,
    name: String,
    generator: Box<GeneratorFn>,
}

impl SyntheticSource {
    /// Create a synthetic source from an arbitrary generator.
    pub fn new(
        id: SourceId,
        name: impl Into<String>,
        generator: impl Fn(&mut dyn FnMut(AssetRecord)) -> Result<CrawlStats, SourceError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            generator: Box::new(generator),
        }
    }

    /// Synthetic source that scans `dir` (non-recursive) for file names
    /// matching `pattern` and mounts them under `prefix` with the given
    /// kind.
    ///
    /// # Example
    ///
    /// A generator that exposes every `tile_*.bin` in a cache directory as
    /// a texture under `tiles/`:
    ///
    /// ```no_run
    /// use modlayer::classify::AssetKind;
    /// use modlayer::record::SourceId;
    /// use modlayer::source::SyntheticSource;
    /// use modlayer::vpath::VirtualPath;
    ///
    /// let source = SyntheticSource::from_glob(
    ///     SourceId::new("tile-cache"),
    ///     "tile cache",
    ///     "/var/cache/tiles",
    ///     "tile_*.bin",
    ///     VirtualPath::new("tiles"),
    ///     AssetKind::Texture,
    /// ).unwrap();
    /// ```
    pub fn from_glob(
        id: SourceId,
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        pattern: &str,
        prefix: VirtualPath,
        kind: AssetKind,
    ) -> Result<Self, SourceError> {
        let pattern = Pattern::new(pattern).map_err(|e| SourceError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let dir = dir.into();
        let scan_id = id.clone();

        let generator = move |emit: &mut dyn FnMut(AssetRecord)| {
            let reader = std::fs::read_dir(&dir).map_err(|source| SourceError::Io {
                path: dir.clone(),
                source,
            })?;

            let mut stats = CrawlStats::default();
            for entry in reader {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(
                            source = %scan_id,
                            dir = %dir.display(),
                            error = %err,
                            "skipping unreadable entry during synthetic scan"
                        );
                        stats.skipped += 1;
                        continue;
                    }
                };
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_hidden_name(&name) || !pattern.matches(&name) {
                    continue;
                }
                if entry.path().is_dir() {
                    continue;
                }

                emit(
                    AssetRecord::new(
                        prefix.join(&name),
                        scan_id.clone(),
                        DataAccessor::File { path: entry.path() },
                    )
                    .with_kind(kind),
                );
                stats.entries += 1;
            }
            Ok(stats)
        };

        Ok(Self {
            id,
            name: name.into(),
            generator: Box::new(generator),
        })
    }
}

impl ContentSource for SyntheticSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn crawl(&self, emit: &mut dyn FnMut(AssetRecord)) -> Result<CrawlStats, SourceError> {
        (self.generator)(emit)
    }
}

impl std::fmt::Debug for SyntheticSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticSource")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generator_source() {
        let source = SyntheticSource::new(SourceId::new("gen"), "generator", |emit| {
            for i in 0..3 {
                emit(
                    AssetRecord::new(
                        VirtualPath::new(format!("gen/item_{}.bin", i)),
                        SourceId::new("gen"),
                        DataAccessor::None,
                    )
                    .with_kind(AssetKind::Binary),
                );
            }
            Ok(CrawlStats {
                entries: 3,
                ..CrawlStats::default()
            })
        });

        let mut paths = Vec::new();
        let stats = source
            .crawl(&mut |record| paths.push(record.path.as_str().to_string()))
            .unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(paths, vec!["gen/item_0.bin", "gen/item_1.bin", "gen/item_2.bin"]);
    }

    #[test]
    fn test_from_glob_matches_naming_rule() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("tile_0_0.bin"), b"t").unwrap();
        std::fs::write(temp.path().join("tile_0_1.bin"), b"t").unwrap();
        std::fs::write(temp.path().join("readme.txt"), b"no").unwrap();
        std::fs::write(temp.path().join(".tile_hidden.bin"), b"no").unwrap();

        let source = SyntheticSource::from_glob(
            SourceId::new("tiles"),
            "tile cache",
            temp.path(),
            "tile_*.bin",
            VirtualPath::new("tiles"),
            AssetKind::Texture,
        )
        .unwrap();

        let mut records = Vec::new();
        let stats = source.crawl(&mut |record| records.push(record)).unwrap();
        assert_eq!(stats.entries, 2);

        let mut paths: Vec<_> = records.iter().map(|r| r.path.as_str().to_string()).collect();
        paths.sort();
        assert_eq!(paths, vec!["tiles/tile_0_0.bin", "tiles/tile_0_1.bin"]);
        assert!(records.iter().all(|r| r.kind == AssetKind::Texture));
    }

    #[test]
    fn test_from_glob_bad_pattern() {
        let err = SyntheticSource::from_glob(
            SourceId::new("tiles"),
            "tiles",
            "/tmp",
            "tile_[",
            VirtualPath::new("tiles"),
            AssetKind::Texture,
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Pattern { .. }));
    }

    #[test]
    fn test_from_glob_missing_dir_is_error() {
        let source = SyntheticSource::from_glob(
            SourceId::new("tiles"),
            "tiles",
            "/no/such/dir",
            "*.bin",
            VirtualPath::new("tiles"),
            AssetKind::Texture,
        )
        .unwrap();
        let err = source.crawl(&mut |_| {}).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
