//! Resource-bundle content source: assets embedded in the running binary.
//!
//! A bundle is a shared byte blob (typically `include_bytes!` data from a
//! loaded module) plus a JSON manifest describing each asset as an
//! offset + length sub-range of the blob. Records reference the blob
//! directly through [`DataAccessor::MemoryRange`]; nothing is copied.

use bytes::Bytes;
use serde::Deserialize;

use super::{has_hidden_component, ContentSource, CrawlStats, SourceError};
use crate::accessor::DataAccessor;
use crate::record::{AssetRecord, SourceId};
use crate::vpath::VirtualPath;

#[derive(Debug, Deserialize)]
struct BundleManifest {
    entries: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    path: String,
    offset: u64,
    len: u64,
}

/// A content source over assets embedded in an in-process byte blob.
#[derive(Debug, Clone)]
pub struct BundleSource {
    id: SourceId,
    name: String,
    blob: Bytes,
    entries: Vec<(VirtualPath, u64, u64)>,
}

impl BundleSource {
    /// Create a bundle from its blob and JSON manifest.
    ///
    /// The manifest has the shape
    /// `{"entries": [{"path": "...", "offset": 0, "len": 42}, ...]}`.
    /// Every entry must fit inside the blob; hidden paths are rejected at
    /// crawl time like any other source.
    pub fn from_manifest(
        id: SourceId,
        name: impl Into<String>,
        blob: Bytes,
        manifest_json: &[u8],
    ) -> Result<Self, SourceError> {
        let manifest: BundleManifest = serde_json::from_slice(manifest_json)
            .map_err(|e| SourceError::Manifest(e.to_string()))?;

        let blob_len = blob.len() as u64;
        let mut entries = Vec::with_capacity(manifest.entries.len());
        for entry in manifest.entries {
            let end = entry.offset.checked_add(entry.len);
            match end {
                Some(end) if end <= blob_len => {}
                _ => {
                    return Err(SourceError::Manifest(format!(
                        "entry {} range {}+{} exceeds blob of {} bytes",
                        entry.path, entry.offset, entry.len, blob_len
                    )))
                }
            }
            let virt = VirtualPath::new(&entry.path);
            if virt.is_root() {
                return Err(SourceError::Manifest(format!(
                    "entry path {:?} normalizes to the namespace root",
                    entry.path
                )));
            }
            entries.push((virt, entry.offset, entry.len));
        }

        Ok(Self {
            id,
            name: name.into(),
            blob,
            entries,
        })
    }

    /// Number of assets described by the manifest.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl ContentSource for BundleSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn crawl(&self, emit: &mut dyn FnMut(AssetRecord)) -> Result<CrawlStats, SourceError> {
        let mut stats = CrawlStats::default();
        for (path, offset, len) in &self.entries {
            if has_hidden_component(path) {
                continue;
            }
            emit(AssetRecord::new(
                path.clone(),
                self.id.clone(),
                DataAccessor::MemoryRange {
                    blob: self.blob.clone(),
                    offset: *offset,
                    len: *len,
                },
            ));
            stats.entries += 1;
        }
        Ok(stats)
    }
}
