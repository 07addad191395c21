//! Content sources: pluggable producers of asset records.
//!
//! A source enumerates its backing store and emits `(virtual path, record)`
//! pairs into the catalog. Variants cover plain directories, zip archives,
//! in-process resource bundles, and synthetic generators. Sources are
//! append-mostly: only their owner calls mutating operations, and crawling
//! two *different* sources concurrently is safe.

mod archive;
mod bundle;
mod directory;
mod synthetic;
pub(crate) mod watch;

pub use archive::ArchiveSource;
pub use bundle::BundleSource;
pub use directory::DirectorySource;
pub use synthetic::SyntheticSource;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;

use crate::record::{AssetRecord, SourceId};
use crate::vpath::VirtualPath;

/// Marker prefix for hidden names: any path component starting with this
/// character is skipped during both crawl and watch.
pub const HIDDEN_PREFIX: char = '.';

/// True when a single name component is hidden.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

/// True when any component of a virtual path is hidden.
pub fn has_hidden_component(path: &VirtualPath) -> bool {
    path.segments().any(is_hidden_name)
}

/// Errors raised by content sources.
///
/// Per-entry read failures during crawl are *not* errors: the entry is
/// skipped, logged, and counted in [`CrawlStats::skipped`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source's backing store could not be read at all.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive container could not be opened or parsed.
    #[error("failed to open archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    /// The bundle manifest is malformed.
    #[error("invalid bundle manifest: {0}")]
    Manifest(String),

    /// A synthetic naming rule is malformed.
    #[error("invalid pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// This source cannot re-read a single path; callers fall back to a
    /// full recrawl.
    #[error("source does not support probing single paths")]
    ProbeUnsupported,
}

/// Counters reported by a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Records emitted.
    pub entries: usize,

    /// Entries skipped because they could not be read.
    pub skipped: usize,

    /// Wall-clock time of the crawl, stamped by the overlay when the source
    /// is crawled through registration or recrawl.
    pub duration: Duration,
}

/// Fresh on-backing-store state of a single path, used by the reload
/// pipeline to classify a change delta.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The path is a readable file; here is its fresh record.
    File(AssetRecord),

    /// The path is a directory; here is a sub-crawl of that subtree only.
    Directory(Vec<AssetRecord>),

    /// Nothing exists at the path any more.
    Absent,
}

/// A pluggable contributor of asset records to the overlay namespace.
pub trait ContentSource: Send + Sync {
    /// Stable identity of this source (ownership key in the catalog).
    fn id(&self) -> &SourceId;

    /// Human-readable name for logs.
    fn display_name(&self) -> &str;

    /// Enumerate the backing store, emitting one record per entry.
    ///
    /// Individual unreadable entries are skipped and counted; only a failure
    /// to read the backing store itself is an error.
    fn crawl(&self, emit: &mut dyn FnMut(AssetRecord)) -> Result<CrawlStats, SourceError>;

    /// Re-read a single path after a change notification.
    ///
    /// The default declines, which makes the reload pipeline fall back to a
    /// full recrawl of this source.
    fn probe(&self, _path: &VirtualPath) -> Result<ProbeOutcome, SourceError> {
        Err(SourceError::ProbeUnsupported)
    }

    /// Filesystem root to watch for external mutations, when this source is
    /// backed by a watchable directory.
    fn watch_root(&self) -> Option<&Path> {
        None
    }
}

/// The set of registered sources, shared between the overlay context and
/// the reload worker.
#[derive(Default)]
pub(crate) struct SourceSet {
    inner: RwLock<Vec<Arc<dyn ContentSource>>>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, keeping registration order.
    pub fn insert(&self, source: Arc<dyn ContentSource>) {
        self.inner.write().push(source);
    }

    /// Remove and return a source by id.
    pub fn remove(&self, id: &SourceId) -> Option<Arc<dyn ContentSource>> {
        let mut inner = self.inner.write();
        let idx = inner.iter().position(|s| s.id() == id)?;
        Some(inner.remove(idx))
    }

    /// Look up a source by id.
    pub fn get(&self, id: &SourceId) -> Option<Arc<dyn ContentSource>> {
        self.inner.read().iter().find(|s| s.id() == id).cloned()
    }

    /// Snapshot of all sources in registration order.
    pub fn list(&self) -> Vec<Arc<dyn ContentSource>> {
        self.inner.read().clone()
    }
}
