//! Live asset registry: weak handles to in-memory consumer objects.
//!
//! Consumers that build an object from a catalog record register it here by
//! virtual path so a later catalog update can refresh it in place. Handles
//! are held weakly: the registry never keeps a consumer alive, and dead
//! handles are pruned lazily on the next touch. RAII-scoped consumers may
//! also call [`LiveAssetRegistry::unregister`] explicitly.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::trace;

use crate::catalog::OverlayCatalog;
use crate::record::AssetRecord;
use crate::telemetry::OverlayMetrics;
use crate::vpath::VirtualPath;

/// An in-memory object produced from a catalog record that can be refreshed
/// in place after the record changes.
pub trait LiveAsset: Send + Sync {
    /// Called on the reload worker after the catalog entry at this handle's
    /// registered path (or below it, for directory handles) changes.
    ///
    /// `record` is the record now at the handle's own path, or `None` when
    /// the path no longer resolves.
    fn refresh(&self, record: Option<&Arc<AssetRecord>>);
}

/// Weak-handle table mapping virtual paths to live consumers.
pub struct LiveAssetRegistry {
    handles: DashMap<VirtualPath, Vec<Weak<dyn LiveAsset>>>,
    metrics: Arc<OverlayMetrics>,
}

impl LiveAssetRegistry {
    /// Create an empty registry.
    pub fn new(metrics: Arc<OverlayMetrics>) -> Self {
        Self {
            handles: DashMap::new(),
            metrics,
        }
    }

    /// Register a consumer at a virtual path. The registry holds the handle
    /// weakly; dropping every external `Arc` retires the entry.
    pub fn register<T: LiveAsset + 'static>(&self, path: impl AsRef<str>, handle: &Arc<T>) {
        let path = VirtualPath::new(path.as_ref());
        let handle: Arc<dyn LiveAsset> = handle.clone();
        let weak: Weak<dyn LiveAsset> = Arc::downgrade(&handle);
        trace!(path = %path, "registering live asset handle");
        self.handles.entry(path).or_default().push(weak);
    }

    /// Explicitly remove a consumer registered at a path. Dropping the
    /// handle works too; this exists for RAII-scoped teardown.
    pub fn unregister<T: LiveAsset + 'static>(&self, path: impl AsRef<str>, handle: &Arc<T>) {
        let path = VirtualPath::new(path.as_ref());
        let target = Arc::as_ptr(handle) as *const ();
        if let Some(mut entry) = self.handles.get_mut(&path) {
            entry.retain(|w| w.strong_count() > 0 && w.as_ptr() as *const () != target);
        }
        self.handles.remove_if(&path, |_, v| v.is_empty());
    }

    /// Number of live handles registered at a path (prunes dead ones).
    pub fn live_count(&self, path: impl AsRef<str>) -> usize {
        let path = VirtualPath::new(path.as_ref());
        let count = match self.handles.get_mut(&path) {
            Some(mut entry) => {
                entry.retain(|w| w.strong_count() > 0);
                entry.len()
            }
            None => 0,
        };
        self.handles.remove_if(&path, |_, v| v.is_empty());
        count
    }

    /// Refresh every live consumer reachable from a changed path: the path
    /// itself plus each ancestor directory with registered handles. Each
    /// consumer receives the record at its *own* registered path and is
    /// visited at most once per update, even when reachable through several
    /// ancestor paths.
    ///
    /// Returns the number of refresh calls delivered.
    pub fn propagate(&self, catalog: &OverlayCatalog, changed: &VirtualPath) -> usize {
        let mut visited: HashSet<*const ()> = HashSet::new();
        let mut refreshed = 0;

        let mut cursor = Some(changed.clone());
        while let Some(path) = cursor {
            // Upgrade under the shard guard, call refresh outside it, so a
            // refresh implementation may touch the registry.
            let targets: Vec<Arc<dyn LiveAsset>> = match self.handles.get_mut(&path) {
                Some(mut entry) => {
                    entry.retain(|w| w.strong_count() > 0);
                    entry
                        .iter()
                        .filter(|w| visited.insert(w.as_ptr() as *const ()))
                        .filter_map(|w| w.upgrade())
                        .collect()
                }
                None => Vec::new(),
            };
            self.handles.remove_if(&path, |_, v| v.is_empty());

            if !targets.is_empty() {
                let record = catalog.get(path.as_str(), None);
                for target in targets {
                    target.refresh(record.as_ref());
                    self.metrics.live_refreshed();
                    refreshed += 1;
                }
            }

            cursor = path.parent();
        }
        refreshed
    }
}

impl std::fmt::Debug for LiveAssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveAssetRegistry")
            .field("paths", &self.handles.len())
            .finish()
    }
}
