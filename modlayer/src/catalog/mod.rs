//! The overlay catalog: merged, path-addressed namespace over all sources.
//!
//! The catalog maintains the `path → record` map plus the directory
//! structure synthesized around contributed leaves. Later registrations win
//! on colliding paths; collisions between conflicting kinds are logged but
//! never fatal. Directory nodes are created lazily when their first
//! descendant arrives and recycled when their last child leaves.
//!
//! # Structure
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              OverlayCatalog              │
//! │                                          │
//! │  entries:  HashMap<VirtualPath, Record>  │
//! │  children: HashMap<DirPath, Vec<Path>>   │
//! │  (one RwLock guards both maps)           │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Every structural mutation (insert/remove plus the parent bookkeeping it
//! implies) happens under a single write lock, so readers never observe a
//! child list pointing at a retired record. No I/O happens under the lock;
//! records are fully read before insertion.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::classify::{AssetKind, PathClassifier};
use crate::record::{AssetRecord, SourceId};
use crate::telemetry::OverlayMetrics;
use crate::vpath::VirtualPath;

/// What an insert or remove did, handed to the reload pipeline.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Final normalized path (after any classifier rewrite).
    pub path: VirtualPath,

    /// Record previously at the path, if any.
    pub previous: Option<Arc<AssetRecord>>,

    /// Record now at the path, if any.
    pub current: Option<Arc<AssetRecord>>,

    /// False when the operation was a no-op (removing a missing path or a
    /// directory).
    pub changed: bool,
}

#[derive(Debug, Default)]
struct CatalogInner {
    entries: HashMap<VirtualPath, Arc<AssetRecord>>,
    /// Ordered child lists, keyed by directory path. Keys mirror exactly
    /// the directory records present in `entries`.
    children: HashMap<VirtualPath, Vec<VirtualPath>>,
}

#[derive(Clone, Copy)]
enum ParentState {
    Directory,
    Leaf,
    Absent,
}

/// The merged namespace shared by every component of the overlay.
pub struct OverlayCatalog {
    inner: RwLock<CatalogInner>,
    classifier: Arc<PathClassifier>,
    metrics: Arc<OverlayMetrics>,
}

impl OverlayCatalog {
    /// Create an empty catalog. The namespace root is a permanent directory
    /// record.
    pub fn new(classifier: Arc<PathClassifier>, metrics: Arc<OverlayMetrics>) -> Self {
        let mut inner = CatalogInner::default();
        let root = VirtualPath::root();
        inner
            .entries
            .insert(root.clone(), Arc::new(AssetRecord::directory(root.clone())));
        inner.children.insert(root, Vec::new());
        Self {
            inner: RwLock::new(inner),
            classifier,
            metrics,
        }
    }

    /// Exact lookup by normalized path.
    ///
    /// With `want` given, a kind mismatch is treated as not-found.
    pub fn get(&self, path: impl AsRef<str>, want: Option<AssetKind>) -> Option<Arc<AssetRecord>> {
        let path = VirtualPath::new(path.as_ref());
        let inner = self.inner.read();
        let record = inner.entries.get(&path)?.clone();
        match want {
            Some(kind) if record.kind != kind => None,
            _ => Some(record),
        }
    }

    /// Ordered child records of a directory. Empty for leaves and missing
    /// paths.
    pub fn children(&self, path: impl AsRef<str>) -> Vec<Arc<AssetRecord>> {
        let path = VirtualPath::new(path.as_ref());
        let inner = self.inner.read();
        match inner.children.get(&path) {
            Some(list) => list
                .iter()
                .filter_map(|child| inner.entries.get(child).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Insert (or replace) a leaf record. Classifies the record when its
    /// kind is unset; the classifier may rewrite the path.
    pub fn insert(&self, mut record: AssetRecord) -> UpdateOutcome {
        // Classification is pure and happens outside the lock.
        if record.kind.is_unclassified() {
            let classification = self.classifier.classify(&record.path);
            record.kind = classification.kind;
            record.format = classification.format;
            if let Some(rewritten) = classification.rewrite {
                debug!(
                    from = %record.path,
                    to = %rewritten,
                    "classifier rewrote virtual path"
                );
                record.path = rewritten;
            }
        }
        let path = record.path.clone();
        if path.is_root() {
            warn!(source = %record.source, "ignoring record at the namespace root");
            return UpdateOutcome {
                path,
                previous: None,
                current: None,
                changed: false,
            };
        }

        let mut inner = self.inner.write();
        let previous = inner.entries.get(&path).cloned();

        if let Some(prev) = &previous {
            if prev.source != record.source && !prev.kind.is_non_conflicting() {
                warn!(
                    path = %path,
                    existing = %prev.source,
                    replacement = %record.source,
                    kind = %prev.kind,
                    "overlay path conflict; later registration wins"
                );
                self.metrics.conflict_logged();
            }
            if prev.is_directory() && !record.is_directory() {
                // A leaf now shadows a synthesized directory; its child list
                // goes with it.
                inner.children.remove(&path);
            }
        }

        let current = Arc::new(record);
        inner.entries.insert(path.clone(), current.clone());
        Self::link_upward(&mut inner, &path);

        UpdateOutcome {
            path,
            previous,
            current: Some(current),
            changed: true,
        }
    }

    /// Remove the record at a path.
    ///
    /// Removing a directory is a no-op: directories leave the namespace only
    /// when their last child does. Removing a missing path is a no-op.
    pub fn remove(&self, path: impl AsRef<str>) -> UpdateOutcome {
        let path = VirtualPath::new(path.as_ref());
        let mut inner = self.inner.write();

        let previous = match inner.entries.get(&path) {
            None => {
                return UpdateOutcome {
                    path,
                    previous: None,
                    current: None,
                    changed: false,
                }
            }
            Some(record) if record.is_directory() => {
                let record = record.clone();
                return UpdateOutcome {
                    path,
                    previous: Some(record.clone()),
                    current: Some(record),
                    changed: false,
                };
            }
            Some(record) => record.clone(),
        };

        inner.entries.remove(&path);
        Self::unlink_upward(&mut inner, &path);

        UpdateOutcome {
            path,
            previous: Some(previous),
            current: None,
            changed: true,
        }
    }

    /// Remove every leaf contributed by a source, cascading directory
    /// teardown. Returns the number of leaves retracted.
    pub fn retract_source(&self, source: &SourceId) -> usize {
        let paths: Vec<VirtualPath> = {
            let inner = self.inner.read();
            inner
                .entries
                .values()
                .filter(|r| !r.is_directory() && &r.source == source)
                .map(|r| r.path.clone())
                .collect()
        };
        let count = paths.len();
        for path in paths {
            self.remove(path.as_str());
        }
        debug!(source = %source, retracted = count, "retracted source entries");
        count
    }

    /// Leaf paths of one source strictly below a prefix. Used by the reload
    /// pipeline to reconcile a re-crawled subtree.
    pub fn paths_under(&self, prefix: &VirtualPath, source: &SourceId) -> Vec<VirtualPath> {
        let inner = self.inner.read();
        inner
            .entries
            .values()
            .filter(|r| {
                !r.is_directory()
                    && &r.source == source
                    && r.path != *prefix
                    && r.path.starts_with(prefix)
            })
            .map(|r| r.path.clone())
            .collect()
    }

    /// Read-only traversal over every record, in path order.
    ///
    /// The callback runs outside the catalog lock on a snapshot, so it may
    /// call back into the catalog freely.
    pub fn for_each_asset(&self, mut f: impl FnMut(&Arc<AssetRecord>)) {
        let mut records: Vec<Arc<AssetRecord>> = {
            let inner = self.inner.read();
            inner.entries.values().cloned().collect()
        };
        records.sort_by(|a, b| a.path.cmp(&b.path));
        for record in &records {
            f(record);
        }
    }

    /// Total number of records, directories included.
    pub fn entry_count(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Number of leaf records.
    pub fn asset_count(&self) -> usize {
        self.inner
            .read()
            .entries
            .values()
            .filter(|r| !r.is_directory())
            .count()
    }

    /// Walk from a freshly inserted path toward the root, synthesizing
    /// missing directory records and wiring child slots.
    ///
    /// Iterative on purpose: adversarially deep paths must not recurse.
    fn link_upward(inner: &mut CatalogInner, path: &VirtualPath) {
        let mut cur = path.clone();
        loop {
            if cur.is_root() {
                break;
            }
            let Some(parent) = cur.parent() else {
                break;
            };

            let state = match inner.entries.get(&parent) {
                Some(record) if record.is_directory() => ParentState::Directory,
                Some(_) => ParentState::Leaf,
                None => ParentState::Absent,
            };

            match state {
                ParentState::Directory => {}
                ParentState::Leaf => {
                    // A leaf sat where a directory is now required; the
                    // directory wins and regains any children already
                    // registered below it.
                    debug!(path = %parent, "promoting shadowed path to directory");
                    let list = Self::rescan_children(&inner.entries, &parent);
                    inner.entries.insert(
                        parent.clone(),
                        Arc::new(AssetRecord::directory(parent.clone())),
                    );
                    inner.children.insert(parent.clone(), list);
                }
                ParentState::Absent => {
                    inner.entries.insert(
                        parent.clone(),
                        Arc::new(AssetRecord::directory(parent.clone())),
                    );
                    inner.children.insert(parent.clone(), Vec::new());
                }
            }

            if let Some(list) = inner.children.get_mut(&parent) {
                // Same path keeps its slot; new paths append.
                if !list.contains(&cur) {
                    list.push(cur.clone());
                }
            }

            if matches!(state, ParentState::Directory | ParentState::Leaf) {
                // The parent (and therefore its ancestors) were already
                // wired into the namespace.
                break;
            }
            cur = parent;
        }
    }

    /// Walk from a removed path toward the root, dropping empty synthesized
    /// directories.
    fn unlink_upward(inner: &mut CatalogInner, path: &VirtualPath) {
        let mut cur = path.clone();
        loop {
            if cur.is_root() {
                break;
            }
            let Some(parent) = cur.parent() else {
                break;
            };

            let now_empty = match inner.children.get_mut(&parent) {
                Some(list) => {
                    list.retain(|p| p != &cur);
                    list.is_empty()
                }
                None => false,
            };

            if now_empty && !parent.is_root() {
                inner.entries.remove(&parent);
                inner.children.remove(&parent);
                cur = parent;
            } else {
                break;
            }
        }
    }

    /// Rebuild a directory's child list from the entries map. Only needed
    /// when a shadowed path is promoted back to a directory.
    fn rescan_children(
        entries: &HashMap<VirtualPath, Arc<AssetRecord>>,
        dir: &VirtualPath,
    ) -> Vec<VirtualPath> {
        let mut list: Vec<VirtualPath> = entries
            .keys()
            .filter(|p| p.parent().as_ref() == Some(dir))
            .cloned()
            .collect();
        list.sort();
        list
    }
}

impl std::fmt::Debug for OverlayCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("OverlayCatalog")
            .field("entries", &inner.entries.len())
            .field("directories", &inner.children.len())
            .finish()
    }
}
