//! The overlay context: one explicit object tying the whole engine together.
//!
//! An [`Overlay`] owns the catalog, the live asset registry, the registered
//! sources with their filesystem watchers, and the reload dispatcher. There
//! is no global state: the context is constructed at process start and
//! passed by reference to every consumer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use modlayer::overlay::{Overlay, OverlayConfig};
//! use modlayer::record::SourceId;
//! use modlayer::source::DirectorySource;
//!
//! # fn main() -> Result<(), modlayer::overlay::OverlayError> {
//! let overlay = Overlay::start(OverlayConfig::default())?;
//!
//! let source = Arc::new(DirectorySource::new(SourceId::new("foo"), "/mods/Foo"));
//! overlay.register_source(source)?;
//!
//! if let Some(record) = overlay.get("sprites/a.png", None) {
//!     let bytes = record.accessor.read_bytes();
//! }
//!
//! // Each frame on the host's main loop:
//! overlay.drain_completed();
//! # Ok(())
//! # }
//! ```

mod config;
mod error;

pub use config::{OverlayConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_PENDING_CAPACITY};
pub use error::OverlayError;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tracing::{info, warn};

use crate::catalog::OverlayCatalog;
use crate::classify::{AssetKind, PathClassifier};
use crate::live::{LiveAsset, LiveAssetRegistry};
use crate::record::{AssetRecord, SourceId};
use crate::reload::{
    ChangeEvent, ChangeKind, NullPresenter, ReactionError, ReactionSet, ReloadContext,
    ReloadDispatcher, ReloadEvent, ReloadItem, ReloadPresenter,
};
use crate::source::watch::SourceWatcher;
use crate::source::{ContentSource, CrawlStats, SourceSet};
use crate::telemetry::{MetricsSnapshot, OverlayMetrics};

/// Builder for an [`Overlay`].
pub struct OverlayBuilder {
    config: OverlayConfig,
    presenter: Arc<dyn ReloadPresenter>,
}

impl OverlayBuilder {
    /// Start from default configuration and the no-op presenter.
    pub fn new() -> Self {
        Self {
            config: OverlayConfig::default(),
            presenter: Arc::new(NullPresenter),
        }
    }

    /// Replace the configuration.
    pub fn config(mut self, config: OverlayConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a presentation handshake implementation.
    pub fn presenter(mut self, presenter: Arc<dyn ReloadPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Start the overlay with its own single-worker runtime for the reload
    /// worker. Use this from synchronous hosts (the common case).
    pub fn start(self) -> Result<Overlay, OverlayError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("modlayer-reload")
            .enable_all()
            .build()
            .map_err(|e| OverlayError::Runtime(e.to_string()))?;
        let handle = runtime.handle().clone();
        Ok(self.build(handle, Some(runtime)))
    }

    /// Start the overlay on an existing runtime.
    pub fn start_on(self, handle: &Handle) -> Overlay {
        self.build(handle.clone(), None)
    }

    fn build(self, handle: Handle, runtime: Option<Runtime>) -> Overlay {
        let metrics = Arc::new(OverlayMetrics::new());
        let classifier = Arc::new(PathClassifier::new());
        let catalog = Arc::new(OverlayCatalog::new(classifier.clone(), metrics.clone()));
        let live = Arc::new(LiveAssetRegistry::new(metrics.clone()));
        let sources = Arc::new(SourceSet::new());
        let reactions = Arc::new(ReactionSet::new());

        let ctx = Arc::new(ReloadContext {
            catalog,
            live,
            sources,
            reactions,
            presenter: self.presenter,
            metrics,
        });

        let dispatcher = ReloadDispatcher::start(
            &handle,
            ctx.clone(),
            self.config.debounce,
            self.config.pending_capacity,
        );

        info!(
            debounce_ms = self.config.debounce.as_millis() as u64,
            watch = self.config.watch_sources,
            "overlay started"
        );

        Overlay {
            ctx,
            classifier,
            dispatcher,
            watchers: Mutex::new(HashMap::new()),
            config: self.config,
            handle,
            runtime,
        }
    }
}

impl Default for OverlayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The mod content overlay engine.
///
/// See the [module documentation](self) for an overview.
pub struct Overlay {
    ctx: Arc<ReloadContext>,
    classifier: Arc<PathClassifier>,
    dispatcher: ReloadDispatcher,
    watchers: Mutex<HashMap<SourceId, SourceWatcher>>,
    config: OverlayConfig,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl Overlay {
    /// Start an overlay with the given configuration and its own reload
    /// runtime.
    pub fn start(config: OverlayConfig) -> Result<Self, OverlayError> {
        OverlayBuilder::new().config(config).start()
    }

    /// Builder for advanced construction (custom presenter, borrowed
    /// runtime).
    pub fn builder() -> OverlayBuilder {
        OverlayBuilder::new()
    }

    // ------------------------------------------------------------------
    // Source registration
    // ------------------------------------------------------------------

    /// Register a content source and crawl it into the catalog.
    ///
    /// For directory sources a filesystem watcher is installed (unless
    /// disabled in the configuration); a watcher failure degrades to an
    /// unwatched source rather than failing registration.
    pub fn register_source(
        &self,
        source: Arc<dyn ContentSource>,
    ) -> Result<CrawlStats, OverlayError> {
        // The source must be resolvable by id before its first change event
        // can arrive.
        self.ctx.sources.insert(source.clone());
        let stats = match self.ctx.crawl_source(source.as_ref()) {
            Ok(stats) => stats,
            Err(err) => {
                self.ctx.sources.remove(source.id());
                // A crawl can fail after emitting some entries; none of them
                // stay behind.
                self.ctx.catalog.retract_source(source.id());
                return Err(OverlayError::SourceRegistration {
                    name: source.display_name().to_string(),
                    source: err,
                });
            }
        };

        if self.config.watch_sources {
            if let Some(root) = source.watch_root() {
                match SourceWatcher::start(
                    source.id().clone(),
                    root.to_path_buf(),
                    self.dispatcher.submitter(),
                ) {
                    Ok(watcher) => {
                        self.watchers.lock().insert(source.id().clone(), watcher);
                    }
                    Err(err) => {
                        warn!(
                            source = %source.id(),
                            root = %root.display(),
                            error = %err,
                            "failed to watch source root; continuing unwatched"
                        );
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Unregister a source, retracting every entry it contributed.
    ///
    /// Returns the number of retracted leaves.
    pub fn unregister_source(&self, id: &SourceId) -> Result<usize, OverlayError> {
        self.watchers.lock().remove(id);
        if self.ctx.sources.remove(id).is_none() {
            return Err(OverlayError::UnknownSource(id.clone()));
        }
        let retracted = self.ctx.catalog.retract_source(id);
        info!(source = %id, retracted, "source unregistered");
        Ok(retracted)
    }

    /// Retract and re-crawl a registered source. Idempotent: with unchanged
    /// backing content the catalog ends up observationally identical.
    pub fn recrawl(&self, id: &SourceId) -> Result<CrawlStats, OverlayError> {
        let source = self
            .ctx
            .sources
            .get(id)
            .ok_or_else(|| OverlayError::UnknownSource(id.clone()))?;
        self.ctx.catalog.retract_source(id);
        self.ctx
            .crawl_source(source.as_ref())
            .map_err(|err| OverlayError::Recrawl {
                name: source.display_name().to_string(),
                source: err,
            })
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look up a record by virtual path, optionally requiring a kind.
    pub fn get(&self, path: impl AsRef<str>, want: Option<AssetKind>) -> Option<Arc<AssetRecord>> {
        self.ctx.catalog.get(path, want)
    }

    /// Ordered child records of a directory path.
    pub fn children(&self, path: impl AsRef<str>) -> Vec<Arc<AssetRecord>> {
        self.ctx.catalog.children(path)
    }

    /// Read-only traversal over every record in path order (dump/export
    /// hook).
    pub fn for_each_asset(&self, f: impl FnMut(&Arc<AssetRecord>)) {
        self.ctx.catalog.for_each_asset(f)
    }

    // ------------------------------------------------------------------
    // Change ingestion and reload work
    // ------------------------------------------------------------------

    /// Feed a change notification into the reload pipeline. Usable by
    /// external callers that detect changes out-of-band (e.g. a package
    /// manager replacing a mod).
    ///
    /// Returns false when the dispatcher is stopping or the queue is full.
    pub fn notify_change(
        &self,
        path: impl AsRef<str>,
        kind: ChangeKind,
        source: &SourceId,
    ) -> bool {
        self.dispatcher.submit(ReloadItem::Change(ChangeEvent {
            path: crate::vpath::VirtualPath::new(path.as_ref()),
            kind,
            source: source.clone(),
        }))
    }

    /// Enqueue an arbitrary unit of reload work on the reload worker.
    pub fn request_reload(
        &self,
        label: impl Into<String>,
        work: impl FnOnce() + Send + 'static,
    ) -> bool {
        self.dispatcher.submit(ReloadItem::Host {
            label: label.into(),
            work: Box::new(work),
            on_done: None,
        })
    }

    /// Enqueue reload work with a completion callback. The callback runs on
    /// the host's own thread during [`drain_completed`](Self::drain_completed),
    /// never on the worker.
    pub fn request_reload_with_callback(
        &self,
        label: impl Into<String>,
        work: impl FnOnce() + Send + 'static,
        on_done: impl FnOnce() + Send + 'static,
    ) -> bool {
        self.dispatcher.submit(ReloadItem::Host {
            label: label.into(),
            work: Box::new(work),
            on_done: Some(Box::new(on_done)),
        })
    }

    /// Drain completed reload items, running completion callbacks on the
    /// calling thread. Call once per frame/tick from the host's main loop.
    pub fn drain_completed(&self) -> usize {
        self.dispatcher.drain_completed()
    }

    /// Block until the reload worker has drained everything submitted so
    /// far, or the timeout elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.dispatcher.wait_idle(timeout)
    }

    // ------------------------------------------------------------------
    // Reactions and live assets
    // ------------------------------------------------------------------

    /// Register an "on kind changed" reaction, invoked synchronously on the
    /// reload worker in registration order. An empty kind slice matches
    /// every kind. Reaction errors are logged and never abort the cycle.
    pub fn register_reaction(
        &self,
        name: impl Into<String>,
        kinds: &[AssetKind],
        reaction: impl Fn(&ReloadEvent) -> Result<(), ReactionError> + Send + Sync + 'static,
    ) {
        self.ctx.reactions.register(name, kinds, reaction);
    }

    /// Register a live consumer object at a virtual path for in-place
    /// refresh.
    pub fn register_live<T: LiveAsset + 'static>(&self, path: impl AsRef<str>, handle: &Arc<T>) {
        self.ctx.live.register(path, handle);
    }

    /// Explicitly remove a live consumer (dropping the handle works too).
    pub fn unregister_live<T: LiveAsset + 'static>(&self, path: impl AsRef<str>, handle: &Arc<T>) {
        self.ctx.live.unregister(path, handle);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The shared catalog.
    pub fn catalog(&self) -> &OverlayCatalog {
        &self.ctx.catalog
    }

    /// The live asset registry.
    pub fn live_assets(&self) -> &LiveAssetRegistry {
        &self.ctx.live
    }

    /// The path classifier (for registering extension rules).
    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Point-in-time telemetry snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// The runtime handle the reload worker runs on.
    pub fn runtime_handle(&self) -> &Handle {
        &self.handle
    }

    /// Stop accepting reload work, drain what is pending, join the worker,
    /// and run any remaining completion callbacks on the calling thread.
    ///
    /// Must be called from outside the reload runtime.
    pub fn shutdown(self) {
        self.dispatcher.stop();
        self.watchers.lock().clear();

        if let Some(worker) = self.dispatcher.take_worker() {
            let result = match &self.runtime {
                Some(runtime) => runtime.block_on(worker),
                None => self.handle.block_on(worker),
            };
            if let Err(err) = result {
                warn!(error = %err, "reload worker ended abnormally");
            }
        }

        self.dispatcher.drain_completed();
        info!("overlay shut down");
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("entries", &self.ctx.catalog.entry_count())
            .field("sources", &self.ctx.sources.list().len())
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}
