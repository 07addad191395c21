//! The reload pipeline: serialized hot-reload of changed content.
//!
//! A detected change travels through one cycle on a single background
//! worker:
//!
//! ```text
//! Detected ──► Classify delta ──► Update catalog ──► React ──► Propagate
//! (watcher,     (probe source)     (under the        (in reg.   (live
//!  notify_change)                   catalog lock)     order)     handles)
//! ```
//!
//! The worker drains a FIFO queue, one item fully at a time, which gives
//! at-most-one in-flight reload per path by construction. Rapid events for
//! the same path coalesce into one cycle carrying the final observed state.
//! Completion callbacks surface through a second queue drained only by the
//! host's own thread.

mod dispatcher;
mod item;
mod presenter;

pub use item::{ChangeEvent, ChangeKind, ReloadEvent};
pub use presenter::{NullPresenter, ReloadPresenter};

pub(crate) use dispatcher::{ReloadDispatcher, ReloadSubmitter};
pub(crate) use item::ReloadItem;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::catalog::OverlayCatalog;
use crate::classify::AssetKind;
use crate::live::LiveAssetRegistry;
use crate::record::SourceId;
use crate::source::{ContentSource, CrawlStats, SourceError, SourceSet};
use crate::telemetry::OverlayMetrics;

/// Error type reactions report; caught and logged per-reaction.
pub type ReactionError = Box<dyn std::error::Error + Send + Sync>;

type ReactionFn = dyn Fn(&ReloadEvent) -> Result<(), ReactionError> + Send + Sync;

struct Reaction {
    name: String,
    /// Kinds this reaction fires for; empty matches every kind.
    kinds: Vec<AssetKind>,
    run: Arc<ReactionFn>,
}

/// Registered "on kind X changed" reactions, invoked synchronously in
/// registration order during a reload cycle.
#[derive(Default)]
pub(crate) struct ReactionSet {
    inner: RwLock<Vec<Reaction>>,
}

impl ReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        kinds: &[AssetKind],
        run: impl Fn(&ReloadEvent) -> Result<(), ReactionError> + Send + Sync + 'static,
    ) {
        self.inner.write().push(Reaction {
            name: name.into(),
            kinds: kinds.to_vec(),
            run: Arc::new(run),
        });
    }

    /// Invoke every matching reaction. A failing reaction is logged and
    /// never blocks the remaining reactions or the update.
    pub fn run_all(&self, event: &ReloadEvent, metrics: &OverlayMetrics) {
        let matching: Vec<(String, Arc<ReactionFn>)> = {
            let inner = self.inner.read();
            inner
                .iter()
                .filter(|r| {
                    r.kinds.is_empty()
                        || event.kind().map_or(false, |kind| r.kinds.contains(&kind))
                })
                .map(|r| (r.name.clone(), r.run.clone()))
                .collect()
        };

        for (name, run) in matching {
            if let Err(err) = (*run)(event) {
                warn!(
                    reaction = %name,
                    path = %event.path,
                    error = %err,
                    "reload reaction failed"
                );
                metrics.reaction_failed();
            }
        }
    }
}

/// Shared state the reload worker and the overlay context both operate on.
pub(crate) struct ReloadContext {
    pub catalog: Arc<OverlayCatalog>,
    pub live: Arc<LiveAssetRegistry>,
    pub sources: Arc<SourceSet>,
    pub reactions: Arc<ReactionSet>,
    pub presenter: Arc<dyn ReloadPresenter>,
    pub metrics: Arc<OverlayMetrics>,
}

impl ReloadContext {
    /// Crawl a source into the catalog, recording telemetry.
    pub fn crawl_source(&self, source: &dyn ContentSource) -> Result<CrawlStats, SourceError> {
        let started = std::time::Instant::now();
        let mut stats = source.crawl(&mut |record| {
            self.catalog.insert(record);
            self.metrics.entry_crawled();
        })?;
        stats.duration = started.elapsed();
        self.metrics.crawl_skipped_by(stats.skipped as u64);
        info!(
            source = %source.id(),
            name = source.display_name(),
            entries = stats.entries,
            skipped = stats.skipped,
            duration_ms = stats.duration.as_millis() as u64,
            "crawl complete"
        );
        Ok(stats)
    }

    /// Retract and re-crawl a registered source (idempotent).
    pub fn recrawl_source(&self, id: &SourceId) -> Option<CrawlStats> {
        let source = self.sources.get(id)?;
        self.catalog.retract_source(id);
        match self.crawl_source(source.as_ref()) {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!(source = %id, error = %err, "recrawl failed");
                None
            }
        }
    }
}
