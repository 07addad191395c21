//! The reload dispatcher: a single background worker draining a FIFO queue
//! of pending reload items, plus the completed-items queue the host drains.
//!
//! Change watchers and API callers only *enqueue*; every catalog mutation,
//! reaction, and live-handle refresh happens on the worker. Stopping the
//! dispatcher refuses new items, drains what is already pending, then exits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::item::{ChangeKind, CompletedReload, ReloadEvent, ReloadItem};
use super::ReloadContext;
use crate::catalog::UpdateOutcome;
use crate::record::SourceId;
use crate::source::{ProbeOutcome, SourceError};

/// Cloneable handle for enqueueing reload items from arbitrary threads.
///
/// Watcher callbacks run on OS-driven threads; `submit` only performs a
/// non-blocking channel send and never touches shared catalog state.
#[derive(Clone)]
pub(crate) struct ReloadSubmitter {
    tx: mpsc::Sender<ReloadItem>,
    stopped: Arc<AtomicBool>,
    submitted: Arc<AtomicU64>,
    metrics: Arc<crate::telemetry::OverlayMetrics>,
}

impl ReloadSubmitter {
    /// Enqueue an item. Returns false when the dispatcher is stopping or
    /// the pending queue is full (the event is dropped and counted).
    pub fn submit(&self, item: ReloadItem) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            debug!(label = %item.label(), "reload dispatcher stopped; item refused");
            return false;
        }
        match self.tx.try_send(item) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(mpsc::error::TrySendError::Full(item)) => {
                warn!(label = %item.label(), "reload queue full; dropping event");
                self.metrics.event_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(item)) => {
                debug!(label = %item.label(), "reload queue closed; item refused");
                false
            }
        }
    }
}

/// Owns the background worker and both queues.
pub(crate) struct ReloadDispatcher {
    submitter: ReloadSubmitter,
    cancel: CancellationToken,
    completed: Arc<Mutex<VecDeque<CompletedReload>>>,
    processed: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReloadDispatcher {
    /// Spawn the worker on the given runtime handle.
    pub fn start(
        handle: &tokio::runtime::Handle,
        ctx: Arc<ReloadContext>,
        debounce: Duration,
        pending_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(pending_capacity);
        let cancel = CancellationToken::new();
        let completed = Arc::new(Mutex::new(VecDeque::new()));
        let processed = Arc::new(AtomicU64::new(0));
        let submitter = ReloadSubmitter {
            tx,
            stopped: Arc::new(AtomicBool::new(false)),
            submitted: Arc::new(AtomicU64::new(0)),
            metrics: ctx.metrics.clone(),
        };

        let worker = handle.spawn(worker_loop(
            rx,
            ctx,
            cancel.clone(),
            completed.clone(),
            processed.clone(),
            debounce,
        ));

        Self {
            submitter,
            cancel,
            completed,
            processed,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Handle for producers (watchers, the overlay API).
    pub fn submitter(&self) -> ReloadSubmitter {
        self.submitter.clone()
    }

    /// Enqueue an item.
    pub fn submit(&self, item: ReloadItem) -> bool {
        self.submitter.submit(item)
    }

    /// Drain the completed queue, running each completion callback on the
    /// calling thread. Intended to be called once per host frame/tick.
    pub fn drain_completed(&self) -> usize {
        let drained: Vec<CompletedReload> = {
            let mut completed = self.completed.lock();
            completed.drain(..).collect()
        };
        let count = drained.len();
        for item in drained {
            item.finish();
        }
        count
    }

    /// Block until every submitted item has been processed, or the timeout
    /// elapses. Returns true when idle was reached.
    ///
    /// Must not be called from inside the worker's runtime.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let submitted = self.submitter.submitted.load(Ordering::SeqCst);
            let processed = self.processed.load(Ordering::SeqCst);
            if processed >= submitted {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Refuse new items and tell the worker to stop after draining what is
    /// already pending.
    pub fn stop(&self) {
        self.submitter.stopped.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Take the worker handle for joining during shutdown.
    pub fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.lock().take()
    }
}

async fn worker_loop(
    mut rx: mpsc::Receiver<ReloadItem>,
    ctx: Arc<ReloadContext>,
    cancel: CancellationToken,
    completed: Arc<Mutex<VecDeque<CompletedReload>>>,
    processed: Arc<AtomicU64>,
    debounce: Duration,
) {
    info!("reload worker started");
    let mut pending: VecDeque<ReloadItem> = VecDeque::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            maybe_item = rx.recv() => match maybe_item {
                Some(item) => coalesce_push(&mut pending, item, &processed),
                None => break,
            },

            _ = tokio::time::sleep(debounce), if !pending.is_empty() => {
                process_batch(&ctx, &mut pending, &completed, &processed);
            }
        }
    }

    // Stop requested: no new items are accepted, but items already
    // submitted are drained before the worker exits.
    while let Ok(item) = rx.try_recv() {
        coalesce_push(&mut pending, item, &processed);
    }
    if !pending.is_empty() {
        process_batch(&ctx, &mut pending, &completed, &processed);
    }
    info!("reload worker stopped");
}

/// Append an item, superseding a pending not-yet-started change for the
/// same (source, path) so one cycle carries only the final observed state.
fn coalesce_push(pending: &mut VecDeque<ReloadItem>, item: ReloadItem, processed: &AtomicU64) {
    if let ReloadItem::Change(ev) = &item {
        let slot = pending.iter_mut().find(|existing| {
            matches!(
                existing,
                ReloadItem::Change(prior) if prior.source == ev.source && prior.path == ev.path
            )
        });
        if let Some(slot) = slot {
            debug!(path = %ev.path, kind = %ev.kind, "superseding pending reload");
            *slot = item;
            // The superseded item counts as processed so idle accounting
            // stays balanced.
            processed.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }
    pending.push_back(item);
}

/// Drain the whole pending batch through the presentation handshake.
fn process_batch(
    ctx: &ReloadContext,
    pending: &mut VecDeque<ReloadItem>,
    completed: &Mutex<VecDeque<CompletedReload>>,
    processed: &AtomicU64,
) {
    let batch_label = match pending.len() {
        1 => pending[0].label(),
        n => format!("{} reload items", n),
    };
    ctx.presenter.begin_batch(&batch_label);

    while let Some(item) = pending.pop_front() {
        let label = item.label();
        process_item(ctx, item, completed);
        ctx.presenter.complete_one(&label);
        ctx.metrics.reload_completed();
        processed.fetch_add(1, Ordering::SeqCst);
    }

    ctx.presenter.batch_done();
}

fn process_item(
    ctx: &ReloadContext,
    item: ReloadItem,
    completed: &Mutex<VecDeque<CompletedReload>>,
) {
    match item {
        ReloadItem::Change(ev) => process_change(ctx, ev),
        ReloadItem::Recrawl(id) => {
            ctx.recrawl_source(&id);
        }
        ReloadItem::Host {
            label,
            work,
            on_done,
        } => {
            debug!(label = %label, "running host reload work");
            work();
            completed
                .lock()
                .push_back(CompletedReload { label, on_done });
        }
    }
}

/// One full Detected→Done cycle for a change event (§reload pipeline):
/// classify the delta against the source, update the catalog, run
/// reactions, and propagate to live consumers.
fn process_change(ctx: &ReloadContext, ev: super::item::ChangeEvent) {
    let Some(source) = ctx.sources.get(&ev.source) else {
        warn!(source = %ev.source, path = %ev.path, "change event for unregistered source");
        return;
    };
    debug!(path = %ev.path, kind = %ev.kind, source = %ev.source, "processing change");

    // A rename retires the old path before the new one is probed.
    if let ChangeKind::Renamed { old_path } = &ev.kind {
        let outcome = ctx.catalog.remove(old_path.as_str());
        finish_update(ctx, &ev.source, outcome);
    }

    match source.probe(&ev.path) {
        Ok(ProbeOutcome::File(record)) => {
            let outcome = ctx.catalog.insert(record);
            finish_update(ctx, &ev.source, outcome);
        }
        Ok(ProbeOutcome::Directory(records)) => {
            // Reconcile the re-crawled subtree: entries of this source that
            // vanished from the backing store go away, the rest refresh.
            let fresh: std::collections::HashSet<_> =
                records.iter().map(|r| r.path.clone()).collect();
            for stale in ctx.catalog.paths_under(&ev.path, &ev.source) {
                if !fresh.contains(&stale) {
                    let outcome = ctx.catalog.remove(stale.as_str());
                    finish_update(ctx, &ev.source, outcome);
                }
            }
            for record in records {
                let outcome = ctx.catalog.insert(record);
                finish_update(ctx, &ev.source, outcome);
            }
        }
        Ok(ProbeOutcome::Absent) => {
            let outcome = ctx.catalog.remove(ev.path.as_str());
            finish_update(ctx, &ev.source, outcome);
        }
        Err(SourceError::ProbeUnsupported) => fallback_recrawl(ctx, &ev),
        Err(err) => {
            warn!(path = %ev.path, source = %ev.source, error = %err, "probe failed");
        }
    }
}

/// Sources that cannot re-read a single path get a full recrawl; reactions
/// and propagation still run for the path named by the event.
fn fallback_recrawl(ctx: &ReloadContext, ev: &super::item::ChangeEvent) {
    debug!(source = %ev.source, path = %ev.path, "probe unsupported; recrawling source");
    let previous = ctx.catalog.get(ev.path.as_str(), None);
    ctx.recrawl_source(&ev.source);
    let current = ctx.catalog.get(ev.path.as_str(), None);

    let unchanged = match (&previous, &current) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    };
    if unchanged {
        return;
    }

    let event = ReloadEvent {
        path: ev.path.clone(),
        previous,
        current,
        source: ev.source.clone(),
    };
    ctx.reactions.run_all(&event, &ctx.metrics);
    ctx.live.propagate(&ctx.catalog, &event.path);
}

/// Steps 4 and 5 of the cycle: reactions in registration order, then
/// refresh of live consumers along the ancestor chain.
fn finish_update(ctx: &ReloadContext, source: &SourceId, outcome: UpdateOutcome) {
    if !outcome.changed {
        return;
    }
    let event = ReloadEvent {
        path: outcome.path,
        previous: outcome.previous,
        current: outcome.current,
        source: source.clone(),
    };
    ctx.reactions.run_all(&event, &ctx.metrics);
    ctx.live.propagate(&ctx.catalog, &event.path);
}
