//! Overlay telemetry for observability and host-side reporting.
//!
//! Lock-free atomic counters recorded by the catalog, sources, and the
//! reload worker, with point-in-time snapshots for display.
//!
//! # Example
//!
//! ```
//! use modlayer::telemetry::OverlayMetrics;
//!
//! let metrics = OverlayMetrics::new();
//! metrics.entry_crawled();
//! metrics.conflict_logged();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.entries_crawled, 1);
//! assert_eq!(snapshot.conflicts, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for overlay activity.
#[derive(Debug, Default)]
pub struct OverlayMetrics {
    entries_crawled: AtomicU64,
    crawl_skips: AtomicU64,
    conflicts: AtomicU64,
    reloads_completed: AtomicU64,
    reactions_failed: AtomicU64,
    live_refreshes: AtomicU64,
    events_dropped: AtomicU64,
}

impl OverlayMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A source emitted one record during crawl.
    pub fn entry_crawled(&self) {
        self.entries_crawled.fetch_add(1, Ordering::Relaxed);
    }

    /// A source skipped one unreadable entry during crawl.
    pub fn crawl_skipped(&self) {
        self.crawl_skips.fetch_add(1, Ordering::Relaxed);
    }

    /// A crawl finished having skipped `n` unreadable entries.
    pub fn crawl_skipped_by(&self, n: u64) {
        self.crawl_skips.fetch_add(n, Ordering::Relaxed);
    }

    /// Two sources collided on a path with a conflicting kind.
    pub fn conflict_logged(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// The reload worker finished one work item.
    pub fn reload_completed(&self) {
        self.reloads_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A registered reaction returned an error.
    pub fn reaction_failed(&self) {
        self.reactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A live consumer was refreshed in place.
    pub fn live_refreshed(&self) {
        self.live_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    /// A change event was dropped because the pending queue was full.
    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_crawled: self.entries_crawled.load(Ordering::Relaxed),
            crawl_skips: self.crawl_skips.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            reloads_completed: self.reloads_completed.load(Ordering::Relaxed),
            reactions_failed: self.reactions_failed.load(Ordering::Relaxed),
            live_refreshes: self.live_refreshes.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`OverlayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Records emitted by sources during crawls.
    pub entries_crawled: u64,
    /// Entries skipped during crawls because they could not be read.
    pub crawl_skips: u64,
    /// Override conflicts logged.
    pub conflicts: u64,
    /// Reload work items completed.
    pub reloads_completed: u64,
    /// Reaction invocations that returned an error.
    pub reactions_failed: u64,
    /// In-place refreshes delivered to live consumers.
    pub live_refreshes: u64,
    /// Change events dropped on a full pending queue.
    pub events_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counts() {
        let metrics = OverlayMetrics::new();
        metrics.entry_crawled();
        metrics.entry_crawled();
        metrics.crawl_skipped();
        metrics.reload_completed();
        metrics.live_refreshed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_crawled, 2);
        assert_eq!(snapshot.crawl_skips, 1);
        assert_eq!(snapshot.reloads_completed, 1);
        assert_eq!(snapshot.live_refreshes, 1);
        assert_eq!(snapshot.conflicts, 0);
        assert_eq!(snapshot.events_dropped, 0);
    }

    #[test]
    fn test_default_snapshot_is_zero() {
        let metrics = OverlayMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
