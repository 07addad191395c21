//! Overlay engine configuration.

use std::time::Duration;

/// Default debounce window for coalescing rapid-fire change events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Default capacity of the pending reload queue.
pub const DEFAULT_PENDING_CAPACITY: usize = 1024;

/// Configuration for an [`Overlay`](super::Overlay).
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    /// How long the reload worker lets events settle before processing a
    /// batch. Rapid events for the same path within this window collapse
    /// into one reload cycle.
    pub debounce: Duration,

    /// Capacity of the pending reload queue. Watcher events beyond this are
    /// dropped (and counted) rather than blocking an OS thread.
    pub pending_capacity: usize,

    /// Install filesystem watchers for directory sources at registration.
    pub watch_sources: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            pending_capacity: DEFAULT_PENDING_CAPACITY,
            watch_sources: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OverlayConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(200));
        assert_eq!(config.pending_capacity, 1024);
        assert!(config.watch_sources);
    }
}
