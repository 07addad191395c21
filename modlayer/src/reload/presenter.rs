//! Presentation handshake with the host's rendering layer.
//!
//! The host owns all drawing, timing, and input. The reload worker only
//! calls these three hooks around each batch of reload work so the host can
//! show a non-blocking "reloading…" indicator.

/// Hooks the reload worker calls around batches of reload work.
pub trait ReloadPresenter: Send + Sync {
    /// A batch of reload work is starting.
    fn begin_batch(&self, label: &str);

    /// One work item in the current batch finished.
    fn complete_one(&self, label: &str);

    /// The current batch is fully drained.
    fn batch_done(&self);
}

/// Default presenter: emits trace events and draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl ReloadPresenter for NullPresenter {
    fn begin_batch(&self, label: &str) {
        tracing::debug!(label, "reload batch started");
    }

    fn complete_one(&self, label: &str) {
        tracing::debug!(label, "reload item complete");
    }

    fn batch_done(&self) {
        tracing::debug!("reload batch done");
    }
}
