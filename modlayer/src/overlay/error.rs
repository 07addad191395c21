//! Overlay lifecycle error types.

use thiserror::Error;

use crate::record::SourceId;
use crate::source::SourceError;

/// Errors that can occur during overlay lifecycle operations.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Failed to create the reload worker runtime.
    #[error("failed to create reload runtime: {0}")]
    Runtime(String),

    /// A source failed its initial crawl during registration.
    #[error("failed to register source {name}: {source}")]
    SourceRegistration {
        name: String,
        #[source]
        source: SourceError,
    },

    /// A source failed to recrawl.
    #[error("failed to recrawl source {name}: {source}")]
    Recrawl {
        name: String,
        #[source]
        source: SourceError,
    },

    /// The referenced source is not registered.
    #[error("source {0} is not registered")]
    UnknownSource(SourceId),
}
