//! Modlayer - mod content overlay filesystem and hot-reload engine.
//!
//! Modlayer merges assets contributed by an ordered list of independent
//! content sources (directories, zip archives, in-process resource bundles,
//! synthetic generators) into one logical, path-addressed namespace,
//! resolves override precedence, and propagates live updates to
//! already-loaded consumer objects while the host keeps running.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  crawl   ┌──────────────────┐  lookup  ┌──────────┐
//! │ ContentSource ├─────────►│  OverlayCatalog  │◄─────────┤   Host   │
//! │ (dir/zip/...) │          │ (merged view)    │          │          │
//! └──────┬────────┘          └────────▲─────────┘          └────▲─────┘
//!        │ watch                      │ update                  │ refresh
//!        ▼                            │                         │
//! ┌───────────────┐  enqueue  ┌───────┴──────────┐  propagate ┌─┴────────┐
//! │ SourceWatcher ├──────────►│ ReloadDispatcher ├───────────►│ LiveAsset│
//! │ (notify)      │           │ (single worker)  │            │ Registry │
//! └───────────────┘           └──────────────────┘            └──────────┘
//! ```
//!
//! The [`overlay::Overlay`] context object owns all of the above; there is
//! no global state. Later-registered sources override earlier ones at
//! colliding paths; conflicts outside the exempt kinds are logged, never
//! fatal.

pub mod accessor;
pub mod catalog;
pub mod classify;
pub mod live;
pub mod overlay;
pub mod record;
pub mod reload;
pub mod source;
pub mod telemetry;
pub mod vpath;

pub use accessor::{AccessError, DataAccessor};
pub use catalog::OverlayCatalog;
pub use classify::{AssetKind, Classification, ClassifierRule, PathClassifier};
pub use live::{LiveAsset, LiveAssetRegistry};
pub use overlay::{Overlay, OverlayBuilder, OverlayConfig, OverlayError};
pub use record::{AssetRecord, SourceId};
pub use reload::{
    ChangeEvent, ChangeKind, NullPresenter, ReactionError, ReloadEvent, ReloadPresenter,
};
pub use source::{
    ArchiveSource, BundleSource, ContentSource, CrawlStats, DirectorySource, ProbeOutcome,
    SourceError, SyntheticSource,
};
pub use telemetry::{MetricsSnapshot, OverlayMetrics};
pub use vpath::VirtualPath;
