//! Reload work items and change descriptors.

use std::fmt;
use std::sync::Arc;

use crate::classify::AssetKind;
use crate::record::{AssetRecord, SourceId};
use crate::vpath::VirtualPath;

/// What happened to a backing-store path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// The path appeared.
    Created,

    /// The path's content changed.
    Modified,

    /// The path disappeared.
    Deleted,

    /// The path moved; the event's path is the new location.
    Renamed { old_path: VirtualPath },
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Renamed { old_path } => write!(f, "renamed from {}", old_path),
        }
    }
}

/// A normalized change notification entering the reload pipeline.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Virtual path the change applies to (new path for renames).
    pub path: VirtualPath,

    /// What happened.
    pub kind: ChangeKind,

    /// The source whose backing store changed.
    pub source: SourceId,
}

/// One unit of work on the reload worker's FIFO queue.
pub(crate) enum ReloadItem {
    /// A detected backing-store change.
    Change(ChangeEvent),

    /// Retract and re-crawl a whole source.
    Recrawl(SourceId),

    /// Arbitrary host-supplied work (e.g. swapping a package binary).
    Host {
        label: String,
        work: Box<dyn FnOnce() + Send>,
        on_done: Option<Box<dyn FnOnce() + Send>>,
    },
}

impl ReloadItem {
    /// Label shown through the presentation handshake.
    pub fn label(&self) -> String {
        match self {
            ReloadItem::Change(ev) => format!("{} ({})", ev.path, ev.kind),
            ReloadItem::Recrawl(id) => format!("recrawl {}", id),
            ReloadItem::Host { label, .. } => label.clone(),
        }
    }
}

impl fmt::Debug for ReloadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadItem::Change(ev) => f.debug_tuple("Change").field(ev).finish(),
            ReloadItem::Recrawl(id) => f.debug_tuple("Recrawl").field(id).finish(),
            ReloadItem::Host { label, .. } => f.debug_tuple("Host").field(label).finish(),
        }
    }
}

/// A finished reload whose completion callback must run on the host's own
/// execution context, never the worker's.
pub(crate) struct CompletedReload {
    pub label: String,
    pub on_done: Option<Box<dyn FnOnce() + Send>>,
}

impl CompletedReload {
    /// Run the completion callback (on the draining thread).
    pub fn finish(self) {
        if let Some(on_done) = self.on_done {
            on_done();
        }
    }
}

/// One applied catalog update, handed to registered reactions.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// Final normalized path that changed.
    pub path: VirtualPath,

    /// Record previously at the path.
    pub previous: Option<Arc<AssetRecord>>,

    /// Record now at the path.
    pub current: Option<Arc<AssetRecord>>,

    /// The source whose change drove the update.
    pub source: SourceId,
}

impl ReloadEvent {
    /// The kind reactions filter on: the new record's kind, falling back to
    /// the replaced record's kind for pure removals.
    pub fn kind(&self) -> Option<AssetKind> {
        self.current
            .as_ref()
            .or(self.previous.as_ref())
            .map(|r| r.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Created.to_string(), "created");
        assert_eq!(
            ChangeKind::Renamed {
                old_path: VirtualPath::new("a/old.png")
            }
            .to_string(),
            "renamed from a/old.png"
        );
    }

    #[test]
    fn test_item_labels() {
        let change = ReloadItem::Change(ChangeEvent {
            path: VirtualPath::new("a.png"),
            kind: ChangeKind::Modified,
            source: SourceId::new("mod"),
        });
        assert_eq!(change.label(), "a.png (modified)");

        let recrawl = ReloadItem::Recrawl(SourceId::new("mod"));
        assert_eq!(recrawl.label(), "recrawl mod");

        let host = ReloadItem::Host {
            label: "swap package".to_string(),
            work: Box::new(|| {}),
            on_done: None,
        };
        assert_eq!(host.label(), "swap package");
    }

    #[test]
    fn test_reload_event_kind_falls_back_to_previous() {
        use crate::accessor::DataAccessor;

        let record = Arc::new(
            AssetRecord::new(
                VirtualPath::new("a.png"),
                SourceId::new("mod"),
                DataAccessor::None,
            )
            .with_kind(AssetKind::Texture),
        );

        let removal = ReloadEvent {
            path: VirtualPath::new("a.png"),
            previous: Some(record),
            current: None,
            source: SourceId::new("mod"),
        };
        assert_eq!(removal.kind(), Some(AssetKind::Texture));
    }
}
