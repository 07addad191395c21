//! Filesystem watching for directory-backed sources.
//!
//! A [`SourceWatcher`] owns one recursive `notify` watcher rooted at a
//! directory source. Callbacks arrive on OS-driven threads and only map the
//! raw event into normalized [`ChangeEvent`]s and enqueue them onto the
//! reload dispatcher's bounded channel; they never touch the catalog.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use super::is_hidden_name;
use crate::record::SourceId;
use crate::reload::{ChangeEvent, ChangeKind, ReloadItem, ReloadSubmitter};
use crate::vpath::VirtualPath;

/// A live filesystem watch feeding one directory source's changes into the
/// reload pipeline. Dropping the watcher stops the watch.
pub(crate) struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Start watching `root` recursively, submitting normalized change
    /// events for `source` through the dispatcher.
    pub fn start(
        source: SourceId,
        root: PathBuf,
        submitter: ReloadSubmitter,
    ) -> Result<Self, notify::Error> {
        let callback_root = root.clone();
        let callback_source = source.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for change in map_event(&callback_root, &callback_source, &event) {
                        submitter.submit(ReloadItem::Change(change));
                    }
                }
                Err(err) => {
                    warn!(source = %callback_source, error = %err, "filesystem watch error");
                }
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        debug!(source = %source, root = %root.display(), "watching source root");

        Ok(Self { _watcher: watcher })
    }
}

/// Map a raw filesystem path under the watch root to its virtual path.
///
/// Events on the root itself, outside the root, or under a hidden component
/// are dropped.
fn to_virtual(root: &Path, real: &Path) -> Option<VirtualPath> {
    let relative = real.strip_prefix(root).ok()?;
    let mut any_component = false;
    for component in relative.components() {
        if is_hidden_name(&component.as_os_str().to_string_lossy()) {
            return None;
        }
        any_component = true;
    }
    if !any_component {
        return None;
    }
    Some(VirtualPath::from_fs(relative))
}

/// Normalize a raw notify event into zero or more change descriptors.
pub(crate) fn map_event(root: &Path, source: &SourceId, event: &Event) -> Vec<ChangeEvent> {
    let make = |path: VirtualPath, kind: ChangeKind| ChangeEvent {
        path,
        kind,
        source: source.clone(),
    };
    let map_all = |kind: ChangeKind| -> Vec<ChangeEvent> {
        event
            .paths
            .iter()
            .filter_map(|p| to_virtual(root, p))
            .map(|v| make(v, kind.clone()))
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => map_all(ChangeKind::Created),
        EventKind::Remove(_) => map_all(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => map_all(ChangeKind::Deleted),
            RenameMode::To => map_all(ChangeKind::Created),
            _ if event.paths.len() >= 2 => {
                let old = to_virtual(root, &event.paths[0]);
                let new = to_virtual(root, &event.paths[1]);
                match (old, new) {
                    (Some(old_path), Some(path)) => {
                        vec![make(path, ChangeKind::Renamed { old_path })]
                    }
                    // A rename out of or into hidden space degrades to a
                    // one-sided event.
                    (Some(old_path), None) => vec![make(old_path, ChangeKind::Deleted)],
                    (None, Some(path)) => vec![make(path, ChangeKind::Created)],
                    (None, None) => Vec::new(),
                }
            }
            _ => map_all(ChangeKind::Modified),
        },
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            map_all(ChangeKind::Modified)
        }
        EventKind::Access(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn source() -> SourceId {
        SourceId::new("mod")
    }

    #[test]
    fn test_create_event_maps_to_created() {
        let changes = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Create(CreateKind::File),
                &["/mods/foo/sprites/a.png"],
            ),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path.as_str(), "sprites/a.png");
        assert_eq!(changes[0].kind, ChangeKind::Created);
        assert_eq!(changes[0].source, source());
    }

    #[test]
    fn test_remove_event_maps_to_deleted() {
        let changes = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(EventKind::Remove(RemoveKind::File), &["/mods/foo/a.png"]),
        );
        assert_eq!(changes[0].kind, ChangeKind::Deleted);
    }

    #[test]
    fn test_modify_data_maps_to_modified() {
        let changes = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Modify(ModifyKind::Any),
                &["/mods/foo/dialog/en.txt"],
            ),
        );
        assert_eq!(changes[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_rename_both_maps_to_renamed() {
        let changes = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/mods/foo/old.png", "/mods/foo/new.png"],
            ),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path.as_str(), "new.png");
        assert_eq!(
            changes[0].kind,
            ChangeKind::Renamed {
                old_path: VirtualPath::new("old.png")
            }
        );
    }

    #[test]
    fn test_rename_from_and_to_halves() {
        let from = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/mods/foo/old.png"],
            ),
        );
        assert_eq!(from[0].kind, ChangeKind::Deleted);

        let to = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                &["/mods/foo/new.png"],
            ),
        );
        assert_eq!(to[0].kind, ChangeKind::Created);
    }

    #[test]
    fn test_rename_into_hidden_degrades_to_deleted() {
        let changes = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/mods/foo/a.png", "/mods/foo/.trash/a.png"],
            ),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path.as_str(), "a.png");
        assert_eq!(changes[0].kind, ChangeKind::Deleted);
    }

    #[test]
    fn test_hidden_and_foreign_paths_dropped() {
        let hidden = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Create(CreateKind::File),
                &["/mods/foo/.cache/tmp.png"],
            ),
        );
        assert!(hidden.is_empty());

        let foreign = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(EventKind::Create(CreateKind::File), &["/elsewhere/a.png"]),
        );
        assert!(foreign.is_empty());

        let root_itself = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(EventKind::Modify(ModifyKind::Any), &["/mods/foo"]),
        );
        assert!(root_itself.is_empty());
    }

    #[test]
    fn test_access_events_ignored() {
        let changes = map_event(
            Path::new("/mods/foo"),
            &source(),
            &event(
                EventKind::Access(notify::event::AccessKind::Read),
                &["/mods/foo/a.png"],
            ),
        );
        assert!(changes.is_empty());
    }
}
