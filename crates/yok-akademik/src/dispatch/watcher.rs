//! Filesystem watch on one session directory.

use std::path::Path;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::files;
use crate::error::DispatchResult;

/// A session file the dispatcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedFile {
    Profiles,
    ProfilesDone,
    Collaborators,
    CollaboratorsDone,
}

impl WatchedFile {
    /// Map a file name inside the session directory.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            files::PROFILES => Some(Self::Profiles),
            files::PROFILES_DONE => Some(Self::ProfilesDone),
            files::COLLABORATORS => Some(Self::Collaborators),
            files::COLLABORATORS_DONE => Some(Self::CollaboratorsDone),
            _ => None,
        }
    }
}

/// Files whose content changed according to a notify event.
///
/// Snapshots are replaced by rename, so creations and rename targets count
/// as well as plain modifications.
#[must_use]
pub fn changed_files(event: &Event) -> Vec<WatchedFile> {
    let relevant = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Name(mode)) => {
            matches!(mode, RenameMode::To | RenameMode::Both | RenameMode::Any)
        }
        EventKind::Modify(_) => true,
        _ => false,
    };
    if !relevant {
        return Vec::new();
    }

    // A `Both` rename lists the source first; only the target is new content.
    let paths = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => &event.paths[event.paths.len().saturating_sub(1)..],
        _ => &event.paths[..],
    };

    let mut changed = Vec::new();
    for file in paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .filter_map(WatchedFile::from_file_name)
    {
        if !changed.contains(&file) {
            changed.push(file);
        }
    }
    changed
}

/// Non-recursive watch on a session directory; stops when dropped.
pub struct SessionWatcher {
    _watcher: RecommendedWatcher,
}

impl SessionWatcher {
    /// Watch `dir`, calling `on_change` from the notify thread.
    ///
    /// `on_change` must only hand the file over (e.g. send on a channel).
    pub fn start<F>(dir: &Path, on_change: F) -> DispatchResult<Self>
    where
        F: Fn(WatchedFile) + Send + 'static,
    {
        let dir_name = dir.display().to_string();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for file in changed_files(&event) {
                    on_change(file);
                }
            }
            Err(e) => tracing::warn!(dir = %dir_name, error = %e, "Watch error"),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(dir = %dir.display(), "Watching session directory");
        Ok(Self { _watcher: watcher })
    }
}

impl std::fmt::Debug for SessionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWatcher").finish_non_exhaustive()
    }
}
