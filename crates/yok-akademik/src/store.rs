//! Session-scoped file store.
//!
//! Each session owns one directory under the sessions root:
//!
//! ```text
//! <root>/<session_id>/main_profile.json
//! <root>/<session_id>/main_done.txt
//! <root>/<session_id>/collaborators.json
//! <root>/<session_id>/collaborators_done.txt
//! ```
//!
//! Every write lands in a temporary file in the same directory, is flushed and
//! synced, and is then renamed over the target, so readers see either the old
//! or the new document and never a torn one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::files;
use crate::error::{StoreError, StoreResult};
use crate::models::{CollaboratorSnapshot, ProfileSnapshot, SessionId};

/// Root directory of all sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (if needed) and open the directory of a session.
    pub fn create(&self, id: &SessionId) -> StoreResult<SessionDir> {
        let dir = self.open(id);
        fs::create_dir_all(&dir.path).map_err(|e| StoreError::io(&dir.path, e))?;
        tracing::debug!(session_id = %id, path = %dir.path.display(), "Session directory ready");
        Ok(dir)
    }

    /// Open the directory of a session without touching the filesystem.
    #[must_use]
    pub fn open(&self, id: &SessionId) -> SessionDir {
        SessionDir { id: id.clone(), path: self.root.join(id.as_str()) }
    }

    /// Delete a session directory and everything in it.
    pub fn remove(&self, id: &SessionId) -> StoreResult<()> {
        let path = self.root.join(id.as_str());
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

/// Directory of one session.
#[derive(Debug, Clone)]
pub struct SessionDir {
    id: SessionId,
    path: PathBuf,
}

impl SessionDir {
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Replace the profile snapshot.
    pub fn write_profiles(&self, snapshot: &ProfileSnapshot) -> StoreResult<()> {
        write_json_atomic(&self.file(files::PROFILES), snapshot)
    }

    /// Replace the collaborator snapshot.
    pub fn write_collaborators(&self, snapshot: &CollaboratorSnapshot) -> StoreResult<()> {
        write_json_atomic(&self.file(files::COLLABORATORS), snapshot)
    }

    /// Write `main_done.txt`.
    pub fn mark_profiles_done(&self) -> StoreResult<()> {
        write_atomic(&self.file(files::PROFILES_DONE), files::DONE_CONTENT.as_bytes())
    }

    /// Write `collaborators_done.txt`.
    pub fn mark_collaborators_done(&self) -> StoreResult<()> {
        write_atomic(&self.file(files::COLLABORATORS_DONE), files::DONE_CONTENT.as_bytes())
    }

    #[must_use]
    pub fn profiles_done(&self) -> bool {
        self.file(files::PROFILES_DONE).is_file()
    }

    #[must_use]
    pub fn collaborators_done(&self) -> bool {
        self.file(files::COLLABORATORS_DONE).is_file()
    }

    /// Read the profile snapshot; `Ok(None)` when it does not exist yet.
    pub fn read_profiles(&self) -> StoreResult<Option<ProfileSnapshot>> {
        read_json(&self.file(files::PROFILES))
    }

    /// Read the collaborator snapshot; `Ok(None)` when it does not exist yet.
    pub fn read_collaborators(&self) -> StoreResult<Option<CollaboratorSnapshot>> {
        read_json(&self.file(files::COLLABORATORS))
    }

    /// Read the profile snapshot, substituting an empty shape for unreadable content.
    #[must_use]
    pub fn load_profiles(&self) -> Option<ProfileSnapshot> {
        match self.read_profiles() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Unreadable profile snapshot");
                Some(ProfileSnapshot::unreadable())
            }
        }
    }

    /// Read the collaborator snapshot, substituting an empty list for unreadable content.
    #[must_use]
    pub fn load_collaborators(&self) -> Option<CollaboratorSnapshot> {
        match self.read_collaborators() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Unreadable collaborator snapshot");
                Some(CollaboratorSnapshot::default())
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &data)
}

fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    tmp.write_all(data).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.flush().map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::Persist { path: path.to_path_buf(), source: e.error })?;

    sync_dir(parent)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> StoreResult<()> {
    fs::File::open(dir).and_then(|d| d.sync_all()).map_err(|e| StoreError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> StoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollaboratorRecord, ProfileRecord, ProfileStatus};

    fn session(root: &Path) -> SessionDir {
        let store = SessionStore::new(root);
        store.create(&SessionId::parse("session_test").unwrap()).unwrap()
    }

    #[test]
    fn test_profile_snapshot_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = session(tmp.path());

        let mut snapshot = ProfileSnapshot::new("session_test", "Ayşe Kaya");
        snapshot.push(ProfileRecord { profile_url: "https://a".into(), ..Default::default() });
        dir.write_profiles(&snapshot).unwrap();

        let read = dir.read_profiles().unwrap().unwrap();
        assert_eq!(read, snapshot);

        let text = fs::read_to_string(dir.file(files::PROFILES)).unwrap();
        assert!(text.contains("\n  \"session_id\""), "pretty printed: {text}");
        assert!(text.contains("Ayşe Kaya"), "not ASCII-escaped: {text}");
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = session(tmp.path());

        let mut snapshot = CollaboratorSnapshot::new("https://p");
        for name in ["A", "B", "C"] {
            snapshot.push(CollaboratorRecord { name: name.into(), ..Default::default() });
            dir.write_collaborators(&snapshot).unwrap();
        }

        let read = dir.read_collaborators().unwrap().unwrap();
        assert_eq!(read.len(), 3);

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "no temporary files left behind");
    }

    #[test]
    fn test_markers() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = session(tmp.path());

        assert!(!dir.profiles_done());
        dir.mark_profiles_done().unwrap();
        assert!(dir.profiles_done());
        assert_eq!(fs::read_to_string(dir.file(files::PROFILES_DONE)).unwrap(), "done");

        assert!(!dir.collaborators_done());
        dir.mark_collaborators_done().unwrap();
        assert!(dir.collaborators_done());
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = session(tmp.path());
        assert!(dir.read_profiles().unwrap().is_none());
        assert!(dir.load_collaborators().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_substitutes_empty_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = session(tmp.path());
        fs::write(dir.file(files::PROFILES), "{\"profiles\": [").unwrap();
        fs::write(dir.file(files::COLLABORATORS), "").unwrap();

        assert!(dir.read_profiles().is_err());
        let profiles = dir.load_profiles().unwrap();
        assert!(profiles.profiles.is_empty());
        assert_eq!(profiles.status, ProfileStatus::Failed);

        let collaborators = dir.load_collaborators().unwrap();
        assert!(collaborators.is_empty());
    }

    #[test]
    fn test_remove_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let id = SessionId::parse("session_gone").unwrap();
        let dir = store.create(&id).unwrap();
        dir.mark_profiles_done().unwrap();

        store.remove(&id).unwrap();
        assert!(!dir.path().exists());
        store.remove(&id).unwrap();
    }
}
