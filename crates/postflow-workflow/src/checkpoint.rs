//! Checkpoint stores.
//!
//! A checkpoint is the whole workflow state plus a cursor saying where the
//! next invocation picks up. Stores have snapshot-and-overwrite semantics:
//! each save replaces the previous record for the session.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use postflow_utils::atomic_write::write_file_atomic;
use postflow_utils::lock::{LockError, SessionLock};
use postflow_utils::paths::{ensure_dir_all, is_valid_session_id};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::CheckpointError;
use crate::graph::StepId;
use crate::state::WorkflowState;

pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Mid-run; `next` is the step to execute on resume
    Running,
    /// Paused before collect-feedback
    AwaitingFeedback,
    /// Reached a terminal step
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub status: RunStatus,
    pub next: Option<StepId>,
}

impl Cursor {
    #[must_use]
    pub const fn running(next: StepId) -> Self {
        Self {
            status: RunStatus::Running,
            next: Some(next),
        }
    }

    #[must_use]
    pub const fn awaiting_feedback() -> Self {
        Self {
            status: RunStatus::AwaitingFeedback,
            next: Some(StepId::CollectFeedback),
        }
    }

    #[must_use]
    pub const fn completed() -> Self {
        Self {
            status: RunStatus::Completed,
            next: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub session_id: String,
    pub cursor: Cursor,
    pub updated_at: DateTime<Utc>,
    pub state: WorkflowState,
}

impl Checkpoint {
    #[must_use]
    pub fn new(session_id: impl Into<String>, state: WorkflowState, cursor: Cursor) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            session_id: session_id.into(),
            cursor,
            updated_at: Utc::now(),
            state,
        }
    }
}

/// Held for the duration of one invocation on a session.
pub struct SessionGuard {
    _lock: Option<SessionLock>,
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("locked", &self._lock.is_some())
            .finish()
    }
}

impl SessionGuard {
    /// A guard that excludes nothing, for stores without cross-process state.
    #[must_use]
    pub const fn unlocked() -> Self {
        Self { _lock: None }
    }
}

pub trait CheckpointStore: Send + Sync {
    /// Latest checkpoint for `session`, or `None` if there is none.
    fn load(&self, session: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Replace the checkpoint for `checkpoint.session_id`.
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Remove the checkpoint; returns whether one existed.
    fn delete(&self, session: &str) -> Result<bool, CheckpointError>;

    /// Exclude other invocations from `session` until the guard drops.
    fn lock_session(&self, session: &str) -> Result<SessionGuard, LockError> {
        let _ = session;
        Ok(SessionGuard::unlocked())
    }
}

fn check_session(session: &str) -> Result<(), CheckpointError> {
    if is_valid_session_id(session) {
        Ok(())
    } else {
        Err(CheckpointError::InvalidSession(session.to_string()))
    }
}

/// One pretty-printed JSON file per session, `<dir>/<session>.json`, written
/// atomically. `<dir>/<session>.lock` guards each invocation.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: Utf8PathBuf,
    lock_ttl_secs: u64,
}

impl FileCheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>, lock_ttl_secs: u64) -> Self {
        Self {
            dir: dir.into(),
            lock_ttl_secs,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    #[must_use]
    pub fn checkpoint_path(&self, session: &str) -> Utf8PathBuf {
        self.dir.join(format!("{session}.json"))
    }

    #[must_use]
    pub fn lock_path(&self, session: &str) -> Utf8PathBuf {
        self.dir.join(format!("{session}.lock"))
    }

    fn io_error(path: &Utf8Path, err: impl std::fmt::Display) -> CheckpointError {
        CheckpointError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, session: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        check_session(session)?;
        let path = self.checkpoint_path(session);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        let checkpoint: Checkpoint =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupt {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Corrupt {
                path: path.to_string(),
                reason: format!(
                    "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                    checkpoint.version
                ),
            });
        }
        if checkpoint.session_id != session {
            return Err(CheckpointError::Corrupt {
                path: path.to_string(),
                reason: format!("belongs to session '{}'", checkpoint.session_id),
            });
        }

        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        check_session(&checkpoint.session_id)?;
        ensure_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let path = self.checkpoint_path(&checkpoint.session_id);
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| Self::io_error(&path, e))?;
        write_file_atomic(&path, &json).map_err(|e| Self::io_error(&path, format!("{e:#}")))?;

        debug!(
            session = %checkpoint.session_id,
            status = ?checkpoint.cursor.status,
            next = ?checkpoint.cursor.next,
            "Checkpoint saved"
        );
        Ok(())
    }

    fn delete(&self, session: &str) -> Result<bool, CheckpointError> {
        check_session(session)?;
        let path = self.checkpoint_path(session);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn lock_session(&self, session: &str) -> Result<SessionGuard, LockError> {
        if !is_valid_session_id(session) {
            return Err(LockError::Io {
                path: self.dir.to_string(),
                reason: format!("invalid session id '{session}'"),
            });
        }
        ensure_dir_all(&self.dir).map_err(|e| LockError::Io {
            path: self.dir.to_string(),
            reason: e.to_string(),
        })?;
        let lock = SessionLock::acquire(&self.lock_path(session), session, self.lock_ttl_secs)?;
        Ok(SessionGuard { _lock: Some(lock) })
    }
}

/// In-process store; checkpoints are kept as serialized JSON so a restore
/// goes through the same serde path as the file store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, session: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        check_session(session)?;
        self.records()
            .get(session)
            .map(|json| {
                serde_json::from_str(json).map_err(|e| CheckpointError::Corrupt {
                    path: format!("memory:{session}"),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        check_session(&checkpoint.session_id)?;
        let json = serde_json::to_string(checkpoint).map_err(|e| CheckpointError::Io {
            path: format!("memory:{}", checkpoint.session_id),
            reason: e.to_string(),
        })?;
        self.records().insert(checkpoint.session_id.clone(), json);
        Ok(())
    }

    fn delete(&self, session: &str) -> Result<bool, CheckpointError> {
        check_session(session)?;
        Ok(self.records().remove(session).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChatEntry, WorkflowParams};
    use tempfile::TempDir;

    fn checkpoint(session: &str) -> Checkpoint {
        let mut state = WorkflowState::new(
            WorkflowParams::new("Remote work productivity", ["professional"], ["managers"])
                .unwrap(),
        );
        state.push_draft("Draft".to_string());
        state.push_entry(ChatEntry::assistant("Generated Post: Draft"));
        Checkpoint::new(session, state, Cursor::awaiting_feedback())
    }

    fn file_store() -> (TempDir, FileCheckpointStore) {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("sessions")).unwrap();
        (temp, FileCheckpointStore::new(dir, 900))
    }

    #[test]
    fn test_file_store_round_trip_and_overwrite() {
        let (_temp, store) = file_store();
        assert!(store.load("s1").unwrap().is_none());

        let mut cp = checkpoint("s1");
        store.save(&cp).unwrap();
        assert_eq!(store.load("s1").unwrap(), Some(cp.clone()));

        cp.cursor = Cursor::completed();
        store.save(&cp).unwrap();
        let loaded = store.load("s1").unwrap().unwrap();
        assert_eq!(loaded.cursor.status, RunStatus::Completed);
        assert_eq!(loaded.state.drafts(), ["Draft"]);
    }

    #[test]
    fn test_file_store_delete() {
        let (_temp, store) = file_store();
        store.save(&checkpoint("s1")).unwrap();
        assert!(store.delete("s1").unwrap());
        assert!(!store.delete("s1").unwrap());
        assert!(store.load("s1").unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_bad_session_ids() {
        let (_temp, store) = file_store();
        assert!(matches!(
            store.load("../escape"),
            Err(CheckpointError::InvalidSession(_))
        ));
        assert!(matches!(
            store.save(&checkpoint("a/b")),
            Err(CheckpointError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_file_store_reports_corrupt_checkpoint() {
        let (_temp, store) = file_store();
        ensure_dir_all(store.dir()).unwrap();
        fs::write(store.checkpoint_path("s1"), "{not json").unwrap();

        assert!(matches!(store.load("s1"), Err(CheckpointError::Corrupt { .. })));
    }

    #[test]
    fn test_file_store_rejects_unknown_version() {
        let (_temp, store) = file_store();
        let mut cp = checkpoint("s1");
        cp.version = 99;
        store.save(&cp).unwrap();

        match store.load("s1") {
            Err(CheckpointError::Corrupt { reason, .. }) => assert!(reason.contains("99")),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_file_store_session_lock_excludes_second_invocation() {
        let (_temp, store) = file_store();

        let guard = store.lock_session("s1").unwrap();
        assert!(store.lock_path("s1").exists());
        assert!(matches!(
            store.lock_session("s1"),
            Err(LockError::SessionBusy { .. })
        ));
        // Other sessions are unaffected.
        let _other = store.lock_session("s2").unwrap();

        drop(guard);
        assert!(!store.lock_path("s1").exists());
        let _again = store.lock_session("s1").unwrap();
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryCheckpointStore::new();
        let cp = checkpoint("mem");
        store.save(&cp).unwrap();
        assert_eq!(store.load("mem").unwrap(), Some(cp));
        assert!(store.delete("mem").unwrap());
        assert!(store.load("mem").unwrap().is_none());
        let _guard = store.lock_session("mem").unwrap();
    }
}
