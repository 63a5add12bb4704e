//! Per-session lock file.
//!
//! One invocation at a time may work on a session. The lock is a JSON file
//! created with `create_new` semantics and held under an exclusive `fd-lock`
//! for its lifetime; dropping the guard removes it. A lock older than the TTL
//! is treated as abandoned and taken over.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Default age after which a lock is considered stale (in seconds)
pub const DEFAULT_LOCK_TTL_SECS: u64 = 900;

const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

/// Lock information stored in the lock file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    /// Process ID that created the lock
    pub pid: u32,
    /// Seconds since UNIX epoch when the lock was created
    pub created_at: u64,
    /// Session being locked
    pub session: String,
    /// postflow version that created the lock
    pub version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Session '{session}' is in use by another invocation (PID {pid}, {age_secs}s old)")]
    SessionBusy {
        session: String,
        pid: u32,
        age_secs: u64,
    },

    #[error("Lock file {path} is corrupted: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Lock I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

impl LockError {
    fn io(path: &Utf8Path, err: impl std::fmt::Display) -> Self {
        LockError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Exclusive session lock; released on drop.
pub struct SessionLock {
    path: Utf8PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl SessionLock {
    /// Acquire the lock file at `path` for `session`.
    pub fn acquire(path: &Utf8Path, session: &str, ttl_secs: u64) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir_all(parent).map_err(|e| LockError::io(parent, e))?;
        }

        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let info = LockInfo {
                pid: process::id(),
                created_at: now_secs(),
                session: session.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            };

            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(path)
            {
                Ok(file) => return Self::finalize(path.to_path_buf(), file, info),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::check_existing(path, session, ttl_secs)?;
                    // Stale: move it aside and try again.
                    remove_stale(path)?;
                }
                Err(e) => return Err(LockError::io(path, e)),
            }
        }

        Err(LockError::io(
            path,
            format!("gave up after {MAX_ACQUIRE_ATTEMPTS} attempts"),
        ))
    }

    #[must_use]
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read the lock at `path` without acquiring it.
    pub fn peek(path: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| LockError::Corrupted {
                    path: path.to_string(),
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LockError::io(path, e)),
        }
    }

    fn finalize(path: Utf8PathBuf, file: fs::File, info: LockInfo) -> Result<Self, LockError> {
        let json = serde_json::to_string_pretty(&info).map_err(|e| LockError::io(&path, e))?;

        let mut rw_lock = Box::new(RwLock::new(file));
        {
            let guard = rw_lock.try_write().map_err(|_| LockError::SessionBusy {
                session: info.session.clone(),
                pid: 0,
                age_secs: 0,
            })?;
            let mut file_ref = &*guard;
            file_ref
                .write_all(json.as_bytes())
                .and_then(|()| file_ref.flush())
                .and_then(|()| file_ref.sync_all())
                .map_err(|e| LockError::io(&path, e))?;
        }

        Ok(Self {
            path,
            _fd_lock: Some(rw_lock),
            info,
        })
    }

    /// Ok(()) means the existing lock may be taken over.
    fn check_existing(path: &Utf8Path, session: &str, ttl_secs: u64) -> Result<(), LockError> {
        match Self::peek(path) {
            Ok(Some(existing)) => {
                let age = now_secs().saturating_sub(existing.created_at);
                if age > ttl_secs {
                    warn!(
                        session = %session,
                        pid = existing.pid,
                        age_secs = age,
                        "Taking over stale session lock"
                    );
                    Ok(())
                } else {
                    Err(LockError::SessionBusy {
                        session: session.to_string(),
                        pid: existing.pid,
                        age_secs: age,
                    })
                }
            }
            // Released between our create attempt and the read.
            Ok(None) => Ok(()),
            Err(LockError::Corrupted { path: p, reason }) => {
                // A writer may still be filling the file in; only an old
                // unreadable lock is abandoned.
                let age = fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| SystemTime::now().duration_since(t).ok())
                    .map_or(0, |d| d.as_secs());
                if age > ttl_secs {
                    Ok(())
                } else {
                    Err(LockError::Corrupted { path: p, reason })
                }
            }
            Err(e) => Err(e),
        }
    }
}

fn remove_stale(path: &Utf8Path) -> Result<(), LockError> {
    let stale = path.with_extension(format!("stale.{}", process::id()));
    match fs::rename(path, &stale) {
        Ok(()) => {
            let _ = fs::remove_file(&stale);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::io(path, e)),
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

impl std::fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLock")
            .field("path", &self.path)
            .field("info", &self.info)
            .finish()
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("sessions").join("s1.lock")).unwrap()
    }

    #[test]
    fn test_acquire_and_release_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let lock = SessionLock::acquire(&path, "s1", DEFAULT_LOCK_TTL_SECS).unwrap();
        assert!(path.exists());
        assert_eq!(lock.info().session, "s1");
        assert_eq!(lock.info().pid, process::id());

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let _held = SessionLock::acquire(&path, "s1", DEFAULT_LOCK_TTL_SECS).unwrap();
        let err = SessionLock::acquire(&path, "s1", DEFAULT_LOCK_TTL_SECS).unwrap_err();
        match err {
            LockError::SessionBusy { session, pid, .. } => {
                assert_eq!(session, "s1");
                assert_eq!(pid, process::id());
            }
            other => panic!("expected SessionBusy, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        // Simulate an abandoned lock from a long-gone process.
        let stale = LockInfo {
            pid: 999_999,
            created_at: now_secs() - 10_000,
            session: "s1".to_string(),
            version: "0.0.1".to_string(),
        };
        fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let lock = SessionLock::acquire(&path, "s1", 60).unwrap();
        assert_eq!(lock.info().pid, process::id());
    }

    #[test]
    fn test_fresh_corrupted_lock_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let err = SessionLock::acquire(&path, "s1", 60).unwrap_err();
        assert!(matches!(err, LockError::Corrupted { .. }));
    }

    #[test]
    fn test_peek_missing_lock() {
        let dir = TempDir::new().unwrap();
        assert!(SessionLock::peek(&lock_path(&dir)).unwrap().is_none());
    }
}
