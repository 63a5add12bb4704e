//! State directory layout.
//!
//! ```text
//! <POSTFLOW_HOME>/
//!   config.toml            (optional, found by config discovery)
//!   sessions/<id>.json     checkpoint snapshot
//!   sessions/<id>.lock     held while an invocation runs
//! ```

use camino::Utf8PathBuf;
use std::cell::RefCell;

thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Resolve postflow home:
/// 1) thread-local override (tests use this)
/// 2) env `POSTFLOW_HOME`
/// 3) default ".postflow"
#[must_use]
pub fn postflow_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var("POSTFLOW_HOME") {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(".postflow")
}

/// Returns `<POSTFLOW_HOME>/sessions`
#[must_use]
pub fn sessions_dir() -> Utf8PathBuf {
    postflow_home().join("sessions")
}

/// mkdir -p; treat `AlreadyExists` as success
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Session ids become file names, so only a conservative alphabet is accepted.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// RAII guard for isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Test helper: point this thread's postflow home at a fresh temp dir.
///
/// Hold the `HomeGuard` for the test's duration.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let td = tempfile::TempDir::new().expect("create temp home");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp path");
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(p));
    HomeGuard { inner: td }
}
