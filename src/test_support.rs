//! Shared test plumbing.

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};

/// Serializes tests that touch process-global state: the working
/// directory and the global log sink.
pub(crate) static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Takes the cwd lock, enters a directory, and restores the previous
/// one on drop.
pub(crate) struct CwdGuard {
    _lock: MutexGuard<'static, ()>,
    original: PathBuf,
}

impl CwdGuard {
    pub(crate) fn enter(dir: &Path) -> Self {
        let lock = CWD_LOCK.lock();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self {
            _lock: lock,
            original,
        }
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}
