//! Local exclusive-create lock file guarding concurrent
//! `AppendPage`/`RemoveFooter` calls against one output file (§4.4).
//!
//! Uses `create_new` rather than an OS-level `flock`: the contract
//! only needs to exclude concurrent tasks within this process, and a
//! stale file left behind by a killed process must be reclaimable by
//! mtime, which a held `flock` would instead release automatically on
//! process exit -- the opposite of what a crash-diagnosis trail needs
//! here.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file {0} is held by another writer")]
    Held(PathBuf),
    #[error("lock file io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An exclusive-create lock file at a fixed path, reclaimable once its
/// mtime exceeds `stale_threshold`.
#[derive(Clone)]
pub struct AdvisoryLock {
    path: PathBuf,
    stale_threshold: Duration,
}

impl AdvisoryLock {
    #[must_use]
    pub fn new(path: PathBuf, stale_threshold: Duration) -> Self {
        Self {
            path,
            stale_threshold,
        }
    }

    /// Blocking: acquires the lock, reclaiming a stale file first if
    /// present. Returns a guard that removes the lock file on drop.
    pub fn acquire(&self) -> Result<LockGuard, LockError> {
        self.reclaim_if_stale();

        match fs::OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(_) => Ok(LockGuard { path: self.path.clone() }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(LockError::Held(self.path.clone()))
            }
            Err(e) => Err(LockError::Io(e)),
        }
    }

    fn reclaim_if_stale(&self) {
        let Ok(metadata) = fs::metadata(&self.path) else {
            return;
        };
        let Ok(modified) = metadata.modified() else {
            return;
        };
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age > self.stale_threshold {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Held lock; removes its file on drop.
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
