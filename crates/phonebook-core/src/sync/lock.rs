//! Single-flight guard for sync cycles.
//!
//! An in-process `tokio` mutex keeps two cycles of one process apart; an
//! advisory file lock does the same across processes (the API scheduler and
//! a manual `phonebook sync`, for example).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::Result;

/// Non-reentrant exclusive lock held for one full cycle
#[derive(Debug, Clone)]
pub struct CycleLock {
    inner: Arc<Mutex<()>>,
    path: Option<PathBuf>,
}

/// Held while a cycle runs; dropping it releases both locks
#[derive(Debug)]
pub struct CycleGuard {
    file: Option<File>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(error) = FileExt::unlock(&file) {
                tracing::warn!(error = %error, "Failed to release sync lock file");
            }
        }
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl CycleLock {
    /// Create a lock, optionally backed by a lock file
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(())),
            path,
        }
    }

    /// Try to take the lock without waiting.
    ///
    /// `Ok(None)` means another cycle holds it.
    pub fn try_acquire(&self) -> Result<Option<CycleGuard>> {
        let Ok(guard) = Arc::clone(&self.inner).try_lock_owned() else {
            return Ok(None);
        };

        let Some(path) = &self.path else {
            return Ok(Some(CycleGuard {
                file: None,
                _guard: guard,
            }));
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(CycleGuard {
                file: Some(file),
                _guard: guard,
            })),
            Err(error) if is_contended(&error) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}
