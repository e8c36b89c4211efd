//! core::lock
//!
//! Exclusive session lock for processing runs.
//!
//! # Architecture
//!
//! Document backends forbid concurrent mutation: the active-variant switch is
//! global, stateful document state. Execution inside one process is strictly
//! single-threaded, but nothing stops a second famforge process from being
//! pointed at the same session directory. The session lock closes that gap.
//!
//! # Storage
//!
//! - `<session_dir>/famforge.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock is held for the entire processing run
//! - Lock is automatically released on drop (RAII pattern)
//! - Lock acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```no_run
//! use famforge::core::lock::SessionLock;
//! use std::path::Path;
//!
//! let lock = SessionLock::acquire(Path::new("/tmp/session"))?;
//! // Process documents while holding the lock.
//! drop(lock);
//! # Ok::<(), famforge::core::lock::LockError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("session is locked by another famforge process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// An exclusive lock on a processing session directory.
///
/// The lock is released when this guard is dropped, even if the run panics.
#[derive(Debug)]
pub struct SessionLock {
    file: File,
    path: PathBuf,
}

impl SessionLock {
    /// File name of the lock within the session directory.
    pub const LOCK_FILE: &'static str = "famforge.lock";

    /// Acquire the session lock, failing fast if it is already held.
    ///
    /// Creates the session directory if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the directory or file cannot be created
    pub fn acquire(session_dir: &Path) -> Result<Self, LockError> {
        fs::create_dir_all(session_dir)
            .map_err(|e| LockError::CreateFailed(format!("{}: {e}", session_dir.display())))?;

        let path = session_dir.join(Self::LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| LockError::CreateFailed(format!("{}: {e}", path.display())))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::Io(e)),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        // Best effort; the OS releases the lock on close regardless.
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
