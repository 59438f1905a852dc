//! Exclusive lock over a workspace directory.
//!
//! Two bottle commands for the same package would otherwise race on the same
//! `<workspace>/src` tree. The lock is an advisory `flock`-style lock on
//! `<workspace>/.workspace.lock`, released when the guard is dropped.

use crate::paths;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from locking a workspace.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock file could not be created, opened or locked.
    #[error("failed to lock {}: {source}", .path.display())]
    Io {
        /// Lock file location.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Another process kept the lock past the deadline.
    #[error("workspace {} is in use by another process (waited {:?})", .path.display(), .timeout)]
    Timeout {
        /// Lock file location.
        path: PathBuf,
        /// How long the command waited.
        timeout: Duration,
    },
}

/// Held for as long as a command uses a workspace.
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    /// Lock `workspace`, creating it if needed, waiting at most `timeout`
    /// for another holder to let go.
    pub async fn acquire(workspace: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = paths::lock_path(workspace);
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(workspace).await.map_err(io_err)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(io_err)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "workspace locked");
                    return Ok(Self { file, path });
                }
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout { path, timeout });
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(source) => return Err(LockError::Io { path, source }),
            }
        }
    }

    /// Location of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), "failed to release workspace lock: {e}");
        }
    }
}
