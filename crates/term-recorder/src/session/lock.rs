//! Single-instance lock per session identifier.
//!
//! Exclusivity comes from `flock(2)` on `terminal_<id>.lock`. The owner
//! record (`terminal_<id>.pid`) is written for operators and is advisory
//! only: nothing reads it to decide whether a session is active.

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::session::paths::SessionPaths;

/// How many times acquisition reopens the lock file after losing a race
/// with a concurrent release that unlinked it.
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Session already active (lock held on {})", path.display())]
    Busy {
        path: PathBuf,
        owner_pid: Option<u32>,
    },

    #[error("Failed to open lock file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to lock {}: {source}", path.display())]
    Lock { path: PathBuf, source: io::Error },

    #[error("Failed to write owner record {}: {source}", path.display())]
    OwnerRecord { path: PathBuf, source: io::Error },
}

impl LockError {
    pub fn is_busy(&self) -> bool {
        matches!(self, LockError::Busy { .. })
    }
}

/// Outcome of one cleanup step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStep {
    Done,
    /// Nothing to do: the file was already gone or the handle already closed.
    Skipped,
    Failed(String),
}

impl CleanupStep {
    fn from_removal(result: io::Result<()>) -> Self {
        match result {
            Ok(()) => CleanupStep::Done,
            Err(e) if e.kind() == io::ErrorKind::NotFound => CleanupStep::Skipped,
            Err(e) => CleanupStep::Failed(e.to_string()),
        }
    }
}

/// Per-resource result of [`SessionLock::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub lock_file: CleanupStep,
    pub owner_record: CleanupStep,
    pub lock_handle: CleanupStep,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        [&self.lock_file, &self.owner_record, &self.lock_handle]
            .iter()
            .all(|step| !matches!(step, CleanupStep::Failed(_)))
    }
}

/// A held session lock. Released on drop.
#[derive(Debug)]
pub struct SessionLock {
    file: Option<File>,
    lock_path: PathBuf,
    owner_path: PathBuf,
}

impl SessionLock {
    /// Acquires the session lock without blocking and records the owner pid.
    ///
    /// Returns `LockError::Busy` if another process holds the lock. A busy
    /// attempt never writes to the owner record or the log.
    pub fn acquire(paths: &SessionPaths) -> Result<Self, LockError> {
        let lock_path = paths.lock().to_path_buf();
        let owner_path = paths.owner().to_path_buf();

        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            let file = open_lock_file(&lock_path)?;

            // SAFETY: flock is safe to call with a valid file descriptor
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result != 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                    return Err(LockError::Busy {
                        owner_pid: read_owner_record(&owner_path),
                        path: lock_path,
                    });
                }
                return Err(LockError::Lock {
                    path: lock_path,
                    source: err,
                });
            }

            if still_linked(&file, &lock_path) {
                let mut lock = Self {
                    file: Some(file),
                    lock_path,
                    owner_path,
                };
                if let Err(source) = write_owner_record(&lock.owner_path) {
                    let path = lock.owner_path.clone();
                    lock.release();
                    return Err(LockError::OwnerRecord { path, source });
                }
                debug!(
                    lock = %lock.lock_path.display(),
                    pid = std::process::id(),
                    "Session lock acquired"
                );
                return Ok(lock);
            }

            debug!(
                attempt,
                lock = %lock_path.display(),
                "Lock file was replaced while locking, retrying"
            );
        }

        Err(LockError::Busy {
            owner_pid: read_owner_record(&owner_path),
            path: lock_path,
        })
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn owner_path(&self) -> &Path {
        &self.owner_path
    }

    /// Removes the owner record and the lock file, then closes the lock handle.
    ///
    /// The owner record goes first, while the lock file still names the
    /// locked inode, so a process that takes over after the unlink never
    /// loses its record to us. A record naming another pid is left alone.
    /// Only a held lock touches the filesystem: a second call reports every
    /// step as skipped.
    pub fn release(&mut self) -> CleanupReport {
        let Some(file) = self.file.take() else {
            return CleanupReport {
                lock_file: CleanupStep::Skipped,
                owner_record: CleanupStep::Skipped,
                lock_handle: CleanupStep::Skipped,
            };
        };

        let owner_record = match read_owner_record(&self.owner_path) {
            Some(pid) if pid != std::process::id() => CleanupStep::Skipped,
            _ => CleanupStep::from_removal(std::fs::remove_file(&self.owner_path)),
        };
        let lock_file = CleanupStep::from_removal(std::fs::remove_file(&self.lock_path));
        drop(file);

        let report = CleanupReport {
            lock_file,
            owner_record,
            lock_handle: CleanupStep::Done,
        };
        if !report.is_clean() {
            debug!(report = ?report, "Session lock cleanup was incomplete");
        }
        report
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if self.is_held() {
            self.release();
        }
    }
}

/// Reads the advisory owner pid, if the record exists and parses.
pub fn read_owner_record(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn write_owner_record(path: &Path) -> io::Result<()> {
    std::fs::write(path, std::process::id().to_string())
}

/// Whether `path` still names the inode `file` has open.
fn still_linked(file: &File, path: &Path) -> bool {
    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}
