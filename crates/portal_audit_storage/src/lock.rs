//! Advisory file locking.
//!
//! Writers to a log file serialize on an exclusive lock held on a sibling
//! `<file>.lock`. The lock is an OS advisory lock (`flock` on Unix,
//! `LockFileEx` on Windows), so it serializes separate processes as well as
//! threads that open their own handles.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Initial wait between lock attempts.
const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
/// Upper bound on the wait between lock attempts.
const MAX_BACKOFF: Duration = Duration::from_millis(200);

/// Returns the lock file path used for `target`.
#[must_use]
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// An exclusive advisory lock, released on drop.
///
/// When the filesystem does not support advisory locks the guard is empty
/// and provides no mutual exclusion.
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    path: PathBuf,
}

impl FileLock {
    /// Acquires the exclusive lock for `target`, retrying with exponential
    /// backoff until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if another holder kept the lock
    /// for longer than `timeout`, or an I/O error if the lock file cannot be
    /// opened.
    pub fn acquire(target: &Path, timeout: Duration) -> StorageResult<Self> {
        let path = lock_path_for(target);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    debug!(path = %path.display(), waited_ms = started.elapsed().as_millis() as u64, "lock acquired");
                    return Ok(Self {
                        file: Some(file),
                        path,
                    });
                }
                Err(err) if is_contended(&err) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        warn!(path = %path.display(), ?waited, "lock acquisition timed out");
                        return Err(StorageError::LockTimeout { path, waited });
                    }
                    let remaining = timeout - waited;
                    thread::sleep(backoff.min(remaining));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(err) if err.kind() == io::ErrorKind::Unsupported => {
                    warn!(
                        path = %path.display(),
                        "advisory locking unsupported here; writes are not serialized"
                    );
                    return Ok(Self { file: None, path });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Returns true if this guard actually holds an OS lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(err) = FileExt::unlock(&file) {
                warn!(path = %self.path.display(), %err, "failed to release lock");
            }
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
