use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TaskError};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_RETRY_DELAY: Duration = Duration::from_millis(256);

/// Exclusive advisory lock over one project's task files.
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Acquire the lock, retrying with exponential backoff (1ms doubling up to
    /// 256ms per attempt) until `timeout` has elapsed.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let mut delay = Duration::from_millis(1);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "lock acquired");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(_) if start.elapsed() < timeout => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    std::thread::sleep(delay.min(remaining));
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
                Err(_) => {
                    return Err(TaskError::LockTimeout(path.display().to_string()));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(lock = %self.path.display(), "lock released");
    }
}

/// Run `f` while holding the lock at `path`. The lock is released on every
/// exit path, including errors and panics unwinding through `f`.
pub fn with_lock<T>(path: &Path, timeout: Duration, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let _guard = ProjectLock::acquire(path, timeout)?;
    f()
}
