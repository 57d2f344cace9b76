//! Filesystem lock marker guarding the registry document.
//!
//! Mutual exclusion across processes relies on the atomicity of
//! create-if-absent: whoever creates the marker file holds the lock.
//! Contenders poll at a fixed interval and may reclaim a marker whose
//! mtime says its owner died mid-operation.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle for acquiring the marker at a fixed path.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    stale_after: Duration,
    poll_interval: Duration,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Block until the marker is created or `timeout` elapses.
    ///
    /// A marker older than the staleness threshold is removed and the
    /// attempt retried immediately; that path logs a warning naming the
    /// reclaimed marker.
    pub fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
        let start = Instant::now();
        loop {
            match self.try_create() {
                Ok(true) => {
                    debug!(path = %self.path.display(), "Acquired registry lock");
                    return Ok(LockGuard {
                        path: self.path.clone(),
                        released: false,
                    });
                }
                Ok(false) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // Parent directory does not exist yet.
                    if let Some(parent) = self.path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    continue;
                }
                Err(err) => return Err(Error::Io(err)),
            }

            if self.reclaim_if_stale() {
                continue;
            }

            if start.elapsed() >= timeout {
                return Err(Error::LockTimeout {
                    waited: start.elapsed(),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// One atomic create attempt. `Ok(false)` means another holder exists.
    fn try_create(&self) -> io::Result<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                // Owner PID is diagnostic only; failing to record it does
                // not affect ownership.
                let _ = writeln!(file, "{}", std::process::id());
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remove the marker if its mtime exceeds the staleness threshold.
    /// Returns true when the caller should retry without sleeping.
    fn reclaim_if_stale(&self) -> bool {
        let Ok(metadata) = fs::metadata(&self.path) else {
            // Holder released between our attempt and now.
            return true;
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| mtime.elapsed().ok());
        match age {
            Some(age) if age >= self.stale_after => {
                warn!(
                    path = %self.path.display(),
                    age_secs = age.as_secs(),
                    "Reclaiming stale registry lock"
                );
                match fs::remove_file(&self.path) {
                    Ok(()) => true,
                    Err(err) => err.kind() == io::ErrorKind::NotFound,
                }
            }
            _ => false,
        }
    }
}

/// Held lock; the marker is removed on `release` or drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = fs::remove_file(&self.path) {
            // A reclaimed or manually removed marker is fine.
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "Failed to remove lock marker");
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
