//! Durable registry persistence with atomic replace.
//!
//! The canonical document only ever changes via rename of a fully
//! written, fsynced temp sibling, so readers never observe a partial
//! document. All access goes through the lock marker; the lock is held
//! only for the brief read or rewrite, never across network phases.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::storage::lock::{LockFile, LockGuard};

/// Handle to the registry document and its lock.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    lock: LockFile,
    lock_timeout: Duration,
}

impl RegistryStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.registry_path(),
            lock: LockFile::new(config.lock_path(), config.lock_stale_after),
            lock_timeout: config.lock_timeout,
        }
    }

    /// Acquire the lock; read and write go through the returned guard.
    pub fn lock(&self) -> Result<StoreGuard<'_>> {
        let lock = self.lock.acquire(self.lock_timeout)?;
        Ok(StoreGuard { store: self, _lock: lock })
    }

    /// Snapshot of the current document.
    pub fn read(&self) -> Result<Registry> {
        Ok(self.lock()?.read())
    }

    /// Read-modify-write in a single critical section.
    pub fn update<T>(&self, mutate: impl FnOnce(&mut Registry) -> T) -> Result<T> {
        let guard = self.lock()?;
        let mut registry = guard.read();
        let value = mutate(&mut registry);
        guard.write(&registry)?;
        Ok(value)
    }

    fn load(&self) -> Registry {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No registry file yet; starting empty");
                return Registry::default();
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Registry file unreadable; treating as empty"
                );
                return Registry::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(registry) => registry,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Registry file corrupt; treating as empty"
                );
                Registry::default()
            }
        }
    }

    fn persist(&self, registry: &Registry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(Error::RegistryWrite)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let written = (|| -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, registry)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(Error::RegistryWrite(err));
        }
        Ok(())
    }
}

/// Lock held for the guard's lifetime; released on drop.
#[derive(Debug)]
pub struct StoreGuard<'a> {
    store: &'a RegistryStore,
    _lock: LockGuard,
}

impl StoreGuard<'_> {
    /// Load the document. Absent, unreadable, or corrupt files all read
    /// as an empty registry; corruption is logged, never fatal.
    pub fn read(&self) -> Registry {
        self.store.load()
    }

    /// Replace the document atomically.
    pub fn write(&self, registry: &Registry) -> Result<()> {
        self.store.persist(registry)
    }
}
