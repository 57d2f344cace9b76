//! Runtime configuration: filesystem layout and lock tuning.
//!
//! Built once at startup and passed explicitly; nothing in this crate
//! reads configuration from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LOCK_STALE_AFTER: Duration = Duration::from_secs(60);

/// Paths and tuning for one steep installation root.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    /// How long acquisition polls before giving up.
    pub lock_timeout: Duration,
    /// Marker age beyond which a lock is considered abandoned.
    pub lock_stale_after: Duration,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_stale_after: DEFAULT_LOCK_STALE_AFTER,
        }
    }

    /// Default root: `~/.steep`, or `.steep` relative to cwd when no home
    /// directory can be determined.
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".steep")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one working directory (clone) per plugin.
    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    /// Canonical registry document.
    pub fn registry_path(&self) -> PathBuf {
        self.root.join("registry.json")
    }

    /// Lock marker guarding the registry document.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("registry.lock")
    }

    /// Directory of per-plugin definition files (TOML or YAML).
    pub fn definitions_dir(&self) -> PathBuf {
        self.root.join("definitions")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Working directory for a named plugin.
    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.plugins_dir().join(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}
