//! Plugin lifecycle operations: install, check, upgrade, remove,
//! enable/disable.
//!
//! Operations are ordinary blocking calls built from ordered phases.
//! Each takes a progress callback reporting percentages in [0, 100] and
//! always lands on a terminal value: 100 on success, 0 on failure. The
//! registry lock is only ever held for the brief persistence phase, so
//! slow network phases of different plugins can overlap freely.

mod install;
mod remove;
mod update;
mod upgrade;

pub use install::InstallOutcome;
pub use update::{UpdateStatus, UpgradePlan};

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::git::GitCli;
use crate::sourcer::{self, ScriptRunner, TmuxRunner};
use crate::storage::RegistryStore;
use crate::vcs::Vcs;

/// Orchestrates lifecycle operations over the store, the VCS
/// capability, and the script runner. Cheap to clone; clones share the
/// same cancellation flag.
#[derive(Clone)]
pub struct Engine {
    config: Config,
    store: RegistryStore,
    vcs: Arc<dyn Vcs>,
    runner: Arc<dyn ScriptRunner>,
    cancel: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(config: Config, vcs: Arc<dyn Vcs>, runner: Arc<dyn ScriptRunner>) -> Self {
        let store = RegistryStore::new(&config);
        Self {
            config,
            store,
            vcs,
            runner,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Engine wired to the real git binary and tmux.
    pub fn with_defaults(config: Config) -> Self {
        Self::new(config, Arc::new(GitCli::new()), Arc::new(TmuxRunner::new()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    /// Shared cancellation flag; operations abort between phases once
    /// it is set. In-flight subprocesses are never killed.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(self.config.plugins_dir())?;
        Ok(())
    }

    /// Where deletion for `name` would happen, containment-checked.
    ///
    /// `None` means there is nothing on disk to delete. A target that
    /// resolves (through symlinks or dot segments) outside the plugins
    /// root is refused before anything is touched.
    pub(crate) fn contained_for_deletion(&self, name: &str) -> Result<Option<PathBuf>> {
        let root = self.config.plugins_dir();
        let candidate = root.join(name);
        if !candidate.exists() {
            return Ok(None);
        }
        let canonical_root = root.canonicalize()?;
        let canonical = candidate.canonicalize()?;
        if canonical.starts_with(&canonical_root) && canonical != canonical_root {
            Ok(Some(candidate))
        } else {
            Err(Error::UnsafePath { path: candidate })
        }
    }

    /// Flip the enabled flag. Returns `Ok(false)` (and writes nothing)
    /// when no record exists. Enabling re-sources every enabled
    /// plugin's scripts so load order stays consistent.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let guard = self.store.lock()?;
        let mut registry = guard.read();
        let Some(record) = registry.get_mut(name) else {
            debug!(plugin = %name, "No registry record; enable/disable is a no-op");
            return Ok(false);
        };
        record.enabled = enabled;
        guard.write(&registry)?;
        drop(guard);

        if enabled {
            sourcer::source_enabled(&registry, &self.config.plugins_dir(), self.runner.as_ref());
        }
        info!(plugin = %name, enabled, "Updated enabled flag");
        Ok(true)
    }

    /// Run every enabled plugin's scripts; the `steep source` hook.
    pub fn source_enabled(&self) -> Result<usize> {
        let registry = self.store.read()?;
        Ok(sourcer::source_enabled(
            &registry,
            &self.config.plugins_dir(),
            self.runner.as_ref(),
        ))
    }

    /// Read-only listing for status tables.
    pub fn list_installed(&self) -> Result<Vec<InstalledInfo>> {
        let registry = self.store.read()?;
        Ok(registry
            .plugins
            .iter()
            .map(|record| {
                let workdir = self.config.plugin_dir(&record.name);
                InstalledInfo {
                    name: record.name.clone(),
                    version: record.version_label(),
                    size: self
                        .vcs
                        .directory_size(&workdir)
                        .unwrap_or_else(|| "unknown".to_string()),
                    installed: record
                        .last_synced
                        .map(|t| t.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    enabled: record.enabled,
                }
            })
            .collect())
    }
}

/// One row of `list_installed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledInfo {
    pub name: String,
    pub version: String,
    pub size: String,
    pub installed: String,
    pub enabled: bool,
}

/// Plugin names become directory names; refuse anything that is not a
/// single normal path component.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::UnsafePath {
            path: path.to_path_buf(),
        }),
    }
}

/// Run `body`, then report the terminal progress value for it.
pub(crate) fn with_progress<T>(
    mut progress: impl FnMut(u8),
    body: impl FnOnce(&mut dyn FnMut(u8)) -> Result<T>,
) -> Result<T> {
    match body(&mut progress) {
        Ok(value) => {
            progress(100);
            Ok(value)
        }
        Err(err) => {
            progress(0);
            Err(err)
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::testkit::{engine_with, MockVcs, RecordingRunner};
    use super::*;
    use crate::registry::PluginRecord;

    fn seed_record(engine: &Engine, name: &str, enabled: bool, scripts: &[&str]) {
        engine
            .store()
            .update(|registry| {
                let mut record = PluginRecord::new(name, format!("owner/{name}"));
                record.enabled = enabled;
                record.scripts = scripts.iter().map(|s| s.to_string()).collect();
                record.last_synced = Some(chrono::Utc.with_ymd_and_hms(2025, 5, 20, 8, 0, 0).unwrap());
                registry.upsert(record);
            })
            .unwrap();
    }

    fn touch_script(root: &std::path::Path, plugin: &str, script: &str) {
        let path = root.join("plugins").join(plugin).join(script);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "#!/bin/sh\n").unwrap();
    }

    #[test]
    fn validate_name_rejects_escapes() {
        assert!(validate_name("tmux-sensible").is_ok());
        for bad in ["../evil", "a/b", "/abs", "..", ".", ""] {
            assert!(
                matches!(validate_name(bad), Err(Error::UnsafePath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn set_enabled_on_absent_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            Arc::new(MockVcs::default()),
            Arc::new(RecordingRunner::default()),
        );

        assert!(!engine.set_enabled("ghost", true).unwrap());
        assert!(!dir.path().join("registry.json").exists());
    }

    #[test]
    fn enabling_sources_every_enabled_plugin_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let engine = engine_with(dir.path(), Arc::new(MockVcs::default()), runner.clone());

        seed_record(&engine, "alpha", true, &["a.tmux"]);
        seed_record(&engine, "beta", false, &["b.tmux"]);
        touch_script(dir.path(), "alpha", "a.tmux");
        touch_script(dir.path(), "beta", "b.tmux");

        assert!(engine.set_enabled("beta", true).unwrap());

        let ran = runner.ran.lock().unwrap();
        assert_eq!(
            *ran,
            vec![
                dir.path().join("plugins/alpha/a.tmux"),
                dir.path().join("plugins/beta/b.tmux"),
            ]
        );
        assert!(engine.store().read().unwrap().get("beta").unwrap().enabled);
    }

    #[test]
    fn disabling_flips_the_flag_without_sourcing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let engine = engine_with(dir.path(), Arc::new(MockVcs::default()), runner.clone());

        seed_record(&engine, "alpha", true, &["a.tmux"]);
        touch_script(dir.path(), "alpha", "a.tmux");

        assert!(engine.set_enabled("alpha", false).unwrap());
        assert!(runner.ran.lock().unwrap().is_empty());
        assert!(!engine.store().read().unwrap().get("alpha").unwrap().enabled);
    }

    #[test]
    fn list_installed_renders_version_size_and_date() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            Arc::new(MockVcs::default()),
            Arc::new(RecordingRunner::default()),
        );

        seed_record(&engine, "alpha", true, &[]);
        std::fs::create_dir_all(dir.path().join("plugins/alpha")).unwrap();

        let rows = engine.list_installed().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "alpha");
        assert_eq!(rows[0].version, "n/a");
        assert_eq!(rows[0].size, "1.0K");
        assert_eq!(rows[0].installed, "2025-05-20");
        assert!(rows[0].enabled);
    }
}
