//! Sourcing of plugin scripts into the running tmux server.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::registry::Registry;

static TMUX_AVAILABLE: Lazy<bool> = Lazy::new(|| which::which("tmux").is_ok());

/// Executes one plugin script. Split out so the sourcing sweep can be
/// tested without a tmux server.
pub trait ScriptRunner: Send + Sync {
    fn run(&self, script: &Path) -> Result<()>;
}

/// Hands scripts to `tmux run-shell`, the conventional way tmux plugins
/// register their keybindings and options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TmuxRunner;

impl TmuxRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptRunner for TmuxRunner {
    fn run(&self, script: &Path) -> Result<()> {
        if !*TMUX_AVAILABLE {
            bail!("tmux binary not found on PATH");
        }
        let script = script.to_string_lossy();
        let output = Command::new("tmux")
            .args(["run-shell", script.as_ref()])
            .output()
            .with_context(|| format!("failed to execute tmux run-shell {script}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            bail!("tmux run-shell {script} failed: {stderr}");
        }
        Ok(())
    }
}

/// Run every enabled plugin's scripts in registry order.
///
/// Missing script files are skipped quietly; runner failures are logged
/// and never stop the sweep. Returns the number of scripts handed to
/// the runner.
pub fn source_enabled(registry: &Registry, plugins_root: &Path, runner: &dyn ScriptRunner) -> usize {
    let mut executed = 0;
    for record in registry.plugins.iter().filter(|r| r.enabled) {
        let workdir = plugins_root.join(&record.name);
        for script in &record.scripts {
            let path = workdir.join(script);
            if !path.is_file() {
                debug!(
                    plugin = %record.name,
                    script = %path.display(),
                    "Script missing; not sourcing"
                );
                continue;
            }
            executed += 1;
            if let Err(err) = runner.run(&path) {
                warn!(plugin = %record.name, error = %err, "Sourcing script failed");
            }
        }
    }
    executed
}
