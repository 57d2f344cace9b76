//! One-shot import of plugins declared in a TPM-style tmux.conf.
//!
//! Scans `set -g @plugin "owner/repo"` lines and generates a TOML
//! definition per plugin, so switching managers does not mean
//! retyping a plugin list. TPM itself is never imported.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::definitions::derive_name;

static PLUGIN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*set\s+-g\s+@plugin\s+['"]([^'"]+)['"]"#).expect("valid plugin line regex")
});
static TPM_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"run(?:-shell)?\s+['"][^'"]*tpm[^'"]*['"]"#).expect("valid bootstrap regex")
});

const TPM_SELF: &str = "tmux-plugins/tpm";

/// One plugin discovered in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCandidate {
    pub name: String,
    pub repo: String,
}

/// Everything `discover` learned, partitioned for `apply`.
#[derive(Debug, Default)]
pub struct MigrationPlan {
    /// Config files actually scanned.
    pub scanned: Vec<PathBuf>,
    /// Whether a TPM bootstrap line was seen (worth telling the user to
    /// remove).
    pub tpm_detected: bool,
    /// Candidates with no existing definition file.
    pub to_create: Vec<MigrationCandidate>,
    /// Candidates that already have a definition; only written with
    /// `overwrite`.
    pub to_skip: Vec<MigrationCandidate>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MigrationOutcome {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

#[derive(Serialize)]
struct GeneratedDefinition {
    url: String,
}

/// tmux config files to scan, most specific first: `$TMUX_CONF`, the
/// XDG location, then `~/.tmux.conf`. Only existing files are returned,
/// each once, even when `$TMUX_CONF` names one of the standard spots.
pub fn default_conf_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(custom) = std::env::var_os("TMUX_CONF") {
        if !custom.is_empty() {
            candidates.push(PathBuf::from(custom));
        }
    }
    if let Some(config) = dirs::config_dir() {
        candidates.push(config.join("tmux/tmux.conf"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".tmux.conf"));
    }
    dedup_existing(candidates)
}

/// Keep the first spelling of each real file. Canonicalizing the dedup
/// key catches the same conf reached through different paths or a
/// symlink.
fn dedup_existing(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for candidate in candidates {
        if !candidate.is_file() {
            continue;
        }
        let key = candidate
            .canonicalize()
            .unwrap_or_else(|_| candidate.clone());
        if seen.insert(key) {
            paths.push(candidate);
        }
    }
    paths
}

/// Scan `conf_paths` for plugin declarations and partition them against
/// the definitions already present in `definitions_dir`.
pub fn discover(conf_paths: &[PathBuf], definitions_dir: &Path) -> MigrationPlan {
    let mut plan = MigrationPlan::default();
    let mut seen = HashSet::new();
    let mut specs = Vec::new();

    for path in conf_paths {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                plan.warnings
                    .push(format!("{}: {err}; skipped", path.display()));
                continue;
            }
        };
        plan.scanned.push(path.clone());

        for line in text.lines() {
            if let Some(captures) = PLUGIN_LINE.captures(line) {
                let spec = captures[1].trim().to_string();
                if spec == TPM_SELF {
                    plan.tpm_detected = true;
                    continue;
                }
                if !spec.is_empty() && seen.insert(spec.clone()) {
                    specs.push(spec);
                }
                continue;
            }
            if TPM_BOOTSTRAP.is_match(line) {
                plan.tpm_detected = true;
            }
        }
    }

    specs.sort();
    for spec in specs {
        let Some(name) = derive_name(&spec) else {
            plan.warnings
                .push(format!("cannot derive a plugin name from {spec:?}; skipped"));
            continue;
        };
        let candidate = MigrationCandidate { name, repo: spec };
        if definition_exists(definitions_dir, &candidate.name) {
            plan.to_skip.push(candidate);
        } else {
            plan.to_create.push(candidate);
        }
    }

    debug!(
        found = plan.to_create.len() + plan.to_skip.len(),
        tpm = plan.tpm_detected,
        "Migration discovery finished"
    );
    plan
}

/// Write a TOML definition per candidate. Existing definitions are left
/// alone unless `overwrite` is set.
pub fn apply(plan: &MigrationPlan, definitions_dir: &Path, overwrite: bool) -> Result<MigrationOutcome> {
    fs::create_dir_all(definitions_dir).with_context(|| {
        format!(
            "failed to create definitions directory {}",
            definitions_dir.display()
        )
    })?;

    let mut outcome = MigrationOutcome::default();
    for candidate in plan.to_create.iter().chain(&plan.to_skip) {
        let path = definitions_dir.join(format!("{}.toml", candidate.name));
        if !overwrite && definition_exists(definitions_dir, &candidate.name) {
            outcome.skipped.push(path);
            continue;
        }
        let body = toml::to_string_pretty(&GeneratedDefinition {
            url: candidate.repo.clone(),
        })
        .context("failed to serialize definition")?;
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
        outcome.created.push(path);
    }
    Ok(outcome)
}

fn definition_exists(definitions_dir: &Path, name: &str) -> bool {
    ["toml", "yaml", "yml"]
        .iter()
        .any(|ext| definitions_dir.join(format!("{name}.{ext}")).is_file())
}
