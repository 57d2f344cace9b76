//! Plugin definition files: the user-authored inputs that drive installs.
//!
//! One file per plugin in the definitions directory, TOML or YAML.
//! Unusable definitions never abort a load; they are skipped and
//! reported so the caller can surface them.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// On-disk definition shape. Only `url` is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawDefinition {
    name: Option<String>,
    url: Option<String>,
    local: bool,
    source: Vec<String>,
    tag: Option<String>,
    skip_auto_update: bool,
}

/// A validated definition, ready for the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRequest {
    pub name: String,
    /// `owner/repo` shorthand or full clone URL.
    pub repo: String,
    /// Requested tag; install refuses to guess when it does not exist.
    pub pin: Option<String>,
    /// Scripts to source after install, in definition order.
    pub scripts: Vec<String>,
    pub skip_auto_update: bool,
    /// Local plugins are listed but never git-managed.
    pub local: bool,
}

#[derive(Debug, Default)]
pub struct LoadedDefinitions {
    /// Sorted by name.
    pub requests: Vec<PluginRequest>,
    /// Human-readable problems: unreadable files, bad syntax, missing
    /// urls, duplicate names. Never fatal.
    pub warnings: Vec<String>,
}

/// Final path segment of a repo spec, minus any `.git` suffix.
pub fn derive_name(url: &str) -> Option<String> {
    let segment = url.trim().trim_end_matches('/').rsplit('/').next()?;
    let name = segment.trim_end_matches(".git").trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Load every definition file in `dir`. A missing directory simply
/// yields no definitions.
pub fn load_definitions(dir: &Path) -> Result<LoadedDefinitions> {
    let mut loaded = LoadedDefinitions::default();
    if !dir.exists() {
        debug!(dir = %dir.display(), "No definitions directory");
        return Ok(loaded);
    }

    let mut files: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read definitions directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("toml" | "yaml" | "yml")
            )
        })
        .collect();
    files.sort();

    for path in files {
        match load_one(&path) {
            Ok(Some(request)) => {
                if loaded.requests.iter().any(|r| r.name == request.name) {
                    loaded.warnings.push(format!(
                        "{}: duplicate plugin name {:?}; keeping the first definition",
                        path.display(),
                        request.name
                    ));
                    continue;
                }
                loaded.requests.push(request);
            }
            Ok(None) => loaded.warnings.push(format!(
                "{}: definition has no usable url; skipped",
                path.display()
            )),
            Err(err) => loaded
                .warnings
                .push(format!("{}: {err:#}; skipped", path.display())),
        }
    }

    loaded.requests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(loaded)
}

/// `Ok(None)` means the file parsed but cannot identify a plugin.
fn load_one(path: &Path) -> Result<Option<PluginRequest>> {
    let text = std::fs::read_to_string(path).context("unreadable")?;
    let raw: RawDefinition = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&text).context("invalid TOML")?,
        _ => serde_yaml::from_str(&text).context("invalid YAML")?,
    };

    let Some(url) = raw.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    let name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| derive_name(url));
    let Some(name) = name else {
        return Ok(None);
    };

    Ok(Some(PluginRequest {
        name,
        repo: url.to_string(),
        pin: raw.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
        scripts: raw.source,
        skip_auto_update: raw.skip_auto_update,
        local: raw.local,
    }))
}
