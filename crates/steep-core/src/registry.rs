//! Registry document model: one record per installed plugin.
//!
//! Persisted as a single JSON document (`{ "plugins": [...] }`) with
//! mapping semantics: `name` is the unique key and upserts replace in
//! place. Unknown fields are ignored on read so older builds can open
//! newer documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Durable state for one installed plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRecord {
    /// Unique key; also the working directory name under the plugins root.
    pub name: String,
    /// `owner/repo` shorthand or a full clone URL.
    pub repo: String,
    /// Tag the user asked for in their definition. Only config changes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    /// Tag actually checked out, when the install resolved to a tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Local HEAD observed after the last successful install or upgrade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Excluded from bulk upgrade sweeps; explicit upgrades still apply.
    #[serde(default)]
    pub skip_auto_update: bool,
    /// Scripts to source, in order, relative to the working directory.
    #[serde(default)]
    pub scripts: Vec<String>,
}

impl PluginRecord {
    pub fn new(name: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
            pin: None,
            tag: None,
            commit: None,
            last_synced: None,
            enabled: true,
            skip_auto_update: false,
            scripts: Vec::new(),
        }
    }

    /// Short human version label: tag, else abbreviated commit, else "n/a".
    pub fn version_label(&self) -> String {
        if let Some(tag) = &self.tag {
            return tag.clone();
        }
        if let Some(commit) = &self.commit {
            return commit.chars().take(7).collect();
        }
        "n/a".to_string()
    }
}

/// The whole registry document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub plugins: Vec<PluginRecord>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PluginRecord> {
        self.plugins.iter_mut().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace by name, keeping the list sorted by name.
    pub fn upsert(&mut self, record: PluginRecord) {
        self.plugins.retain(|p| p.name != record.name);
        self.plugins.push(record);
        self.plugins.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Remove by name; returns whether a record was dropped.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name != name);
        self.plugins.len() != before
    }
}
