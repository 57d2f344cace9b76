//! Update availability checks.
//!
//! Checking is read-only: it never mutates the registry or any working
//! directory, so any number of checks can run concurrently. Remote
//! failures degrade to "up to date" with a warning rather than failing
//! a bulk sweep.

use std::fmt;

use tracing::warn;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::git::clone_url;
use crate::registry::PluginRecord;
use crate::resolver::{self, ResolvedRef};
use crate::workers;

/// Where one plugin stands relative to its remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Recorded in the registry but missing on disk.
    NotInstalled,
    UpToDate,
    Available { from: String, to: String },
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStatus::NotInstalled => write!(f, "not installed"),
            UpdateStatus::UpToDate => write!(f, "up to date"),
            UpdateStatus::Available { from, to } => write!(f, "{from} -> {to}"),
        }
    }
}

/// Everything needed to decide on and apply one upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub name: String,
    pub status: UpdateStatus,
    pub(crate) target: Option<ResolvedRef>,
    pub skip_auto_update: bool,
    /// Working directory footprint; "unknown" when it cannot be read.
    pub size: String,
    /// Age of the plan's reference, as reported by the VCS.
    pub released: String,
}

impl UpgradePlan {
    pub fn update_available(&self) -> bool {
        matches!(self.status, UpdateStatus::Available { .. })
    }
}

impl Engine {
    /// Classify one installed plugin against its remote.
    pub fn plan_update(&self, record: &PluginRecord) -> UpgradePlan {
        let workdir = self.config().plugin_dir(&record.name);
        if !workdir.is_dir() {
            return UpgradePlan {
                name: record.name.clone(),
                status: UpdateStatus::NotInstalled,
                target: None,
                skip_auto_update: record.skip_auto_update,
                size: "unknown".to_string(),
                released: "unknown".to_string(),
            };
        }

        let remote = clone_url(&record.repo);
        let tags = match self.vcs.list_remote_tags(&remote) {
            Ok(tags) => tags,
            Err(err) => {
                warn!(
                    plugin = %record.name,
                    error = %err,
                    "Tag listing failed; treating as up to date"
                );
                Vec::new()
            }
        };

        // Untagged installs track the default branch head instead of a
        // tag, so only then is the extra remote round trip worth it.
        let remote_head = if record.tag.is_none() {
            match self.vcs.remote_head(&remote) {
                Ok(head) => head,
                Err(err) => {
                    warn!(
                        plugin = %record.name,
                        error = %err,
                        "Remote head lookup failed; treating as up to date"
                    );
                    None
                }
            }
        } else {
            None
        };

        let resolution = resolver::resolve_update(
            record.tag.as_deref(),
            record.commit.as_deref(),
            &tags,
            remote_head.as_deref(),
        );
        let (status, target) = match resolution {
            Some(resolution) if resolution.newer => {
                let to = resolution.target.short_label();
                (
                    UpdateStatus::Available {
                        from: record.version_label(),
                        to,
                    },
                    Some(resolution.target),
                )
            }
            _ => (UpdateStatus::UpToDate, None),
        };

        // Diagnostics only; failures surface as "unknown", never as an
        // error for the check itself.
        let size = self
            .vcs
            .directory_size(&workdir)
            .unwrap_or_else(|| "unknown".to_string());
        let reference = match &target {
            Some(ResolvedRef::Tag(tag)) => format!("tags/{tag}"),
            Some(ResolvedRef::Commit(commit)) => commit.clone(),
            None => "HEAD".to_string(),
        };
        let released = self
            .vcs
            .commit_age(&workdir, &reference)
            .unwrap_or_else(|| "unknown".to_string());

        UpgradePlan {
            name: record.name.clone(),
            status,
            target,
            skip_auto_update: record.skip_auto_update,
            size,
            released,
        }
    }

    /// Plan for a single plugin by name.
    pub fn plan_for(&self, name: &str) -> Result<UpgradePlan> {
        let registry = self.store().read()?;
        let record = registry.get(name).ok_or_else(|| Error::NotInstalled {
            name: name.to_string(),
        })?;
        Ok(self.plan_update(record))
    }

    /// Check every recorded plugin against its remote on a bounded
    /// worker pool. Plans come back in registry (name) order.
    pub fn check_all(&self, parallelism: usize) -> Result<Vec<UpgradePlan>> {
        let registry = self.store().read()?;
        Ok(workers::map_bounded(
            registry.plugins,
            parallelism,
            |record| self.plan_update(&record),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::testkit::{engine_with, request, MockVcs, RecordingRunner};

    fn installed(engine: &Engine, name: &str) {
        engine.install(&request(name), false, |_| {}).unwrap();
    }

    fn runner() -> Arc<RecordingRunner> {
        Arc::new(RecordingRunner::default())
    }

    #[test]
    fn missing_directory_classifies_as_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "abc1234def"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());

        installed(&engine, "tmux-yank");
        std::fs::remove_dir_all(dir.path().join("plugins/tmux-yank")).unwrap();

        let plan = engine.plan_for("tmux-yank").unwrap();
        assert_eq!(plan.status, UpdateStatus::NotInstalled);
        assert!(!plan.update_available());
        assert_eq!(plan.size, "unknown");
    }

    #[test]
    fn tagged_plugin_compares_tag_to_tag_without_remote_head() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "abc1234def"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());
        installed(&engine, "tmux-yank");

        vcs.calls.lock().unwrap().clear();
        let record = engine.store().read().unwrap().get("tmux-yank").cloned().unwrap();

        // Same latest tag: up to date even though commits may differ.
        let plan = engine.plan_update(&record);
        assert_eq!(plan.status, UpdateStatus::UpToDate);
        assert_eq!(plan.target, None);
        assert!(
            !vcs.calls().iter().any(|c| c.starts_with("remote-head")),
            "tagged installs never consult the remote head"
        );
    }

    #[test]
    fn newer_tag_is_reported_with_both_labels() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "abc1234def"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());
        installed(&engine, "tmux-yank");

        let upgraded = Arc::new(MockVcs::with_tags(&["v1.0.0", "v1.10.0", "v1.9.0"], "abc1234def"));
        let engine = engine_with(dir.path(), upgraded, runner());
        let plan = engine.plan_for("tmux-yank").unwrap();

        assert_eq!(
            plan.status,
            UpdateStatus::Available {
                from: "v1.0.0".to_string(),
                to: "v1.10.0".to_string(),
            }
        );
        assert_eq!(plan.target, Some(ResolvedRef::Tag("v1.10.0".to_string())));
        assert_eq!(plan.status.to_string(), "v1.0.0 -> v1.10.0");
    }

    #[test]
    fn untagged_plugin_compares_local_and_remote_heads() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&[], "aaaa111bbbb"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());
        installed(&engine, "scratch");

        let moved = Arc::new(MockVcs {
            remote_head: Some("cccc222dddd".to_string()),
            ..MockVcs::with_tags(&[], "aaaa111bbbb")
        });
        let engine = engine_with(dir.path(), moved, runner());
        let plan = engine.plan_for("scratch").unwrap();

        assert_eq!(
            plan.status,
            UpdateStatus::Available {
                from: "aaaa111".to_string(),
                to: "cccc222".to_string(),
            }
        );

        let same = Arc::new(MockVcs {
            remote_head: Some("aaaa111bbbb".to_string()),
            ..MockVcs::with_tags(&[], "aaaa111bbbb")
        });
        let engine = engine_with(dir.path(), same, runner());
        assert_eq!(engine.plan_for("scratch").unwrap().status, UpdateStatus::UpToDate);
    }

    #[test]
    fn remote_failure_degrades_to_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0", "v2.0.0"], "abc1234def"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());
        installed(&engine, "tmux-yank");

        let failing = Arc::new(MockVcs {
            fail_list: true,
            ..MockVcs::with_tags(&["v2.0.0"], "abc1234def")
        });
        let engine = engine_with(dir.path(), failing, runner());
        let plan = engine.plan_for("tmux-yank").unwrap();

        assert_eq!(plan.status, UpdateStatus::UpToDate);
    }

    #[test]
    fn check_all_returns_one_plan_per_record_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "abc1234def"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());

        installed(&engine, "zsh-ish");
        installed(&engine, "tmux-yank");

        let plans = engine.check_all(4).unwrap();
        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["tmux-yank", "zsh-ish"]);
        assert!(plans.iter().all(|p| p.status == UpdateStatus::UpToDate));
    }

    #[test]
    fn missing_registry_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with(dir.path(), Arc::new(MockVcs::default()), runner());

        let err = engine.plan_for("ghost").unwrap_err();
        assert!(matches!(err, Error::NotInstalled { .. }));
    }
}
