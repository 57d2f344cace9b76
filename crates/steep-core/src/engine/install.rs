//! Install: clone, resolve a version, check out, record.

use std::fs;

use chrono::Utc;
use tracing::{debug, info};

use crate::definitions::PluginRequest;
use crate::engine::{validate_name, with_progress, Engine};
use crate::error::Result;
use crate::git::clone_url;
use crate::registry::PluginRecord;
use crate::resolver::{self, ResolvedRef};

/// What an install attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Tag recorded for the plugin, when one was resolved.
    pub tag: Option<String>,
    /// True when an existing working directory satisfied the request
    /// and nothing was done.
    pub already_installed: bool,
}

impl Engine {
    /// Install one plugin. With `force`, an existing working directory
    /// is deleted (containment-checked first) and recreated from
    /// scratch; the recorded enabled flag survives the reinstall.
    pub fn install(
        &self,
        request: &PluginRequest,
        force: bool,
        progress: impl FnMut(u8),
    ) -> Result<InstallOutcome> {
        with_progress(progress, |report| self.install_inner(request, force, report))
    }

    fn install_inner(
        &self,
        request: &PluginRequest,
        force: bool,
        report: &mut dyn FnMut(u8),
    ) -> Result<InstallOutcome> {
        report(0);
        self.check_cancelled()?;
        validate_name(&request.name)?;
        self.ensure_layout()?;

        let workdir = self.config().plugin_dir(&request.name);
        if workdir.exists() && !force {
            let recorded = self
                .store()
                .read()?
                .get(&request.name)
                .and_then(|record| record.tag.clone());
            debug!(plugin = %request.name, "Already installed; nothing to do");
            return Ok(InstallOutcome {
                tag: recorded,
                already_installed: true,
            });
        }

        if workdir.exists() {
            report(5);
            if let Some(target) = self.contained_for_deletion(&request.name)? {
                fs::remove_dir_all(&target)?;
                info!(plugin = %request.name, "Removed existing directory for forced reinstall");
            }
        }

        self.check_cancelled()?;
        let remote = clone_url(&request.repo);
        info!(plugin = %request.name, remote = %remote, "Cloning");
        self.vcs.clone_repo(&remote, &workdir)?;
        report(40);

        self.check_cancelled()?;
        let tags = self.vcs.list_remote_tags(&workdir.to_string_lossy())?;
        report(55);

        // Only hit HEAD when the resolver will actually need the
        // fallback; a pinned or normally tagged install never does.
        let fallback_head = if request.pin.is_none() && resolver::latest_stable(&tags).is_none() {
            Some(self.vcs.head_commit(&workdir)?)
        } else {
            None
        };
        let resolution = resolver::resolve_install(
            request.pin.as_deref(),
            &tags,
            fallback_head.as_deref(),
            &request.repo,
        )?;
        report(70);

        self.check_cancelled()?;
        if matches!(resolution.target, ResolvedRef::Tag(_)) {
            self.vcs.checkout(&workdir, &resolution.target)?;
        }
        report(85);

        // Persist what HEAD actually points at, not what was asked for.
        let commit = self.vcs.head_commit(&workdir)?;
        report(95);

        let resolved_tag = match &resolution.target {
            ResolvedRef::Tag(tag) => Some(tag.clone()),
            ResolvedRef::Commit(_) => None,
        };
        let now = Utc::now();
        self.store().update(|registry| {
            let enabled = registry
                .get(&request.name)
                .map(|existing| existing.enabled)
                .unwrap_or(true);
            let mut record = PluginRecord::new(request.name.clone(), request.repo.clone());
            record.pin = request.pin.clone();
            record.tag = resolved_tag.clone();
            record.commit = Some(commit.clone());
            record.last_synced = Some(now);
            record.enabled = enabled;
            record.skip_auto_update = request.skip_auto_update;
            record.scripts = request.scripts.clone();
            registry.upsert(record);
        })?;

        info!(
            plugin = %request.name,
            version = %resolution.target.short_label(),
            "Installed"
        );
        Ok(InstallOutcome {
            tag: resolved_tag,
            already_installed: false,
        })
    }
}
