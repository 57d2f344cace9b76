//! Upgrade: fetch the planned target, check it out, re-record.

use chrono::Utc;
use tracing::info;

use crate::engine::{with_progress, Engine, UpgradePlan};
use crate::error::{Error, Result};
use crate::resolver::ResolvedRef;
use crate::workers;

impl Engine {
    /// Apply a previously computed plan. Refuses plans that carry no
    /// update so a stale table can never downgrade anything.
    pub fn upgrade(&self, plan: &UpgradePlan, progress: impl FnMut(u8)) -> Result<()> {
        with_progress(progress, |report| self.upgrade_inner(plan, report))
    }

    fn upgrade_inner(&self, plan: &UpgradePlan, report: &mut dyn FnMut(u8)) -> Result<()> {
        let Some(target) = plan.target.as_ref().filter(|_| plan.update_available()) else {
            return Err(Error::NoUpdate {
                name: plan.name.clone(),
            });
        };
        report(10);
        self.check_cancelled()?;

        let workdir = self.config().plugin_dir(&plan.name);
        if !workdir.is_dir() {
            return Err(Error::NotInstalled {
                name: plan.name.clone(),
            });
        }

        self.vcs.fetch_ref(&workdir, target)?;
        report(40);
        self.check_cancelled()?;

        self.vcs.checkout(&workdir, target)?;
        report(70);

        // Record what HEAD landed on, not what the plan promised.
        let commit = self.vcs.head_commit(&workdir)?;
        report(90);

        let now = Utc::now();
        let recorded = self.store().update(|registry| {
            let Some(record) = registry.get_mut(&plan.name) else {
                return false;
            };
            if let ResolvedRef::Tag(tag) = target {
                record.tag = Some(tag.clone());
            }
            record.commit = Some(commit.clone());
            record.last_synced = Some(now);
            true
        })?;
        if !recorded {
            return Err(Error::NotInstalled {
                name: plan.name.clone(),
            });
        }

        info!(plugin = %plan.name, version = %target.short_label(), "Upgraded");
        Ok(())
    }

    /// Apply every actionable plan on a bounded worker pool, skipping
    /// records flagged `skip_auto_update`. Results keep plan order.
    pub fn upgrade_all(
        &self,
        plans: Vec<UpgradePlan>,
        parallelism: usize,
        on_event: impl Fn(&str, u8) + Sync,
    ) -> Vec<(String, Result<()>)> {
        let eligible: Vec<UpgradePlan> = plans
            .into_iter()
            .filter(|plan| plan.update_available() && !plan.skip_auto_update)
            .collect();
        workers::map_bounded(eligible, parallelism, |plan| {
            let result = self.upgrade(&plan, |pct| on_event(&plan.name, pct));
            (plan.name, result)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::engine::testkit::{engine_with, progress_sink, request, MockVcs, RecordingRunner};
    use crate::engine::UpdateStatus;

    fn runner() -> Arc<RecordingRunner> {
        Arc::new(RecordingRunner::default())
    }

    fn plan_against(engine: &Engine, name: &str) -> UpgradePlan {
        engine.plan_for(name).unwrap()
    }

    #[test]
    fn refuses_plans_without_an_update() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "abc1234def"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());
        engine.install(&request("tmux-yank"), false, |_| {}).unwrap();

        let plan = plan_against(&engine, "tmux-yank");
        assert_eq!(plan.status, UpdateStatus::UpToDate);

        let (seen, sink) = progress_sink();
        let err = engine.upgrade(&plan, sink).unwrap_err();
        assert!(matches!(err, Error::NoUpdate { .. }));
        assert_eq!(*seen.lock().unwrap().last().unwrap(), 0);
    }

    #[test]
    fn upgrade_to_tag_records_tag_and_actual_head() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "old-sha-111"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());
        engine.install(&request("tmux-yank"), false, |_| {}).unwrap();

        let newer = Arc::new(MockVcs::with_tags(&["v1.0.0", "v1.1.0"], "new-sha-222"));
        let engine = engine_with(dir.path(), newer.clone(), runner());
        let plan = plan_against(&engine, "tmux-yank");
        assert!(plan.update_available());

        let (seen, sink) = progress_sink();
        engine.upgrade(&plan, sink).unwrap();

        let record = engine.store().read().unwrap().get("tmux-yank").cloned().unwrap();
        assert_eq!(record.tag.as_deref(), Some("v1.1.0"));
        assert_eq!(record.commit.as_deref(), Some("new-sha-222"));
        assert!(record.last_synced.is_some());

        let calls = newer.calls();
        assert!(calls.contains(&"fetch v1.1.0".to_string()));
        assert!(calls.contains(&"checkout v1.1.0".to_string()));
        assert_eq!(*seen.lock().unwrap().last().unwrap(), 100);
    }

    #[test]
    fn upgrade_of_untagged_install_moves_the_commit_only() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&[], "aaaa111bbbb"));
        let engine = engine_with(dir.path(), vcs.clone(), runner());
        engine.install(&request("scratch"), false, |_| {}).unwrap();

        let moved = Arc::new(MockVcs {
            remote_head: Some("cccc222dddd".to_string()),
            ..MockVcs::with_tags(&[], "cccc222dddd")
        });
        let engine = engine_with(dir.path(), moved, runner());
        let plan = plan_against(&engine, "scratch");

        engine.upgrade(&plan, |_| {}).unwrap();

        let record = engine.store().read().unwrap().get("scratch").cloned().unwrap();
        assert_eq!(record.tag, None);
        assert_eq!(record.commit.as_deref(), Some("cccc222dddd"));
    }

    #[test]
    fn pin_survives_an_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "old-sha-111"));
        let engine = engine_with(dir.path(), vcs, runner());
        let mut pinned = request("tmux-yank");
        pinned.pin = Some("v1.0.0".to_string());
        engine.install(&pinned, false, |_| {}).unwrap();

        let newer = Arc::new(MockVcs::with_tags(&["v1.0.0", "v1.1.0"], "new-sha-222"));
        let engine = engine_with(dir.path(), newer, runner());
        let plan = plan_against(&engine, "tmux-yank");
        engine.upgrade(&plan, |_| {}).unwrap();

        let record = engine.store().read().unwrap().get("tmux-yank").cloned().unwrap();
        assert_eq!(record.pin.as_deref(), Some("v1.0.0"), "pin is never rewritten");
        assert_eq!(record.tag.as_deref(), Some("v1.1.0"));
    }

    #[test]
    fn fetch_failure_leaves_the_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "old-sha-111"));
        let engine = engine_with(dir.path(), vcs, runner());
        engine.install(&request("tmux-yank"), false, |_| {}).unwrap();

        let failing = Arc::new(MockVcs {
            fail_fetch: true,
            ..MockVcs::with_tags(&["v1.0.0", "v1.1.0"], "new-sha-222")
        });
        let engine = engine_with(dir.path(), failing, runner());
        let plan = plan_against(&engine, "tmux-yank");

        let err = engine.upgrade(&plan, |_| {}).unwrap_err();
        assert!(matches!(err, Error::Vcs { .. }));

        let record = engine.store().read().unwrap().get("tmux-yank").cloned().unwrap();
        assert_eq!(record.tag.as_deref(), Some("v1.0.0"));
        assert_eq!(record.commit.as_deref(), Some("old-sha-111"));
    }

    #[test]
    fn upgrade_all_applies_eligible_plans_and_skips_flagged_ones() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(MockVcs::with_tags(&["v1.0.0"], "old-sha-111"));
        let engine = engine_with(dir.path(), vcs, runner());
        engine.install(&request("alpha"), false, |_| {}).unwrap();
        let mut flagged = request("beta");
        flagged.skip_auto_update = true;
        engine.install(&flagged, false, |_| {}).unwrap();

        let newer = Arc::new(MockVcs::with_tags(&["v1.0.0", "v1.1.0"], "new-sha-222"));
        let engine = engine_with(dir.path(), newer, runner());
        let plans = engine.check_all(2).unwrap();
        assert!(plans.iter().all(|p| p.update_available()));

        let events: Mutex<Vec<(String, u8)>> = Mutex::new(Vec::new());
        let results = engine.upgrade_all(plans, 2, |name, pct| {
            events.lock().unwrap().push((name.to_string(), pct));
        });

        assert_eq!(results.len(), 1, "flagged plan is skipped");
        assert_eq!(results[0].0, "alpha");
        assert!(results[0].1.is_ok());

        let registry = engine.store().read().unwrap();
        assert_eq!(registry.get("alpha").unwrap().tag.as_deref(), Some("v1.1.0"));
        assert_eq!(registry.get("beta").unwrap().tag.as_deref(), Some("v1.0.0"));

        let events = events.into_inner().unwrap();
        assert!(events.iter().any(|(name, pct)| name == "alpha" && *pct == 100));
        assert!(events.iter().all(|(name, _)| name == "alpha"));
    }
}
