//! Subcommand implementations. Thin: parse nothing, print results,
//! delegate every decision to the engine.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use tracing::info;

use steep_core::definitions::{self, PluginRequest};
use steep_core::engine::{InstallOutcome, UpgradePlan};
use steep_core::migrate::{self, MigrationPlan};
use steep_core::{workers, Engine};

/// Single-line progress for one foreground operation.
fn live_progress(name: &str) -> impl FnMut(u8) + '_ {
    move |pct| {
        print!("\r  {name}: {pct:>3}%");
        let _ = io::stdout().flush();
    }
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}

fn announce_install(name: &str, result: &steep_core::Result<InstallOutcome>) {
    match result {
        Ok(outcome) if outcome.already_installed => println!("  {name}: already installed"),
        Ok(outcome) => println!(
            "  {name}: installed ({})",
            outcome.tag.as_deref().unwrap_or("default branch")
        ),
        Err(err) => println!("  {name}: failed ({err})"),
    }
}

pub fn install(engine: &Engine, name: Option<&str>, force: bool, jobs: usize) -> Result<()> {
    let loaded = definitions::load_definitions(&engine.config().definitions_dir())?;
    print_warnings(&loaded.warnings);

    if let Some(name) = name {
        let request = loaded
            .requests
            .into_iter()
            .find(|request| request.name == name)
            .with_context(|| format!("no definition found for '{name}'"))?;
        if request.local {
            println!("{name} is a local plugin; nothing to clone");
            return Ok(());
        }
        let result = engine.install(&request, force, live_progress(name));
        println!();
        let outcome = result?;
        if outcome.already_installed {
            println!("{name} is already installed (use --force to re-clone)");
        }
        return Ok(());
    }

    if loaded.requests.is_empty() {
        println!(
            "no definitions in {}",
            engine.config().definitions_dir().display()
        );
        return Ok(());
    }

    let (local, managed): (Vec<PluginRequest>, Vec<PluginRequest>) = loaded
        .requests
        .into_iter()
        .partition(|request| request.local);
    for request in &local {
        println!("  {}: local plugin, left alone", request.name);
    }

    let total = managed.len();
    let results: Vec<(String, steep_core::Result<InstallOutcome>)> =
        workers::map_bounded(managed, jobs, |request: PluginRequest| {
            let result = engine.install(&request, force, |_| {});
            announce_install(&request.name, &result);
            (request.name, result)
        });

    let failed = results.iter().filter(|(_, result)| result.is_err()).count();
    info!(total, failed, "Install run finished");
    if failed > 0 {
        bail!("{failed} of {total} installs failed");
    }
    Ok(())
}

pub fn check(engine: &Engine, jobs: usize) -> Result<()> {
    let plans = engine.check_all(jobs)?;
    if plans.is_empty() {
        println!("no plugins installed");
        return Ok(());
    }

    let width = name_width(plans.iter().map(|plan| plan.name.as_str()), "NAME");
    println!("{:<width$}  {:<24}  {:>8}  {}", "NAME", "STATUS", "SIZE", "RELEASED");
    for plan in &plans {
        println!(
            "{:<width$}  {:<24}  {:>8}  {}",
            plan.name,
            plan.status.to_string(),
            plan.size,
            plan.released,
        );
    }

    let available = plans.iter().filter(|plan| plan.update_available()).count();
    match available {
        0 => println!("\neverything is up to date"),
        n => println!("\n{n} update(s) available; run `steep upgrade --all`"),
    }
    Ok(())
}

pub fn upgrade(engine: &Engine, name: Option<&str>, all: bool, jobs: usize) -> Result<()> {
    if let Some(name) = name {
        let plan = engine.plan_for(name)?;
        if !plan.update_available() {
            println!("{name}: {}", plan.status);
            return Ok(());
        }
        let result = engine.upgrade(&plan, live_progress(name));
        println!();
        result?;
        println!("{name}: {}", plan.status);
        return Ok(());
    }
    if !all {
        bail!("pass a plugin name or --all");
    }

    let plans: Vec<UpgradePlan> = engine
        .check_all(jobs)?
        .into_iter()
        .filter(|plan| plan.update_available() && !plan.skip_auto_update)
        .collect();
    if plans.is_empty() {
        println!("everything is up to date");
        return Ok(());
    }

    let total = plans.len();
    let results = engine.upgrade_all(plans, jobs, |name, pct| match pct {
        100 => println!("  {name}: upgraded"),
        0 => println!("  {name}: failed"),
        _ => {}
    });

    let failed = results.iter().filter(|(_, result)| result.is_err()).count();
    info!(total, failed, "Upgrade run finished");
    for (name, result) in &results {
        if let Err(err) = result {
            eprintln!("error: {name}: {err}");
        }
    }
    if failed > 0 {
        bail!("{failed} of {total} upgrades failed");
    }
    Ok(())
}

pub fn remove(engine: &Engine, name: &str) -> Result<()> {
    let result = engine.remove(name, live_progress(name));
    println!();
    result?;
    println!("removed {name}");
    Ok(())
}

pub fn set_enabled(engine: &Engine, name: &str, enabled: bool) -> Result<()> {
    if !engine.set_enabled(name, enabled)? {
        bail!("'{name}' is not installed");
    }
    println!("{name} {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub fn list(engine: &Engine) -> Result<()> {
    let rows = engine.list_installed()?;
    if rows.is_empty() {
        println!("no plugins installed");
        return Ok(());
    }

    let width = name_width(rows.iter().map(|row| row.name.as_str()), "NAME");
    println!(
        "{:<width$}  {:<12}  {:>8}  {:<12}  {}",
        "NAME", "VERSION", "SIZE", "INSTALLED", "ENABLED"
    );
    for row in &rows {
        println!(
            "{:<width$}  {:<12}  {:>8}  {:<12}  {}",
            row.name,
            row.version,
            row.size,
            row.installed,
            if row.enabled { "yes" } else { "no" },
        );
    }
    Ok(())
}

pub fn source(engine: &Engine) -> Result<()> {
    let count = engine.source_enabled()?;
    println!("ran {count} plugin script(s)");
    Ok(())
}

pub fn migrate(engine: &Engine, apply: bool, overwrite: bool) -> Result<()> {
    let conf_paths = migrate::default_conf_paths();
    if conf_paths.is_empty() {
        println!("no tmux.conf found in the usual places");
        return Ok(());
    }

    let definitions_dir = engine.config().definitions_dir();
    let plan = migrate::discover(&conf_paths, &definitions_dir);
    print_plan(&plan);

    if !apply {
        if !plan.to_create.is_empty() {
            println!("\nrun with --apply to write the definition files");
        }
        return Ok(());
    }

    let outcome = migrate::apply(&plan, &definitions_dir, overwrite)?;
    info!(
        created = outcome.created.len(),
        kept = outcome.skipped.len(),
        "Migration applied"
    );
    println!(
        "\nwrote {} definition file(s), left {} in place",
        outcome.created.len(),
        outcome.skipped.len()
    );
    Ok(())
}

fn print_plan(plan: &MigrationPlan) {
    for path in &plan.scanned {
        println!("scanned {}", path.display());
    }
    if plan.tpm_detected {
        println!("note: tpm detected; remember to drop its run-shell line from tmux.conf");
    }
    print_warnings(&plan.warnings);

    for candidate in &plan.to_create {
        println!("  + {} ({})", candidate.name, candidate.repo);
    }
    for candidate in &plan.to_skip {
        println!("  = {} (definition already exists)", candidate.name);
    }
    if plan.to_create.is_empty() && plan.to_skip.is_empty() {
        println!("no @plugin lines found");
    }
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>, header: &str) -> usize {
    names
        .map(str::len)
        .max()
        .unwrap_or(0)
        .max(header.len())
}
