//! Git subprocess implementation of the VCS capability.

use std::collections::HashSet;
use std::path::Path;
use std::process::{Command, Output};

use once_cell::sync::Lazy;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::resolver::ResolvedRef;
use crate::vcs::Vcs;

static GIT_AVAILABLE: Lazy<bool> = Lazy::new(|| which::which("git").is_ok());

/// Resolve an `owner/repo` shorthand to a clone URL. Full URLs and
/// scp-style addresses pass through untouched.
pub fn clone_url(repo: &str) -> String {
    let repo = repo.trim();
    if repo.contains("://") || repo.starts_with("git@") {
        repo.to_string()
    } else {
        format!("https://github.com/{repo}")
    }
}

/// Invokes the `git` binary; the only `Vcs` implementation shipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Fail with a clear message when git is not on PATH, instead of a
    /// spawn error mid-operation.
    pub fn ensure_available() -> Result<()> {
        if *GIT_AVAILABLE {
            Ok(())
        } else {
            Err(Error::vcs("git binary not found on PATH"))
        }
    }
}

fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<Output> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    debug!(args = %args.join(" "), "Running git");
    let output = command
        .output()
        .map_err(|err| Error::vcs(format!("failed to execute git {}: {err}", args.join(" "))))?;

    if output.status.success() {
        Ok(output)
    } else {
        let detail = command_error_detail(&output.stdout, &output.stderr);
        Err(Error::vcs(format!("git {} failed: {detail}", args.join(" "))))
    }
}

fn command_error_detail(stdout: &[u8], stderr: &[u8]) -> String {
    for stream in [stderr, stdout] {
        let text = String::from_utf8_lossy(stream).trim().to_string();
        if !text.is_empty() {
            return text;
        }
    }
    "no output".to_string()
}

impl Vcs for GitCli {
    fn clone_repo(&self, remote: &str, dest: &Path) -> Result<()> {
        Self::ensure_available()?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let dest = dest.to_string_lossy();
        run_git(&["clone", remote, dest.as_ref()], None)?;
        Ok(())
    }

    fn fetch_ref(&self, workdir: &Path, target: &ResolvedRef) -> Result<()> {
        Self::ensure_available()?;
        match target {
            ResolvedRef::Tag(tag) => {
                // Explicit refspec so a tag moved upstream still lands.
                let refspec = format!("refs/tags/{tag}:refs/tags/{tag}");
                run_git(&["fetch", "--force", "origin", &refspec], Some(workdir))?;
            }
            ResolvedRef::Commit(commit) => {
                run_git(&["fetch", "origin", commit], Some(workdir))?;
            }
        }
        Ok(())
    }

    fn checkout(&self, workdir: &Path, target: &ResolvedRef) -> Result<()> {
        let refname = match target {
            ResolvedRef::Tag(tag) => format!("tags/{tag}"),
            ResolvedRef::Commit(commit) => commit.clone(),
        };
        run_git(&["checkout", "--detach", &refname], Some(workdir))?;
        Ok(())
    }

    fn list_remote_tags(&self, remote: &str) -> Result<Vec<String>> {
        Self::ensure_available()?;
        let output = run_git(&["ls-remote", "--tags", remote], None)?;
        Ok(parse_ls_remote_tags(&String::from_utf8_lossy(&output.stdout)))
    }

    fn head_commit(&self, workdir: &Path) -> Result<String> {
        let output = run_git(&["rev-parse", "HEAD"], Some(workdir))?;
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if sha.is_empty() {
            return Err(Error::vcs("git rev-parse HEAD produced no output"));
        }
        Ok(sha)
    }

    fn remote_head(&self, remote: &str) -> Result<Option<String>> {
        Self::ensure_available()?;
        let output = run_git(&["ls-remote", remote, "HEAD"], None)?;
        Ok(parse_ls_remote_head(&String::from_utf8_lossy(&output.stdout)))
    }

    fn directory_size(&self, path: &Path) -> Option<String> {
        if !path.is_dir() {
            return None;
        }
        let total: u64 = WalkDir::new(path)
            .into_iter()
            .flatten()
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|metadata| metadata.len())
            .sum();
        Some(format_size(total))
    }

    fn commit_age(&self, workdir: &Path, reference: &str) -> Option<String> {
        let output = run_git(&["log", "-1", "--format=%cr", reference], Some(workdir)).ok()?;
        let age = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!age.is_empty()).then_some(age)
    }
}

/// Parse `ls-remote --tags` output into bare tag names. Annotated tags
/// appear twice (once with a `^{}` peel suffix); both collapse to one
/// entry in first-seen order.
fn parse_ls_remote_tags(output: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for line in output.lines() {
        let Some((_, refname)) = line.split_once('\t') else {
            continue;
        };
        let Some(tag) = refname.trim().strip_prefix("refs/tags/") else {
            continue;
        };
        let tag = tag.strip_suffix("^{}").unwrap_or(tag);
        if !tag.is_empty() && seen.insert(tag.to_string()) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn parse_ls_remote_head(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| {
            let (sha, refname) = line.split_once('\t')?;
            (refname.trim() == "HEAD").then(|| sha.trim().to_string())
        })
        .filter(|sha| !sha.is_empty())
}

/// du-style human size: bytes up to one decimal place per unit step.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else if value >= 10.0 {
        format!("{value:.0}{}", UNITS[unit])
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}
