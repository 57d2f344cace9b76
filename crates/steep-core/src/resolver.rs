//! Pure version decision logic: which revision to check out, and
//! whether something newer exists.
//!
//! No I/O happens here. Callers gather tag lists and commit ids through
//! the VCS capability and hand them in; everything below is plain data
//! manipulation, which keeps the ordering and classification rules
//! directly testable.

use std::collections::HashSet;
use std::fmt;

use semver::Version;

use crate::error::{Error, Result};

/// A concrete revision to check out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRef {
    Tag(String),
    Commit(String),
}

impl ResolvedRef {
    pub fn label(&self) -> &str {
        match self {
            ResolvedRef::Tag(tag) => tag,
            ResolvedRef::Commit(commit) => commit,
        }
    }

    /// Tag name verbatim; commits abbreviated for display.
    pub fn short_label(&self) -> String {
        match self {
            ResolvedRef::Tag(tag) => tag.clone(),
            ResolvedRef::Commit(commit) => commit.chars().take(7).collect(),
        }
    }
}

impl fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a resolution: the ref to move to, and whether it differs
/// from what is currently recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: ResolvedRef,
    pub newer: bool,
}

/// Lenient tag parse: optional leading `v`/`V`, and 1- or 2-component
/// cores padded to full semver (`v2.4` reads as 2.4.0). Returns `None`
/// for tags that are not versions at all.
pub fn parse_loose(tag: &str) -> Option<Version> {
    let trimmed = tag.trim();
    let rest = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if rest.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(rest) {
        return Some(version);
    }

    let (core, suffix) = match rest.find(['-', '+']) {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    let padded = match core.chars().filter(|c| *c == '.').count() {
        0 => format!("{core}.0.0{suffix}"),
        1 => format!("{core}.0{suffix}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Stable (non-pre-release) version tags, deduplicated, newest first.
/// Unparseable tags are skipped entirely.
pub fn sort_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut parsed: Vec<(Version, &str)> = tags
        .iter()
        .filter(|tag| seen.insert(tag.as_str()))
        .filter_map(|tag| {
            let version = parse_loose(tag)?;
            version.pre.is_empty().then_some((version, tag.as_str()))
        })
        .collect();
    parsed.sort_by(|a, b| b.0.cmp(&a.0));
    parsed.into_iter().map(|(_, tag)| tag.to_string()).collect()
}

/// Highest stable version tag, if any tag parses.
pub fn latest_stable(tags: &[String]) -> Option<String> {
    sort_tags(tags).into_iter().next()
}

/// Pick the revision a fresh install should check out.
///
/// An explicit pin must exist verbatim in `tags`; resolution never
/// silently substitutes another revision for a missing pin. Without a
/// pin the highest stable tag wins, and a repository with no usable
/// tags falls back to the default branch head.
pub fn resolve_install(
    pin: Option<&str>,
    tags: &[String],
    fallback_head: Option<&str>,
    repo: &str,
) -> Result<Resolution> {
    if let Some(pin) = pin {
        if tags.iter().any(|tag| tag == pin) {
            return Ok(Resolution {
                target: ResolvedRef::Tag(pin.to_string()),
                newer: true,
            });
        }
        return Err(Error::UnknownTag {
            tag: pin.to_string(),
            repo: repo.to_string(),
        });
    }

    if let Some(latest) = latest_stable(tags) {
        return Ok(Resolution {
            target: ResolvedRef::Tag(latest),
            newer: true,
        });
    }

    match fallback_head {
        Some(head) => Ok(Resolution {
            target: ResolvedRef::Commit(head.to_string()),
            newer: true,
        }),
        None => Err(Error::vcs(format!(
            "{repo} has no version tags and no reachable default branch head"
        ))),
    }
}

/// Classify update availability for an installed plugin.
///
/// Tagged installs compare tags only: a different latest stable tag
/// means an update. Commit-tracking installs compare the remote default
/// branch head against the recorded commit. `None` means there is no
/// basis for comparison; callers treat that as up to date.
pub fn resolve_update(
    current_tag: Option<&str>,
    current_commit: Option<&str>,
    tags: &[String],
    remote_head: Option<&str>,
) -> Option<Resolution> {
    if let Some(current) = current_tag {
        let latest = latest_stable(tags)?;
        let newer = latest != current;
        return Some(Resolution {
            target: ResolvedRef::Tag(latest),
            newer,
        });
    }

    let head = remote_head?;
    Some(Resolution {
        newer: current_commit != Some(head),
        target: ResolvedRef::Commit(head.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn orders_tags_numerically_not_lexically() {
        let sorted = sort_tags(&tags(&["v1.9.0", "v1.10.0", "v1.2.0"]));
        assert_eq!(sorted, vec!["v1.10.0", "v1.9.0", "v1.2.0"]);
    }

    #[test]
    fn skips_prereleases_and_non_versions() {
        let sorted = sort_tags(&tags(&["v1.0.0", "v2.0.0-beta", "nightly", "foo"]));
        assert_eq!(sorted, vec!["v1.0.0"]);
    }

    #[test]
    fn accepts_short_version_tags() {
        assert_eq!(parse_loose("v1.1"), Some(Version::new(1, 1, 0)));
        assert_eq!(parse_loose("3"), Some(Version::new(3, 0, 0)));
        assert_eq!(parse_loose("v2.4-rc1").map(|v| v.pre.is_empty()), Some(false));
        assert_eq!(parse_loose("1.2.3.4"), None);

        let sorted = sort_tags(&tags(&["v1.0", "v1.1", "v1.0.1"]));
        assert_eq!(sorted, vec!["v1.1", "v1.0.1", "v1.0"]);
    }

    #[test]
    fn deduplicates_repeated_tags() {
        let sorted = sort_tags(&tags(&["v1.0.0", "v1.0.0", "v0.9.0"]));
        assert_eq!(sorted, vec!["v1.0.0", "v0.9.0"]);
    }

    #[test]
    fn install_verifies_explicit_pin() {
        let available = tags(&["v1.0.0", "v1.1.0", "v2.0.0-beta"]);

        let resolved = resolve_install(Some("v1.0.0"), &available, None, "o/p").unwrap();
        assert_eq!(resolved.target, ResolvedRef::Tag("v1.0.0".to_string()));

        // Pinning to a pre-release is allowed; the pin is matched verbatim.
        let resolved = resolve_install(Some("v2.0.0-beta"), &available, None, "o/p").unwrap();
        assert_eq!(resolved.target, ResolvedRef::Tag("v2.0.0-beta".to_string()));

        let err = resolve_install(Some("v9.9.9"), &available, None, "o/p").unwrap_err();
        assert!(matches!(err, Error::UnknownTag { tag, .. } if tag == "v9.9.9"));
    }

    #[test]
    fn install_without_pin_picks_latest_stable() {
        let available = tags(&["v1.0.0", "v1.10.0", "v1.9.0", "v2.0.0-rc1"]);
        let resolved = resolve_install(None, &available, Some("abc123"), "o/p").unwrap();
        assert_eq!(resolved.target, ResolvedRef::Tag("v1.10.0".to_string()));
    }

    #[test]
    fn install_without_tags_falls_back_to_head() {
        let resolved = resolve_install(None, &[], Some("abc123"), "o/p").unwrap();
        assert_eq!(resolved.target, ResolvedRef::Commit("abc123".to_string()));

        let err = resolve_install(None, &[], None, "o/p").unwrap_err();
        assert!(matches!(err, Error::Vcs { .. }));
    }

    #[test]
    fn tagged_install_updates_only_on_newer_tag() {
        let available = tags(&["v1.0", "v1.1"]);

        let resolution = resolve_update(Some("v1.0"), None, &available, None).unwrap();
        assert!(resolution.newer);
        assert_eq!(resolution.target, ResolvedRef::Tag("v1.1".to_string()));

        let resolution = resolve_update(Some("v1.1"), None, &available, None).unwrap();
        assert!(!resolution.newer);

        // No comparable tags at all: nothing to report.
        assert_eq!(resolve_update(Some("v1.0"), None, &[], None), None);
    }

    #[test]
    fn commit_install_updates_on_different_remote_head() {
        let resolution = resolve_update(None, Some("aaa"), &[], Some("bbb")).unwrap();
        assert!(resolution.newer);
        assert_eq!(resolution.target, ResolvedRef::Commit("bbb".to_string()));

        let resolution = resolve_update(None, Some("aaa"), &[], Some("aaa")).unwrap();
        assert!(!resolution.newer);

        // Never synced but the remote is reachable: treat as newer.
        let resolution = resolve_update(None, None, &[], Some("bbb")).unwrap();
        assert!(resolution.newer);

        // Unreachable remote: no basis for comparison.
        assert_eq!(resolve_update(None, Some("aaa"), &[], None), None);
    }

    #[test]
    fn short_labels_abbreviate_commits_only() {
        assert_eq!(
            ResolvedRef::Tag("v1.2.0".to_string()).short_label(),
            "v1.2.0"
        );
        assert_eq!(
            ResolvedRef::Commit("0123456789abcdef".to_string()).short_label(),
            "0123456"
        );
    }
}
