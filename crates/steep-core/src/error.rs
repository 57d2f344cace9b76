//! Failure taxonomy for store and lifecycle operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by registry access and plugin lifecycle operations.
///
/// A corrupt registry file is deliberately *not* represented here: reads
/// recover to an empty registry and log a warning instead of failing.
#[derive(Debug, Error)]
pub enum Error {
    /// The registry lock marker could not be acquired before the timeout.
    #[error("timed out waiting for registry lock after {waited:?}")]
    LockTimeout { waited: Duration },

    /// The atomic registry rewrite failed; the canonical file is untouched.
    #[error("failed to write registry: {0}")]
    RegistryWrite(#[source] std::io::Error),

    /// A clone, fetch, checkout, or listing invocation failed.
    #[error("git operation failed: {detail}")]
    Vcs { detail: String },

    /// A pinned tag does not exist in the repository's tag list.
    #[error("tag {tag:?} not found in {repo}")]
    UnknownTag { tag: String, repo: String },

    /// A deletion target resolved outside the managed plugins directory.
    #[error("refusing to delete outside the plugins directory: {path}")]
    UnsafePath { path: PathBuf },

    /// The named plugin has no registry record.
    #[error("plugin {name:?} is not installed")]
    NotInstalled { name: String },

    /// Upgrade was requested but the plan reports nothing newer.
    #[error("plugin {name:?} has no update available")]
    NoUpdate { name: String },

    /// The cancellation flag was set between phases.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn vcs(detail: impl Into<String>) -> Self {
        Error::Vcs {
            detail: detail.into(),
        }
    }
}
