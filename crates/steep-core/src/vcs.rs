//! Abstract version-control capability consumed by the lifecycle engine.
//!
//! The engine never shells out directly; everything it needs from a
//! repository goes through this trait so tests can substitute a mock
//! and the git mechanics stay in one place.

use std::path::Path;

use crate::error::Result;
use crate::resolver::ResolvedRef;

pub trait Vcs: Send + Sync {
    /// Clone `remote` into `dest`, creating parent directories as needed.
    fn clone_repo(&self, remote: &str, dest: &Path) -> Result<()>;

    /// Bring `target` into the local object store (tag refspec or bare
    /// commit fetch).
    fn fetch_ref(&self, workdir: &Path, target: &ResolvedRef) -> Result<()>;

    /// Detached checkout of `target`.
    fn checkout(&self, workdir: &Path, target: &ResolvedRef) -> Result<()>;

    /// Tag names advertised by `remote`; accepts URLs and local paths.
    fn list_remote_tags(&self, remote: &str) -> Result<Vec<String>>;

    /// Commit id of the local HEAD. This is the ground truth persisted
    /// to the registry after installs and upgrades.
    fn head_commit(&self, workdir: &Path) -> Result<String>;

    /// Commit id of the remote's default branch head, when advertised.
    fn remote_head(&self, remote: &str) -> Result<Option<String>>;

    /// Human-readable on-disk size; diagnostic only.
    fn directory_size(&self, path: &Path) -> Option<String>;

    /// Relative age of `reference` ("3 weeks ago"); diagnostic only.
    fn commit_age(&self, workdir: &Path, reference: &str) -> Option<String>;
}
