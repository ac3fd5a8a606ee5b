//! Git operations abstraction layer
//!
//! This module provides a trait-based abstraction over the version-control
//! backend a release run talks to, allowing for a real implementation backed
//! by `git2` and an in-memory implementation for testing.
//!
//! # Overview
//!
//! The primary abstraction is the [Repository] trait. It is split into read
//! queries, used once per run to capture a
//! [`RepositorySnapshot`](crate::state::RepositorySnapshot), and mutations,
//! used only by the [`ReleaseExecutor`](crate::executor::ReleaseExecutor).
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: An in-memory implementation for testing
//!
//! # Usage
//!
//! ```rust
//! # use git_release::git::Repository;
//! # fn example<R: Repository>(repo: &R) -> git_release::Result<()> {
//! repo.fetch_prune("origin")?;
//! let remote = repo.remote_refs("origin")?;
//! if remote.tags.contains_key("v0.1.0") {
//!     println!("v0.1.0 is already published");
//! }
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where a ref lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefScope {
    Local,
    Remote,
}

/// Refs a remote advertises, keyed by short name, valued by object id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRefs {
    pub branches: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

impl RemoteRefs {
    /// Look up a fully qualified ref (`refs/heads/..` or `refs/tags/..`)
    pub fn get(&self, refname: &str) -> Option<&String> {
        if let Some(branch) = refname.strip_prefix("refs/heads/") {
            self.branches.get(branch)
        } else if let Some(tag) = refname.strip_prefix("refs/tags/") {
            self.tags.get(tag)
        } else {
            None
        }
    }
}

/// Version-control backend consumed by a release run
///
/// ## Error Handling
///
/// All methods return [crate::error::Result<T>]. Implementations map network
/// failures to [`BackendUnavailable`](crate::error::ReleaseError::BackendUnavailable)
/// and refused pushes to [`RemoteRejected`](crate::error::ReleaseError::RemoteRejected).
///
/// ## Implementations
///
/// - [Git2Repository](repository::Git2Repository): Real Git implementation using the `git2` crate
/// - [MockRepository](mock::MockRepository): Test implementation with failure injection
pub trait Repository {
    /// Root of the working tree
    fn workdir(&self) -> Result<PathBuf>;

    /// Fetch all branches of `remote` into its remote-tracking refs, pruning
    /// tracking refs whose branch disappeared
    fn fetch_prune(&self, remote: &str) -> Result<()>;

    /// List the refs `remote` currently advertises (`git ls-remote`)
    fn remote_refs(&self, remote: &str) -> Result<RemoteRefs>;

    /// Current branch name, or `None` when HEAD is detached
    fn current_branch(&self) -> Result<Option<String>>;

    /// True iff nothing is staged, modified or untracked
    fn is_clean(&self) -> Result<bool>;

    /// Names of all local branches
    fn local_branches(&self) -> Result<Vec<String>>;

    /// Names of all local tags
    fn local_tags(&self) -> Result<Vec<String>>;

    /// Commits reachable only from `local_ref` and only from `remote_ref`
    ///
    /// # Returns
    /// * `Ok((ahead, behind))`
    fn ahead_behind(&self, local_ref: &str, remote_ref: &str) -> Result<(usize, usize)>;

    /// Full id of the commit HEAD points at
    fn head_commit(&self) -> Result<String>;

    /// Contents of `path` as committed on local `branch`
    ///
    /// # Returns
    /// * `Ok(Some(contents))` - The file exists in the branch tip's tree
    /// * `Ok(None)` - No such file on that branch
    fn read_file(&self, branch: &str, path: &Path) -> Result<Option<String>>;

    /// Switch the working tree to an existing local branch
    fn checkout_branch(&self, name: &str) -> Result<()>;

    /// Create `name` at the tip of local branch `from` and check it out
    fn create_branch(&self, name: &str, from: &str) -> Result<()>;

    /// Advance the checked-out `branch` to `upstream` without a merge commit
    ///
    /// Fails with [`DivergedHistory`](crate::error::ReleaseError::DivergedHistory)
    /// when `branch` has commits `upstream` does not contain.
    fn fast_forward(&self, branch: &str, upstream: &str) -> Result<()>;

    /// Merge `upstream` into the checked-out `branch`, resolving content
    /// conflicts in favor of the local side; returns the merge commit id
    fn merge_prefer_local(&self, branch: &str, upstream: &str) -> Result<String>;

    /// Stage every modification, deletion and untracked file
    fn stage_all(&self) -> Result<()>;

    /// Stage the given paths (relative to the working tree root)
    fn stage_paths(&self, paths: &[&Path]) -> Result<()>;

    /// Commit the index on HEAD
    ///
    /// # Returns
    /// * `Ok(Some(id))` - A commit was created
    /// * `Ok(None)` - The index matches HEAD, nothing to commit
    fn commit(&self, message: &str) -> Result<Option<String>>;

    /// Create an annotated tag on HEAD
    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<()>;

    /// Delete a local tag
    fn delete_local_tag(&self, name: &str) -> Result<()>;

    /// Delete a local branch
    fn delete_local_branch(&self, name: &str) -> Result<()>;

    /// Push a local branch (never forced); optionally record it as upstream
    fn push_branch(&self, remote: &str, name: &str, set_upstream: bool) -> Result<()>;

    /// Push a local tag (never forced)
    fn push_tag(&self, remote: &str, name: &str) -> Result<()>;

    /// Delete a fully qualified ref on the remote
    ///
    /// Callers that need compare-and-swap semantics re-list the remote first;
    /// the delete itself is unconditional.
    fn delete_remote_ref(&self, remote: &str, refname: &str) -> Result<()>;
}
