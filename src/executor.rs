//! Carries a [Plan] out against the repository, one action at a time.
//!
//! Execution is sequential and stops at the first failing action. Nothing
//! already applied is rolled back; the returned [ExecutionFailure] names
//! what completed so the operator can continue by hand.

use crate::domain::Tag;
use crate::error::{ReleaseError, Result};
use crate::git::Repository;
use crate::metadata::{self, ConfigMutator};
use crate::planner::{Action, Plan, SyncStrategy};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

/// Where a successful release left the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub branch: String,
    pub tag: String,
    /// Commit both the branch and the tag point at
    pub commit: String,
}

/// An action failed after earlier ones were applied
#[derive(Debug, Error)]
#[error("'{failed}' failed after {} completed action(s): {source}", .completed.len())]
pub struct ExecutionFailure {
    pub completed: Vec<Action>,
    pub failed: Action,
    pub source: ReleaseError,
}

pub struct ReleaseExecutor<'a, R: Repository + ?Sized, M: ConfigMutator + ?Sized> {
    repo: &'a R,
    mutator: &'a M,
    remote: String,
}

impl<'a, R: Repository + ?Sized, M: ConfigMutator + ?Sized> ReleaseExecutor<'a, R, M> {
    pub fn new(repo: &'a R, mutator: &'a M, remote: impl Into<String>) -> Self {
        ReleaseExecutor {
            repo,
            mutator,
            remote: remote.into(),
        }
    }

    /// Execute every action of `plan` in order
    pub fn run(&self, plan: &Plan) -> Result<ReleaseOutcome> {
        self.run_with_progress(plan, |_| {})
    }

    /// Like [run](Self::run), calling `on_action` before each action starts
    pub fn run_with_progress<F>(&self, plan: &Plan, mut on_action: F) -> Result<ReleaseOutcome>
    where
        F: FnMut(&Action),
    {
        let workdir = self.repo.workdir()?;
        let mut completed = Vec::with_capacity(plan.actions.len());

        for action in &plan.actions {
            on_action(action);

            let span = info_span!("action", kind = action.kind());
            let _enter = span.enter();

            if let Err(source) = self.apply(action, &workdir) {
                error!(error = %source, "action failed");
                return Err(ExecutionFailure {
                    completed,
                    failed: action.clone(),
                    source,
                }
                .into());
            }

            info!("{}", action);
            completed.push(action.clone());
        }

        let commit = self.repo.head_commit()?;
        info!(branch = %plan.branch, tag = %plan.tag, %commit, "release published");

        Ok(ReleaseOutcome {
            branch: plan.branch.clone(),
            tag: plan.tag.clone(),
            commit,
        })
    }

    fn apply(&self, action: &Action, workdir: &Path) -> Result<()> {
        match action {
            Action::DeleteConflictingBranch {
                name,
                local,
                remote,
            } => {
                if *local && self.repo.local_branches()?.iter().any(|b| b == name) {
                    self.repo.delete_local_branch(name)?;
                }
                if let Some(expected) = remote {
                    let refname = format!("refs/heads/{}", name);
                    if self.lease_holds(&refname, expected)? {
                        self.repo.delete_remote_ref(&self.remote, &refname)?;
                    }
                }
                Ok(())
            }
            Action::CommitAll { message } => {
                self.repo.stage_all()?;
                self.commit(message)
            }
            Action::Checkout { branch } => self.repo.checkout_branch(branch),
            Action::CreateBranch { name, from } => self.repo.create_branch(name, from),
            Action::Sync { branch, strategy } => {
                let upstream = format!("refs/remotes/{}/{}", self.remote, branch);
                // Earlier actions may have committed on the branch since planning
                let (ahead, behind) = self
                    .repo
                    .ahead_behind(&format!("refs/heads/{}", branch), &upstream)?;
                if behind == 0 {
                    debug!(%branch, ahead, "already contains its remote counterpart");
                    return Ok(());
                }

                match strategy {
                    SyncStrategy::FastForward if ahead > 0 => {
                        Err(ReleaseError::DivergedHistory {
                            branch: branch.clone(),
                            ahead,
                            behind,
                        })
                    }
                    SyncStrategy::FastForward => self.repo.fast_forward(branch, &upstream),
                    SyncStrategy::MergeOrRebasePreferLocal => {
                        let merge = self.repo.merge_prefer_local(branch, &upstream)?;
                        debug!(%merge, "merged remote changes");
                        Ok(())
                    }
                }
            }
            Action::WriteVersionMarker { path, version } => {
                metadata::write_version_marker(&workdir.join(path), version)?;
                Ok(())
            }
            Action::UpdateCompanionConfig { path, field, value } => {
                self.mutator.set_field(&workdir.join(path), field, value)?;
                Ok(())
            }
            Action::Commit { message, paths } => {
                let present: Vec<&Path> = paths
                    .iter()
                    .map(PathBuf::as_path)
                    .filter(|p| workdir.join(p).exists())
                    .collect();
                self.repo.stage_paths(&present)?;
                self.commit(message)
            }
            Action::PushBranch {
                branch,
                set_upstream,
            } => self.repo.push_branch(&self.remote, branch, *set_upstream),
            Action::DeleteLocalTag { tag } => {
                if self.repo.local_tags()?.iter().any(|t| t == tag) {
                    self.repo.delete_local_tag(tag)
                } else {
                    debug!(%tag, "local tag already gone");
                    Ok(())
                }
            }
            Action::DeleteRemoteTag { tag, expected } => {
                let refname = Tag::new(tag.as_str()).refname();
                if self.lease_holds(&refname, expected)? {
                    self.repo.delete_remote_ref(&self.remote, &refname)?;
                }
                Ok(())
            }
            Action::CreateTag { tag, message } => self.repo.create_annotated_tag(tag, message),
            Action::PushTag { tag } => self.repo.push_tag(&self.remote, tag),
        }
    }

    fn commit(&self, message: &str) -> Result<()> {
        match self.repo.commit(message)? {
            Some(id) => debug!(commit = %id, "committed"),
            None => debug!("tree unchanged, no commit created"),
        }
        Ok(())
    }

    /// Compare-and-swap guard for destructive remote updates
    ///
    /// # Returns
    /// * `Ok(true)` - The remote still advertises `expected`
    /// * `Ok(false)` - The ref is already gone; nothing to delete
    /// * `Err(RemoteRejected)` - The remote moved since planning
    fn lease_holds(&self, refname: &str, expected: &str) -> Result<bool> {
        let refs = self.repo.remote_refs(&self.remote)?;
        match refs.get(refname) {
            None => {
                warn!(refname, "remote ref disappeared before deletion");
                Ok(false)
            }
            Some(actual) if actual == expected => Ok(true),
            Some(actual) => Err(ReleaseError::rejected(
                refname,
                format!(
                    "remote moved since it was observed (expected {}, found {})",
                    expected, actual
                ),
            )),
        }
    }
}
