//! Release planning: a pure decision over a [RepositorySnapshot].
//!
//! [`ReleasePlanner::plan`] walks a fixed sequence of checks (detached HEAD,
//! name collisions, dirty tree, downgrade, branch resolution, metadata,
//! commit, push, tag resolution) and either returns an ordered [Plan] or the
//! first blocking [ReleaseError]. Nothing here touches the repository; the
//! only outside input is the injected [Confirmer].

use crate::boundary::BoundaryWarning;
use crate::confirm::Confirmer;
use crate::domain::{BranchContext, SemanticVersion, Tag};
use crate::error::{ReleaseError, Result};
use crate::git::RefScope;
use crate::state::{CompanionState, RepositorySnapshot};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// How aggressively a run may resolve conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleasePolicy {
    /// Waive downgrade and tag-collision confirmations
    pub force: bool,
    /// Prompts may be shown; when false every prompt fails closed
    pub interactive: bool,
}

/// How a release branch catches up with its remote counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    FastForward,
    /// Merge the remote in, keeping local content on conflict
    MergeOrRebasePreferLocal,
}

/// One step of a release
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Remove a branch that shares its name with the release tag.
    /// `remote` carries the object id observed for the remote branch.
    DeleteConflictingBranch {
        name: String,
        local: bool,
        remote: Option<String>,
    },
    CommitAll { message: String },
    Checkout { branch: String },
    CreateBranch { name: String, from: String },
    Sync {
        branch: String,
        strategy: SyncStrategy,
    },
    WriteVersionMarker {
        path: PathBuf,
        version: SemanticVersion,
    },
    UpdateCompanionConfig {
        path: PathBuf,
        field: String,
        value: String,
    },
    Commit { message: String, paths: Vec<PathBuf> },
    PushBranch { branch: String, set_upstream: bool },
    DeleteLocalTag { tag: String },
    /// `expected` is the object id the remote advertised when planning
    DeleteRemoteTag { tag: String, expected: String },
    CreateTag { tag: String, message: String },
    PushTag { tag: String },
}

impl Action {
    /// Stable short identifier of the action kind
    pub fn kind(&self) -> &'static str {
        match self {
            Action::DeleteConflictingBranch { .. } => "delete-conflicting-branch",
            Action::CommitAll { .. } => "commit-all",
            Action::Checkout { .. } => "checkout",
            Action::CreateBranch { .. } => "create-branch",
            Action::Sync { .. } => "sync",
            Action::WriteVersionMarker { .. } => "write-version-marker",
            Action::UpdateCompanionConfig { .. } => "update-companion-config",
            Action::Commit { .. } => "commit",
            Action::PushBranch { .. } => "push-branch",
            Action::DeleteLocalTag { .. } => "delete-local-tag",
            Action::DeleteRemoteTag { .. } => "delete-remote-tag",
            Action::CreateTag { .. } => "create-tag",
            Action::PushTag { .. } => "push-tag",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DeleteConflictingBranch { name, local, remote } => {
                let sides = match (local, remote.is_some()) {
                    (true, true) => "local and remote",
                    (true, false) => "local",
                    (false, true) => "remote",
                    (false, false) => "no",
                };
                write!(
                    f,
                    "delete {} branch '{}' (collides with tag)",
                    sides, name
                )
            }
            Action::CommitAll { message } => {
                write!(f, "commit all pending changes: \"{}\"", message)
            }
            Action::Checkout { branch } => write!(f, "check out branch '{}'", branch),
            Action::CreateBranch { name, from } => {
                write!(f, "create branch '{}' from '{}'", name, from)
            }
            Action::Sync { branch, strategy } => match strategy {
                SyncStrategy::FastForward => {
                    write!(f, "fast-forward '{}' to its remote counterpart", branch)
                }
                SyncStrategy::MergeOrRebasePreferLocal => write!(
                    f,
                    "merge remote changes into '{}', preferring local content",
                    branch
                ),
            },
            Action::WriteVersionMarker { path, version } => {
                write!(f, "write {} to '{}'", version, path.display())
            }
            Action::UpdateCompanionConfig { path, field, value } => {
                write!(f, "set {} = {} in '{}'", field, value, path.display())
            }
            Action::Commit { message, .. } => {
                write!(f, "commit release metadata: \"{}\"", message)
            }
            Action::PushBranch {
                branch,
                set_upstream,
            } => {
                if *set_upstream {
                    write!(f, "push branch '{}' and set upstream", branch)
                } else {
                    write!(f, "push branch '{}'", branch)
                }
            }
            Action::DeleteLocalTag { tag } => write!(f, "delete local tag '{}'", tag),
            Action::DeleteRemoteTag { tag, .. } => write!(f, "delete remote tag '{}'", tag),
            Action::CreateTag { tag, .. } => write!(f, "create annotated tag '{}'", tag),
            Action::PushTag { tag } => write!(f, "push tag '{}'", tag),
        }
    }
}

/// Ordered actions for one release, plus what planning noticed on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub version: SemanticVersion,
    pub branch: String,
    pub tag: String,
    pub actions: Vec<Action>,
    pub warnings: Vec<BoundaryWarning>,
}

impl Plan {
    /// Kinds of the planned actions, in order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.actions.iter().map(Action::kind).collect()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.actions.iter().any(|a| a.kind() == kind)
    }
}

/// Repository conventions the planner applies
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub trunk_branches: Vec<String>,
    pub version_file: PathBuf,
    pub companion_file: PathBuf,
    pub branch_field: String,
    /// Templates; `{version}` is replaced with the release version
    pub release_commit_message: String,
    pub tag_message: String,
    pub pending_changes_message: String,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        PlannerSettings {
            trunk_branches: vec!["main".to_string(), "master".to_string()],
            version_file: PathBuf::from("VERSION"),
            companion_file: PathBuf::from("template.toml"),
            branch_field: "branch".to_string(),
            release_commit_message: "Release {version}".to_string(),
            tag_message: "Release {version}".to_string(),
            pending_changes_message: "Prepare release {version}".to_string(),
        }
    }
}

/// What the caller asks for
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub version: SemanticVersion,
    /// Message for committing pending changes; a template default otherwise
    pub commit_message: Option<String>,
}

impl ReleaseRequest {
    pub fn new(version: SemanticVersion) -> Self {
        ReleaseRequest {
            version,
            commit_message: None,
        }
    }
}

/// Turns a request and a snapshot into a [Plan]
pub struct ReleasePlanner {
    settings: PlannerSettings,
}

struct Draft<'a> {
    target: &'a SemanticVersion,
    branch: String,
    tag: String,
    actions: Vec<Action>,
    warnings: Vec<BoundaryWarning>,
}

impl ReleasePlanner {
    pub fn new(settings: PlannerSettings) -> Self {
        ReleasePlanner { settings }
    }

    /// Plan a release, or explain why it must not start
    ///
    /// # Returns
    /// * `Ok(Plan)` - Actions to execute, in order
    /// * `Err` - A blocking reason; no action has been taken
    pub fn plan(
        &self,
        request: &ReleaseRequest,
        snap: &RepositorySnapshot,
        policy: ReleasePolicy,
        confirmer: &dyn Confirmer,
    ) -> Result<Plan> {
        let target = &request.version;
        let mut draft = Draft {
            target,
            branch: BranchContext::for_version(target),
            tag: Tag::for_version(target).name,
            actions: Vec::new(),
            warnings: Vec::new(),
        };

        let current = snap
            .current_branch()
            .ok_or(ReleaseError::DetachedHead)?
            .to_string();

        self.resolve_name_collisions(&mut draft, &current, snap, policy, confirmer)?;
        self.resolve_dirty_tree(&mut draft, request, snap, policy, confirmer)?;
        let write_marker = self.check_downgrade(&mut draft, snap, policy)?;
        self.resolve_branch(&mut draft, &current, snap, policy, confirmer)?;
        self.schedule_metadata(&mut draft, write_marker, snap);
        self.schedule_push_branch(&mut draft, snap);
        self.resolve_tag(&mut draft, snap, policy, confirmer)?;

        info!(
            version = %target,
            actions = draft.actions.len(),
            warnings = draft.warnings.len(),
            "release planned"
        );

        Ok(Plan {
            version: target.clone(),
            branch: draft.branch,
            tag: draft.tag,
            actions: draft.actions,
            warnings: draft.warnings,
        })
    }

    fn render(&self, template: &str, version: &SemanticVersion) -> String {
        template.replace("{version}", &version.to_string())
    }

    fn resolve_name_collisions(
        &self,
        draft: &mut Draft<'_>,
        current: &str,
        snap: &RepositorySnapshot,
        policy: ReleasePolicy,
        confirmer: &dyn Confirmer,
    ) -> Result<()> {
        // A tag named like the release branch is never ours to delete
        if snap.tag_exists(&draft.branch, RefScope::Local)
            || snap.tag_exists(&draft.branch, RefScope::Remote)
        {
            return Err(ReleaseError::NameCollision {
                name: draft.branch.clone(),
            });
        }

        let local = snap.branch_exists(&draft.tag, RefScope::Local);
        let remote = snap.remote_branch_oid(&draft.tag).map(str::to_string);
        if !local && remote.is_none() {
            return Ok(());
        }

        if current == draft.tag {
            return Err(ReleaseError::NameCollision {
                name: draft.tag.clone(),
            });
        }

        let prompt = format!(
            "A branch named '{}' collides with the release tag. Delete it?",
            draft.tag
        );
        if !(policy.force || ask(policy, confirmer, &prompt)) {
            return Err(ReleaseError::NameCollision {
                name: draft.tag.clone(),
            });
        }

        debug!(
            name = %draft.tag,
            local,
            remote = remote.is_some(),
            "deleting branch that collides with tag"
        );
        draft.actions.push(Action::DeleteConflictingBranch {
            name: draft.tag.clone(),
            local,
            remote,
        });
        Ok(())
    }

    fn resolve_dirty_tree(
        &self,
        draft: &mut Draft<'_>,
        request: &ReleaseRequest,
        snap: &RepositorySnapshot,
        policy: ReleasePolicy,
        confirmer: &dyn Confirmer,
    ) -> Result<()> {
        if snap.is_working_tree_clean() {
            return Ok(());
        }

        if !ask(
            policy,
            confirmer,
            "The working tree has uncommitted changes. Commit them before releasing?",
        ) {
            return Err(ReleaseError::DirtyWorkingTree);
        }

        let message = request
            .commit_message
            .clone()
            .unwrap_or_else(|| self.render(&self.settings.pending_changes_message, draft.target));
        draft.actions.push(Action::CommitAll { message });
        Ok(())
    }

    /// Returns whether the version marker must be rewritten
    fn check_downgrade(
        &self,
        draft: &mut Draft<'_>,
        snap: &RepositorySnapshot,
        policy: ReleasePolicy,
    ) -> Result<bool> {
        let current = match &snap.recorded_version {
            Some(version) => version.clone(),
            None => {
                draft.warnings.push(BoundaryWarning::MissingVersionMarker {
                    path: self.settings.version_file.clone(),
                });
                SemanticVersion::default()
            }
        };

        match draft.target.compare(&current) {
            Ordering::Equal => {
                if snap.recorded_version.is_some() {
                    draft.warnings.push(BoundaryWarning::VersionUnchanged {
                        version: current,
                    });
                }
                Ok(false)
            }
            Ordering::Greater => Ok(true),
            Ordering::Less if policy.force => {
                draft.warnings.push(BoundaryWarning::ForcedDowngrade {
                    current,
                    target: draft.target.clone(),
                });
                Ok(true)
            }
            Ordering::Less => Err(ReleaseError::VersionDowngradeRejected {
                target: draft.target.clone(),
                suggestions: current.suggestions(),
                current,
            }),
        }
    }

    fn resolve_branch(
        &self,
        draft: &mut Draft<'_>,
        current: &str,
        snap: &RepositorySnapshot,
        policy: ReleasePolicy,
        confirmer: &dyn Confirmer,
    ) -> Result<()> {
        let branch = draft.branch.clone();

        if current == branch {
            debug!(%branch, "already on the release branch");
        } else if snap.branch_exists(&branch, RefScope::Local) {
            draft.actions.push(Action::Checkout {
                branch: branch.clone(),
            });
        } else {
            let fork_point = BranchContext::classify(current, &self.settings.trunk_branches);
            if !fork_point.is_recognized_fork_point() {
                let prompt = format!(
                    "'{}' is neither a trunk nor a release branch. Create '{}' from it?",
                    current, branch
                );
                if !ask(policy, confirmer, &prompt) {
                    return Err(ReleaseError::AmbiguousForkPoint {
                        branch: current.to_string(),
                        target: branch,
                    });
                }
            }
            draft.actions.push(Action::CreateBranch {
                name: branch.clone(),
                from: current.to_string(),
            });
        }

        self.resolve_sync(draft, snap, policy, confirmer)
    }

    fn resolve_sync(
        &self,
        draft: &mut Draft<'_>,
        snap: &RepositorySnapshot,
        policy: ReleasePolicy,
        confirmer: &dyn Confirmer,
    ) -> Result<()> {
        let Some(mut divergence) = snap.divergence() else {
            return Ok(());
        };
        let branch = draft.branch.clone();

        // Pending work committed before the sync lands on the synced branch
        // unless an existing branch is checked out afterwards
        let commits_pending = draft
            .actions
            .iter()
            .any(|a| matches!(a, Action::CommitAll { .. }));
        let switches_away = draft
            .actions
            .iter()
            .any(|a| matches!(a, Action::Checkout { .. }));
        if commits_pending && !switches_away {
            divergence.ahead += 1;
        }

        let strategy = if divergence.is_level() {
            return Ok(());
        } else if !divergence.is_diverged() {
            SyncStrategy::FastForward
        } else {
            let diverged = || ReleaseError::DivergedHistory {
                branch: branch.clone(),
                ahead: divergence.ahead,
                behind: divergence.behind,
            };
            if !policy.interactive {
                return Err(diverged());
            }
            let prompt = format!(
                "'{}' is {} ahead and {} behind its remote. \
                 Merge remote changes, keeping local content on conflict?",
                branch, divergence.ahead, divergence.behind
            );
            if !(policy.force || confirmer.confirm(&prompt)) {
                return Err(diverged());
            }
            SyncStrategy::MergeOrRebasePreferLocal
        };

        draft.actions.push(Action::Sync { branch, strategy });
        Ok(())
    }

    fn schedule_metadata(
        &self,
        draft: &mut Draft<'_>,
        write_marker: bool,
        snap: &RepositorySnapshot,
    ) {
        let mut paths = Vec::new();

        if write_marker {
            draft.actions.push(Action::WriteVersionMarker {
                path: self.settings.version_file.clone(),
                version: draft.target.clone(),
            });
            paths.push(self.settings.version_file.clone());
        }

        let path = self.settings.companion_file.clone();
        match &snap.companion {
            CompanionState::Missing => draft
                .warnings
                .push(BoundaryWarning::CompanionConfigMissing { path }),
            CompanionState::NoField => draft.warnings.push(BoundaryWarning::CompanionFieldMissing {
                path,
                field: self.settings.branch_field.clone(),
            }),
            CompanionState::Branch(recorded) if *recorded == draft.branch => {}
            CompanionState::Branch(_) => {
                draft.actions.push(Action::UpdateCompanionConfig {
                    path: path.clone(),
                    field: self.settings.branch_field.clone(),
                    value: draft.branch.clone(),
                });
                paths.push(path);
            }
        }

        if !paths.is_empty() {
            draft.actions.push(Action::Commit {
                message: self.render(&self.settings.release_commit_message, draft.target),
                paths,
            });
        }
    }

    fn schedule_push_branch(&self, draft: &mut Draft<'_>, snap: &RepositorySnapshot) {
        draft.actions.push(Action::PushBranch {
            branch: draft.branch.clone(),
            set_upstream: !snap.branch_exists(&draft.branch, RefScope::Remote),
        });
    }

    fn resolve_tag(
        &self,
        draft: &mut Draft<'_>,
        snap: &RepositorySnapshot,
        policy: ReleasePolicy,
        confirmer: &dyn Confirmer,
    ) -> Result<()> {
        let tag = draft.tag.clone();

        if snap.tag_exists(&tag, RefScope::Local) {
            draft
                .warnings
                .push(BoundaryWarning::LocalTagReplaced { tag: tag.clone() });
            draft
                .actions
                .push(Action::DeleteLocalTag { tag: tag.clone() });
        }

        if let Some(expected) = snap.remote_tag_oid(&tag) {
            let prompt = format!("Tag '{}' is already published. Replace it on the remote?", tag);
            if !(policy.force || ask(policy, confirmer, &prompt)) {
                return Err(ReleaseError::TagAlreadyExists { tag });
            }
            draft.actions.push(Action::DeleteRemoteTag {
                tag: tag.clone(),
                expected: expected.to_string(),
            });
        }

        draft.actions.push(Action::CreateTag {
            tag: tag.clone(),
            message: self.render(&self.settings.tag_message, draft.target),
        });
        draft.actions.push(Action::PushTag { tag });
        Ok(())
    }
}

/// Prompts only exist in interactive runs; otherwise the answer is no
fn ask(policy: ReleasePolicy, confirmer: &dyn Confirmer, prompt: &str) -> bool {
    policy.interactive && confirmer.confirm(prompt)
}
