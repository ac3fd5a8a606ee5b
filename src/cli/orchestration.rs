//! Main workflow orchestration logic
//!
//! Splits a release into the two phases the binary drives: preparing a plan
//! (no side effects beyond fetching the remote) and executing it. Keeping
//! this out of main.rs lets the workflow run programmatically without clap.

use tracing::info;

use crate::config::Config;
use crate::confirm::Confirmer;
use crate::domain::effective_version;
use crate::error::Result;
use crate::executor::{ReleaseExecutor, ReleaseOutcome};
use crate::git::Repository;
use crate::metadata::{self, ConfigMutator};
use crate::planner::{Action, Plan, ReleasePlanner, ReleasePolicy, ReleaseRequest};
use crate::state::{RepositorySnapshot, SnapshotScope};

/// Arguments for the release workflow
///
/// Mirrors the CLI Args but in a format suitable for orchestration logic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReleaseWorkflowArgs {
    /// Version to release; the version marker is used when absent
    pub version: Option<String>,

    /// Overrides the configured remote
    pub remote: Option<String>,

    /// Waive downgrade and tag-collision confirmations
    pub force: bool,

    /// Prompts may be answered
    pub interactive: bool,

    /// Message for committing pending changes
    pub commit_message: Option<String>,
}

impl ReleaseWorkflowArgs {
    /// Remote to publish to
    pub fn remote<'a>(&'a self, config: &'a Config) -> &'a str {
        self.remote.as_deref().unwrap_or(&config.remote)
    }

    pub fn policy(&self) -> ReleasePolicy {
        ReleasePolicy {
            force: self.force,
            interactive: self.interactive,
        }
    }
}

/// Plan a release
///
/// Resolves the version (usage errors surface before the remote is
/// contacted), captures a snapshot and runs the planner.
///
/// # Returns
///
/// The plan to execute, or the reason the release must not start
pub fn prepare_release<R: Repository + ?Sized>(
    repo: &R,
    confirmer: &dyn Confirmer,
    config: &Config,
    args: &ReleaseWorkflowArgs,
) -> Result<Plan> {
    let recorded = match args.version {
        Some(_) => None,
        None => metadata::read_version_marker(&repo.workdir()?.join(&config.files.version))?,
    };
    let version = effective_version(
        args.version.as_deref(),
        recorded.as_ref(),
        &config.files.version,
    )?;

    let scope = SnapshotScope {
        remote: args.remote(config).to_string(),
        branch: version.to_string(),
        version_file: config.files.version.clone(),
        companion_file: config.files.companion.clone(),
        branch_field: config.files.branch_field.clone(),
    };
    let snapshot = RepositorySnapshot::capture(repo, &scope)?;

    let request = ReleaseRequest {
        version,
        commit_message: args.commit_message.clone(),
    };
    let planner = ReleasePlanner::new(config.planner_settings());
    planner.plan(&request, &snapshot, args.policy(), confirmer)
}

/// Execute a prepared plan, reporting each action before it starts
pub fn execute_release<R, M, F>(
    repo: &R,
    mutator: &M,
    remote: &str,
    plan: &Plan,
    on_action: F,
) -> Result<ReleaseOutcome>
where
    R: Repository + ?Sized,
    M: ConfigMutator + ?Sized,
    F: FnMut(&Action),
{
    info!(version = %plan.version, remote, "executing release plan");
    ReleaseExecutor::new(repo, mutator, remote).run_with_progress(plan, on_action)
}
