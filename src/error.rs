use std::path::PathBuf;

use thiserror::Error;

use crate::domain::SemanticVersion;
use crate::executor::ExecutionFailure;

/// Unified error type for git-release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Invalid version format: '{0}' - expected MAJOR.MINOR.PATCH")]
    InvalidVersionFormat(String),

    #[error("No version given and no version marker found at {}", .0.display())]
    MissingVersion(PathBuf),

    #[error("HEAD is detached; check out a branch before releasing")]
    DetachedHead,

    #[error("Working tree has uncommitted changes")]
    DirtyWorkingTree,

    #[error(
        "Version {target} is lower than the current version {current}; try one of {}",
        join_versions(.suggestions)
    )]
    VersionDowngradeRejected {
        target: SemanticVersion,
        current: SemanticVersion,
        suggestions: Vec<SemanticVersion>,
    },

    #[error("Name collision: '{name}' is used by both a branch and a tag")]
    NameCollision { name: String },

    #[error("Refusing to fork release branch '{target}' from '{branch}' without confirmation")]
    AmbiguousForkPoint { branch: String, target: String },

    #[error("Branch '{branch}' has diverged from its remote ({ahead} ahead, {behind} behind)")]
    DivergedHistory {
        branch: String,
        ahead: usize,
        behind: usize,
    },

    #[error("Tag '{tag}' already exists on the remote")]
    TagAlreadyExists { tag: String },

    #[error("Remote rejected update of '{refname}': {reason}")]
    RemoteRejected { refname: String, reason: String },

    #[error("Remote unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Merging the remote into '{branch}' left unresolved conflicts")]
    SyncConflict { branch: String },

    #[error(transparent)]
    Execution(Box<ExecutionFailure>),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in git-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a remote rejection for a ref
    pub fn rejected(refname: impl Into<String>, reason: impl Into<String>) -> Self {
        ReleaseError::RemoteRejected {
            refname: refname.into(),
            reason: reason.into(),
        }
    }

    /// Create an unavailable-remote error with context
    pub fn unavailable(msg: impl Into<String>) -> Self {
        ReleaseError::BackendUnavailable(msg.into())
    }

    /// True for errors caused by how the tool was invoked rather than by repository state.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ReleaseError::InvalidVersionFormat(_) | ReleaseError::MissingVersion(_)
        )
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_usage_error() {
            2
        } else {
            1
        }
    }
}

impl From<ExecutionFailure> for ReleaseError {
    fn from(failure: ExecutionFailure) -> Self {
        ReleaseError::Execution(Box::new(failure))
    }
}

fn join_versions(versions: &[SemanticVersion]) -> String {
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
