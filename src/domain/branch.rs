use crate::domain::SemanticVersion;

/// What a branch is, as far as forking a release branch from it is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// One of the configured mainline branches (main/master by default)
    Trunk,
    /// A branch named after a version, created by an earlier release
    Release,
    /// Anything else: feature branches, personal branches
    Other,
}

/// Represents a git branch with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchContext {
    pub name: String,
    pub kind: BranchKind,
}

impl BranchContext {
    /// Classify a branch name against the configured trunk branches
    pub fn classify(name: impl Into<String>, trunk_branches: &[String]) -> Self {
        let name = name.into();
        let kind = if trunk_branches.iter().any(|trunk| *trunk == name) {
            BranchKind::Trunk
        } else if SemanticVersion::parse(&name).is_ok() {
            BranchKind::Release
        } else {
            BranchKind::Other
        };

        BranchContext { name, kind }
    }

    /// Whether a new release branch may be forked from here without asking
    pub fn is_recognized_fork_point(&self) -> bool {
        matches!(self.kind, BranchKind::Trunk | BranchKind::Release)
    }

    /// The branch name a release of `version` lives on
    pub fn for_version(version: &SemanticVersion) -> String {
        version.to_string()
    }
}
