//! Point-in-time view of the repository a release run plans against.
//!
//! A [RepositorySnapshot] is captured once, after a single fetch/prune of
//! the remote, so existence checks and ahead/behind counts are consistent
//! with each other. Planning never re-queries the backend.

use crate::domain::SemanticVersion;
use crate::error::Result;
use crate::git::{RefScope, RemoteRefs, Repository};
use crate::metadata;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// What a snapshot needs to know about, beyond generic repository state
#[derive(Debug, Clone)]
pub struct SnapshotScope {
    pub remote: String,
    /// Version branch whose divergence from the remote is measured
    pub branch: String,
    /// Version marker, relative to the repository root
    pub version_file: PathBuf,
    /// Companion config, relative to the repository root
    pub companion_file: PathBuf,
    pub branch_field: String,
}

/// Commits only on the local side vs. only on the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Divergence {
    pub ahead: usize,
    pub behind: usize,
}

impl Divergence {
    pub fn new(ahead: usize, behind: usize) -> Self {
        Divergence { ahead, behind }
    }

    /// Nothing on the remote side is missing locally
    pub fn is_level(&self) -> bool {
        self.behind == 0
    }

    pub fn is_diverged(&self) -> bool {
        self.ahead > 0 && self.behind > 0
    }
}

/// Recorded state of the companion config's branch field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanionState {
    Missing,
    NoField,
    Branch(String),
}

/// Repository state as observed at the start of a run
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    /// `None` when HEAD is detached
    pub current_branch: Option<String>,
    pub is_clean: bool,
    pub local_branches: BTreeSet<String>,
    pub local_tags: BTreeSet<String>,
    pub remote: RemoteRefs,
    /// Version branch (or HEAD when it does not exist locally) against its
    /// remote counterpart; `None` when the remote has no such branch
    pub divergence: Option<Divergence>,
    /// Read from the tree that will be released: the version branch's tip
    /// when it exists locally and is not checked out, else the working tree
    pub recorded_version: Option<SemanticVersion>,
    pub companion: CompanionState,
}

impl RepositorySnapshot {
    /// Fetch the remote once and read everything planning needs
    #[instrument(skip(repo, scope), fields(remote = %scope.remote, branch = %scope.branch))]
    pub fn capture<R: Repository + ?Sized>(repo: &R, scope: &SnapshotScope) -> Result<Self> {
        repo.fetch_prune(&scope.remote)?;
        let remote = repo.remote_refs(&scope.remote)?;

        let current_branch = repo.current_branch()?;
        let is_clean = repo.is_clean()?;
        let local_branches: BTreeSet<String> = repo.local_branches()?.into_iter().collect();
        let local_tags: BTreeSet<String> = repo.local_tags()?.into_iter().collect();

        let divergence = if remote.branches.contains_key(&scope.branch) {
            let local_ref = if local_branches.contains(&scope.branch) {
                format!("refs/heads/{}", scope.branch)
            } else {
                "HEAD".to_string()
            };
            let remote_ref = format!("refs/remotes/{}/{}", scope.remote, scope.branch);
            let (ahead, behind) = repo.ahead_behind(&local_ref, &remote_ref)?;
            Some(Divergence::new(ahead, behind))
        } else {
            None
        };

        let on_branch = current_branch.as_deref() == Some(scope.branch.as_str());
        let (marker, companion_text) = if local_branches.contains(&scope.branch) && !on_branch {
            debug!(branch = %scope.branch, "reading release metadata from the version branch");
            (
                repo.read_file(&scope.branch, &scope.version_file)?,
                repo.read_file(&scope.branch, &scope.companion_file)?,
            )
        } else {
            let workdir = repo.workdir()?;
            (
                metadata::read_optional(&workdir.join(&scope.version_file))?,
                metadata::read_optional(&workdir.join(&scope.companion_file))?,
            )
        };

        let recorded_version = match marker {
            Some(contents) => metadata::parse_version_marker(&contents)?,
            None => None,
        };

        let companion = match companion_text {
            None => CompanionState::Missing,
            Some(contents) => {
                let field =
                    metadata::parse_field(&contents, &scope.branch_field, &scope.companion_file)?;
                match field {
                    Some(branch) => CompanionState::Branch(branch),
                    None => CompanionState::NoField,
                }
            }
        };

        debug!(
            current_branch = ?current_branch,
            is_clean,
            divergence = ?divergence,
            recorded_version = ?recorded_version.as_ref().map(|v| v.to_string()),
            "captured repository snapshot"
        );

        Ok(RepositorySnapshot {
            current_branch,
            is_clean,
            local_branches,
            local_tags,
            remote,
            divergence,
            recorded_version,
            companion,
        })
    }

    pub fn current_branch(&self) -> Option<&str> {
        self.current_branch.as_deref()
    }

    pub fn is_working_tree_clean(&self) -> bool {
        self.is_clean
    }

    pub fn branch_exists(&self, name: &str, scope: RefScope) -> bool {
        match scope {
            RefScope::Local => self.local_branches.contains(name),
            RefScope::Remote => self.remote.branches.contains_key(name),
        }
    }

    pub fn tag_exists(&self, name: &str, scope: RefScope) -> bool {
        match scope {
            RefScope::Local => self.local_tags.contains(name),
            RefScope::Remote => self.remote.tags.contains_key(name),
        }
    }

    /// Object id the remote advertised for a branch
    pub fn remote_branch_oid(&self, name: &str) -> Option<&str> {
        self.remote.branches.get(name).map(String::as_str)
    }

    /// Object id the remote advertised for a tag
    pub fn remote_tag_oid(&self, name: &str) -> Option<&str> {
        self.remote.tags.get(name).map(String::as_str)
    }

    pub fn divergence(&self) -> Option<Divergence> {
        self.divergence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;
    use std::fs;
    use tempfile::TempDir;

    fn scope(branch: &str) -> SnapshotScope {
        SnapshotScope {
            remote: "origin".into(),
            branch: branch.into(),
            version_file: "VERSION".into(),
            companion_file: "template.toml".into(),
            branch_field: "branch".into(),
        }
    }

    #[test]
    fn test_capture_fetches_before_reading() {
        let dir = TempDir::new().unwrap();
        let repo = MockRepository::new(dir.path())
            .with_remote_branch("0.2.0", "c7")
            .with_divergence("0.2.0", 1, 2);

        let snap = RepositorySnapshot::capture(&repo, &scope("0.2.0")).unwrap();

        assert_eq!(repo.ops(), vec!["fetch_prune origin".to_string()]);
        assert_eq!(snap.current_branch(), Some("main"));
        assert!(snap.is_working_tree_clean());
        assert!(snap.branch_exists("0.2.0", RefScope::Remote));
        assert!(!snap.branch_exists("0.2.0", RefScope::Local));
        assert_eq!(snap.remote_branch_oid("0.2.0"), Some("c7"));
        assert_eq!(snap.divergence(), Some(Divergence::new(1, 2)));
        assert!(snap.divergence().unwrap().is_diverged());
    }

    #[test]
    fn test_no_remote_branch_means_no_divergence() {
        let dir = TempDir::new().unwrap();
        let repo = MockRepository::new(dir.path()).with_divergence("0.2.0", 3, 0);

        let snap = RepositorySnapshot::capture(&repo, &scope("0.2.0")).unwrap();
        assert_eq!(snap.divergence(), None);
    }

    #[test]
    fn test_reads_marker_and_companion() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("VERSION"), "0.1.3\n").unwrap();
        fs::write(dir.path().join("template.toml"), "branch = \"0.1.3\"\n").unwrap();
        let repo = MockRepository::new(dir.path()).with_tag("v0.1.3");

        let snap = RepositorySnapshot::capture(&repo, &scope("0.1.4")).unwrap();

        assert_eq!(snap.recorded_version, Some(SemanticVersion::new(0, 1, 3)));
        assert_eq!(snap.companion, CompanionState::Branch("0.1.3".into()));
        assert!(snap.tag_exists("v0.1.3", RefScope::Local));
        assert!(!snap.tag_exists("v0.1.3", RefScope::Remote));
    }

    #[test]
    fn test_companion_without_field() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("template.toml"), "name = \"x\"\n").unwrap();
        let repo = MockRepository::new(dir.path());

        let snap = RepositorySnapshot::capture(&repo, &scope("0.1.0")).unwrap();
        assert_eq!(snap.companion, CompanionState::NoField);
        assert_eq!(snap.recorded_version, None);
    }

    #[test]
    fn test_existing_version_branch_supplies_metadata() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("VERSION"), "0.2.0\n").unwrap();
        fs::write(dir.path().join("template.toml"), "branch = \"main\"\n").unwrap();
        let repo = MockRepository::new(dir.path())
            .with_branch("0.2.0")
            .with_file_on_branch("0.2.0", "VERSION", "0.1.9\n")
            .with_file_on_branch("0.2.0", "template.toml", "branch = \"0.1.9\"\n");

        let snap = RepositorySnapshot::capture(&repo, &scope("0.2.0")).unwrap();

        assert_eq!(snap.recorded_version, Some(SemanticVersion::new(0, 1, 9)));
        assert_eq!(snap.companion, CompanionState::Branch("0.1.9".into()));
    }

    #[test]
    fn test_checked_out_version_branch_reads_working_tree() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("VERSION"), "0.2.0\n").unwrap();
        let repo = MockRepository::new(dir.path())
            .on_branch("0.2.0")
            .with_file_on_branch("0.2.0", "VERSION", "0.1.9\n");

        let snap = RepositorySnapshot::capture(&repo, &scope("0.2.0")).unwrap();

        assert_eq!(snap.recorded_version, Some(SemanticVersion::new(0, 2, 0)));
        assert_eq!(snap.companion, CompanionState::Missing);
    }

    #[test]
    fn test_fetch_failure_aborts_capture() {
        let dir = TempDir::new().unwrap();
        let repo = MockRepository::new(dir.path()).fail_on("remote_refs");

        assert!(RepositorySnapshot::capture(&repo, &scope("0.1.0")).is_err());
    }
}
