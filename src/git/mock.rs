use crate::error::{ReleaseError, Result};
use crate::git::{RemoteRefs, Repository};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Mutable model behind [MockRepository]
#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub head: Option<String>,
    pub clean: bool,
    pub branches: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    /// `refs/remotes/<remote>/<branch>` tracking refs, keyed by branch
    pub tracking: BTreeMap<String, String>,
    pub remote: RemoteRefs,
    /// Ahead/behind answers keyed by the remote ref asked about
    pub divergence: BTreeMap<String, (usize, usize)>,
    pub upstreams: BTreeMap<String, String>,
    /// Committed file contents keyed by `(branch, path)`
    pub files: BTreeMap<(String, PathBuf), String>,
    pub staged: bool,
    pub next_commit: u32,
    /// Operation name that fails when invoked (e.g., "push_tag")
    pub fail_on: Option<String>,
    /// Log of every operation performed, in order
    pub ops: Vec<String>,
}

/// In-memory repository for testing without actual git operations
///
/// Commits are opaque ids (`c1`, `c2`, ...). File writes still happen for
/// real inside `workdir`, which is the only part of the working tree the
/// model does not track.
pub struct MockRepository {
    workdir: PathBuf,
    state: RefCell<MockState>,
}

impl MockRepository {
    /// Create a repository on `main` with one commit and a clean tree
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let mut state = MockState {
            clean: true,
            next_commit: 2,
            ..MockState::default()
        };
        state.branches.insert("main".into(), "c1".into());
        state.head = Some("main".into());

        MockRepository {
            workdir: workdir.into(),
            state: RefCell::new(state),
        }
    }

    /// Add a local branch at the current HEAD commit
    pub fn with_branch(self, name: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let head = head_oid(&state);
            state.branches.insert(name.into(), head);
        }
        self
    }

    /// Check out an existing (or new) local branch
    pub fn on_branch(self, name: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            if !state.branches.contains_key(name) {
                let head = head_oid(&state);
                state.branches.insert(name.into(), head);
            }
            state.head = Some(name.into());
        }
        self
    }

    /// Detach HEAD
    pub fn detached(self) -> Self {
        self.state.borrow_mut().head = None;
        self
    }

    /// Mark the working tree as having uncommitted changes
    pub fn dirty(self) -> Self {
        self.state.borrow_mut().clean = false;
        self
    }

    /// Add a local tag at the current HEAD commit
    pub fn with_tag(self, name: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let head = head_oid(&state);
            state.tags.insert(name.into(), head);
        }
        self
    }

    /// Advertise a branch on the remote
    pub fn with_remote_branch(self, name: &str, oid: &str) -> Self {
        self.state
            .borrow_mut()
            .remote
            .branches
            .insert(name.into(), oid.into());
        self
    }

    /// Advertise a tag on the remote
    pub fn with_remote_tag(self, name: &str, oid: &str) -> Self {
        self.state
            .borrow_mut()
            .remote
            .tags
            .insert(name.into(), oid.into());
        self
    }

    /// Answer ahead/behind queries against `refs/remotes/origin/<branch>`
    pub fn with_divergence(self, branch: &str, ahead: usize, behind: usize) -> Self {
        self.state
            .borrow_mut()
            .divergence
            .insert(format!("refs/remotes/origin/{}", branch), (ahead, behind));
        self
    }

    /// Record `contents` as committed at `path` on local branch `branch`
    pub fn with_file_on_branch(self, branch: &str, path: &str, contents: &str) -> Self {
        self.state
            .borrow_mut()
            .files
            .insert((branch.into(), PathBuf::from(path)), contents.into());
        self
    }

    /// Make the named operation fail
    pub fn fail_on(self, op: &str) -> Self {
        self.state.borrow_mut().fail_on = Some(op.into());
        self
    }

    /// Move a remote ref behind our back (simulates a concurrent run)
    pub fn move_remote_tag(&self, name: &str, oid: &str) {
        self.state
            .borrow_mut()
            .remote
            .tags
            .insert(name.into(), oid.into());
    }

    /// Delete a remote tag behind our back
    pub fn drop_remote_tag(&self, name: &str) {
        self.state.borrow_mut().remote.tags.remove(name);
    }

    /// Snapshot of the model
    pub fn state(&self) -> MockState {
        self.state.borrow().clone()
    }

    /// Operations performed so far
    pub fn ops(&self) -> Vec<String> {
        self.state.borrow().ops.clone()
    }

    fn record(&self, op: &str, detail: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_on.as_deref() == Some(op) {
            return Err(ReleaseError::rejected(detail, "injected failure"));
        }
        state.ops.push(format!("{} {}", op, detail).trim_end().to_string());
        Ok(())
    }

    fn new_commit(state: &mut MockState) -> String {
        let id = format!("c{}", state.next_commit);
        state.next_commit += 1;
        id
    }
}

fn head_oid(state: &MockState) -> String {
    state
        .head
        .as_ref()
        .and_then(|b| state.branches.get(b))
        .cloned()
        .unwrap_or_else(|| "c1".to_string())
}

fn short_name(refname: &str) -> &str {
    refname
        .strip_prefix("refs/remotes/origin/")
        .or_else(|| refname.strip_prefix("refs/heads/"))
        .unwrap_or(refname)
}

impl Repository for MockRepository {
    fn workdir(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }

    fn fetch_prune(&self, remote: &str) -> Result<()> {
        self.record("fetch_prune", remote)?;
        let mut state = self.state.borrow_mut();
        state.tracking = state.remote.branches.clone();
        Ok(())
    }

    fn remote_refs(&self, _remote: &str) -> Result<RemoteRefs> {
        if self.state.borrow().fail_on.as_deref() == Some("remote_refs") {
            return Err(ReleaseError::unavailable("injected failure"));
        }
        Ok(self.state.borrow().remote.clone())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.state.borrow().head.clone())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.state.borrow().clean)
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().branches.keys().cloned().collect())
    }

    fn local_tags(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().tags.keys().cloned().collect())
    }

    fn ahead_behind(&self, _local_ref: &str, remote_ref: &str) -> Result<(usize, usize)> {
        Ok(self
            .state
            .borrow()
            .divergence
            .get(remote_ref)
            .copied()
            .unwrap_or((0, 0)))
    }

    fn head_commit(&self) -> Result<String> {
        Ok(head_oid(&self.state.borrow()))
    }

    fn read_file(&self, branch: &str, path: &Path) -> Result<Option<String>> {
        Ok(self
            .state
            .borrow()
            .files
            .get(&(branch.to_string(), path.to_path_buf()))
            .cloned())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        self.record("checkout_branch", name)?;
        let mut state = self.state.borrow_mut();
        if !state.branches.contains_key(name) {
            return Err(ReleaseError::config(format!("Branch not found: {}", name)));
        }
        state.head = Some(name.into());
        Ok(())
    }

    fn create_branch(&self, name: &str, from: &str) -> Result<()> {
        self.record("create_branch", &format!("{} {}", name, from))?;
        let mut state = self.state.borrow_mut();
        let start = state
            .branches
            .get(from)
            .cloned()
            .ok_or_else(|| ReleaseError::config(format!("Branch not found: {}", from)))?;
        state.branches.insert(name.into(), start);
        state.head = Some(name.into());
        Ok(())
    }

    fn fast_forward(&self, branch: &str, upstream: &str) -> Result<()> {
        self.record("fast_forward", &format!("{} {}", branch, upstream))?;
        let mut state = self.state.borrow_mut();
        let target = state
            .tracking
            .get(short_name(upstream))
            .cloned()
            .ok_or_else(|| ReleaseError::config(format!("Unknown ref: {}", upstream)))?;
        let (ahead, behind) = state.divergence.get(upstream).copied().unwrap_or((0, 0));
        if ahead > 0 {
            return Err(ReleaseError::DivergedHistory {
                branch: branch.into(),
                ahead,
                behind,
            });
        }
        state.branches.insert(branch.into(), target);
        state.divergence.insert(upstream.into(), (0, 0));
        Ok(())
    }

    fn merge_prefer_local(&self, branch: &str, upstream: &str) -> Result<String> {
        self.record("merge_prefer_local", &format!("{} {}", branch, upstream))?;
        let mut state = self.state.borrow_mut();
        let id = Self::new_commit(&mut state);
        state.branches.insert(branch.into(), id.clone());
        if let Some((ahead, behind)) = state.divergence.get_mut(upstream) {
            *ahead += 1;
            *behind = 0;
        }
        Ok(id)
    }

    fn stage_all(&self) -> Result<()> {
        self.record("stage_all", "")?;
        self.state.borrow_mut().staged = true;
        Ok(())
    }

    fn stage_paths(&self, paths: &[&Path]) -> Result<()> {
        let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.record("stage_paths", &listed.join(" "))?;
        self.state.borrow_mut().staged = true;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Option<String>> {
        self.record("commit", message)?;
        let mut state = self.state.borrow_mut();
        if !state.staged {
            return Ok(None);
        }
        let id = Self::new_commit(&mut state);
        if let Some(head) = state.head.clone() {
            // The new commit is one the remote counterpart lacks
            let tracking = format!("refs/remotes/origin/{}", head);
            if let Some((ahead, _)) = state.divergence.get_mut(&tracking) {
                *ahead += 1;
            }
            state.branches.insert(head, id.clone());
        }
        state.staged = false;
        state.clean = true;
        Ok(Some(id))
    }

    fn create_annotated_tag(&self, name: &str, _message: &str) -> Result<()> {
        self.record("create_annotated_tag", name)?;
        let mut state = self.state.borrow_mut();
        if state.tags.contains_key(name) {
            return Err(ReleaseError::config(format!("Tag already exists: {}", name)));
        }
        let head = head_oid(&state);
        state.tags.insert(name.into(), head);
        Ok(())
    }

    fn delete_local_tag(&self, name: &str) -> Result<()> {
        self.record("delete_local_tag", name)?;
        self.state.borrow_mut().tags.remove(name);
        Ok(())
    }

    fn delete_local_branch(&self, name: &str) -> Result<()> {
        self.record("delete_local_branch", name)?;
        self.state.borrow_mut().branches.remove(name);
        Ok(())
    }

    fn push_branch(&self, _remote: &str, name: &str, set_upstream: bool) -> Result<()> {
        self.record("push_branch", name)?;
        let mut state = self.state.borrow_mut();
        let oid = state
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| ReleaseError::config(format!("Branch not found: {}", name)))?;
        state.remote.branches.insert(name.into(), oid.clone());
        state.tracking.insert(name.into(), oid);
        if set_upstream {
            state
                .upstreams
                .insert(name.into(), format!("origin/{}", name));
        }
        Ok(())
    }

    fn push_tag(&self, _remote: &str, name: &str) -> Result<()> {
        self.record("push_tag", name)?;
        let mut state = self.state.borrow_mut();
        let oid = state
            .tags
            .get(name)
            .cloned()
            .ok_or_else(|| ReleaseError::config(format!("Tag not found: {}", name)))?;
        if state.remote.tags.contains_key(name) {
            return Err(ReleaseError::rejected(
                format!("refs/tags/{}", name),
                "already exists",
            ));
        }
        state.remote.tags.insert(name.into(), oid);
        Ok(())
    }

    fn delete_remote_ref(&self, _remote: &str, refname: &str) -> Result<()> {
        self.record("delete_remote_ref", refname)?;
        let mut state = self.state.borrow_mut();
        if let Some(branch) = refname.strip_prefix("refs/heads/") {
            state.remote.branches.remove(branch);
            state.tracking.remove(branch);
        } else if let Some(tag) = refname.strip_prefix("refs/tags/") {
            state.remote.tags.remove(tag);
        }
        Ok(())
    }
}
