use crate::error::{ReleaseError, Result};
use crate::git::RemoteRefs;
use git2::build::CheckoutBuilder;
use git2::{
    AutotagOption, BranchType, Direction, ErrorClass, ErrorCode, FetchOptions, FetchPrune,
    FileFavor, IndexAddOption, MergeOptions, PushOptions, RemoteCallbacks, Repository as Git2Repo,
    StatusOptions,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    fn commit_for(&self, spec: &str) -> Result<git2::Commit<'_>> {
        Ok(self.repo.revparse_single(spec)?.peel_to_commit()?)
    }

    /// Push refspecs, turning per-ref rejections reported by the remote into errors
    fn push_refspecs(&self, remote_name: &str, refspecs: &[String]) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|e| {
                ReleaseError::config(format!("Cannot find remote '{}': {}", remote_name, e))
            })?;

        let rejection: RefCell<Option<(String, String)>> = RefCell::new(None);
        let mut callbacks = remote_callbacks();
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                *rejection.borrow_mut() = Some((refname.to_string(), status.to_string()));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();
        remote
            .push(&refspec_strs, Some(&mut push_options))
            .map_err(|e| classify_remote_error(&refspecs.join(" "), e))?;

        if let Some((refname, reason)) = rejection.borrow_mut().take() {
            return Err(ReleaseError::rejected(refname, reason));
        }

        Ok(())
    }
}

/// Credentials callback shared by fetch, ls-remote and push.
///
/// Tries SSH keys from ~/.ssh/, then the SSH agent, then git's defaults.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(git2::CredentialType::SSH_KEY) {
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = git2::Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }

            if let Ok(cred) = git2::Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
        }

        git2::Cred::default()
    });
    callbacks
}

fn classify_remote_error(refname: &str, e: git2::Error) -> ReleaseError {
    match e.class() {
        ErrorClass::Net | ErrorClass::Ssh | ErrorClass::Http | ErrorClass::Ssl | ErrorClass::Os => {
            ReleaseError::unavailable(e.message().to_string())
        }
        _ => ReleaseError::rejected(refname, e.message()),
    }
}

impl super::Repository for Git2Repository {
    fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| ReleaseError::config("Cannot release from a bare repository"))
    }

    fn fetch_prune(&self, remote_name: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|e| {
                ReleaseError::config(format!("Cannot find remote '{}': {}", remote_name, e))
            })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks());
        fetch_options.prune(FetchPrune::On);
        fetch_options.download_tags(AutotagOption::None);

        let refspec = format!("+refs/heads/*:refs/remotes/{}/*", remote_name);
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_options), None)
            .map_err(|e| {
                ReleaseError::unavailable(format!(
                    "Failed to fetch from remote '{}': {}",
                    remote_name,
                    e.message()
                ))
            })?;

        debug!(remote = remote_name, "fetched and pruned remote-tracking branches");
        Ok(())
    }

    fn remote_refs(&self, remote_name: &str) -> Result<RemoteRefs> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|e| {
                ReleaseError::config(format!("Cannot find remote '{}': {}", remote_name, e))
            })?;

        let connection = remote
            .connect_auth(Direction::Fetch, Some(remote_callbacks()), None)
            .map_err(|e| {
                ReleaseError::unavailable(format!(
                    "Cannot connect to remote '{}': {}",
                    remote_name,
                    e.message()
                ))
            })?;

        let mut refs = RemoteRefs::default();
        for head in connection.list()? {
            let name = head.name();
            if let Some(branch) = name.strip_prefix("refs/heads/") {
                refs.branches.insert(branch.to_string(), head.oid().to_string());
            } else if let Some(tag) = name.strip_prefix("refs/tags/") {
                // Peeled entries ("v1.0.0^{}") describe the tagged commit, not the tag ref
                if !tag.ends_with("^{}") {
                    refs.tags.insert(tag.to_string(), head.oid().to_string());
                }
            }
        }

        Ok(refs)
    }

    fn current_branch(&self) -> Result<Option<String>> {
        if self.repo.head_detached()? {
            return Ok(None);
        }

        let head = self.repo.head()?;
        if !head.is_branch() {
            return Ok(None);
        }

        Ok(head.shorthand().map(String::from))
    }

    fn is_clean(&self) -> Result<bool> {
        let statuses = self.repo.statuses(Some(
            StatusOptions::new()
                .include_untracked(true)
                .recurse_untracked_dirs(true)
                .exclude_submodules(true),
        ))?;

        Ok(statuses.is_empty())
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn local_tags(&self) -> Result<Vec<String>> {
        let tags = self.repo.tag_names(None)?;

        Ok(tags.iter().flatten().map(|s| s.to_string()).collect())
    }

    fn ahead_behind(&self, local_ref: &str, remote_ref: &str) -> Result<(usize, usize)> {
        let local = self.commit_for(local_ref)?.id();
        let remote = self.commit_for(remote_ref)?.id();

        Ok(self.repo.graph_ahead_behind(local, remote)?)
    }

    fn head_commit(&self) -> Result<String> {
        Ok(self.repo.head()?.peel_to_commit()?.id().to_string())
    }

    fn read_file(&self, branch: &str, path: &Path) -> Result<Option<String>> {
        let commit = self.commit_for(&format!("refs/heads/{}", branch))?;
        let entry = match commit.tree()?.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let object = entry.to_object(&self.repo)?;
        let Some(blob) = object.as_blob() else {
            return Ok(None);
        };

        let contents = std::str::from_utf8(blob.content()).map_err(|e| {
            ReleaseError::config(format!(
                "{} on branch '{}' is not valid UTF-8: {}",
                path.display(),
                branch,
                e
            ))
        })?;
        Ok(Some(contents.to_string()))
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        let refname = format!("refs/heads/{}", name);
        let target = self.repo.revparse_single(&refname)?;

        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        self.repo.set_head(&refname)?;

        Ok(())
    }

    fn create_branch(&self, name: &str, from: &str) -> Result<()> {
        let start = self.commit_for(&format!("refs/heads/{}", from))?;
        self.repo.branch(name, &start, false)?;

        self.checkout_branch(name)
    }

    fn fast_forward(&self, branch: &str, upstream: &str) -> Result<()> {
        let local = self.commit_for(&format!("refs/heads/{}", branch))?;
        let target = self.commit_for(upstream)?;

        if local.id() != target.id() && !self.repo.graph_descendant_of(target.id(), local.id())? {
            let (ahead, behind) = self.repo.graph_ahead_behind(local.id(), target.id())?;
            return Err(ReleaseError::DivergedHistory {
                branch: branch.to_string(),
                ahead,
                behind,
            });
        }

        self.repo
            .checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))?;

        let mut reference = self.repo.find_reference(&format!("refs/heads/{}", branch))?;
        reference.set_target(target.id(), &format!("fast-forward from {}", upstream))?;

        Ok(())
    }

    fn merge_prefer_local(&self, branch: &str, upstream: &str) -> Result<String> {
        let ours = self.commit_for(&format!("refs/heads/{}", branch))?;
        let theirs = self.commit_for(upstream)?;

        let mut merge_options = MergeOptions::new();
        merge_options.file_favor(FileFavor::Ours);

        let mut index = self.repo.merge_commits(&ours, &theirs, Some(&merge_options))?;
        if index.has_conflicts() {
            return Err(ReleaseError::SyncConflict {
                branch: branch.to_string(),
            });
        }

        let tree = self.repo.find_tree(index.write_tree_to(&self.repo)?)?;
        let sig = self.repo.signature()?;
        let message = format!("Merge {} into {}, keeping local changes", upstream, branch);

        let oid = self.repo.commit(
            Some(&format!("refs/heads/{}", branch)),
            &sig,
            &sig,
            &message,
            &tree,
            &[&ours, &theirs],
        )?;

        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))?;

        Ok(oid.to_string())
    }

    fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn stage_paths(&self, paths: &[&Path]) -> Result<()> {
        let workdir = super::Repository::workdir(self)?;
        let mut index = self.repo.index()?;

        for path in paths {
            if workdir.join(path).exists() {
                index.add_path(path)?;
            } else {
                index.remove_path(path)?;
            }
        }

        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Option<String>> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let parent = self.repo.head()?.peel_to_commit()?;

        if parent.tree_id() == tree_id {
            return Ok(None);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.repo.signature()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;

        Ok(Some(oid.to_string()))
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        let sig = self.repo.signature()?;

        self.repo
            .tag(name, head.as_object(), &sig, message, false)?;

        Ok(())
    }

    fn delete_local_tag(&self, name: &str) -> Result<()> {
        self.repo.tag_delete(name)?;
        Ok(())
    }

    fn delete_local_branch(&self, name: &str) -> Result<()> {
        let mut branch = self.repo.find_branch(name, BranchType::Local)?;
        branch.delete()?;
        Ok(())
    }

    fn push_branch(&self, remote_name: &str, name: &str, set_upstream: bool) -> Result<()> {
        let refname = format!("refs/heads/{}", name);
        self.push_refspecs(remote_name, &[format!("{0}:{0}", refname)])?;

        // Keep the remote-tracking ref in step with what we just published
        let oid = self.repo.refname_to_id(&refname)?;
        let tracking = format!("refs/remotes/{}/{}", remote_name, name);
        self.repo
            .reference(&tracking, oid, true, "push: update tracking ref")?;

        if set_upstream {
            let mut branch = self.repo.find_branch(name, BranchType::Local)?;
            branch.set_upstream(Some(&format!("{}/{}", remote_name, name)))?;
        }

        Ok(())
    }

    fn push_tag(&self, remote_name: &str, name: &str) -> Result<()> {
        self.push_refspecs(remote_name, &[format!("refs/tags/{0}:refs/tags/{0}", name)])
    }

    /// Deletes unconditionally. git2 has no force-with-lease, so the
    /// executor's ls-remote check before this call still leaves a window in
    /// which another client can move the ref.
    fn delete_remote_ref(&self, remote_name: &str, refname: &str) -> Result<()> {
        self.push_refspecs(remote_name, &[format!(":{}", refname)])?;

        if let Some(branch) = refname.strip_prefix("refs/heads/") {
            let tracking = format!("refs/remotes/{}/{}", remote_name, branch);
            match self.repo.find_reference(&tracking) {
                Ok(mut reference) => reference.delete()?,
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Repository;
    use std::fs;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Git2Repository) {
        let dir = TempDir::new().unwrap();
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Git2Repo::init_opts(dir.path(), &opts).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }

        fs::write(dir.path().join("README.md"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();
        drop(tree);

        (dir, Git2Repository::from_git2(repo))
    }

    #[test]
    fn test_current_branch_and_clean() {
        let (dir, repo) = setup_repo();
        assert_eq!(repo.current_branch().unwrap(), Some("main".to_string()));
        assert!(repo.is_clean().unwrap());

        fs::write(dir.path().join("new.txt"), "x").unwrap();
        assert!(!repo.is_clean().unwrap());
    }

    #[test]
    fn test_commit_skips_unchanged_tree() {
        let (dir, repo) = setup_repo();
        assert_eq!(repo.commit("nothing").unwrap(), None);

        fs::write(dir.path().join("VERSION"), "0.1.0\n").unwrap();
        repo.stage_paths(&[Path::new("VERSION")]).unwrap();
        let id = repo.commit("Release 0.1.0").unwrap();
        assert_eq!(id, Some(repo.head_commit().unwrap()));
        assert!(repo.is_clean().unwrap());
    }

    #[test]
    fn test_create_branch_checks_it_out() {
        let (_dir, repo) = setup_repo();
        repo.create_branch("0.1.0", "main").unwrap();

        assert_eq!(repo.current_branch().unwrap(), Some("0.1.0".to_string()));
        let mut branches = repo.local_branches().unwrap();
        branches.sort();
        assert_eq!(branches, vec!["0.1.0".to_string(), "main".to_string()]);
    }

    #[test]
    fn test_annotated_tag_lifecycle() {
        let (_dir, repo) = setup_repo();
        repo.create_annotated_tag("v0.1.0", "Release 0.1.0").unwrap();
        assert_eq!(repo.local_tags().unwrap(), vec!["v0.1.0".to_string()]);

        repo.delete_local_tag("v0.1.0").unwrap();
        assert!(repo.local_tags().unwrap().is_empty());
    }

    /// Commit `file` on top of `base`, publish it as `refs/remotes/origin/main`
    /// and hard-reset `main` back to `base`
    fn stage_upstream(dir: &Path, repo: &Git2Repository, base: &str, file: &str) -> String {
        fs::write(dir.join(file), "upstream\n").unwrap();
        repo.stage_all().unwrap();
        let upstream = repo.commit("Upstream work").unwrap().unwrap();
        repo.repo
            .reference(
                "refs/remotes/origin/main",
                git2::Oid::from_str(&upstream).unwrap(),
                true,
                "test",
            )
            .unwrap();

        let base = repo
            .repo
            .find_object(git2::Oid::from_str(base).unwrap(), None)
            .unwrap();
        repo.repo.reset(&base, git2::ResetType::Hard, None).unwrap();
        upstream
    }

    #[test]
    fn test_fast_forward_moves_branch_and_tree() {
        let (dir, repo) = setup_repo();
        let base = repo.head_commit().unwrap();
        let upstream = stage_upstream(dir.path(), &repo, &base, "remote.txt");
        assert!(!dir.path().join("remote.txt").exists());

        repo.fast_forward("main", "refs/remotes/origin/main").unwrap();

        assert_eq!(repo.head_commit().unwrap(), upstream);
        assert!(dir.path().join("remote.txt").exists());
        assert!(repo.is_clean().unwrap());
    }

    #[test]
    fn test_fast_forward_refuses_diverged_branch() {
        let (dir, repo) = setup_repo();
        let base = repo.head_commit().unwrap();
        stage_upstream(dir.path(), &repo, &base, "remote.txt");

        fs::write(dir.path().join("local.txt"), "mine\n").unwrap();
        repo.stage_all().unwrap();
        let local = repo.commit("Local work").unwrap().unwrap();

        let err = repo
            .fast_forward("main", "refs/remotes/origin/main")
            .unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::DivergedHistory {
                ahead: 1,
                behind: 1,
                ..
            }
        ));
        assert_eq!(repo.head_commit().unwrap(), local);
        assert!(dir.path().join("local.txt").exists());
    }

    #[test]
    fn test_read_file_from_other_branch() {
        let (dir, repo) = setup_repo();
        repo.create_branch("0.2.0", "main").unwrap();
        fs::write(dir.path().join("VERSION"), "0.1.9\n").unwrap();
        repo.stage_paths(&[Path::new("VERSION")]).unwrap();
        repo.commit("Record version").unwrap();
        repo.checkout_branch("main").unwrap();

        assert_eq!(
            repo.read_file("0.2.0", Path::new("VERSION")).unwrap(),
            Some("0.1.9\n".to_string())
        );
        assert_eq!(repo.read_file("main", Path::new("VERSION")).unwrap(), None);
        assert_eq!(
            repo.read_file("main", Path::new("README.md")).unwrap(),
            Some("hello\n".to_string())
        );
    }

    #[test]
    fn test_missing_remote_is_config_error() {
        let (_dir, repo) = setup_repo();
        assert!(matches!(
            repo.fetch_prune("origin"),
            Err(ReleaseError::Config(_))
        ));
    }
}
