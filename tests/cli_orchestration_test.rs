use git_release::cli::orchestration::{execute_release, prepare_release, ReleaseWorkflowArgs};
use git_release::config::Config;
use git_release::confirm::{DenyAll, ScriptedConfirmer};
use git_release::git::MockRepository;
use git_release::metadata::FieldRewriter;
use git_release::ReleaseError;
use std::fs;
use tempfile::TempDir;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("template.toml"), "branch = \"main\"\n").unwrap();
    dir
}

fn args(version: &str) -> ReleaseWorkflowArgs {
    ReleaseWorkflowArgs {
        version: Some(version.to_string()),
        ..ReleaseWorkflowArgs::default()
    }
}

#[test]
fn test_release_workflow_args_defaults() {
    let args = ReleaseWorkflowArgs::default();
    assert_eq!(args.version, None);
    assert_eq!(args.remote, None);
    assert!(!args.force);
    assert!(!args.interactive);
    assert!(!args.policy().force);
}

#[test]
fn test_remote_override() {
    let config = Config::default();
    assert_eq!(args("0.1.0").remote(&config), "origin");

    let custom = ReleaseWorkflowArgs {
        remote: Some("upstream".to_string()),
        ..args("0.1.0")
    };
    assert_eq!(custom.remote(&config), "upstream");
}

#[test]
fn test_invalid_version_fails_before_fetch() {
    let dir = workspace();
    let repo = MockRepository::new(dir.path());

    let err = prepare_release(&repo, &DenyAll, &Config::default(), &args("1.2.x")).unwrap_err();
    assert!(matches!(err, ReleaseError::InvalidVersionFormat(_)));
    assert!(repo.ops().is_empty());
}

#[test]
fn test_version_defaults_to_marker() {
    let dir = workspace();
    fs::write(dir.path().join("VERSION"), "0.4.1\n").unwrap();
    let repo = MockRepository::new(dir.path());

    let plan = prepare_release(&repo, &DenyAll, &Config::default(), &ReleaseWorkflowArgs::default())
        .unwrap();
    assert_eq!(plan.branch, "0.4.1");
    assert_eq!(plan.tag, "v0.4.1");
    assert!(!plan.contains("write-version-marker"));
}

#[test]
fn test_configured_trunk_is_recognized() {
    let dir = workspace();
    let repo = MockRepository::new(dir.path()).on_branch("develop");

    let strict = prepare_release(&repo, &DenyAll, &Config::default(), &args("0.1.0"));
    assert!(matches!(strict, Err(ReleaseError::AmbiguousForkPoint { .. })));

    let config = Config {
        trunk_branches: vec!["develop".to_string()],
        ..Config::default()
    };
    let plan = prepare_release(&repo, &DenyAll, &config, &args("0.1.0")).unwrap();
    assert_eq!(plan.kinds()[0], "create-branch");
}

#[test]
fn test_non_interactive_never_asks() {
    let dir = workspace();
    let repo = MockRepository::new(dir.path()).dirty();
    let confirmer = ScriptedConfirmer::new([true]);

    let result = prepare_release(&repo, &confirmer, &Config::default(), &args("0.1.0"));
    assert!(matches!(result, Err(ReleaseError::DirtyWorkingTree)));
    assert!(confirmer.prompts().is_empty());
}

#[test]
fn test_execute_reports_progress_in_plan_order() {
    let dir = workspace();
    let repo = MockRepository::new(dir.path());
    let plan = prepare_release(&repo, &DenyAll, &Config::default(), &args("0.1.0")).unwrap();

    let mut started = Vec::new();
    let outcome = execute_release(&repo, &FieldRewriter, "origin", &plan, |action| {
        started.push(action.kind())
    })
    .unwrap();

    assert_eq!(started, plan.kinds());
    assert_eq!(outcome.branch, "0.1.0");
    assert_eq!(outcome.tag, "v0.1.0");
    let state = repo.state();
    assert_eq!(state.remote.tags.get("v0.1.0"), Some(&outcome.commit));
}
