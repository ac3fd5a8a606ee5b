use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use git_release::cli::logging;
use git_release::cli::orchestration::{execute_release, prepare_release, ReleaseWorkflowArgs};
use git_release::config;
use git_release::confirm::{Confirmer, DenyAll};
use git_release::git::Git2Repository;
use git_release::metadata::FieldRewriter;
use git_release::ui::{self, TerminalConfirmer};
use git_release::ReleaseError;

#[derive(clap::Parser)]
#[command(
    name = "git-release",
    version,
    about = "Cut a release branch and annotated tag for a semantic version"
)]
struct Args {
    #[arg(
        value_name = "VERSION",
        help = "Version to release (MAJOR.MINOR.PATCH); read from the version marker when omitted"
    )]
    release_version: Option<String>,

    #[arg(short, long, help = "Allow downgrades and replace existing tags without asking")]
    force: bool,

    #[arg(long, help = "Never prompt; anything that would need confirmation aborts")]
    no_input: bool,

    #[arg(short = 'm', long = "message", help = "Commit message for pending changes")]
    message: Option<String>,

    #[arg(long, help = "Preview the plan without making changes")]
    dry_run: bool,

    #[arg(long, help = "Remote to publish to (overrides config)")]
    remote: Option<String>,

    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(short, long, action = ArgAction::Count, help = "More diagnostics (-v debug, -vv trace)")]
    verbose: u8,

    #[arg(short, long, help = "Only log errors")]
    quiet: bool,
}

fn main() {
    let args = Args::parse();
    logging::init(args.quiet, args.verbose);

    let code = match run(args) {
        Ok(()) => 0,
        Err(e) => report(&e),
    };
    std::process::exit(code);
}

fn run(args: Args) -> Result<()> {
    let config = config::load_config(args.config.as_deref())?;
    let repo = Git2Repository::open(".").context("Not inside a git repository")?;

    let workflow = ReleaseWorkflowArgs {
        version: args.release_version,
        remote: args.remote,
        force: args.force,
        interactive: !args.no_input && ui::is_interactive(),
        commit_message: args.message,
    };
    let confirmer: &dyn Confirmer = if workflow.interactive {
        &TerminalConfirmer
    } else {
        &DenyAll
    };
    let remote = workflow.remote(&config).to_string();

    ui::display_status(&format!("Fetching from '{}'...", remote));
    let plan = prepare_release(&repo, confirmer, &config, &workflow)?;
    ui::display_plan(&plan);

    if args.dry_run {
        ui::display_status("Dry run: no changes made");
        return Ok(());
    }

    if workflow.interactive
        && !workflow.force
        && !ui::confirm_action("Proceed with this release?")?
    {
        println!("Operation cancelled by user.");
        return Ok(());
    }

    let outcome = execute_release(&repo, &FieldRewriter, &remote, &plan, ui::display_progress)?;
    ui::display_outcome(&outcome);
    Ok(())
}

/// Print an error the way its kind calls for and pick the exit status
fn report(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ReleaseError>() {
        Some(ReleaseError::Execution(failure)) => {
            ui::display_execution_failure(failure);
            1
        }
        Some(e) => {
            ui::display_error(&e.to_string());
            e.exit_code()
        }
        None => {
            ui::display_error(&format!("{:#}", err));
            1
        }
    }
}
