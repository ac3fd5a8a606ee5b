//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.
//! `format_*` functions build strings and are testable; `display_*` print them.

use console::style;

use crate::boundary::BoundaryWarning;
use crate::executor::{ExecutionFailure, ReleaseOutcome};
use crate::planner::{Action, Plan};

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning to the user.
///
/// Shows a yellow warning icon followed by the warning message.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Numbered plan listing, one action per line
pub fn format_plan(plan: &Plan) -> String {
    let mut out = format!(
        "Release {} (branch '{}', tag '{}'):\n",
        plan.version, plan.branch, plan.tag
    );
    for (i, action) in plan.actions.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, action));
    }
    out
}

/// Display the plan, preceded by any warnings raised while planning.
pub fn display_plan(plan: &Plan) {
    for warning in &plan.warnings {
        display_boundary_warning(warning);
    }
    let listing = format_plan(plan);
    let mut lines = listing.lines();
    if let Some(header) = lines.next() {
        println!("\n{}", style(header).bold());
    }
    for line in lines {
        println!("{}", line);
    }
}

/// Print the action about to run.
pub fn display_progress(action: &Action) {
    display_status(&action.to_string());
}

/// What completed, what failed and why
pub fn format_execution_failure(failure: &ExecutionFailure) -> String {
    let mut out = String::from("Completed actions:\n");
    if failure.completed.is_empty() {
        out.push_str("  (none)\n");
    }
    for action in &failure.completed {
        out.push_str(&format!("  ✓ {}\n", action));
    }
    out.push_str(&format!(
        "Failed action:\n  ✗ {}\n    {}\n",
        failure.failed, failure.source
    ));
    out.push_str("Nothing was rolled back; remaining actions were not attempted.\n");
    out
}

/// Display an execution-phase failure so the run can be finished by hand.
pub fn display_execution_failure(failure: &ExecutionFailure) {
    display_error(&format!("Release stopped at: {}", failure.failed));
    eprint!("{}", format_execution_failure(failure));
}

/// Display the final state of a successful release.
pub fn display_outcome(outcome: &ReleaseOutcome) {
    display_success(&format!(
        "Published branch '{}' and tag '{}' at {}",
        style(&outcome.branch).cyan(),
        style(&outcome.tag).cyan(),
        short_id(&outcome.commit)
    ));
}

fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}
