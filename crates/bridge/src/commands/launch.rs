//! Launch commands: one attempt to hand off to the agent in a given mode.

use anyhow::{Result, bail};
use bridge_core::dispatch::ExitOutcome;
use bridge_core::{BackendMode, Orchestrator, SelectOutcome, StatusSnapshot};
use colored::Colorize;

use crate::ui::{self, ConsoleObserver};

/// Shown before the agent takes over the terminal.
const AGENT_HINT: &str = "Use /help to see commands. Use /architect to plan complex changes.";

/// `bridge launch <mode>`: survey, then a single attempt.
pub async fn execute(orchestrator: &mut Orchestrator, mode: BackendMode) -> Result<()> {
    let status = orchestrator.survey().await?;

    match attempt(orchestrator, mode, &status).await? {
        SelectOutcome::Finished(_) => Ok(()),
        SelectOutcome::Unavailable(mode) => bail!("{} mode is not available", mode),
        SelectOutcome::RemediationFailed(reason) => bail!("Local backend not ready: {}", reason),
    }
}

/// Select `mode` and report what happened.
///
/// Errors returned here are the ones the orchestrator could not absorb; the
/// caller decides whether they end the session.
pub async fn attempt(
    orchestrator: &mut Orchestrator,
    mode: BackendMode,
    status: &StatusSnapshot,
) -> Result<SelectOutcome> {
    if status.availability.is_selectable(mode) {
        println!();
        println!(
            "{}",
            format!("🚀 Initializing {}...", mode.model_identifier(&status.config)).green()
        );
        println!("{}", AGENT_HINT.dimmed());
    }

    let observer = ConsoleObserver::default();
    let outcome = match orchestrator.select(mode, status, &observer).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_fatal() => {
            println!("{}", "✗ The coding agent could not be found.".red().bold());
            println!(
                "  {}",
                "Install it with `pip install aider-chat` or place it next to bridge.".dimmed()
            );
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    report(&outcome);
    Ok(outcome)
}

fn report(outcome: &SelectOutcome) {
    match outcome {
        SelectOutcome::Unavailable(BackendMode::Cloud) => {
            println!(
                "{}",
                "Cloud mode needs an internet connection and an API key (see Settings).".yellow()
            );
        }
        SelectOutcome::Unavailable(mode) => {
            println!("{}", format!("{} mode is not available.", mode).yellow());
        }
        SelectOutcome::RemediationFailed(reason) => ui::print_failure(*reason),
        SelectOutcome::Finished(ExitOutcome::Exited(0))
        | SelectOutcome::Finished(ExitOutcome::Interrupted) => {
            println!("{}", "Agent session ended.".dimmed());
        }
        SelectOutcome::Finished(ExitOutcome::Exited(code)) => {
            println!("{}", format!("Agent exited with status {}.", code).yellow());
        }
        SelectOutcome::Finished(ExitOutcome::Signaled) => {
            println!("{}", "Agent was terminated by a signal.".yellow());
        }
    }
}

/// Whether an error from [`attempt`] must end the session.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<bridge_core::Error>()
        .is_some_and(bridge_core::Error::is_fatal)
}
