//! Interactive and one-shot sessions — `walkspec chat` and `walkspec say`.

use anyhow::{Context, Result};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;
use walkspec::artifact::WorkspaceLock;
use walkspec::orchestrator::{
    ActionOutcome, ActionStatus, Orchestrator, OrchestratorEvent, OrchestratorState,
};

use super::load_config;

/// An orchestrator plus the lock that keeps other processes off its artifacts.
struct Session {
    orchestrator: Orchestrator,
    _lock: WorkspaceLock,
}

fn open_session(project_dir: &Path, verbose: bool) -> Result<Session> {
    let config = load_config(project_dir, verbose)?;
    for warning in config.validate() {
        warn!("{}", warning);
    }

    let lock = WorkspaceLock::acquire(&config.artifacts_dir())
        .context("Could not lock the artifacts directory")?;
    let orchestrator = Orchestrator::from_config(&config)?;

    Ok(Session {
        orchestrator,
        _lock: lock,
    })
}

/// Submit one utterance, show a spinner until the queue drains, and return
/// what it produced.
async fn run_utterance(orchestrator: &Orchestrator, text: &str) -> Result<Vec<ActionOutcome>> {
    let mut events = orchestrator.subscribe_events();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("listening...");

    let Some(id) = orchestrator.submit(text).await else {
        spinner.finish_and_clear();
        return Ok(Vec::new());
    };

    let mut state = orchestrator.subscribe_state();
    loop {
        let current = *state.borrow_and_update();
        if current == OrchestratorState::Idle {
            break;
        }
        spinner.set_message(format!("{}...", current));
        if state.changed().await.is_err() {
            break;
        }
    }
    spinner.finish_and_clear();

    let mut outcomes = Vec::new();
    loop {
        match events.try_recv() {
            Ok(OrchestratorEvent::ActionFinished {
                id: finished,
                outcome,
                ..
            }) if finished == id => outcomes.push(outcome),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    Ok(outcomes)
}

fn print_outcome(outcome: &ActionOutcome) {
    let (_, columns) = Term::stdout().size();
    let text = textwrap::fill(&outcome.response, usize::from(columns).clamp(40, 100));
    match outcome.status {
        ActionStatus::Completed => println!("{}", text),
        ActionStatus::Rejected => println!("{}", style(text).yellow()),
        ActionStatus::Failed => println!("{}", style(text).red()),
    }
}

pub async fn cmd_say(project_dir: &Path, verbose: bool, text: &str) -> Result<()> {
    let session = open_session(project_dir, verbose)?;
    for outcome in run_utterance(&session.orchestrator, text).await? {
        print_outcome(&outcome);
    }
    Ok(())
}

pub async fn cmd_chat(project_dir: &Path, verbose: bool) -> Result<()> {
    let session = open_session(project_dir, verbose)?;

    println!();
    println!("{}", style("walkspec").bold().cyan());
    println!("Describe your project, then ask me to write the description or the phasing.");
    println!("{}", style("Type 'exit' or press Ctrl-D to leave.").dim());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").cyan().bold());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        for outcome in run_utterance(&session.orchestrator, line).await? {
            print_outcome(&outcome);
        }
        println!();
    }

    Ok(())
}
