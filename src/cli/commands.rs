//! Command implementations.
//!
//! Workflow commands print the conversation after the invocation, or the
//! saved checkpoint with `--json`. Only `start`, `feedback` and `resume`
//! construct an LLM backend; the other commands work on the checkpoint store
//! alone.

use postflow_config::Config;
use postflow_llm::Gateway;
use postflow_utils::logging::use_color;
use postflow_workflow::{
    Checkpoint, CheckpointStore, FileCheckpointStore, Interaction, Orchestrator, RunStatus,
    WorkflowError, WorkflowParams,
};
use tracing::{debug, warn};

use super::args::{Audience, Tone};
use crate::error::PostflowError;
use crate::render::{next_action, render_history};

pub(crate) fn checkpoint_store(config: &Config) -> FileCheckpointStore {
    FileCheckpointStore::new(config.checkpoint_dir(), config.lock_ttl_secs())
}

/// Orchestrator over the configured backend and the file checkpoint store.
pub(crate) fn build_orchestrator(config: &Config) -> Result<Orchestrator, PostflowError> {
    let (gateway, fallback) = Gateway::from_config(config)?;
    if let Some(info) = fallback {
        warn!(
            primary = %info.primary_provider,
            fallback = %info.fallback_provider,
            "Running on the fallback provider"
        );
    }
    debug!(
        provider = config.provider(),
        checkpoint_dir = %config.checkpoint_dir(),
        "Orchestrator ready"
    );
    Ok(Orchestrator::new(gateway, Box::new(checkpoint_store(config))).with_user_echo(true))
}

pub(crate) async fn execute_start_command(
    config: &Config,
    session: &str,
    topic: String,
    tone: &[Tone],
    audience: &[Audience],
    json: bool,
) -> Result<(), PostflowError> {
    let params = WorkflowParams::new(
        topic,
        tone.iter().map(Tone::as_str),
        audience.iter().map(Audience::as_str),
    )?;
    run_interaction(config, session, Interaction::Start(params), json).await
}

pub(crate) async fn execute_feedback_command(
    config: &Config,
    session: &str,
    text: String,
    json: bool,
) -> Result<(), PostflowError> {
    run_interaction(config, session, Interaction::Feedback(text), json).await
}

pub(crate) async fn execute_resume_command(
    config: &Config,
    session: &str,
    json: bool,
) -> Result<(), PostflowError> {
    run_interaction(config, session, Interaction::Resume, json).await
}

async fn run_interaction(
    config: &Config,
    session: &str,
    interaction: Interaction,
    json: bool,
) -> Result<(), PostflowError> {
    let orchestrator = build_orchestrator(config)?;
    let outcome = orchestrator.run(session, interaction).await?;

    if let Some(stats) = orchestrator.gateway().cache_stats() {
        debug!(
            hits = stats.hits,
            misses = stats.misses,
            hit_ratio = stats.hit_ratio(),
            "Response cache"
        );
    }

    if json {
        let checkpoint = Checkpoint::new(session, outcome.state, outcome.cursor);
        return print_json(&checkpoint);
    }

    print!("{}", render_history(outcome.state.history(), use_color()));
    println!();
    println!("{}", next_action(session, &outcome.cursor));
    Ok(())
}

pub(crate) fn execute_show_command(
    config: &Config,
    session: &str,
    json: bool,
) -> Result<(), PostflowError> {
    let store = checkpoint_store(config);
    let checkpoint = store.load(session).map_err(WorkflowError::from)?;

    let Some(checkpoint) = checkpoint else {
        if json {
            println!("{{}}");
        } else {
            println!("Session: {session}");
            println!("  Status: no run found");
            println!("  Start one with: postflow start --topic \"...\" --tone <TONE> --audience <AUDIENCE>");
        }
        return Ok(());
    };

    if json {
        return print_json(&checkpoint);
    }

    let state = &checkpoint.state;
    println!("Session: {session}");
    println!("  Topic: {}", state.topic());
    println!("  Tone: {}", state.tone_list());
    println!("  Audience: {}", state.audience_list());
    println!("  Status: {}", status_label(checkpoint.cursor.status));
    println!("  Drafts: {}", state.drafts().len());
    println!(
        "  Updated: {}",
        checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    print!("{}", render_history(state.history(), use_color()));
    println!();
    println!("{}", next_action(session, &checkpoint.cursor));
    Ok(())
}

pub(crate) fn execute_reset_command(config: &Config, session: &str) -> Result<(), PostflowError> {
    let store = checkpoint_store(config);
    let _guard = store.lock_session(session).map_err(WorkflowError::from)?;
    if store.delete(session).map_err(WorkflowError::from)? {
        println!("Session '{session}' reset.");
    } else {
        println!("Session '{session}' has no checkpoint.");
    }
    Ok(())
}

pub(crate) fn execute_config_command(config: &Config) -> Result<(), PostflowError> {
    let effective = config.effective_config();
    let width = effective.keys().map(String::len).max().unwrap_or(0);

    println!("Effective configuration:");
    for (key, (value, source)) in &effective {
        println!("  {key:<width$} = {value}  ({source})");
    }
    Ok(())
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "interrupted",
        RunStatus::AwaitingFeedback => "awaiting feedback",
        RunStatus::Completed => "completed",
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), PostflowError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| PostflowError::Output(e.to_string()))?;
    println!("{json}");
    Ok(())
}
