//! Drives the step graph and checkpoints after every step.
//!
//! One call to [`Orchestrator::run`] is one invocation: it takes the session
//! lock, restores the checkpoint, executes steps until the run pauses for
//! feedback or reaches a terminal step, and saves the state after each step.
//! A failed step aborts the invocation; the last saved cursor still points at
//! that step, so `Interaction::Resume` retries it.

use postflow_llm::Gateway;
use postflow_utils::logging::{log_step_complete, log_step_error, log_step_start, step_span};
use postflow_utils::paths::is_valid_session_id;
use std::time::Instant;
use tracing::{Instrument, info};

use crate::checkpoint::{Checkpoint, CheckpointStore, Cursor, RunStatus};
use crate::error::{CheckpointError, WorkflowError};
use crate::graph::{ENTRY, Next, StepId, next_step, route};
use crate::prompts;
use crate::state::{ChatEntry, WorkflowParams, WorkflowState};
use crate::steps::run_step;

/// What the caller asks of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// Fresh run; replaces any earlier checkpoint for the session.
    Start(WorkflowParams),
    /// Human feedback on the latest draft.
    Feedback(String),
    /// Continue an invocation that stopped mid-run.
    Resume,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: WorkflowState,
    pub cursor: Cursor,
    /// Steps executed by this invocation, in order.
    pub steps_run: Vec<StepId>,
}

impl RunOutcome {
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.cursor.status
    }
}

pub struct Orchestrator {
    gateway: Gateway,
    store: Box<dyn CheckpointStore>,
    user_echo: bool,
}

impl Orchestrator {
    #[must_use]
    pub fn new(gateway: Gateway, store: Box<dyn CheckpointStore>) -> Self {
        Self {
            gateway,
            store,
            user_echo: false,
        }
    }

    /// Record what the user typed as user-authored chat entries.
    #[must_use]
    pub fn with_user_echo(mut self, enabled: bool) -> Self {
        self.user_echo = enabled;
        self
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Run one invocation for `session`.
    ///
    /// # Errors
    ///
    /// Fails when the session is locked by another invocation, when the
    /// interaction does not fit the checkpointed status, when a step's
    /// precondition is unmet, or when a model call or checkpoint write fails.
    pub async fn run(
        &self,
        session: &str,
        interaction: Interaction,
    ) -> Result<RunOutcome, WorkflowError> {
        check_session(session)?;
        let _guard = self.store.lock_session(session)?;
        let existing = self.store.load(session)?;

        let (state, first) = match interaction {
            Interaction::Start(params) => {
                if existing.is_some() {
                    info!(session, "Replacing existing checkpoint with a fresh run");
                }
                let mut state = WorkflowState::new(params);
                if self.user_echo {
                    state.push_entry(ChatEntry::user(prompts::start_echo(&state)));
                }
                (state, ENTRY)
            }
            Interaction::Feedback(feedback) => {
                let checkpoint =
                    existing.ok_or_else(|| WorkflowError::UnknownSession(session.to_string()))?;
                let accepts = match checkpoint.cursor.status {
                    RunStatus::AwaitingFeedback => true,
                    RunStatus::Completed => !checkpoint.state.drafts().is_empty(),
                    RunStatus::Running => false,
                };
                if !accepts {
                    return Err(invalid(session, feedback_refusal(&checkpoint)));
                }
                let mut state = checkpoint.state;
                if self.user_echo {
                    state.push_entry(ChatEntry::user(feedback.clone()));
                }
                state.set_feedback(feedback);
                (state, StepId::CollectFeedback)
            }
            Interaction::Resume => {
                let checkpoint =
                    existing.ok_or_else(|| WorkflowError::UnknownSession(session.to_string()))?;
                match checkpoint.cursor {
                    Cursor {
                        status: RunStatus::Running,
                        next: Some(next),
                    } => (checkpoint.state, next),
                    Cursor {
                        status: RunStatus::AwaitingFeedback,
                        ..
                    } => {
                        return Err(invalid(
                            session,
                            "the run is waiting for feedback; send feedback instead",
                        ));
                    }
                    _ => return Err(invalid(session, "the run has already completed")),
                }
            }
        };

        // The cursor is saved before the first step so a failure there is resumable.
        self.save(session, &state, Cursor::running(first))?;
        self.drive(session, state, first).await
    }

    /// Latest checkpoint for `session`, if any.
    ///
    /// # Errors
    ///
    /// Fails on an invalid session id or an unreadable checkpoint.
    pub fn load(&self, session: &str) -> Result<Option<Checkpoint>, WorkflowError> {
        check_session(session)?;
        Ok(self.store.load(session)?)
    }

    /// Delete the checkpoint for `session`; returns whether one existed.
    ///
    /// # Errors
    ///
    /// Fails when the session is locked or the checkpoint cannot be removed.
    pub fn reset(&self, session: &str) -> Result<bool, WorkflowError> {
        check_session(session)?;
        let _guard = self.store.lock_session(session)?;
        let removed = self.store.delete(session)?;
        if removed {
            info!(session, "Checkpoint removed");
        }
        Ok(removed)
    }

    async fn drive(
        &self,
        session: &str,
        mut state: WorkflowState,
        first: StepId,
    ) -> Result<RunOutcome, WorkflowError> {
        let mut steps_run = Vec::new();
        let mut step = first;

        loop {
            log_step_start(session, step.as_str());
            let started = Instant::now();
            let result = run_step(step, &mut state, &self.gateway, session)
                .instrument(step_span(session, step.as_str()))
                .await;
            let elapsed_ms = started.elapsed().as_millis();

            if let Err(err) = result {
                log_step_error(session, step.as_str(), &err.to_string(), elapsed_ms);
                return Err(err);
            }
            log_step_complete(session, step.as_str(), elapsed_ms);
            steps_run.push(step);

            let cursor = match next_step(step, route(step, &state)) {
                Next::End => Cursor::completed(),
                Next::Step(next) if next.interrupts_before() => Cursor {
                    status: RunStatus::AwaitingFeedback,
                    next: Some(next),
                },
                Next::Step(next) => Cursor::running(next),
            };
            self.save(session, &state, cursor)?;

            match cursor {
                Cursor {
                    status: RunStatus::Running,
                    next: Some(next),
                } => step = next,
                _ => {
                    info!(
                        session,
                        status = ?cursor.status,
                        steps = steps_run.len(),
                        "Invocation finished"
                    );
                    return Ok(RunOutcome {
                        state,
                        cursor,
                        steps_run,
                    });
                }
            }
        }
    }

    fn save(&self, session: &str, state: &WorkflowState, cursor: Cursor) -> Result<(), WorkflowError> {
        self.store
            .save(&Checkpoint::new(session, state.clone(), cursor))?;
        Ok(())
    }
}

fn check_session(session: &str) -> Result<(), WorkflowError> {
    if is_valid_session_id(session) {
        Ok(())
    } else {
        Err(CheckpointError::InvalidSession(session.to_string()).into())
    }
}

fn invalid(session: &str, reason: impl Into<String>) -> WorkflowError {
    WorkflowError::InvalidInteraction {
        session: session.to_string(),
        reason: reason.into(),
    }
}

fn feedback_refusal(checkpoint: &Checkpoint) -> &'static str {
    match checkpoint.cursor.status {
        RunStatus::Running => "the run was interrupted mid-step; resume it first",
        _ => "the run ended without producing a draft",
    }
}
