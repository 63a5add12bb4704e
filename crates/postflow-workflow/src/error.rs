use postflow_llm::LlmError;
use postflow_utils::error::{ErrorCategory, LockError, UserFriendlyError};
use postflow_utils::exit_codes::ExitCode;
use thiserror::Error;

use crate::graph::StepId;

/// Checkpoint store failures
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Invalid session id '{0}': use letters, digits, '-', '_' and '.' (max 128 characters)")]
    InvalidSession(String),

    #[error("Checkpoint I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Checkpoint {path} is unreadable: {reason}")]
    Corrupt { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A step ran without its precondition; the run is aborted.
    #[error("Step '{step}' cannot run: {reason}")]
    ContractViolation { step: StepId, reason: String },

    #[error("Invalid workflow parameters: {0}")]
    InvalidParameters(String),

    #[error("Session '{session}' cannot accept this request: {reason}")]
    InvalidInteraction { session: String, reason: String },

    #[error("No checkpoint exists for session '{0}'")]
    UnknownSession(String),

    #[error("Model call failed during '{step}': {source}")]
    Gateway {
        step: StepId,
        #[source]
        source: LlmError,
    },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl WorkflowError {
    pub(crate) fn contract(step: StepId, reason: impl Into<String>) -> Self {
        WorkflowError::ContractViolation {
            step,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            WorkflowError::ContractViolation { .. } | WorkflowError::InvalidInteraction { .. } => {
                ExitCode::CONTRACT_VIOLATION
            }
            WorkflowError::InvalidParameters(_) | WorkflowError::UnknownSession(_) => ExitCode::CONFIG,
            WorkflowError::Gateway { source, .. } => ExitCode::from(source),
            WorkflowError::Checkpoint(CheckpointError::InvalidSession(_)) => ExitCode::CONFIG,
            WorkflowError::Checkpoint(_) => ExitCode::CHECKPOINT_IO,
            WorkflowError::Lock(e) => ExitCode::from(e),
        }
    }
}

impl UserFriendlyError for CheckpointError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            CheckpointError::Corrupt { .. } => {
                Some("The session file exists but does not contain a valid checkpoint.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            CheckpointError::InvalidSession(_) => {
                vec!["Choose a session name such as 'launch-post' or 'q3_update'".to_string()]
            }
            CheckpointError::Io { .. } => vec![
                "Check permissions on the checkpoint directory".to_string(),
                "Set POSTFLOW_HOME or [checkpoint] dir to a writable location".to_string(),
            ],
            CheckpointError::Corrupt { .. } => {
                vec!["Run 'postflow reset' for this session to start over".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            CheckpointError::InvalidSession(_) => ErrorCategory::Validation,
            _ => ErrorCategory::FileSystem,
        }
    }
}

impl UserFriendlyError for WorkflowError {
    fn user_message(&self) -> String {
        match self {
            WorkflowError::Gateway { step, source } => {
                format!("Model call failed during '{step}': {}", source.user_message())
            }
            WorkflowError::Checkpoint(e) => e.user_message(),
            WorkflowError::Lock(e) => e.user_message(),
            _ => self.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            WorkflowError::ContractViolation { .. } => Some(
                "The run was aborted; the last checkpoint still holds the state before this step."
                    .to_string(),
            ),
            WorkflowError::Gateway { source, .. } => source.context(),
            WorkflowError::Checkpoint(e) => e.context(),
            WorkflowError::Lock(e) => e.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            WorkflowError::ContractViolation { .. } => {
                vec!["Start a new run with 'postflow start'".to_string()]
            }
            WorkflowError::InvalidParameters(_) => {
                vec!["Pick at most 3 tones and at most 3 audiences".to_string()]
            }
            WorkflowError::InvalidInteraction { .. } => vec![
                "Use 'postflow show' to see where the session stands".to_string(),
                "Use 'postflow resume' to continue an interrupted run".to_string(),
            ],
            WorkflowError::UnknownSession(_) => {
                vec!["Start the session first with 'postflow start'".to_string()]
            }
            WorkflowError::Gateway { source, .. } => {
                let mut suggestions = source.suggestions();
                suggestions.push("Run 'postflow resume' to retry the failed step".to_string());
                suggestions
            }
            WorkflowError::Checkpoint(e) => e.suggestions(),
            WorkflowError::Lock(e) => e.suggestions(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            WorkflowError::ContractViolation { .. }
            | WorkflowError::InvalidInteraction { .. }
            | WorkflowError::UnknownSession(_) => ErrorCategory::Workflow,
            WorkflowError::InvalidParameters(_) => ErrorCategory::Validation,
            WorkflowError::Gateway { .. } => ErrorCategory::ModelGateway,
            WorkflowError::Checkpoint(e) => e.category(),
            WorkflowError::Lock(e) => e.category(),
        }
    }
}
