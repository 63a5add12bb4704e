//! Top-level error for the CLI and embedders.

use postflow_utils::error::{ConfigError, ErrorCategory, LlmError, UserFriendlyError};
use postflow_utils::exit_codes::ExitCode;
use postflow_workflow::WorkflowError;
use thiserror::Error;

/// Every failure the CLI can report, with its exit code.
///
/// Library code returns `PostflowError` and never exits the process.
#[derive(Debug, Error)]
pub enum PostflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Output error: {0}")]
    Output(String),
}

impl PostflowError {
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            PostflowError::Config(e) => ExitCode::from(e),
            PostflowError::Llm(e) => ExitCode::from(e),
            PostflowError::Workflow(e) => e.exit_code(),
            PostflowError::Output(_) => ExitCode::INTERNAL,
        }
    }
}

impl UserFriendlyError for PostflowError {
    fn user_message(&self) -> String {
        match self {
            PostflowError::Config(e) => e.user_message(),
            PostflowError::Llm(e) => e.user_message(),
            PostflowError::Workflow(e) => e.user_message(),
            PostflowError::Output(msg) => format!("Could not write output: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            PostflowError::Config(e) => e.context(),
            PostflowError::Llm(e) => e.context(),
            PostflowError::Workflow(e) => e.context(),
            PostflowError::Output(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            PostflowError::Config(e) => e.suggestions(),
            PostflowError::Llm(e) => e.suggestions(),
            PostflowError::Workflow(e) => e.suggestions(),
            PostflowError::Output(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            PostflowError::Config(e) => e.category(),
            PostflowError::Llm(e) => e.category(),
            PostflowError::Workflow(e) => e.category(),
            PostflowError::Output(_) => ErrorCategory::FileSystem,
        }
    }
}
