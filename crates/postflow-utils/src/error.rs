//! Shared error types with user-facing reporting.
//!
//! Each layer owns a `thiserror` enum. Everything that reaches the CLI also
//! implements [`UserFriendlyError`] so the same error can be rendered as a short
//! message, optional context, and a list of suggested actions.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use crate::lock::LockError;

/// Trait for errors that can be presented to an end user.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;

    /// Render message, context, and suggestions as one block of text.
    fn display_for_user(&self) -> String {
        let mut out = format!("Error: {}", self.user_message());
        if let Some(context) = self.context() {
            out.push_str("\n\n");
            out.push_str(&context);
        }
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                out.push_str("\n  - ");
                out.push_str(&suggestion);
            }
        }
        out
    }
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Workflow,
    ModelGateway,
    FileSystem,
    Concurrency,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Workflow => write!(f, "Workflow"),
            Self::ModelGateway => write!(f, "Model Gateway"),
            Self::FileSystem => write!(f, "File System"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Configuration errors raised while discovering, parsing, or validating config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file exists but could not be read or parsed
    #[error("Invalid configuration file {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    /// A configuration value is out of range or unrecognized
    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    /// Discovery could not run (for example, the working directory is unreadable)
    #[error("Configuration discovery failed: {0}")]
    Discovery(String),
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile { path, .. } => format!("Configuration file '{path}' is invalid"),
            Self::InvalidValue { key, value } => {
                format!("Configuration value '{key}' is invalid: {value}")
            }
            Self::Discovery(msg) => format!("Could not discover configuration: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile { reason, .. } => Some(reason.clone()),
            Self::InvalidValue { .. } => Some(
                "Configuration precedence is: command-line flags, then .postflow/config.toml, then built-in defaults."
                    .to_string(),
            ),
            Self::Discovery(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile { .. } => vec![
                "Check the TOML syntax of the configuration file".to_string(),
                "Run 'postflow config' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => vec![format!(
                "Fix '{key}' in .postflow/config.toml or override it on the command line"
            )],
            Self::Discovery(_) => vec!["Pass an explicit path with --config".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// LLM gateway errors, shared by every backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, malformed response body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::BudgetExceeded { limit, attempted } => {
                format!("LLM budget exceeded: attempted {attempted} calls, limit is {limit}")
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) => {
                Some("Transport errors occur when the LLM provider cannot be reached.".to_string())
            }
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage(_) => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::Timeout { .. } => Some(
                "Timeouts occur when a model call takes longer than the configured limit."
                    .to_string(),
            ),
            Self::BudgetExceeded { .. } => Some(
                "The call budget stops runaway regeneration loops from accruing cost.".to_string(),
            ),
            Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid provider settings.".to_string(),
            ),
            Self::Unsupported(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) | Self::ProviderOutage(_) => vec![
                "Check network connectivity".to_string(),
                "Retry with 'postflow resume'".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Set the API key environment variable named by api_key_env in [llm.<provider>]"
                    .to_string(),
            ],
            Self::ProviderQuota(_) => vec!["Wait and retry with 'postflow resume'".to_string()],
            Self::Timeout { .. } => vec![
                "Increase [defaults] timeout_secs or pass --timeout".to_string(),
                "Retry with 'postflow resume'".to_string(),
            ],
            Self::BudgetExceeded { .. } => vec![
                "Raise [llm.<provider>] budget or POSTFLOW_LLM_BUDGET".to_string(),
            ],
            Self::Misconfiguration(_) | Self::Unsupported(_) => vec![
                "Run 'postflow config' to inspect the effective [llm] settings".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::ModelGateway
    }
}

impl UserFriendlyError for LockError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Only one invocation may work on a session at a time.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            LockError::SessionBusy { .. } => vec![
                "Wait for the other invocation to finish".to_string(),
                "If no other invocation is running, the lock expires after the configured TTL"
                    .to_string(),
            ],
            _ => vec!["Check permissions on the postflow state directory".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_for_user_includes_suggestions() {
        let err = ConfigError::InvalidValue {
            key: "timeout_secs".to_string(),
            value: "must be at least 5".to_string(),
        };
        let rendered = err.display_for_user();
        assert!(rendered.starts_with("Error: Configuration value 'timeout_secs' is invalid"));
        assert!(rendered.contains("Suggestions:"));
        assert!(rendered.contains("timeout_secs"));
    }

    #[test]
    fn test_llm_error_categories() {
        let errors = [
            LlmError::Transport("x".into()),
            LlmError::ProviderAuth("x".into()),
            LlmError::Timeout {
                duration: Duration::from_secs(3),
            },
            LlmError::BudgetExceeded {
                limit: 2,
                attempted: 3,
            },
        ];
        for err in errors {
            assert_eq!(err.category(), ErrorCategory::ModelGateway);
            assert!(!err.user_message().is_empty());
            assert!(!err.suggestions().is_empty());
        }
    }

    #[test]
    fn test_budget_error_message() {
        let err = LlmError::BudgetExceeded {
            limit: 20,
            attempted: 21,
        };
        assert_eq!(
            err.to_string(),
            "Budget exceeded: attempted 21 calls, limit is 20"
        );
    }
}
