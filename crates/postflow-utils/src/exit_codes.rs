//! Process exit codes.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CONFIG` | Invalid CLI arguments or configuration |
//! | 3 | `CONTRACT_VIOLATION` | A step ran without its precondition, or the interaction was not allowed |
//! | 9 | `LOCK_HELD` | Another invocation holds the session lock |
//! | 70 | `GATEWAY_FAILURE` | The model gateway failed |
//! | 74 | `CHECKPOINT_IO` | The checkpoint could not be read or written |

use crate::error::{ConfigError, LlmError, LockError};

/// Stable process exit code.
///
/// ```rust
/// use postflow_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(70), ExitCode::GATEWAY_FAILURE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Configuration or CLI argument error
    pub const CONFIG: ExitCode = ExitCode(2);

    /// Contract violation - missing precondition or disallowed interaction
    pub const CONTRACT_VIOLATION: ExitCode = ExitCode(3);

    /// Lock held - another invocation is working on the same session
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// Gateway failure - the model call failed after retries
    pub const GATEWAY_FAILURE: ExitCode = ExitCode(70);

    /// Checkpoint read/write failure
    pub const CHECKPOINT_IO: ExitCode = ExitCode(74);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(_: &ConfigError) -> Self {
        ExitCode::CONFIG
    }
}

impl From<&LlmError> for ExitCode {
    fn from(err: &LlmError) -> Self {
        match err {
            LlmError::Misconfiguration(_) | LlmError::Unsupported(_) => ExitCode::CONFIG,
            _ => ExitCode::GATEWAY_FAILURE,
        }
    }
}

impl From<&LockError> for ExitCode {
    fn from(err: &LockError) -> Self {
        match err {
            LockError::SessionBusy { .. } => ExitCode::LOCK_HELD,
            LockError::Io { .. } | LockError::Corrupted { .. } => ExitCode::CHECKPOINT_IO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_code_values_are_stable() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CONFIG.as_i32(), 2);
        assert_eq!(ExitCode::CONTRACT_VIOLATION.as_i32(), 3);
        assert_eq!(ExitCode::LOCK_HELD.as_i32(), 9);
        assert_eq!(ExitCode::GATEWAY_FAILURE.as_i32(), 70);
        assert_eq!(ExitCode::CHECKPOINT_IO.as_i32(), 74);
    }

    #[test]
    fn test_llm_error_mapping() {
        let timeout = LlmError::Timeout {
            duration: Duration::from_secs(1),
        };
        assert_eq!(ExitCode::from(&timeout), ExitCode::GATEWAY_FAILURE);

        let misconfig = LlmError::Misconfiguration("no key".into());
        assert_eq!(ExitCode::from(&misconfig), ExitCode::CONFIG);
    }

    #[test]
    fn test_lock_error_mapping() {
        let busy = LockError::SessionBusy {
            session: "s1".into(),
            pid: 42,
            age_secs: 3,
        };
        assert_eq!(ExitCode::from(&busy), ExitCode::LOCK_HELD);
    }

    #[test]
    fn test_round_trip_i32() {
        let code: i32 = ExitCode::CHECKPOINT_IO.into();
        assert_eq!(ExitCode::from(code), ExitCode::CHECKPOINT_IO);
    }
}
