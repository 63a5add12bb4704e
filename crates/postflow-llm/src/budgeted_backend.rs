//! Call ceiling for a backend.
//!
//! The budget counts attempts, not successes: a failed call still consumes a
//! slot, so a misbehaving provider cannot drive an unbounded number of calls
//! (for example through the draft regeneration loop).

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Default number of model calls per process
pub const DEFAULT_BUDGET_LIMIT: u32 = 20;

/// Overrides the configured budget when set to a valid integer
pub const BUDGET_ENV_VAR: &str = "POSTFLOW_LLM_BUDGET";

pub struct BudgetedBackend {
    inner: Box<dyn LlmBackend>,
    calls: AtomicU32,
    limit: u32,
}

impl BudgetedBackend {
    #[must_use]
    pub fn new(inner: Box<dyn LlmBackend>, limit: u32) -> Self {
        debug!(limit, "Creating BudgetedBackend");
        Self {
            inner,
            calls: AtomicU32::new(0),
            limit,
        }
    }

    /// Limit precedence: `POSTFLOW_LLM_BUDGET` > `config_budget` > 20.
    #[must_use]
    pub fn with_limit_from_config(inner: Box<dyn LlmBackend>, config_budget: Option<u32>) -> Self {
        let env_budget = std::env::var(BUDGET_ENV_VAR)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());

        let (limit, source) = match (env_budget, config_budget) {
            (Some(limit), _) => (limit, "env"),
            (None, Some(limit)) => (limit, "config"),
            (None, None) => (DEFAULT_BUDGET_LIMIT, "default"),
        };
        debug!(limit, source, "Resolved model call budget");

        Self::new(inner, limit)
    }

    /// Attempts made so far, including refused ones.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        // Count before the call so failures consume the slot too.
        let current = self.calls.fetch_add(1, Ordering::SeqCst);

        if current >= self.limit {
            let attempted = current + 1;
            warn!(limit = self.limit, attempted, step = %inv.step, "Model call budget exceeded");
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }

        let result = self.inner.invoke(inv).await;

        if let Err(e) = &result {
            debug!(
                call_count = current + 1,
                limit = self.limit,
                error = %e,
                "Inner backend failed; budget slot still consumed"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use crate::types::Message;
    use serial_test::serial;
    use std::time::Duration;

    fn inv() -> LlmInvocation {
        LlmInvocation::new(
            "s1",
            "generate-draft",
            "",
            Duration::from_secs(5),
            vec![Message::user("write")],
        )
    }

    fn ok_backend() -> Box<dyn LlmBackend> {
        Box::new(ScriptedBackend::new().always("generate-draft", "post"))
    }

    #[tokio::test]
    async fn test_budget_refuses_call_past_limit() {
        let backend = BudgetedBackend::new(ok_backend(), 2);

        backend.invoke(inv()).await.unwrap();
        backend.invoke(inv()).await.unwrap();

        match backend.invoke(inv()).await {
            Err(LlmError::BudgetExceeded { limit, attempted }) => {
                assert_eq!(limit, 2);
                assert_eq!(attempted, 3);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_calls_consume_budget() {
        let scripted = ScriptedBackend::new()
            .fail("generate-draft", LlmError::Transport("reset".to_string()))
            .always("generate-draft", "post");
        let handle = scripted.clone();
        let backend = BudgetedBackend::new(Box::new(scripted), 1);

        assert!(matches!(
            backend.invoke(inv()).await,
            Err(LlmError::Transport(_))
        ));
        assert!(matches!(
            backend.invoke(inv()).await,
            Err(LlmError::BudgetExceeded { .. })
        ));
        // The refused call never reached the provider.
        assert_eq!(handle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_refuses_first_call() {
        let backend = BudgetedBackend::new(ok_backend(), 0);
        assert!(matches!(
            backend.invoke(inv()).await,
            Err(LlmError::BudgetExceeded {
                limit: 0,
                attempted: 1
            })
        ));
    }

    #[test]
    #[serial]
    fn test_limit_precedence() {
        unsafe {
            std::env::remove_var(BUDGET_ENV_VAR);
        }
        assert_eq!(
            BudgetedBackend::with_limit_from_config(ok_backend(), None).limit(),
            DEFAULT_BUDGET_LIMIT
        );
        assert_eq!(
            BudgetedBackend::with_limit_from_config(ok_backend(), Some(7)).limit(),
            7
        );

        unsafe {
            std::env::set_var(BUDGET_ENV_VAR, "3");
        }
        assert_eq!(
            BudgetedBackend::with_limit_from_config(ok_backend(), Some(7)).limit(),
            3
        );

        unsafe {
            std::env::set_var(BUDGET_ENV_VAR, "lots");
        }
        assert_eq!(
            BudgetedBackend::with_limit_from_config(ok_backend(), Some(7)).limit(),
            7
        );

        unsafe {
            std::env::remove_var(BUDGET_ENV_VAR);
        }
    }
}
