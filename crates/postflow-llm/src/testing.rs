//! Deterministic backend for tests.
//!
//! `ScriptedBackend` answers by step name. Each step has a queue of one-shot
//! replies and an optional standing reply used once the queue is drained.
//! Every invocation is recorded so tests can assert on prompts and call counts.

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Result<String, LlmError>>>,
    standing: HashMap<String, String>,
    calls: Vec<LlmInvocation>,
}

/// Cloneable handle; clones share the same script and call log.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread must not hide the call log from the others.
        self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue a one-shot reply for `step`.
    #[must_use]
    pub fn reply(self, step: &str, text: impl Into<String>) -> Self {
        self.lock()
            .queued
            .entry(step.to_string())
            .or_default()
            .push_back(Ok(text.into()));
        self
    }

    /// Reply with `text` whenever `step` has no queued reply left.
    #[must_use]
    pub fn always(self, step: &str, text: impl Into<String>) -> Self {
        self.lock().standing.insert(step.to_string(), text.into());
        self
    }

    /// Queue a one-shot failure for `step`.
    #[must_use]
    pub fn fail(self, step: &str, error: LlmError) -> Self {
        self.lock()
            .queued
            .entry(step.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    /// All invocations so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<LlmInvocation> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of invocations issued for `step`.
    #[must_use]
    pub fn calls_for(&self, step: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.step == step).count()
    }

    /// Text of the last user message sent for `step`, if any.
    #[must_use]
    pub fn last_prompt(&self, step: &str) -> Option<String> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|c| c.step == step)
            .and_then(|c| c.messages.last())
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let mut script = self.lock();
        let step = inv.step.clone();
        let model = inv.model.clone();
        script.calls.push(inv);

        let next = script.queued.get_mut(&step).and_then(VecDeque::pop_front);
        let reply = match next {
            Some(reply) => reply,
            None => script.standing.get(&step).cloned().ok_or_else(|| {
                LlmError::Unsupported(format!("no scripted response for step '{step}'"))
            }),
        }?;

        Ok(LlmResult::new(reply, "scripted", model))
    }
}
