//! The model gateway used by workflow steps.
//!
//! A step hands the gateway one prompt and, optionally, an output schema. The
//! gateway lays the prompt out for the configured template, invokes the
//! backend, extracts the declared field, and memoizes the answer.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use postflow_config::Config;
use postflow_prompt_template::{PromptLayout, PromptTemplate};
use tracing::debug;

use crate::LlmError;
use crate::cache::{CacheKey, CacheStats, ResponseCache};
use crate::structured::OutputSchema;
use crate::types::{LlmBackend, LlmInvocation, Message};

/// Per-call settings shared by every request issued through one gateway.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Empty means the backend's default model
    pub model: String,
    pub timeout: Duration,
    pub template: PromptTemplate,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            timeout: Duration::from_secs(postflow_config::DEFAULT_TIMEOUT_SECS),
            template: PromptTemplate::default(),
        }
    }
}

impl GatewayOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.defaults.model.clone().unwrap_or_default(),
            timeout: config.timeout(),
            template: config.prompt_template(),
        }
    }
}

/// One prompt for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub step: String,
    pub prompt: String,
    pub schema: Option<OutputSchema>,
    /// Extra cache-key input; requests differing only in salt never share an answer
    pub cache_salt: Option<String>,
    pub session_id: String,
}

impl GatewayRequest {
    #[must_use]
    pub fn new(step: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            prompt: prompt.into(),
            schema: None,
            cache_salt: None,
            session_id: String::new(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_cache_salt(mut self, salt: impl Into<String>) -> Self {
        self.cache_salt = Some(salt.into());
        self
    }

    #[must_use]
    pub fn for_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    fn cache_key(&self) -> CacheKey {
        let schema = self.schema.as_ref().map(OutputSchema::fingerprint);
        CacheKey::new(
            &self.step,
            schema.as_deref(),
            &self.prompt,
            self.cache_salt.as_deref(),
        )
    }
}

pub struct Gateway {
    backend: Box<dyn LlmBackend>,
    options: GatewayOptions,
    cache: Option<Mutex<ResponseCache>>,
}

impl Gateway {
    /// A gateway without a response cache.
    #[must_use]
    pub fn new(backend: Box<dyn LlmBackend>, options: GatewayOptions) -> Self {
        Self {
            backend,
            options,
            cache: None,
        }
    }

    /// Enable memoization with room for `capacity` answers; `None` disables it.
    #[must_use]
    pub fn with_cache(mut self, capacity: Option<usize>) -> Self {
        self.cache = capacity.map(|c| Mutex::new(ResponseCache::new(c)));
        self
    }

    #[must_use]
    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Cache statistics, or `None` when caching is off.
    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| *lock(c).stats())
    }

    /// Send `request` and return the reply text, or the declared field when
    /// the request carries a schema.
    ///
    /// # Errors
    ///
    /// Backend failures propagate unchanged. Malformed structured replies are
    /// not errors; see [`OutputSchema::parse_field`].
    pub async fn invoke(&self, request: &GatewayRequest) -> Result<String, LlmError> {
        let key = request.cache_key();
        if let Some(cache) = &self.cache
            && let Some(hit) = lock(cache).get(&key)
        {
            debug!(step = %request.step, key = key.as_str(), "Gateway cache hit");
            return Ok(hit);
        }

        let instruction = request.schema.as_ref().map(OutputSchema::format_instruction);
        let layout = self
            .options
            .template
            .layout(&request.prompt, instruction.as_deref());

        let invocation = LlmInvocation::new(
            request.session_id.clone(),
            request.step.clone(),
            self.options.model.clone(),
            self.options.timeout,
            layout_messages(layout),
        );

        let started = Instant::now();
        let result = self.backend.invoke(invocation).await?;
        debug!(
            step = %request.step,
            provider = %result.provider,
            model = %result.model_used,
            duration_ms = started.elapsed().as_millis() as u64,
            "Gateway call completed"
        );

        let answer = match &request.schema {
            Some(schema) => schema.parse_field(&result.raw_response),
            None => result.raw_response.trim().to_string(),
        };

        if let Some(cache) = &self.cache {
            lock(cache).insert(key, answer.clone());
        }

        Ok(answer)
    }
}

fn lock(cache: &Mutex<ResponseCache>) -> MutexGuard<'_, ResponseCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

fn layout_messages(layout: PromptLayout) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = layout.system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(layout.user));
    messages
}
