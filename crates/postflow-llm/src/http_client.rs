//! Shared HTTP plumbing for the HTTP providers.
//!
//! One `reqwest::Client` per backend, a per-request timeout capped by a global
//! maximum, and a small retry loop for server errors and network failures.
//! Client errors (4xx) are never retried.

use postflow_utils::logging::redact_secrets;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::LlmError;
use crate::types::LlmInvocation;

const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries after the first attempt, for 5xx and network failures
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Client,
    max_timeout: Duration,
    backoff: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_timeout,
            backoff: INITIAL_BACKOFF,
        })
    }

    /// A request builder bound to this client's connection pool.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Send `request_builder`, retrying 5xx and network failures with linear
    /// backoff (1s, 2s).
    ///
    /// Errors map as: 401/403 → `ProviderAuth`, 429 → `ProviderQuota`, other
    /// 4xx → `Transport`, 5xx after retries → `ProviderOutage`, elapsed
    /// deadline → `Timeout`, network failure after retries → `Transport`.
    pub async fn execute_with_retry(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider: &str,
    ) -> Result<Response, LlmError> {
        let effective_timeout = request_timeout.min(self.max_timeout);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| LlmError::Transport("Failed to clone request for retry".to_string()))?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| LlmError::Transport(format!("Failed to build request: {e}")))?;

            debug!(
                provider,
                attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            let failure = match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_client_error() {
                        return Err(map_client_error(status, provider));
                    }
                    if !status.is_server_error() {
                        return Ok(response);
                    }
                    LlmError::ProviderOutage(format!("{provider} returned server error: {status}"))
                }
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout {
                        duration: effective_timeout,
                    });
                }
                Err(e) => LlmError::Transport(format!(
                    "{provider} request failed: {}",
                    redact_secrets(&e.to_string())
                )),
            };

            if attempt > MAX_RETRIES {
                return Err(failure);
            }

            warn!(provider, attempt, error = %failure, "Request failed, will retry");
            tokio::time::sleep(self.backoff * attempt).await;
        }
    }
}

/// Sampling parameters shared by the HTTP backends
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        // Posts are short; 1024 tokens leaves room for the revision prompt's output.
        Self {
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl HttpParams {
    /// Per-invocation overrides from `metadata["max_tokens"]` and `metadata["temperature"]`.
    pub fn resolve(&self, inv: &LlmInvocation) -> Self {
        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(self.max_tokens);

        let temperature = inv
            .metadata
            .get("temperature")
            .and_then(serde_json::Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(self.temperature);

        Self {
            max_tokens,
            temperature,
        }
    }
}

/// Read an API key from `env_name`, or explain which variable is missing.
pub(crate) fn api_key_from_env(env_name: &str, provider: &str, section: &str) -> Result<String, LlmError> {
    match std::env::var(env_name) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::Misconfiguration(format!(
            "{provider} API key not found in environment variable '{env_name}'. \
             Set this variable or configure a different api_key_env in [{section}]."
        ))),
    }
}

fn map_client_error(status: StatusCode, provider: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::ProviderAuth(format!("{provider} authentication failed: {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::ProviderQuota(format!("{provider} rate limit exceeded: {status}"))
        }
        _ => LlmError::Transport(format!("{provider} returned client error: {status}")),
    }
}
