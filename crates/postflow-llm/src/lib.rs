//! Model gateway and LLM backends for postflow.
//!
//! Every provider implements [`LlmBackend`]. Workflow steps never talk to a
//! backend directly; they go through [`Gateway`], which adds prompt layout,
//! structured-output parsing and memoization on top.

mod anthropic_backend;
mod budgeted_backend;
mod cache;
mod gateway;
mod http_client;
mod openrouter_backend;
mod structured;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use anthropic_backend::DEFAULT_ANTHROPIC_MODEL;
pub use budgeted_backend::{BUDGET_ENV_VAR, BudgetedBackend, DEFAULT_BUDGET_LIMIT};
pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use gateway::{Gateway, GatewayOptions, GatewayRequest};
pub use openrouter_backend::DEFAULT_OPENROUTER_MODEL;
pub use postflow_utils::error::LlmError;
pub use structured::OutputSchema;
pub use types::{LlmBackend, LlmFallbackInfo, LlmInvocation, LlmResult, Message, Role};

use anthropic_backend::AnthropicBackend;
use openrouter_backend::OpenRouterBackend;
use postflow_config::Config;
use postflow_prompt_template::KNOWN_PROVIDERS;
use postflow_utils::logging::redact_secrets;
use tracing::{info, warn};

/// Build the budgeted backend for one provider, without fallback.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    let (backend, budget): (Box<dyn LlmBackend>, Option<u32>) = match provider {
        "anthropic" => (
            Box::new(AnthropicBackend::new_from_config(config)?),
            config.llm.anthropic.as_ref().and_then(|a| a.budget),
        ),
        "openrouter" => (
            Box::new(OpenRouterBackend::new_from_config(config)?),
            config.llm.openrouter.as_ref().and_then(|o| o.budget),
        ),
        unknown => {
            return Err(LlmError::Unsupported(format!(
                "Unknown LLM provider '{unknown}'. Supported providers: {}.",
                KNOWN_PROVIDERS.join(", ")
            )));
        }
    };

    Ok(Box::new(BudgetedBackend::with_limit_from_config(
        backend, budget,
    )))
}

/// Build the configured backend; when the primary provider cannot be
/// constructed and a fallback is configured, use the fallback and report it.
///
/// # Errors
///
/// Returns the primary provider's error when it fails and there is no
/// fallback, or when the fallback fails too.
pub fn from_config_with_fallback(
    config: &Config,
) -> Result<(Box<dyn LlmBackend>, Option<LlmFallbackInfo>), LlmError> {
    let provider = config.provider();

    let primary_error = match construct_backend_for_provider(provider, config) {
        Ok(backend) => return Ok((backend, None)),
        Err(e) => e,
    };

    let Some(fallback_provider) = config.llm.fallback_provider.as_deref() else {
        return Err(primary_error);
    };

    let reason = redact_secrets(&primary_error.to_string());
    warn!(
        primary = provider,
        fallback = fallback_provider,
        reason = %reason,
        "Primary provider unavailable, trying fallback"
    );

    match construct_backend_for_provider(fallback_provider, config) {
        Ok(backend) => {
            info!(provider = fallback_provider, "Using fallback provider");
            Ok((
                backend,
                Some(LlmFallbackInfo {
                    primary_provider: provider.to_string(),
                    fallback_provider: fallback_provider.to_string(),
                    reason,
                }),
            ))
        }
        Err(fallback_error) => {
            warn!(
                provider = fallback_provider,
                error = %redact_secrets(&fallback_error.to_string()),
                "Fallback provider failed too"
            );
            Err(primary_error)
        }
    }
}

/// [`from_config_with_fallback`] without the fallback report.
///
/// # Errors
///
/// See [`from_config_with_fallback`].
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    from_config_with_fallback(config).map(|(backend, _)| backend)
}

impl Gateway {
    /// Gateway over the configured backend, with the configured cache.
    ///
    /// # Errors
    ///
    /// See [`from_config_with_fallback`].
    pub fn from_config(config: &Config) -> Result<(Self, Option<LlmFallbackInfo>), LlmError> {
        let (backend, fallback) = from_config_with_fallback(config)?;
        let gateway =
            Gateway::new(backend, GatewayOptions::from_config(config)).with_cache(config.cache_capacity());
        Ok((gateway, fallback))
    }
}

#[cfg(test)]
mod factory_tests {
    use super::*;
    use postflow_config::{AnthropicConfig, OpenRouterConfig};
    use serial_test::serial;

    fn anthropic_key_env(name: &str) -> Option<AnthropicConfig> {
        Some(AnthropicConfig {
            api_key_env: Some(name.to_string()),
            ..AnthropicConfig::default()
        })
    }

    fn openrouter_key_env(name: &str) -> Option<OpenRouterConfig> {
        Some(OpenRouterConfig {
            api_key_env: Some(name.to_string()),
            ..OpenRouterConfig::default()
        })
    }

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let config = Config::minimal_for_testing();
        match construct_backend_for_provider("gemini-cli", &config) {
            Err(LlmError::Unsupported(msg)) => {
                assert!(msg.contains("gemini-cli"));
                assert!(msg.contains("anthropic, openrouter"));
            }
            _ => panic!("expected Unsupported"),
        }
    }

    #[test]
    #[serial]
    fn test_primary_success_reports_no_fallback() {
        let key = "POSTFLOW_TEST_FACTORY_PRIMARY_KEY";
        unsafe {
            std::env::set_var(key, "sk-test");
        }

        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("anthropic".to_string());
        config.llm.anthropic = anthropic_key_env(key);

        let (_, fallback) = from_config_with_fallback(&config).unwrap();
        assert!(fallback.is_none());

        unsafe {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_fallback_used_when_primary_key_missing() {
        let missing = "POSTFLOW_TEST_FACTORY_MISSING_KEY";
        let present = "POSTFLOW_TEST_FACTORY_FALLBACK_KEY";
        unsafe {
            std::env::remove_var(missing);
            std::env::set_var(present, "or-test");
        }

        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("anthropic".to_string());
        config.llm.fallback_provider = Some("openrouter".to_string());
        config.llm.anthropic = anthropic_key_env(missing);
        config.llm.openrouter = openrouter_key_env(present);

        let (_, fallback) = from_config_with_fallback(&config).unwrap();
        let info = fallback.expect("fallback info");
        assert_eq!(info.primary_provider, "anthropic");
        assert_eq!(info.fallback_provider, "openrouter");
        assert!(info.reason.contains(missing));

        unsafe {
            std::env::remove_var(present);
        }
    }

    #[test]
    #[serial]
    fn test_primary_error_returned_when_fallback_also_fails() {
        let missing_a = "POSTFLOW_TEST_FACTORY_MISSING_A";
        let missing_b = "POSTFLOW_TEST_FACTORY_MISSING_B";
        unsafe {
            std::env::remove_var(missing_a);
            std::env::remove_var(missing_b);
        }

        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("anthropic".to_string());
        config.llm.fallback_provider = Some("openrouter".to_string());
        config.llm.anthropic = anthropic_key_env(missing_a);
        config.llm.openrouter = openrouter_key_env(missing_b);

        match from_config(&config) {
            Err(LlmError::Misconfiguration(msg)) => assert!(msg.contains(missing_a)),
            _ => panic!("expected the primary Misconfiguration error"),
        }
    }

    #[test]
    #[serial]
    fn test_gateway_from_config_honours_cache_setting() {
        let key = "POSTFLOW_TEST_FACTORY_GATEWAY_KEY";
        unsafe {
            std::env::set_var(key, "sk-test");
        }

        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("anthropic".to_string());
        config.llm.anthropic = anthropic_key_env(key);
        config.cache.enabled = Some(false);

        let (gateway, _) = Gateway::from_config(&config).unwrap();
        assert!(gateway.cache_stats().is_none());

        config.cache.enabled = Some(true);
        config.cache.capacity = Some(4);
        let (gateway, _) = Gateway::from_config(&config).unwrap();
        assert_eq!(gateway.cache_stats(), Some(CacheStats::default()));

        unsafe {
            std::env::remove_var(key);
        }
    }
}
