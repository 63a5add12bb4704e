use postflow_prompt_template::{KNOWN_PROVIDERS, PromptTemplate};
use postflow_utils::error::ConfigError;
use postflow_utils::paths::is_valid_session_id;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.defaults.timeout_secs {
            if timeout < 5 {
                return Err(invalid("timeout_secs", "must be at least 5 seconds"));
            }
            if timeout > 3600 {
                return Err(invalid(
                    "timeout_secs",
                    "exceeds maximum limit of 3600 seconds (1 hour)",
                ));
            }
        }

        if let Some(session) = &self.defaults.session
            && !is_valid_session_id(session)
        {
            return Err(invalid(
                "session",
                format!("'{session}' may only contain letters, digits, '-', '_' and '.'"),
            ));
        }

        let provider = self.provider();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(invalid(
                "llm_provider",
                format!(
                    "'{provider}' is not supported. Supported providers: {}",
                    KNOWN_PROVIDERS.join(", ")
                ),
            ));
        }

        if let Some(fallback) = &self.llm.fallback_provider {
            if !KNOWN_PROVIDERS.contains(&fallback.as_str()) {
                return Err(invalid(
                    "llm_fallback_provider",
                    format!(
                        "'{fallback}' is not supported. Supported providers: {}",
                        KNOWN_PROVIDERS.join(", ")
                    ),
                ));
            }
            if fallback == provider {
                return Err(invalid(
                    "llm_fallback_provider",
                    "must differ from the primary provider",
                ));
            }
        }

        if let Some(name) = &self.llm.prompt_template {
            let template =
                PromptTemplate::parse(name).map_err(|e| invalid("prompt_template", e.to_string()))?;
            template
                .validate_provider_compatibility(provider)
                .map_err(|e| invalid("prompt_template", e.to_string()))?;
        }

        if let Some(anthropic) = &self.llm.anthropic {
            validate_sampling("llm.anthropic", anthropic.max_tokens, anthropic.temperature)?;
            validate_budget("llm.anthropic.budget", anthropic.budget)?;
        }
        if let Some(openrouter) = &self.llm.openrouter {
            validate_sampling("llm.openrouter", openrouter.max_tokens, openrouter.temperature)?;
            validate_budget("llm.openrouter.budget", openrouter.budget)?;
        }

        if self.cache.enabled.unwrap_or(true)
            && let Some(capacity) = self.cache.capacity
        {
            if capacity == 0 {
                return Err(invalid("cache_capacity", "must be at least 1 when the cache is enabled"));
            }
            if capacity > 100_000 {
                return Err(invalid("cache_capacity", "exceeds maximum limit of 100,000"));
            }
        }

        if let Some(ttl) = self.checkpoint.lock_ttl_seconds {
            if ttl < 60 {
                return Err(invalid("lock_ttl_seconds", "must be at least 60 seconds (1 minute)"));
            }
            if ttl > 86_400 {
                return Err(invalid(
                    "lock_ttl_seconds",
                    "exceeds maximum limit of 86400 seconds (24 hours)",
                ));
            }
        }

        Ok(())
    }
}

fn validate_sampling(
    section: &str,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
) -> Result<(), ConfigError> {
    if max_tokens == Some(0) {
        return Err(invalid(&format!("{section}.max_tokens"), "must be greater than 0"));
    }
    if let Some(t) = temperature
        && !(0.0..=2.0).contains(&t)
    {
        return Err(invalid(
            &format!("{section}.temperature"),
            format!("{t} is outside the range 0.0 to 2.0"),
        ));
    }
    Ok(())
}

fn validate_budget(key: &str, budget: Option<u32>) -> Result<(), ConfigError> {
    if budget == Some(0) {
        return Err(invalid(key, "must be greater than 0"));
    }
    Ok(())
}
