use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ConfigSource;

/// Default per-call model timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default number of memoized gateway responses
pub const DEFAULT_CACHE_CAPACITY: usize = 128;
/// Default session id when none is given
pub const DEFAULT_SESSION: &str = "default";
/// Default provider when neither CLI, env, nor file choose one
pub const DEFAULT_PROVIDER: &str = "anthropic";

/// Configuration for postflow.
///
/// Precedence: CLI arguments > environment (provider only) > config file >
/// built-in defaults. Use [`Config::discover()`] for CLI behavior.
///
/// ```toml
/// [defaults]
/// model = "claude-sonnet-4-5"
/// timeout_secs = 120
/// session = "default"
///
/// [llm]
/// provider = "anthropic"
/// fallback_provider = "openrouter"
/// prompt_template = "default"
///
/// [llm.anthropic]
/// api_key_env = "ANTHROPIC_API_KEY"
/// max_tokens = 1024
///
/// [cache]
/// enabled = true
/// capacity = 128
///
/// [checkpoint]
/// lock_ttl_seconds = 900
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub checkpoint: CheckpointConfig,
    /// Source attribution for each setting (for `postflow config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Model name; each provider has its own fallback when unset.
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub verbose: Option<bool>,
    pub session: Option<String>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub fallback_provider: Option<String>,
    /// "default", "claude-optimized", or "openai-compatible"
    pub prompt_template: Option<String>,
    pub anthropic: Option<AnthropicConfig>,
    pub openrouter: Option<OpenRouterConfig>,
}

/// Anthropic Messages API configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnthropicConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub budget: Option<u32>,
}

/// OpenRouter (OpenAI-compatible) configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub budget: Option<u32>,
}

/// In-process response cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub enabled: Option<bool>,
    pub capacity: Option<usize>,
}

/// Session checkpoint storage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckpointConfig {
    /// Directory for session files; defaults to `<POSTFLOW_HOME>/sessions`.
    pub dir: Option<String>,
    pub lock_ttl_seconds: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: None,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            verbose: Some(false),
            session: Some(DEFAULT_SESSION.to_string()),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            capacity: Some(DEFAULT_CACHE_CAPACITY),
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: None,
            lock_ttl_seconds: Some(postflow_utils::lock::DEFAULT_LOCK_TTL_SECS),
        }
    }
}
