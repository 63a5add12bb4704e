//! Configuration management for postflow
//!
//! Hierarchical configuration with discovery and precedence: CLI > env > file >
//! defaults. The TOML file has `[defaults]`, `[llm]`, `[cache]`, and
//! `[checkpoint]` sections.

mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use cli_args::CliArgs;
pub use model::*;
pub use sources::ConfigSource;

use camino::Utf8PathBuf;
use postflow_prompt_template::PromptTemplate;
use std::time::Duration;

impl Config {
    /// Active provider name.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Prompt template; validation guarantees a configured name parses.
    #[must_use]
    pub fn prompt_template(&self) -> PromptTemplate {
        self.llm
            .prompt_template
            .as_deref()
            .and_then(|name| PromptTemplate::parse(name).ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn session(&self) -> &str {
        self.defaults.session.as_deref().unwrap_or(DEFAULT_SESSION)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    /// Cache capacity, or `None` when the cache is disabled.
    #[must_use]
    pub fn cache_capacity(&self) -> Option<usize> {
        if self.cache.enabled.unwrap_or(true) {
            Some(self.cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        } else {
            None
        }
    }

    /// Directory holding session checkpoints and locks.
    #[must_use]
    pub fn checkpoint_dir(&self) -> Utf8PathBuf {
        self.checkpoint
            .dir
            .as_ref()
            .map_or_else(postflow_utils::paths::sessions_dir, Utf8PathBuf::from)
    }

    #[must_use]
    pub fn lock_ttl_secs(&self) -> u64 {
        self.checkpoint
            .lock_ttl_seconds
            .unwrap_or(postflow_utils::lock::DEFAULT_LOCK_TTL_SECS)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// Create a minimal Config for tests that don't need discovery.
    pub fn minimal_for_testing() -> Self {
        Config {
            defaults: Defaults::default(),
            llm: LlmConfig {
                provider: Some(DEFAULT_PROVIDER.to_string()),
                ..LlmConfig::default()
            },
            cache: CacheConfig::default(),
            checkpoint: CheckpointConfig::default(),
            source_attribution: std::collections::HashMap::new(),
        }
    }
}
