use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Config;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Command-line flag (highest precedence)
    Cli,
    /// Environment variable
    Env,
    /// `.postflow/config.toml` or an explicit `--config` file
    ConfigFile(PathBuf),
    /// Built-in default (lowest precedence)
    Default,
}

impl ConfigSource {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ConfigSource::Cli => "cli",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile(_) => "config",
            ConfigSource::Default => "default",
        }
    }
}

fn source_label(source: Option<&ConfigSource>) -> String {
    source.map_or("default", ConfigSource::label).to_string()
}

impl Config {
    /// Effective configuration as key -> (value, source), sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: Option<String>| {
            if let Some(val) = value {
                let source = source_label(self.source_attribution.get(key));
                config.insert(key.to_string(), (val, source));
            }
        };

        add("model", self.defaults.model.clone());
        add("timeout_secs", self.defaults.timeout_secs.map(|v| v.to_string()));
        add("verbose", self.defaults.verbose.map(|v| v.to_string()));
        add("session", self.defaults.session.clone());
        add("llm_provider", self.llm.provider.clone());
        add("llm_fallback_provider", self.llm.fallback_provider.clone());
        add("prompt_template", Some(self.prompt_template().as_str().to_string()));
        add("cache_enabled", self.cache.enabled.map(|v| v.to_string()));
        add("cache_capacity", self.cache.capacity.map(|v| v.to_string()));
        add("checkpoint_dir", Some(self.checkpoint_dir().to_string()));
        add(
            "lock_ttl_seconds",
            self.checkpoint.lock_ttl_seconds.map(|v| v.to_string()),
        );

        config
    }
}
