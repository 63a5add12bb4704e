use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use postflow_utils::error::ConfigError;

use super::{
    CacheConfig, CheckpointConfig, CliArgs, Config, ConfigSource, Defaults, LlmConfig,
    DEFAULT_PROVIDER,
};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlConfig {
    defaults: Option<Defaults>,
    llm: Option<LlmConfig>,
    cache: Option<CacheConfig>,
    checkpoint: Option<CheckpointConfig>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid depending on the process cwd.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut source_attribution = HashMap::new();

        let mut defaults = Defaults::default();
        let mut llm = LlmConfig::default();
        let mut cache = CacheConfig::default();
        let mut checkpoint = CheckpointConfig::default();

        for key in [
            "timeout_secs",
            "verbose",
            "session",
            "cache_enabled",
            "cache_capacity",
            "lock_ttl_seconds",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)?;
            let src = ConfigSource::ConfigFile(path.clone());

            if let Some(file_defaults) = file_config.defaults {
                if file_defaults.model.is_some() {
                    defaults.model = file_defaults.model;
                    source_attribution.insert("model".to_string(), src.clone());
                }
                if file_defaults.timeout_secs.is_some() {
                    defaults.timeout_secs = file_defaults.timeout_secs;
                    source_attribution.insert("timeout_secs".to_string(), src.clone());
                }
                if file_defaults.verbose.is_some() {
                    defaults.verbose = file_defaults.verbose;
                    source_attribution.insert("verbose".to_string(), src.clone());
                }
                if file_defaults.session.is_some() {
                    defaults.session = file_defaults.session;
                    source_attribution.insert("session".to_string(), src.clone());
                }
            }

            if let Some(file_llm) = file_config.llm {
                if file_llm.provider.is_some() {
                    llm.provider = file_llm.provider;
                    source_attribution.insert("llm_provider".to_string(), src.clone());
                }
                if file_llm.fallback_provider.is_some() {
                    llm.fallback_provider = file_llm.fallback_provider;
                    source_attribution.insert("llm_fallback_provider".to_string(), src.clone());
                }
                if file_llm.prompt_template.is_some() {
                    llm.prompt_template = file_llm.prompt_template;
                    source_attribution.insert("prompt_template".to_string(), src.clone());
                }
                if file_llm.anthropic.is_some() {
                    llm.anthropic = file_llm.anthropic;
                    source_attribution.insert("llm_anthropic".to_string(), src.clone());
                }
                if file_llm.openrouter.is_some() {
                    llm.openrouter = file_llm.openrouter;
                    source_attribution.insert("llm_openrouter".to_string(), src.clone());
                }
            }

            if let Some(file_cache) = file_config.cache {
                if file_cache.enabled.is_some() {
                    cache.enabled = file_cache.enabled;
                    source_attribution.insert("cache_enabled".to_string(), src.clone());
                }
                if file_cache.capacity.is_some() {
                    cache.capacity = file_cache.capacity;
                    source_attribution.insert("cache_capacity".to_string(), src.clone());
                }
            }

            if let Some(file_checkpoint) = file_config.checkpoint {
                if file_checkpoint.dir.is_some() {
                    checkpoint.dir = file_checkpoint.dir;
                    source_attribution.insert("checkpoint_dir".to_string(), src.clone());
                }
                if file_checkpoint.lock_ttl_seconds.is_some() {
                    checkpoint.lock_ttl_seconds = file_checkpoint.lock_ttl_seconds;
                    source_attribution.insert("lock_ttl_seconds".to_string(), src);
                }
            }
        }

        // Provider: CLI > env > file > default
        if let Ok(env_provider) = env::var("POSTFLOW_LLM_PROVIDER")
            && !env_provider.is_empty()
        {
            llm.provider = Some(env_provider);
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Env);
        }

        if let Some(model) = &cli_args.model {
            defaults.model = Some(model.clone());
            source_attribution.insert("model".to_string(), ConfigSource::Cli);
        }
        if let Some(timeout) = cli_args.timeout_secs {
            defaults.timeout_secs = Some(timeout);
            source_attribution.insert("timeout_secs".to_string(), ConfigSource::Cli);
        }
        if let Some(verbose) = cli_args.verbose {
            defaults.verbose = Some(verbose);
            source_attribution.insert("verbose".to_string(), ConfigSource::Cli);
        }
        if let Some(session) = &cli_args.session {
            defaults.session = Some(session.clone());
            source_attribution.insert("session".to_string(), ConfigSource::Cli);
        }
        if let Some(provider) = &cli_args.llm_provider {
            llm.provider = Some(provider.clone());
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Cli);
        }
        if let Some(template) = &cli_args.prompt_template {
            llm.prompt_template = Some(template.clone());
            source_attribution.insert("prompt_template".to_string(), ConfigSource::Cli);
        }
        if cli_args.no_cache {
            cache.enabled = Some(false);
            source_attribution.insert("cache_enabled".to_string(), ConfigSource::Cli);
        }
        if let Some(dir) = &cli_args.checkpoint_dir {
            checkpoint.dir = Some(dir.clone());
            source_attribution.insert("checkpoint_dir".to_string(), ConfigSource::Cli);
        }

        if llm.provider.is_none() {
            llm.provider = Some(DEFAULT_PROVIDER.to_string());
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Default);
        }

        let config = Self {
            defaults,
            llm,
            cache,
            checkpoint,
            source_attribution,
        };

        config.validate()?;

        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.postflow/config.toml`, stopping at
    /// repository root markers (.git, .hg, .svn) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(".postflow").join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::InvalidFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
            // An explicit path that does not exist yet means "no overrides".
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(ConfigError::InvalidFile {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}
