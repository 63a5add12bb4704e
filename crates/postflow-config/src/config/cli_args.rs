use std::path::PathBuf;

/// Values the command line may override. Every field is optional so an empty
/// `CliArgs` yields "config file + defaults" behavior.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub verbose: Option<bool>,
    pub session: Option<String>,
    pub llm_provider: Option<String>,
    pub prompt_template: Option<String>,
    pub no_cache: bool,
    pub checkpoint_dir: Option<String>,
}
