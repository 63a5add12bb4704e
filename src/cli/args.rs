//! CLI argument definitions
//!
//! The `Cli` struct carries the global flags that feed configuration
//! discovery; `Commands` lists the subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use postflow_config::CliArgs;
use std::path::PathBuf;

/// postflow - draft LinkedIn posts with an LLM, one feedback round at a time
#[derive(Parser, Debug)]
#[command(name = "postflow")]
#[command(about = "Draft, validate and revise LinkedIn posts with an LLM")]
#[command(long_about = r#"
postflow validates a topic, drafts a LinkedIn post, checks the draft, and then
waits for your feedback. Positive feedback ends the run; anything else produces
a revised post that is published (simulated).

EXAMPLES:
  # Start a run
  postflow start --topic "Remote work productivity" --tone professional --audience managers

  # Answer with feedback
  postflow feedback "add more data"

  # Show the conversation so far
  postflow show

  # Continue a run that was interrupted by an error
  postflow resume

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is discovered by searching upward from CWD for .postflow/config.toml
  Use --config to specify an explicit config file path
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session to work on
    #[arg(long, short = 's', global = true)]
    pub session: Option<String>,

    /// Model to use for LLM provider calls
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// LLM provider (anthropic or openrouter)
    #[arg(long = "provider", global = true)]
    pub llm_provider: Option<String>,

    /// Message layout (default, claude-optimized, openai-compatible)
    #[arg(long, global = true)]
    pub prompt_template: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", global = true)]
    pub timeout_secs: Option<u64>,

    /// Disable the in-memory response cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Directory holding session checkpoints
    #[arg(long, global = true)]
    pub checkpoint_dir: Option<String>,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Overrides handed to configuration discovery.
    #[must_use]
    pub fn config_overrides(&self) -> CliArgs {
        CliArgs {
            config_path: self.config.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            verbose: self.verbose.then_some(true),
            session: self.session.clone(),
            llm_provider: self.llm_provider.clone(),
            prompt_template: self.prompt_template.clone(),
            no_cache: self.no_cache,
            checkpoint_dir: self.checkpoint_dir.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new run (replaces any earlier run in the session)
    Start {
        /// What the post is about
        #[arg(long)]
        topic: String,

        /// Tone of the post (up to 3)
        #[arg(long, value_enum, required = true, num_args = 1..)]
        tone: Vec<Tone>,

        /// Target audience (up to 3)
        #[arg(long, value_enum, required = true, num_args = 1..)]
        audience: Vec<Audience>,

        /// Print the checkpoint as JSON instead of the conversation
        #[arg(long)]
        json: bool,
    },

    /// Give feedback on the latest draft
    Feedback {
        /// Your feedback, e.g. "add more data" or "looks good"
        text: String,

        /// Print the checkpoint as JSON instead of the conversation
        #[arg(long)]
        json: bool,
    },

    /// Continue a run that stopped mid-way
    Resume {
        /// Print the checkpoint as JSON instead of the conversation
        #[arg(long)]
        json: bool,
    },

    /// Show the conversation and status of a session
    Show {
        /// Print the checkpoint as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the session checkpoint
    Reset,

    /// Show the effective configuration and where each value came from
    Config,
}

/// Tone choices offered for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tone {
    Professional,
    Funny,
    Inspirational,
    Casual,
    Motivational,
    Educational,
    Friendly,
    Authoritative,
}

impl Tone {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Funny => "funny",
            Tone::Inspirational => "inspirational",
            Tone::Casual => "casual",
            Tone::Motivational => "motivational",
            Tone::Educational => "educational",
            Tone::Friendly => "friendly",
            Tone::Authoritative => "authoritative",
        }
    }
}

/// Audience choices offered for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Audience {
    Generic,
    Professionals,
    Students,
    Executives,
    Marketers,
    Developers,
    Managers,
    Entrepreneurs,
}

impl Audience {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Audience::Generic => "generic",
            Audience::Professionals => "professionals",
            Audience::Students => "students",
            Audience::Executives => "executives",
            Audience::Marketers => "marketers",
            Audience::Developers => "developers",
            Audience::Managers => "managers",
            Audience::Entrepreneurs => "entrepreneurs",
        }
    }
}
