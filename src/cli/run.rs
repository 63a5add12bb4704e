//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers configuration, installs logging,
//! dispatches to a command handler, and prints every error itself. main.rs
//! only maps the returned code to the process exit status.

use clap::Parser;
use postflow_config::Config;
use postflow_utils::error::{ConfigError, UserFriendlyError};
use postflow_utils::exit_codes::ExitCode;
use postflow_utils::logging::{init_tracing, redact_secrets};

use super::args::{Cli, Commands};
use super::commands;
use crate::error::PostflowError;

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after the error has been reported on stderr.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let config = match discover_config(&cli) {
        Ok(config) => config,
        Err(err) => return Err(report(&err)),
    };

    if let Err(e) = init_tracing(config.verbose()) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let session = config.session().to_string();
    let result = rt.block_on(async {
        match cli.command {
            Commands::Start {
                topic,
                tone,
                audience,
                json,
            } => {
                commands::execute_start_command(&config, &session, topic, &tone, &audience, json)
                    .await
            }
            Commands::Feedback { text, json } => {
                commands::execute_feedback_command(&config, &session, text, json).await
            }
            Commands::Resume { json } => {
                commands::execute_resume_command(&config, &session, json).await
            }
            Commands::Show { json } => commands::execute_show_command(&config, &session, json),
            Commands::Reset => commands::execute_reset_command(&config, &session),
            Commands::Config => commands::execute_config_command(&config),
        }
    });

    result.map_err(|err| report(&err))
}

/// Discover configuration, keeping typed config errors for reporting.
fn discover_config(cli: &Cli) -> Result<Config, PostflowError> {
    Config::discover(&cli.config_overrides()).map_err(|err| match err.downcast::<ConfigError>() {
        Ok(config_error) => PostflowError::Config(config_error),
        Err(other) => PostflowError::Config(ConfigError::Discovery(format!("{other:#}"))),
    })
}

fn report(err: &PostflowError) -> ExitCode {
    eprintln!("{}", redact_secrets(&err.display_for_user()));
    err.to_exit_code()
}
