//! Command-line interface for postflow
//!
//! - `args`: clap definitions
//! - `run`: entry point and dispatch
//! - `commands`: command implementations

pub mod args;
mod commands;
mod run;

pub use args::{Audience, Cli, Commands, Tone};
pub use run::run;
