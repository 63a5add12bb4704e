//! Layered configuration for postflow: CLI flags over `.postflow/config.toml`
//! over built-in defaults, with per-key source attribution.

mod config;

pub use config::*;
