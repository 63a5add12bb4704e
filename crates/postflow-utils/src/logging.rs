//! Structured logging for postflow.
//!
//! A compact `tracing-subscriber` format by default; verbose mode adds targets
//! and span close events so each workflow step reports its own duration.
//! `RUST_LOG` overrides the built-in filter.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::IsTerminal;
use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Check if colored output should be used.
///
/// True only when stdout is a terminal and `NO_COLOR` is not set.
#[must_use]
pub fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr so stdout stays clean for rendered output and `--json`.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("postflow=debug,info")
            } else {
                EnvFilter::try_new("postflow=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span wrapping one workflow step.
pub fn step_span(session: &str, step: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "workflow_step",
        session = %session,
        step = %step,
    )
}

pub fn log_step_start(session: &str, step: &str) {
    info!(session = %session, step = %step, "Starting step");
}

pub fn log_step_complete(session: &str, step: &str, duration_ms: u128) {
    info!(
        session = %session,
        step = %step,
        duration_ms = %duration_ms,
        "Step completed"
    );
}

/// Log a step failure. The error text is redacted first.
pub fn log_step_error(session: &str, step: &str, err: &str, duration_ms: u128) {
    let sanitized = redact_secrets(err);
    error!(
        session = %session,
        step = %step,
        duration_ms = %duration_ms,
        error = %sanitized,
        "Step failed"
    );
}

static URL_CREDENTIALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"://[^/\s:@]+:[^/\s@]+@").expect("valid regex"));
static BEARER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._\-]+").expect("valid regex"));
static KEY_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(sk|pk|or)-[A-Za-z0-9_\-]{16,}\b").expect("valid regex"));
static QUERY_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([?&](api_key|key|token)=)[^&\s]+").expect("valid regex")
});

/// Strip credentials from text bound for logs or error messages.
///
/// Covers userinfo in URLs, bearer tokens, provider-style API keys, and
/// key/token query parameters.
#[must_use]
pub fn redact_secrets(text: &str) -> String {
    let out = URL_CREDENTIALS.replace_all(text, "://[REDACTED]@");
    let out = BEARER_TOKEN.replace_all(&out, "Bearer [REDACTED]");
    let out = KEY_LIKE.replace_all(&out, "[REDACTED]");
    let out = QUERY_KEY.replace_all(&out, "${1}[REDACTED]");
    out.into_owned()
}
