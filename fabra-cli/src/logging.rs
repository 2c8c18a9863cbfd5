//! Diagnostic output for the fabra CLI.
//!
//! The reliability figure is the CLI's stdout contract, so every
//! diagnostic goes to stderr through a global `tracing` subscriber. The
//! output format is chosen by the `--log-json` flag, falling back to the
//! `FABRA_LOG_FORMAT` environment variable; verbosity comes from
//! `RUST_LOG` and defaults to `info`. The `log` facade is bridged so the
//! crates underneath emit structured events either way.

use std::{env, str::FromStr, sync::OnceLock};

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FORMAT_ENV: &str = "FABRA_LOG_FORMAT";

static INSTALLED: OnceLock<LogFormat> = OnceLock::new();

/// How diagnostics are rendered on stderr.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// Human-readable single-line events.
    #[default]
    Human,
    /// One JSON object per event, for log collectors.
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(raw: &str) -> Result<Self, LoggingError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::UnsupportedFormat {
                provided: raw.trim().to_owned(),
            }),
        }
    }
}

/// Errors raised while choosing the diagnostic format.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The format value was neither `human` nor `json`.
    #[error("unsupported log format `{provided}`; expected `human` or `json`")]
    UnsupportedFormat {
        /// Raw value supplied by the user.
        provided: String,
    },
    /// The environment variable was not valid Unicode.
    #[error("environment variable `{name}` contained invalid UTF-8")]
    InvalidUnicode {
        /// Name of the offending environment variable.
        name: &'static str,
    },
}

/// Chooses the diagnostic format: the `--log-json` flag wins, then
/// `FABRA_LOG_FORMAT`, then human output.
///
/// # Errors
/// Returns [`LoggingError`] when the environment variable holds an
/// unsupported or non-Unicode value.
pub fn resolve_format(json_flag: bool) -> Result<LogFormat, LoggingError> {
    let env_value = match env::var(LOG_FORMAT_ENV) {
        Ok(raw) => Some(raw),
        Err(env::VarError::NotPresent) => None,
        Err(env::VarError::NotUnicode(_)) => {
            return Err(LoggingError::InvalidUnicode {
                name: LOG_FORMAT_ENV,
            });
        }
    };
    format_from(json_flag, env_value.as_deref())
}

/// Installs the global subscriber once; later calls (and subscribers
/// installed by test harnesses) are left in place.
pub fn init(format: LogFormat) {
    if INSTALLED.set(format).is_err() {
        return;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let fmt_layer = match format {
        LogFormat::Human => fmt_layer.boxed(),
        LogFormat::Json => fmt_layer.json().with_current_span(true).boxed(),
    };

    // Best-effort: another logger or subscriber already owning the global
    // slot keeps it.
    let _ = LogTracer::init();
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

fn format_from(json_flag: bool, env_value: Option<&str>) -> Result<LogFormat, LoggingError> {
    if json_flag {
        return Ok(LogFormat::Json);
    }
    env_value.map_or(Ok(LogFormat::Human), LogFormat::from_str)
}
