//! Logging initialization
//!
//! Installs a `tracing` subscriber with an `EnvFilter` (from `RUST_LOG`) and
//! either JSON or human-readable output. JSON is the default in-cluster so
//! log collectors can index the structured reconcile fields.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,licensing_operator=debug,kube=info,tower=warn,hyper=warn";

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the global subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),

    /// Unknown log format name
    #[error("unknown log format '{0}' (expected 'json' or 'text')")]
    UnknownFormat(String),
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines, for local runs
    Text,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Install the global tracing subscriber
pub fn init(format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>().ok(), Some(LogFormat::Text));
        assert_eq!("pretty".parse::<LogFormat>().ok(), Some(LogFormat::Text));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.to_string().contains("xml"));
    }
}
