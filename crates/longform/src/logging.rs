//! Logging setup, powered by tracing-subscriber.
//!
//! The pipeline emits `tracing` spans and events; the database layer logs through
//! the `log` facade. A `tracing_log::LogTracer` bridge routes those `log` records
//! into the same subscriber so both end up in one stream.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogFormat;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("A global subscriber is already installed")]
    AlreadyInstalled,
}

/// `RUST_LOG` wins over the configured default directive.
pub fn build_env_filter(default_filter: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_filter).map_err(|e| LoggingError::Filter {
        filter: default_filter.to_string(),
        source: e,
    })
}

/// Installs the global subscriber. Logs go to stderr so command output on stdout
/// stays machine-readable.
pub fn init_logging(format: LogFormat, default_filter: &str) -> Result<(), LoggingError> {
    let filter = build_env_filter(default_filter)?;

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    // ok() in case a bridge is already installed
    tracing_log::LogTracer::init().ok();

    tracing::debug!(?format, filter = default_filter, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_configured_filter_used_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        let filter = build_env_filter("longform=debug").unwrap();
        assert_eq!(filter.to_string(), "longform=debug");
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_config() {
        std::env::set_var("RUST_LOG", "warn");
        let filter = build_env_filter("longform=debug").unwrap();
        assert_eq!(filter.to_string(), "warn");
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    #[serial]
    fn test_invalid_filter() {
        std::env::remove_var("RUST_LOG");
        let err = build_env_filter("longform=verbose").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
    }
}
