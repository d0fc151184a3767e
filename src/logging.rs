//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing`. Applications install a
//! subscriber once at startup:
//!
//! ```no_run
//! use brrtbridge::logging::{init_logging_with_config, LogConfig};
//!
//! let _guard = init_logging_with_config(&LogConfig::from_env())
//!     .expect("Failed to initialize logging");
//! ```
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `BRRT_LOG_LEVEL` | `info` | trace/debug/info/warn/error |
//! | `BRRT_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `BRRT_LOG_ASYNC` | `true` | buffer output on a background writer |
//! | `BRRT_LOG_TARGET_FILTER` | unset | extra comma-separated filter directives |
//! | `BRRT_LOG_INCLUDE_LOCATION` | `false` | add file and line to every event |
//!
//! `RUST_LOG`, when set, takes precedence over `BRRT_LOG_LEVEL`.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a non-blocking background worker
    pub async_logging: bool,
    /// Extra filter directives (comma-separated)
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl LogConfig {
    /// Read `BRRT_LOG_*` variables, falling back to production defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default_prod();
        Self {
            log_level: env::var("BRRT_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: env::var("BRRT_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            async_logging: env::var("BRRT_LOG_ASYNC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
            target_filter: env::var("BRRT_LOG_TARGET_FILTER").ok(),
            include_location: env::var("BRRT_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.include_location),
        }
    }

    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    #[must_use]
    pub fn default_prod() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        // may_minihttp reports every client disconnect at info
        filter = filter.add_directive(
            "may_minihttp=warn"
                .parse()
                .context("invalid built-in filter directive")?,
        );
        if let Some(extra) = &self.target_filter {
            for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(err) => eprintln!("Warning: invalid log filter directive '{directive}': {err}"),
                }
            }
        }
        Ok(filter)
    }
}

/// Install the global subscriber.
///
/// With `async_logging` the returned guard owns the background writer; keep
/// it alive for as long as logs should be flushed.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(config.env_filter()?);

    let (writer, guard) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_level_falls_back_to_info() {
        let mut config = LogConfig::default_dev();
        assert_eq!(config.level(), Level::DEBUG);
        config.log_level = "chatty".to_string();
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_bad_target_filter_is_skipped() {
        let mut config = LogConfig::default_dev();
        config.target_filter = Some("brrtbridge=trace, ,[[bad".to_string());
        assert!(config.env_filter().is_ok());
    }
}
