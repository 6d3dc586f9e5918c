//! Logging utilities
//!
//! This module provides logging setup and configuration.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};

/// Parse a configured level name, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured level for this crate
fn build_filter(level: Level) -> Result<EnvFilter> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return Ok(EnvFilter::from_default_env());
    }
    let directives = format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level);
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::ConfigError(format!("invalid log filter `{}`: {}", directives, e)))
}

/// Initialize logging based on configuration
///
/// Without a `[logging]` table, INFO-level text goes to stderr so stdout stays
/// free for the JSON report.
pub fn init_logging(config: &Option<LoggingConfig>) -> Result<()> {
    let defaults = LoggingConfig::default();
    let config = config.as_ref().unwrap_or(&defaults);
    let env_filter = build_filter(parse_level(&config.level))?;

    let installed = if let Some(file_path) = &config.file {
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = Mutex::new(File::create(file_path)?);

        match config.format {
            LogFormat::Json => tracing::subscriber::set_global_default(
                fmt::Subscriber::builder()
                    .json()
                    .with_env_filter(env_filter)
                    .with_writer(file)
                    .finish(),
            ),
            LogFormat::Text => tracing::subscriber::set_global_default(
                fmt::Subscriber::builder()
                    .with_ansi(false)
                    .with_env_filter(env_filter)
                    .with_writer(file)
                    .finish(),
            ),
        }
    } else {
        match config.format {
            LogFormat::Json => tracing::subscriber::set_global_default(
                fmt::Subscriber::builder()
                    .json()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .finish(),
            ),
            LogFormat::Text => tracing::subscriber::set_global_default(
                fmt::Subscriber::builder()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .finish(),
            ),
        }
    };

    installed.map_err(|e| Error::ConfigError(format!("failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TRACE", Level::TRACE)]
    #[case("debug", Level::DEBUG)]
    #[case("warn", Level::WARN)]
    #[case("error", Level::ERROR)]
    #[case("verbose", Level::INFO)]
    fn parses_levels(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(parse_level(input), expected);
    }
}
