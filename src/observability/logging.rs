//! Structured logging setup using the tracing crate
//!
//! ## Environment variables
//!
//! - `LOG_LEVEL`: log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to INFO
//! - `LOG_FORMAT`: output format (json, pretty, compact) - defaults to json
//! - `RUST_LOG`: overrides log filtering (env_logger syntax)

use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Initialize logging with manual configuration
pub fn init_logging(level: Level, format: LogFormat) {
    let mut filter = EnvFilter::new(level.to_string())
        // Reduce noise from the runtime
        .add_directive("tokio=warn".parse().unwrap());

    if let Ok(rust_log) = env::var("RUST_LOG") {
        filter = EnvFilter::new(rust_log);
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            subscriber.with(fmt::layer().json()).init();
        }
        LogFormat::Pretty => {
            subscriber.with(fmt::layer().pretty()).init();
        }
        LogFormat::Compact => {
            subscriber.with(fmt::layer().compact()).init();
        }
    }
}

/// Initialize logging from `LOG_LEVEL` and `LOG_FORMAT`
pub fn init_logging_from_env() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let format = LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default());
    init_logging(level, format);
}
