//! # Structured Logging Module
//!
//! Environment-aware structured logging for query composition and execution.
//! Console output is human readable by default and JSON when
//! `COMPOSER_LOG_FORMAT=json`. `RUST_LOG` overrides the environment's default level.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("COMPOSER_LOG_FORMAT").is_ok_and(|format| format == "json");

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            // Another subscriber owns the global slot (test harness, embedding host)
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            json,
            "Structured logging initialized"
        );
    });
}

/// Current environment name
pub fn get_environment() -> String {
    std::env::var("COMPOSER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default log level for an environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for one composed-query operation
pub fn log_query_operation(
    operation: &str,
    root_table: &str,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        root_table = %root_table,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "QUERY_OPERATION"
    );
}
