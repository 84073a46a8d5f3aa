//! # Structured Logging Module
//!
//! Environment-aware structured logging for the lifecycle, event and
//! persistence layers. Console output is human readable by default and JSON
//! when configured.

use crate::config::{ConfigManager, LoggingConfig};
use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults
pub fn init_structured_logging() {
    init_with_config(&LoggingConfig::default());
}

/// Initialize structured logging honouring the `logging` config section
pub fn init_with_config(logging: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let directive = resolve_directive(logging, &environment);

        let layer = if logging.json {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(EnvFilter::new(directive))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(directive))
                .boxed()
        };

        // Use try_init to avoid panic if a host already installed a subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            json = logging.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn resolve_directive(logging: &LoggingConfig, environment: &str) -> String {
    logging
        .level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| get_log_level(environment))
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for lifecycle operations (startup, shutdown, state changes)
pub fn log_lifecycle_operation(
    operation: &str,
    component: Option<&str>,
    state: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        component = component,
        state = %state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔄 LIFECYCLE_OPERATION"
    );
}

/// Log structured data for persistence operations
pub fn log_persistence_operation(
    operation: &str,
    slot: Option<u32>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        slot = slot,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "💾 PERSISTENCE_OPERATION"
    );
}

/// Log structured data for event bus registry operations
pub fn log_event_operation(operation: &str, channel: &str, status: &str, details: Option<&str>) {
    tracing::debug!(
        operation = %operation,
        channel = %channel,
        status = %status,
        details = details,
        "📡 EVENT_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
    }

    #[test]
    fn test_explicit_level_wins() {
        let logging = LoggingConfig {
            level: Some("warn,chimera_core=trace".to_string()),
            json: false,
        };
        assert_eq!(
            resolve_directive(&logging, "production"),
            "warn,chimera_core=trace"
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_with_config(&LoggingConfig {
            level: Some("info".to_string()),
            json: true,
        });
    }
}
