//! # Structured Logging Module
//!
//! Environment-aware structured logging for the task pipeline and the
//! resource service.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// `RUST_LOG` wins over the configured level. An already-installed global
/// subscriber is left in place.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(effective_level(config, &environment)));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            json = config.json,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("PROVISIONER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Test runs are always verbose; elsewhere the configured level applies
fn effective_level(config: &LoggingConfig, environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        _ => config.level.clone(),
    }
}

/// Log structured data for task operations
pub fn log_task_operation(operation: &str, task_link: &str, stage: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        task_link = %task_link,
        stage = %stage,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "TASK_OPERATION"
    );
}

/// Log structured data for resource operations
pub fn log_resource_operation(operation: &str, link: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        link = %link,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "RESOURCE_OPERATION"
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
        "ERROR"
    );
}
