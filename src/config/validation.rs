//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. Validation is a pure
//! function over `ProxyConfig` and reports every problem, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::storage::StorageAccount;

/// Maximum `numofmessages` the queue service accepts.
pub const MAX_QUEUE_BATCH: u32 = 32;

/// A single semantic problem in the configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ValidationError {
    ValidationError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(invalid(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(invalid("timeouts.request_secs", "must be greater than 0"));
    }

    let storage = &config.storage;
    for (field, value) in [
        ("TABLE_CONNECTION_STRING", &storage.table_connection_string),
        ("QUEUE_CONNECTION_STRING", &storage.queue_connection_string),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::Missing(field));
        } else if let Err(e) = StorageAccount::from_connection_string(value) {
            errors.push(invalid(field, e.to_string()));
        }
    }

    if storage.timeout_secs == 0 {
        errors.push(invalid("storage.timeout_secs", "must be greater than 0"));
    }
    if storage.queue_max_messages == 0 || storage.queue_max_messages > MAX_QUEUE_BATCH {
        errors.push(invalid(
            "storage.queue_max_messages",
            format!("must be between 1 and {}", MAX_QUEUE_BATCH),
        ));
    }

    let telemetry = &config.telemetry;
    if telemetry.enabled {
        if telemetry.instrumentation_key.trim().is_empty() {
            errors.push(ValidationError::Missing("INSTRUMENTATION_KEY"));
        }
        if url::Url::parse(&telemetry.ingestion_endpoint).is_err() {
            errors.push(invalid(
                "telemetry.ingestion_endpoint",
                format!("'{}' is not a URL", telemetry.ingestion_endpoint),
            ));
        }
    }
    if !(0.0..=1.0).contains(&telemetry.sampling_ratio) {
        errors.push(invalid("telemetry.sampling_ratio", "must be within 0.0..=1.0"));
    }
    if telemetry.max_batch_size == 0 {
        errors.push(invalid("telemetry.max_batch_size", "must be greater than 0"));
    }
    if telemetry.channel_capacity == 0 {
        errors.push(invalid("telemetry.channel_capacity", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(invalid(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
