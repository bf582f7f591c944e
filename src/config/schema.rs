//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the storage proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Storage account access.
    pub storage: StorageConfig,

    /// Request telemetry export.
    pub telemetry: TelemetryConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// How queue messages are read from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueReadMode {
    /// Messages stay visible to other consumers.
    #[default]
    Peek,
    /// Messages become invisible for `visibility_timeout_secs`, never deleted.
    Receive,
}

/// Storage account configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Connection string for the table service (`TABLE_CONNECTION_STRING`).
    pub table_connection_string: String,

    /// Connection string for the queue service (`QUEUE_CONNECTION_STRING`).
    pub queue_connection_string: String,

    /// Timeout for a single backend call in seconds.
    pub timeout_secs: u64,

    /// Number of messages requested per queue read (1..=32).
    pub queue_max_messages: u32,

    /// Peek or receive.
    pub queue_read_mode: QueueReadMode,

    /// Visibility timeout applied in receive mode.
    pub queue_visibility_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            table_connection_string: String::new(),
            queue_connection_string: String::new(),
            timeout_secs: 10,
            queue_max_messages: 10,
            queue_read_mode: QueueReadMode::Peek,
            queue_visibility_timeout_secs: 30,
        }
    }
}

/// Telemetry (request span) export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Export spans to the ingestion endpoint.
    pub enabled: bool,

    /// Instrumentation key (`INSTRUMENTATION_KEY`). May also be a full
    /// `InstrumentationKey=...;IngestionEndpoint=...` connection string.
    pub instrumentation_key: String,

    /// Base URL of the ingestion service.
    pub ingestion_endpoint: String,

    /// Fraction of requests exported, 0.0..=1.0.
    pub sampling_ratio: f64,

    /// Maximum delay before buffered spans are flushed, in milliseconds.
    pub flush_interval_ms: u64,

    /// Most spans sent in one export call.
    pub max_batch_size: usize,

    /// Spans queued for export. Spans finished while the queue is full are dropped.
    pub channel_capacity: usize,

    /// Reported as `ai.cloud.role`.
    pub role_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            instrumentation_key: String::new(),
            ingestion_endpoint: "https://dc.services.visualstudio.com".to_string(),
            sampling_ratio: 1.0,
            flush_interval_ms: 5000,
            max_batch_size: 64,
            channel_capacity: 4096,
            role_name: "storage-proxy".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Pretty for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "storage_proxy=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
