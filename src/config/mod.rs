//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (INSTRUMENTATION_KEY, *_CONNECTION_STRING)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared with handlers through axum State
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; built exactly once at process start
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, CliOverrides, ConfigError};
pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, QueueReadMode, StorageConfig,
    TelemetryConfig, TimeoutConfig,
};
