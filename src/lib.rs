//! Read-only HTTP proxy for storage tables and queues.
//!
//! `GET /table/{name}` lists table entities, `GET /queue/{name}` lists queue
//! message bodies. Every request is traced and exported as telemetry.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod storage;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
