//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (one span per request)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → exporter.rs (batch processor) → Application Insights /v2/track
//! ```
//!
//! # Design Decisions
//! - Request ID and trace ID flow through log lines and spans
//! - Span export never blocks or fails a request

pub mod exporter;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::exporter::{build_provider, ExporterError};
pub use self::tracing::{RequestSpan, RequestTracer};
