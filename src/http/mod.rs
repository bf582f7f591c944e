//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign x-request-id)
//!     → middleware/request_span.rs (open span)
//!     → handlers.rs (table / queue read)
//!     → error.rs (storage failure → 502)
//!     → middleware/request_span.rs (status + URL, close span)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::RequestIdExt;
pub use server::{AppState, HttpServer, ServerError};
