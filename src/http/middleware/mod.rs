//! Request pipeline stages that wrap the handlers.

pub mod request_span;

pub use request_span::trace_request;
