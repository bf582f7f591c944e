//! Request spans on OpenTelemetry.
//!
//! `RequestTracer` opens one server span per request and continues an
//! incoming W3C `traceparent` when the header is valid. `RequestSpan` closes
//! it exactly once: through `finish` with the response status, or on drop
//! with 499 when the client went away before a response existed.

use axum::http::HeaderMap;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{Span as _, SpanKind, Status, Tracer as _, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_http::HeaderExtractor;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, Span, Tracer, TracerProvider};

pub use opentelemetry_semantic_conventions::trace::{
    HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, HTTP_ROUTE, URL_FULL,
};

/// Custom attribute carrying the `x-request-id` of the request.
pub const ATTR_REQUEST_ID: &str = "request_id";

/// Status recorded when the client disconnects before a response exists.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

const INSTRUMENTATION_NAME: &str = "storage-proxy";

/// Map a configured ratio onto the SDK sampler.
pub fn sampler_for(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

/// Starts request spans. Cheap to clone; shared through handler state.
#[derive(Clone)]
pub struct RequestTracer {
    tracer: Tracer,
    propagator: TraceContextPropagator,
}

impl RequestTracer {
    pub fn new(provider: &TracerProvider) -> Self {
        Self {
            tracer: provider.tracer(INSTRUMENTATION_NAME),
            propagator: TraceContextPropagator::new(),
        }
    }

    /// Open a server span, parented on the request's `traceparent` if any.
    pub fn start(
        &self,
        name: String,
        headers: &HeaderMap,
        attributes: Vec<KeyValue>,
    ) -> RequestSpan {
        let parent = self.propagator.extract(&HeaderExtractor(headers));
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &parent);

        RequestSpan {
            span,
            finished: false,
        }
    }
}

/// An open request span.
pub struct RequestSpan {
    span: Span,
    finished: bool,
}

impl RequestSpan {
    pub fn trace_id(&self) -> String {
        self.span.span_context().trace_id().to_string()
    }

    pub fn span_id(&self) -> String {
        self.span.span_context().span_id().to_string()
    }

    /// Record the final status code and close the span.
    pub fn finish(mut self, status: u16) {
        self.record_status(status);
        self.finished = true;
    }

    fn record_status(&mut self, status: u16) {
        self.span
            .set_attribute(KeyValue::new(HTTP_RESPONSE_STATUS_CODE, i64::from(status)));
        if status >= 400 {
            self.span.set_status(Status::error(format!("HTTP {}", status)));
        }
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        if !self.finished {
            self.record_status(CLIENT_CLOSED_REQUEST);
        }
        self.span.end();
    }
}
