//! Request tracing middleware.
//!
//! Before the handler: open a server span named `"{METHOD} {path}"`,
//! continuing an incoming `traceparent` when valid, with the method, URL,
//! route and request id attached. After the handler: record the final status
//! code and close the span. If the client disconnects first, the span guard
//! closes it as 499. The response itself is passed through untouched.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use opentelemetry::KeyValue;
use tracing::Instrument;

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::observability::tracing::{ATTR_REQUEST_ID, HTTP_REQUEST_METHOD, HTTP_ROUTE, URL_FULL};

/// Absolute URL of the request as the caller addressed it.
pub fn request_url<B>(request: &Request<B>) -> String {
    let uri = request.uri();
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let host = uri.authority().map(|a| a.as_str()).or_else(|| {
        request
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
    });
    let scheme = uri.scheme_str().unwrap_or("http");

    match host {
        Some(host) => format!("{}://{}{}", scheme, host, path_and_query),
        None => path_and_query.to_string(),
    }
}

pub async fn trace_request(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());
    let request_id = request.request_id().map(str::to_string);

    let mut attributes = vec![
        KeyValue::new(HTTP_REQUEST_METHOD, method.to_string()),
        KeyValue::new(URL_FULL, request_url(&request)),
    ];
    if let Some(route) = &route {
        attributes.push(KeyValue::new(HTTP_ROUTE, route.clone()));
    }
    if let Some(request_id) = &request_id {
        attributes.push(KeyValue::new(ATTR_REQUEST_ID, request_id.clone()));
    }

    let span = state.tracer.start(
        format!("{} {}", method, path),
        request.headers(),
        attributes,
    );

    let log_span = tracing::info_span!(
        "request",
        trace_id = %span.trace_id(),
        span_id = %span.span_id(),
        request_id = request_id.as_deref().unwrap_or("-"),
    );
    let response = next.run(request).instrument(log_span).await;
    let status = response.status().as_u16();

    metrics::record_request(
        method.as_str(),
        route.as_deref().unwrap_or("unmatched"),
        status,
        start,
    );
    tracing::debug!(
        method = %method,
        path = %path,
        status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request complete"
    );

    span.finish(status);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_from_host_header() {
        let req = Request::builder()
            .uri("/table/users?x=1")
            .header("Host", "proxy.local:8080")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_url(&req), "http://proxy.local:8080/table/users?x=1");
    }

    #[test]
    fn test_request_url_absolute_form() {
        let req = Request::builder()
            .uri("https://proxy.local/queue/jobs")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_url(&req), "https://proxy.local/queue/jobs");
    }

    #[test]
    fn test_request_url_without_host() {
        let req = Request::builder()
            .uri("/queue/jobs")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_url(&req), "/queue/jobs");
    }
}
