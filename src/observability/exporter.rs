//! Span export to Application Insights.
//!
//! The SDK batch processor buffers finished spans and hands them to the
//! Application Insights exporter, which ships `RequestData` envelopes to
//! `{endpoint}/v2/track`. Delivery is best effort: a failed batch is logged,
//! counted and discarded.

use std::time::Duration;

use futures_util::future::BoxFuture;
use opentelemetry::KeyValue;
use opentelemetry_application_insights::Exporter;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;
use thiserror::Error;

use crate::config::TelemetryConfig;
use crate::observability::metrics;
use crate::observability::tracing::sampler_for;

/// Errors raised while setting up the exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Invalid instrumentation key: {0}")]
    InstrumentationKey(String),

    #[error("Invalid ingestion endpoint: {0}")]
    Endpoint(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Build the Application Insights exporter from a bare key or a full
/// `InstrumentationKey=...;IngestionEndpoint=...` connection string.
pub fn build_exporter(
    config: &TelemetryConfig,
) -> Result<Exporter<reqwest::Client>, ExporterError> {
    let key = config.instrumentation_key.trim();
    if key.is_empty() {
        return Err(ExporterError::InstrumentationKey(
            "no InstrumentationKey found".to_string(),
        ));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let exporter = if key.to_ascii_lowercase().contains("instrumentationkey=") {
        let connection_string = key.trim_end_matches(';');
        let has_key = connection_string.split(';').any(|part| {
            part.split_once('=').is_some_and(|(k, v)| {
                k.trim().eq_ignore_ascii_case("instrumentationkey") && !v.trim().is_empty()
            })
        });
        if !has_key {
            return Err(ExporterError::InstrumentationKey(
                "empty InstrumentationKey".to_string(),
            ));
        }
        Exporter::new_from_connection_string(connection_string, client)
            .map_err(|e| ExporterError::InstrumentationKey(e.to_string()))?
    } else {
        // The connection-string constructor forces https; a bare key keeps
        // the configured endpoint scheme as given.
        #[allow(deprecated)]
        Exporter::new(key.to_string(), client)
            .with_endpoint(&config.ingestion_endpoint)
            .map_err(|e| {
                ExporterError::Endpoint(format!("'{}': {}", config.ingestion_endpoint, e))
            })?
    };

    Ok(exporter.with_sample_rate(config.sampling_ratio.clamp(0.0, 1.0)))
}

/// Counts and logs the outcome of every exported batch.
#[derive(Debug)]
pub struct MeteredExporter<E> {
    inner: E,
}

impl<E> MeteredExporter<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: SpanExporter> SpanExporter for MeteredExporter<E> {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let count = batch.len();
        let export = self.inner.export(batch);
        Box::pin(async move {
            let result = export.await;
            match &result {
                Ok(()) => {
                    metrics::record_spans_exported(count, true);
                    tracing::debug!(spans = count, "Telemetry batch exported");
                }
                Err(e) => {
                    metrics::record_spans_exported(count, false);
                    tracing::warn!(spans = count, error = %e, "Telemetry export failed");
                }
            }
            result
        })
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
    }

    fn force_flush(&mut self) -> BoxFuture<'static, ExportResult> {
        self.inner.force_flush()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}

/// Build the tracer provider for the configured telemetry.
///
/// When enabled this spawns the batch processor, so it must be called inside
/// a Tokio runtime. A disabled provider samples nothing and has no exporter.
pub fn build_provider(config: &TelemetryConfig) -> Result<TracerProvider, ExporterError> {
    if !config.enabled {
        tracing::info!("Telemetry export disabled");
        return Ok(TracerProvider::builder()
            .with_sampler(Sampler::AlwaysOff)
            .build());
    }

    let exporter = MeteredExporter::new(build_exporter(config)?);
    let batch = BatchConfigBuilder::default()
        .with_scheduled_delay(Duration::from_millis(config.flush_interval_ms.max(1)))
        .with_max_export_batch_size(config.max_batch_size.max(1))
        .with_max_queue_size(config.channel_capacity.max(1))
        .build();
    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
        .with_batch_config(batch)
        .build();

    tracing::info!(
        endpoint = %config.ingestion_endpoint,
        sampling_ratio = config.sampling_ratio,
        "Telemetry exporter started"
    );

    Ok(TracerProvider::builder()
        .with_span_processor(processor)
        .with_sampler(sampler_for(config.sampling_ratio))
        .with_resource(Resource::new(vec![KeyValue::new(
            SERVICE_NAME,
            config.role_name.clone(),
        )]))
        .build())
}

/// Flush buffered spans and stop the exporter, waiting at most `timeout`.
pub async fn drain(provider: TracerProvider, timeout: Duration) {
    // Provider shutdown blocks until the batch task answers.
    let shutdown = tokio::task::spawn_blocking(move || provider.shutdown());
    match tokio::time::timeout(timeout, shutdown).await {
        Ok(Ok(Ok(()))) => tracing::debug!("Telemetry exporter drained"),
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Telemetry exporter shutdown failed"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Telemetry exporter task failed"),
        Err(_) => tracing::warn!("Telemetry exporter did not drain in time"),
    }
}
