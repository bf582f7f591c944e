//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the table, queue and health handlers
//! - Wire up middleware (request ID, tracing, timeout, panic capture)
//! - Serve on a listener until the shutdown signal fires
//! - Drain the telemetry exporter on the way out

use std::time::Duration;

use axum::{middleware, routing::get, Router};
use opentelemetry_sdk::trace::TracerProvider;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::handlers::{health, not_found, read_queue_messages, read_table_entries};
use crate::http::middleware::trace_request;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::observability::exporter::{self, ExporterError};
use crate::observability::RequestTracer;
use crate::storage::{StorageError, StorageReader};

/// Upper bound on how long shutdown waits for the last telemetry flush.
const EXPORTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageReader,
    pub tracer: RequestTracer,
}

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(#[from] ExporterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the storage proxy.
pub struct HttpServer {
    router: Router,
    provider: TracerProvider,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Starts the telemetry batch processor, so it must be called inside a
    /// Tokio runtime.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let storage = StorageReader::from_config(&config.storage)?;
        let provider = exporter::build_provider(&config.telemetry)?;

        let state = AppState {
            storage,
            tracer: RequestTracer::new(&provider),
        };
        let router = Self::build_router(&config, state);
        Ok(Self { router, provider })
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        with_middleware(routes(), config, state)
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let HttpServer { router, provider } = self;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");

        exporter::drain(provider, EXPORTER_DRAIN_TIMEOUT).await;
        Ok(())
    }
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/table/{table_name}", get(read_table_entries))
        .route("/queue/{queue_name}", get(read_queue_messages))
        .route("/health", get(health))
        .fallback(not_found)
}

/// Wrap `routes` in the request pipeline.
///
/// Layers listed first run innermost: panics become 500s and timeouts
/// become 408s before the tracing stage observes the status.
#[allow(deprecated)]
pub(crate) fn with_middleware(
    routes: Router<AppState>,
    config: &ProxyConfig,
    state: AppState,
) -> Router {
    routes
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::from_fn_with_state(state.clone(), trace_request))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .with_state(state)
}
