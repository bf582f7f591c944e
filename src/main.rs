//! Storage proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────┐
//!                     │                 STORAGE PROXY                 │
//!                     │                                               │
//!   GET /table/{t}    │  ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//!   GET /queue/{q} ───┼─▶│ request  │──▶│ handler │──▶│  storage  │──┼──▶ Table / Queue
//!                     │  │  span    │   └─────────┘   │  reader   │  │    REST service
//!   JSON  ◀───────────┼──│ (tracer) │◀──────────────────────────────┘  │
//!                     │  └────┬─────┘                                 │
//!                     │       │ finished span (non-blocking)          │
//!                     │       ▼                                       │
//!                     │  ┌──────────┐                                 │
//!                     │  │ exporter │─────────────────────────────────┼──▶ Telemetry
//!                     │  └──────────┘                                 │    ingestion
//!                     └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use storage_proxy::config::{load_config, CliOverrides};
use storage_proxy::http::HttpServer;
use storage_proxy::lifecycle::{signals, Shutdown};
use storage_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "storage-proxy")]
#[command(about = "Read-only HTTP proxy for storage tables and queues", long_about = None)]
struct Cli {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = CliOverrides {
        bind_address: cli.bind,
    };
    let config = load_config(cli.config.as_deref(), &overrides)?;

    logging::init_logging(&config.observability)?;

    tracing::info!("storage-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        storage_timeout_secs = config.storage.timeout_secs,
        queue_read_mode = ?config.storage.queue_read_mode,
        queue_max_messages = config.storage.queue_max_messages,
        telemetry_enabled = config.telemetry.enabled,
        sampling_ratio = config.telemetry.sampling_ratio,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
