//! Storage backend subsystem.
//!
//! # Data Flow
//! ```text
//! handler (table/queue name from path)
//!     → StorageReader (immutable accounts parsed at startup)
//!     → table.rs / queue.rs (short-lived client per request)
//!     → auth.rs (SharedKey / SharedKeyLite / SAS)
//!     → storage REST endpoint
//! ```
//!
//! # Design Decisions
//! - One client value per request; only the HTTP connection pool is shared
//! - Every backend call carries an explicit timeout
//! - No retries; failures surface as `StorageError`

pub mod account;
pub mod auth;
pub mod error;
pub mod queue;
pub mod table;

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use account::{Credential, StorageAccount};
pub use error::{StorageError, StorageResult};
pub use queue::QueueClient;
pub use table::{TableClient, TableEntity};

use crate::config::{QueueReadMode, StorageConfig};
use crate::observability::metrics;

/// Reads tables and queues of the configured storage accounts.
#[derive(Clone)]
pub struct StorageReader {
    http: reqwest::Client,
    table_account: Arc<StorageAccount>,
    queue_account: Arc<StorageAccount>,
    timeout: Duration,
    max_messages: u32,
    read_mode: QueueReadMode,
    visibility_timeout_secs: u64,
}

impl StorageReader {
    /// Parse both connection strings and prepare the shared HTTP client.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let table_account = StorageAccount::from_connection_string(&config.table_connection_string)?;
        let queue_account = StorageAccount::from_connection_string(&config.queue_connection_string)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("storage-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::Transport)?;

        Ok(Self {
            http,
            table_account: Arc::new(table_account),
            queue_account: Arc::new(queue_account),
            timeout: Duration::from_secs(config.timeout_secs),
            max_messages: config.queue_max_messages,
            read_mode: config.queue_read_mode,
            visibility_timeout_secs: config.queue_visibility_timeout_secs,
        })
    }

    /// List every entity of `table_name`.
    pub async fn read_table_entries(&self, table_name: &str) -> StorageResult<Vec<TableEntity>> {
        let start = Instant::now();
        let client = TableClient::new(&self.http, &self.table_account, table_name, self.timeout);
        let result = client.query_entities().await;
        metrics::record_backend_call("table", outcome(&result), start);
        result
    }

    /// Read up to the configured number of message bodies from `queue_name`.
    pub async fn read_queue_messages(&self, queue_name: &str) -> StorageResult<Vec<String>> {
        let start = Instant::now();
        let client = QueueClient::new(&self.http, &self.queue_account, queue_name, self.timeout);
        let result = client
            .read_messages(self.max_messages, self.read_mode, self.visibility_timeout_secs)
            .await;
        metrics::record_backend_call("queue", outcome(&result), start);
        result
    }
}

fn outcome<T>(result: &StorageResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
