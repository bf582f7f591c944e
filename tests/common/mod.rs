//! Shared utilities for integration tests: mock storage and ingestion
//! endpoints plus a proxy instance wired to them.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::GzDecoder;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use storage_proxy::config::ProxyConfig;
use storage_proxy::http::HttpServer;
use storage_proxy::lifecycle::Shutdown;

pub const ACCOUNT: &str = "testaccount";
pub const ACCOUNT_KEY: &str = "dGVzdC1rZXk=";
/// A well-formed key that is not the account's.
pub const WRONG_ACCOUNT_KEY: &str = "b3RoZXIta2V5";
pub const INSTRUMENTATION_KEY: &str = "11111111-2222-3333-4444-555555555555";

/// Entities returned per table page by the mock.
pub const TABLE_PAGE_SIZE: usize = 2;

/// A request as seen by the mock storage service.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub has_date: bool,
}

/// In-memory table and queue service speaking the storage REST dialect.
#[derive(Clone, Default)]
pub struct MockStorage {
    pub tables: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    pub queues: Arc<Mutex<HashMap<String, Vec<String>>>>,
    pub requests: Arc<Mutex<Vec<SeenRequest>>>,
    /// Stall every response this long before answering.
    pub delay: Option<Duration>,
    /// Hand out the same table continuation token on every page.
    pub stuck_continuation: bool,
}

impl MockStorage {
    pub fn with_table(self, name: &str, entities: Vec<Value>) -> Self {
        self.tables.lock().unwrap().insert(name.to_string(), entities);
        self
    }

    pub fn with_queue(self, name: &str, messages: &[&str]) -> Self {
        self.queues.lock().unwrap().insert(
            name.to_string(),
            messages.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_stuck_continuation(mut self) -> Self {
        self.stuck_continuation = true;
        self
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn stall(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(&self, path: String, query: &HashMap<String, String>, headers: &HeaderMap) {
        self.requests.lock().unwrap().push(SeenRequest {
            path,
            query: query.clone(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            has_date: headers.contains_key("x-ms-date"),
        });
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(&format!("/{}/{{resource}}", ACCOUNT), get(table_handler))
            .route(&format!("/{}/{{queue}}/messages", ACCOUNT), get(queue_handler))
            .with_state(self.clone())
    }
}

fn storage_error(status: StatusCode, code: &str) -> Response {
    (
        status,
        [("x-ms-error-code", code.to_string())],
        format!("<Error><Code>{}</Code></Error>", code),
    )
        .into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

/// SharedKeyLite: date, then `/{account}{path}`.
fn table_string_to_sign(headers: &HeaderMap, uri: &Uri) -> String {
    format!("{}\n/{}{}", header(headers, "x-ms-date"), ACCOUNT, uri.path())
}

/// SharedKey: verb and twelve standard header lines (all empty for a GET),
/// sorted `x-ms-*` headers, `/{account}{path}`, sorted query parameters.
fn queue_string_to_sign(headers: &HeaderMap, uri: &Uri) -> String {
    let mut out = format!("GET{}", "\n".repeat(12));

    let ms_headers: BTreeMap<String, &str> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| (name.as_str().to_string(), value.to_str().unwrap_or("").trim()))
        .collect();
    for (name, value) in ms_headers {
        out.push_str(&format!("{}:{}\n", name, value));
    }

    out.push_str(&format!("/{}{}", ACCOUNT, uri.path()));
    let params: BTreeMap<String, String> =
        url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
            .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
            .collect();
    for (name, value) in params {
        out.push_str(&format!("\n{}:{}", name, value));
    }
    out
}

/// Recompute the signature with the account key and compare.
fn authorized(headers: &HeaderMap, scheme: &str, string_to_sign: &str) -> bool {
    let key = STANDARD.decode(ACCOUNT_KEY).unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
    mac.update(string_to_sign.as_bytes());
    let expected = format!(
        "{} {}:{}",
        scheme,
        ACCOUNT,
        STANDARD.encode(mac.finalize().into_bytes())
    );
    header(headers, "authorization") == expected
}

async fn table_handler(
    State(mock): State<MockStorage>,
    Path(resource): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    mock.record(resource.clone(), &query, &headers);
    mock.stall().await;
    if !authorized(&headers, "SharedKeyLite", &table_string_to_sign(&headers, &uri)) {
        return storage_error(StatusCode::FORBIDDEN, "AuthenticationFailed");
    }
    let Some(name) = resource.strip_suffix("()") else {
        return storage_error(StatusCode::BAD_REQUEST, "InvalidUri");
    };

    let tables = mock.tables.lock().unwrap();
    let Some(entities) = tables.get(name) else {
        return storage_error(StatusCode::NOT_FOUND, "TableNotFound");
    };

    let start: usize = query
        .get("NextPartitionKey")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let end = (start + TABLE_PAGE_SIZE).min(entities.len());
    let page: Vec<Value> = entities.get(start..end).unwrap_or_default().to_vec();

    let mut response = Json(json!({ "value": page })).into_response();
    if mock.stuck_continuation {
        let headers = response.headers_mut();
        headers.insert("x-ms-continuation-nextpartitionkey", "0".parse().unwrap());
        headers.insert("x-ms-continuation-nextrowkey", "rk0".parse().unwrap());
    } else if end < entities.len() {
        let headers = response.headers_mut();
        headers.insert("x-ms-continuation-nextpartitionkey", end.to_string().parse().unwrap());
        headers.insert("x-ms-continuation-nextrowkey", format!("rk{}", end).parse().unwrap());
    }
    response
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

async fn queue_handler(
    State(mock): State<MockStorage>,
    Path(queue): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    mock.record(format!("{}/messages", queue), &query, &headers);
    mock.stall().await;
    if !authorized(&headers, "SharedKey", &queue_string_to_sign(&headers, &uri)) {
        return storage_error(StatusCode::FORBIDDEN, "AuthenticationFailed");
    }

    let queues = mock.queues.lock().unwrap();
    let Some(messages) = queues.get(&queue) else {
        return storage_error(StatusCode::NOT_FOUND, "QueueNotFound");
    };

    let count: usize = query
        .get("numofmessages")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

    let mut body = String::from("\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessagesList>");
    for (i, text) in messages.iter().take(count).enumerate() {
        body.push_str(&format!(
            "<QueueMessage><MessageId>{}</MessageId><InsertionTime>Mon, 01 Jan 2024 00:00:00 GMT</InsertionTime><DequeueCount>0</DequeueCount><MessageText>{}</MessageText></QueueMessage>",
            i,
            xml_escape(text)
        ));
    }
    body.push_str("</QueueMessagesList>");

    ([("content-type", "application/xml")], body).into_response()
}

/// Collects envelopes posted to `/v2/track`.
#[derive(Clone, Default)]
pub struct MockIngestion {
    pub envelopes: Arc<Mutex<Vec<Value>>>,
}

impl MockIngestion {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/v2/track", post(track_handler))
            .with_state(self.clone())
    }

    pub fn envelopes(&self) -> Vec<Value> {
        self.envelopes.lock().unwrap().clone()
    }
}

async fn track_handler(
    State(ingestion): State<MockIngestion>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let mut raw = Vec::new();
    if header(&headers, "content-encoding") == "gzip" {
        GzDecoder::new(&body[..]).read_to_end(&mut raw).unwrap();
    } else {
        raw.extend_from_slice(&body);
    }
    let batch: Vec<Value> = serde_json::from_slice(&raw).unwrap();
    let count = batch.len();
    ingestion.envelopes.lock().unwrap().extend(batch);
    Json(json!({ "itemsReceived": count, "itemsAccepted": count, "errors": [] }))
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Proxy configuration pointing at the given mock endpoints.
pub fn proxy_config(storage_addr: SocketAddr, ingestion_addr: SocketAddr) -> ProxyConfig {
    let connection_string = format!(
        "AccountName={account};AccountKey={key};TableEndpoint=http://{addr}/{account};QueueEndpoint=http://{addr}/{account}",
        account = ACCOUNT,
        key = ACCOUNT_KEY,
        addr = storage_addr,
    );

    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.storage.table_connection_string = connection_string.clone();
    config.storage.queue_connection_string = connection_string;
    config.storage.timeout_secs = 5;
    config.telemetry.instrumentation_key = INSTRUMENTATION_KEY.to_string();
    config.telemetry.ingestion_endpoint = format!("http://{}", ingestion_addr);
    config.telemetry.flush_interval_ms = 20;
    config.observability.metrics_enabled = false;
    config
}

/// A running proxy wired to mock storage and ingestion.
pub struct TestProxy {
    pub base_url: String,
    pub storage: MockStorage,
    pub ingestion: MockIngestion,
    pub client: reqwest::Client,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestProxy {
    pub async fn start(storage: MockStorage) -> Self {
        Self::start_with(storage, |_| {}).await
    }

    pub async fn start_with<F>(storage: MockStorage, customize: F) -> Self
    where
        F: FnOnce(&mut ProxyConfig),
    {
        let ingestion = MockIngestion::default();
        let storage_addr = spawn_router(storage.router()).await;
        let ingestion_addr = spawn_router(ingestion.router()).await;

        let mut config = proxy_config(storage_addr, ingestion_addr);
        customize(&mut config);

        let server = HttpServer::new(config).expect("proxy should start");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        let handle = tokio::spawn(async move {
            server.run(listener, server_shutdown).await.unwrap();
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        Self {
            base_url: format!("http://{}", proxy_addr),
            storage,
            ingestion,
            client,
            shutdown,
            handle,
        }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("proxy unreachable")
    }

    /// Poll until at least `count` envelopes arrived, or five seconds pass.
    pub async fn wait_for_envelopes(&self, count: usize) -> Vec<Value> {
        for _ in 0..250 {
            let envelopes = self.ingestion.envelopes();
            if envelopes.len() >= count {
                return envelopes;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.ingestion.envelopes()
    }

    /// Trigger shutdown and wait for the server, including the final flush.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(10), self.handle).await;
    }
}
