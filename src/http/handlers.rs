//! Route handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::storage::TableEntity;

/// `GET /table/{table_name}`: every entity of the table.
pub async fn read_table_entries(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> Result<Json<Vec<TableEntity>>, ApiError> {
    let entries = state.storage.read_table_entries(&table_name).await?;
    Ok(Json(entries))
}

/// `GET /queue/{queue_name}`: up to the configured number of message bodies.
pub async fn read_queue_messages(
    State(state): State<AppState>,
    Path(queue_name): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let messages = state.storage.read_queue_messages(&queue_name).await?;
    Ok(Json(messages))
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Fallback for unknown routes, in the same `{"detail": ...}` shape as API errors.
pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "detail": "Not Found" })))
}
