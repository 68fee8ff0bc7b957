use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ephemera_types::{DisplayName, ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::error::ServerResult;
use crate::state::AppState;

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.store.stats();
    Json(json!({
        "name": "ephemera-server",
        "version": env!("CARGO_PKG_VERSION"),
        "retention_secs": state.store.config().retention_secs,
        "active_objects": stats.active,
        "draining_objects": stats.draining,
        "next_expiry": stats.next_expiry,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PutParams {
    /// Suggested download filename. Sanitized; never used to locate the object.
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PutResponse {
    pub id: ObjectId,
    pub name: DisplayName,
    pub url: String,
    pub size: u64,
    pub expires_at: DateTime<Utc>,
}

/// `POST /v1/objects?name=<name>` with the raw payload as body.
pub async fn put_object(
    State(state): State<AppState>,
    Query(params): Query<PutParams>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<PutResponse>)> {
    let stored = state
        .store
        .put(body, params.name.as_deref().unwrap_or_default())
        .await?;

    tracing::info!(
        id = %stored.meta.id.short(),
        size = stored.meta.size,
        "object uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(PutResponse {
            url: stored.reference.to_url(&state.public_base_url),
            id: stored.meta.id,
            name: stored.meta.name,
            size: stored.meta.size,
            expires_at: stored.meta.expires_at,
        }),
    ))
}

/// `GET /v1/objects/:id`
pub async fn get_object(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    stream_object(&state, &id).await
}

/// `GET /v1/objects/:id/:name`. The name segment is cosmetic and ignored.
pub async fn get_named_object(
    State(state): State<AppState>,
    Path((id, _name)): Path<(String, String)>,
) -> ServerResult<Response> {
    stream_object(&state, &id).await
}

/// `DELETE /v1/objects/:id`. Always 204, so callers cannot probe for ids.
///
/// A failed unlink has already been queued for retry by the store; it is
/// logged here rather than reported.
pub async fn delete_object(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if let Err(e) = state.store.evict(&id).await {
        tracing::warn!(error = %e, "eviction failed; deletion queued for retry");
    }
    StatusCode::NO_CONTENT
}

async fn stream_object(state: &AppState, id: &str) -> ServerResult<Response> {
    let reader = state.store.get(id).await?;
    let name = reader.meta().name.clone();
    let headers = [
        (CONTENT_TYPE, content_type_for(name.extension()).to_string()),
        (CONTENT_LENGTH, reader.len().to_string()),
        (CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(reader))).into_response())
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}
