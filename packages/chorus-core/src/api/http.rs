//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the hub and the library
//! collaborators.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::stream::stream_media;
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::{ChorusError, ChorusResult};
use crate::hub::SessionSummary;
use crate::library::SessionDescriptor;
use crate::protocol_constants::SEARCH_RESULT_LIMIT;

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    /// Creator's user ID. Library reads for this session run under it.
    #[serde(default)]
    user_id: Option<String>,
    media_file_ids: Vec<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    max_bit_rate: Option<u32>,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    id: String,
    url: String,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    id: String,
    title: String,
    artist: String,
    album: String,
    duration: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes, mounted under the configured
/// base path.
pub fn create_router(state: AppState) -> Router {
    let base = state.config.normalized_base_path();
    let routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/lt/{id}/ws", get(ws_handler))
        .route("/lt/{id}/search", get(search_library))
        .route("/lt/s/{token}", get(stream_media))
        .with_state(state);

    if base.is_empty() {
        routes
    } else {
        Router::new().nest(&base, routes)
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session API
// ─────────────────────────────────────────────────────────────────────────────

/// Creates a live session from a list of media file IDs and eagerly primes
/// the hub, so the first WebSocket join finds it.
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ChorusResult<Json<CreateSessionResponse>> {
    if request.media_file_ids.is_empty() {
        return Err(ChorusError::InvalidRequest(
            "mediaFileIds must not be empty".into(),
        ));
    }

    let library = state.hub.library();
    let mut tracks = Vec::with_capacity(request.media_file_ids.len());
    for id in &request.media_file_ids {
        let media = library.get(id).await?;
        if media.missing {
            return Err(ChorusError::MediaNotFound(id.clone()));
        }
        tracks.push(media);
    }

    let descriptor = SessionDescriptor {
        id: Uuid::new_v4().simple().to_string(),
        user_id: request.user_id.unwrap_or_default(),
        tracks,
        format: request.format,
        max_bit_rate: request.max_bit_rate,
    };
    state.hub.get_or_create(&descriptor);

    let url = format!(
        "{}/lt/{}",
        state.config.normalized_base_path(),
        descriptor.id
    );
    Ok(Json(CreateSessionResponse {
        id: descriptor.id,
        url,
    }))
}

async fn get_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ChorusResult<Json<SessionSummary>> {
    let session = state
        .hub
        .get(&id)
        .ok_or_else(|| ChorusError::SessionNotFound(id))?;
    Ok(Json(session.summary()))
}

/// Terminates a live session: every participant is notified and
/// disconnected, then the session is evicted.
async fn delete_session(Path(id): Path<String>, State(state): State<AppState>) -> StatusCode {
    if let Some(session) = state.hub.get(&id) {
        session.terminate();
    }
    StatusCode::NO_CONTENT
}

// ─────────────────────────────────────────────────────────────────────────────
// Library Search
// ─────────────────────────────────────────────────────────────────────────────

/// In-session library search, used by the queue-add UI. Runs under the
/// session creator's read authority.
async fn search_library(
    Path(id): Path<String>,
    Query(query): Query<SearchQuery>,
    State(state): State<AppState>,
) -> ChorusResult<Json<Vec<SearchResult>>> {
    let session = state
        .hub
        .get(&id)
        .ok_or_else(|| ChorusError::SessionNotFound(id))?;

    if query.q.trim().is_empty() {
        return Ok(Json(vec![]));
    }

    let results = state
        .hub
        .library()
        .search(session.host_user_id(), query.q.trim(), SEARCH_RESULT_LIMIT)
        .await?;

    Ok(Json(
        results
            .into_iter()
            .map(|media| SearchResult {
                id: media.id,
                title: media.title,
                artist: media.artist,
                album: media.album,
                duration: media.duration,
            })
            .collect(),
    ))
}
