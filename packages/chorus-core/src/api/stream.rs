//! Public media streaming handler.
//!
//! Separated from the REST handlers because its response is a byte stream,
//! not JSON. The token in the URL is the sole authorization: it was minted
//! for one media file with the session's format and bit-rate settings and
//! expires on its own.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;

use crate::api::AppState;
use crate::error::{ChorusError, ChorusResult};

pub(super) async fn stream_media(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> ChorusResult<Response> {
    let claims = state.tokens.decode(&token)?;

    log::debug!(
        "[Stream] open: media={} format={:?} maxBitRate={:?}",
        claims.id,
        claims.f,
        claims.b
    );

    let media = state
        .streamer
        .open(&claims.id, claims.f.as_deref(), claims.b)
        .await?;

    Response::builder()
        .header(header::CONTENT_TYPE, media.content_type)
        .body(Body::from_stream(media.body))
        .map_err(|err| ChorusError::Internal(err.to_string()))
}
