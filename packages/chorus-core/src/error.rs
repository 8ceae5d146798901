//! Centralized error types for the Chorus core library.
//!
//! Two distinct error surfaces exist:
//!
//! - [`ChorusError`]: HTTP-facing errors, mapped to status codes and a JSON
//!   body via `IntoResponse`.
//! - [`CommandError`]: session-command failures, rendered as targeted
//!   `error` messages over the WebSocket and never surfaced via HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::library::LibraryError;

/// Application-wide error type for the HTTP surface.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// No live session exists for the given ID.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Requested media file does not exist (or is missing from storage).
    #[error("Media not found: {0}")]
    MediaNotFound(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Stream token failed validation (bad signature, expired, malformed).
    #[error("Invalid stream token: {0}")]
    InvalidToken(String),

    /// The media library collaborator failed.
    #[error("Library error: {0}")]
    Library(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChorusError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::MediaNotFound(_) => "media_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidToken(_) => "invalid_token",
            Self::Library(_) => "library_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) | Self::MediaNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Library(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for HTTP handlers.
pub type ChorusResult<T> = Result<T, ChorusError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for ChorusError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<LibraryError> for ChorusError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::NotFound(id) | LibraryError::Missing(id) => Self::MediaNotFound(id),
            other => Self::Library(other.to_string()),
        }
    }
}

/// Failures of session commands.
///
/// The `Display` strings are the wire contract: they are delivered verbatim
/// inside `error` messages to the offending participant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A holder-only action was attempted by a non-holder.
    #[error("only the remote holder can {0}")]
    AuthorityDenied(&'static str),

    /// The command payload was missing or malformed.
    #[error("invalid {0} payload")]
    InvalidPayload(&'static str),

    /// A queue position fell outside `[0, queue_len)`.
    #[error("invalid queue position")]
    OutOfRange,

    /// A reorder endpoint fell outside `[0, queue_len)`.
    #[error("invalid queue positions")]
    ReorderOutOfRange,

    /// Removing the currently playing track is not allowed.
    #[error("cannot remove the currently playing track")]
    RemoveCurrent,

    /// The named participant is not in this session.
    #[error("participant not found")]
    ParticipantNotFound,

    /// The media file could not be resolved through the library.
    #[error("track not found")]
    TrackNotFound,

    /// Unrecognised command action.
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_maps_to_404() {
        let err = ChorusError::SessionNotFound("abc".into());
        assert_eq!(err.code(), "session_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_token_maps_to_401() {
        let err = ChorusError::InvalidToken("expired".into());
        assert_eq!(err.code(), "invalid_token");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn library_not_found_becomes_media_not_found() {
        let err: ChorusError = LibraryError::NotFound("mf-1".into()).into();
        assert_eq!(err.code(), "media_not_found");
    }

    #[test]
    fn command_error_strings_are_stable() {
        assert_eq!(
            CommandError::AuthorityDenied("control playback").to_string(),
            "only the remote holder can control playback"
        );
        assert_eq!(
            CommandError::RemoveCurrent.to_string(),
            "cannot remove the currently playing track"
        );
        assert_eq!(
            CommandError::UnknownAction("warp".into()).to_string(),
            "unknown action: warp"
        );
    }
}
