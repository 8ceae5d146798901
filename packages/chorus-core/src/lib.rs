//! Chorus Core - shared library for the Chorus group listening server.
//!
//! This crate provides the live session hub for Chorus: multiple clients
//! connected to a shared session hear the same track queue, see each other,
//! and observe a single designated remote holder driving playback.
//!
//! # Architecture
//!
//! - [`hub`]: the session registry and per-session runtime state
//! - [`protocol`]: the JSON wire protocol spoken over the WebSocket
//! - [`token`]: signed streaming tokens handed out per track
//! - [`library`]: contracts for the external media library and streamer
//! - [`api`]: the HTTP/WebSocket surface (axum)
//! - [`error`]: centralized error types
//!
//! Persistence is deliberately absent: the hub consumes loaded session
//! descriptors and keeps everything else in memory. A session whose last
//! participant left expires after a short grace period.

#![warn(clippy::all)]

pub mod api;
pub mod error;
pub mod hub;
pub mod library;
pub mod protocol;
pub mod protocol_constants;
pub mod state;
pub mod token;

// Re-export commonly used types at the crate root
pub use api::{start_server, AppState, ServerError};
pub use error::{ChorusError, ChorusResult, CommandError};
pub use hub::{Hub, JoinedParticipant, LiveSession, SessionSummary};
pub use library::{
    LibraryError, MediaBody, MediaFile, MediaLibrary, MediaStream, MediaStreamer,
    SessionDescriptor,
};
pub use protocol::{Command, StatePayload, Track, WsMessage};
pub use state::Config;
pub use token::{StreamClaims, StreamTokens};
