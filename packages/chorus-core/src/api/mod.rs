//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to the hub.
//! It provides the router construction and server startup functionality.

use std::sync::Arc;

use thiserror::Error;

use crate::hub::Hub;
use crate::library::MediaStreamer;
use crate::state::Config;
use crate::token::StreamTokens;

pub mod http;
mod stream;
pub mod ws;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or serve on the configured port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// A thin wrapper holding references to the hub and the external
/// collaborators; all session logic lives behind the hub.
#[derive(Clone)]
pub struct AppState {
    /// Registry of live sessions.
    pub hub: Arc<Hub>,
    /// Streams media bytes for validated stream tokens.
    pub streamer: Arc<dyn MediaStreamer>,
    /// Validates stream tokens (same key the hub mints with).
    pub tokens: Arc<StreamTokens>,
    /// Server configuration.
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(hub: Arc<Hub>, streamer: Arc<dyn MediaStreamer>, config: Config) -> Self {
        let tokens = hub.tokens();
        Self {
            hub,
            streamer,
            tokens,
            config: Arc::new(config),
        }
    }
}

/// Starts the HTTP server on the configured port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.config.preferred_port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Server listening on http://{}", addr);
    let app = http::create_router(state);

    axum::serve(listener, app).await?;
    Ok(())
}
