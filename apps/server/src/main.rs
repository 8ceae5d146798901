//! Chorus Server - standalone headless server for group listening sessions.
//!
//! Serves a directory of media files described by a YAML manifest, hosts
//! the live session hub, and exposes the WebSocket/HTTP surface. Designed
//! to run as a background daemon.

mod config;
mod library;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chorus_core::{AppState, Hub, MediaLibrary, MediaStreamer, StreamTokens};
use clap::Parser;
use tokio::signal;

use crate::config::ServerConfig;
use crate::library::FsMediaLibrary;

/// Chorus Server - synchronized group listening sessions over your library.
#[derive(Parser, Debug)]
#[command(name = "chorus-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CHORUS_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "CHORUS_BIND_PORT")]
    port: Option<u16>,

    /// Media library manifest (overrides config file).
    #[arg(short = 'm', long, env = "CHORUS_LIBRARY_MANIFEST")]
    library_manifest: Option<PathBuf>,

    /// Directory that relative media paths resolve against.
    #[arg(short = 'd', long, env = "CHORUS_MEDIA_DIR")]
    media_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Chorus Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(manifest) = args.library_manifest {
        config.library_manifest = Some(manifest);
    }
    if let Some(media_dir) = args.media_dir {
        config.media_dir = Some(media_dir);
    }

    let Some(manifest_path) = config.library_manifest.clone() else {
        bail!(
            "No library manifest configured. \
             Pass --library-manifest or set CHORUS_LIBRARY_MANIFEST to a YAML \
             file describing the media files to serve."
        );
    };
    let media_dir = config
        .media_dir
        .clone()
        .or_else(|| manifest_path.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    log::info!(
        "Configuration: bind_port={}, manifest={}, media_dir={}",
        config.bind_port,
        manifest_path.display(),
        media_dir.display()
    );

    let library = Arc::new(
        FsMediaLibrary::load(&manifest_path, &media_dir)
            .context("Failed to load media library")?,
    );
    if library.is_empty() {
        log::warn!("Library manifest is empty; sessions will have nothing to play");
    }

    let tokens = match config.signing_secret.as_deref() {
        Some(secret) => Arc::new(StreamTokens::new(secret.as_bytes())),
        None => {
            log::info!("No signing secret configured, using a process-random key");
            Arc::new(StreamTokens::generate())
        }
    };

    let hub = Hub::new(Arc::clone(&library) as Arc<dyn MediaLibrary>, tokens);
    let state = AppState::new(
        hub,
        Arc::clone(&library) as Arc<dyn MediaStreamer>,
        config.to_core_config(),
    );

    // Spawn the HTTP server on the main runtime.
    let server_handle = tokio::spawn(async move {
        if let Err(e) = chorus_core::start_server(state).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("HTTP server started on port {}", config.bind_port);

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");
    server_handle.abort();
    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
