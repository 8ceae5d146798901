//! WebSocket handler for live session connections.
//!
//! Each connection runs two independent loops: a read loop that feeds
//! commands into the session and a write loop that drains the
//! participant's send queue while keeping the connection alive with
//! periodic pings. Either loop failing tears the whole connection down,
//! and participant departure runs exactly once, after the read loop exits.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::sink::SinkExt;
use futures::stream::{SplitSink, SplitStream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::error::ChorusError;
use crate::hub::LiveSession;
use crate::protocol::WsMessage;
use crate::protocol_constants::{
    MAX_MESSAGE_SIZE, PING_PERIOD_SECS, PONG_WAIT_SECS, WRITE_WAIT_SECS,
};

#[derive(Deserialize)]
pub(crate) struct JoinQuery {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    host: Option<bool>,
}

/// WebSocket upgrade handler.
///
/// Joining is deliberately unauthenticated: a session URL is a bearer
/// capability, and only session creation requires an account.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    Query(query): Query<JoinQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(session) = state.hub.get(&id) else {
        return ChorusError::SessionNotFound(id).into_response();
    };

    let name = query
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "Guest".to_string());
    let is_host = query.host.unwrap_or(false);

    ws.on_upgrade(move |socket| handle_socket(socket, session, name, is_host))
}

/// Main connection handler: joins the session, runs both loops, and leaves
/// exactly once when the read loop ends.
async fn handle_socket(socket: WebSocket, session: Arc<LiveSession>, name: String, is_host: bool) {
    let (sink, stream) = socket.split();

    let joined = session.join(&name, is_host);
    let participant_id = joined.id;
    let cancel = joined.cancel;

    log::info!(
        "[WS] connection open: participant={} session={}",
        participant_id,
        session.id()
    );

    let write_task = tokio::spawn(write_loop(sink, joined.rx, cancel.clone()));

    read_loop(stream, &session, &participant_id, &cancel).await;

    // The read loop is the single departure trigger; leave() is idempotent
    // for the already-terminated case.
    session.leave(&participant_id);
    cancel.cancel();
    let _ = write_task.await;

    log::info!(
        "[WS] connection closed: participant={} session={}",
        participant_id,
        session.id()
    );
}

/// Reads frames until the client disconnects, the inactivity deadline
/// passes, or the connection is cancelled. Any inbound frame (pongs
/// included) advances the deadline.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    session: &Arc<LiveSession>,
    participant_id: &str,
    cancel: &CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout(Duration::from_secs(PONG_WAIT_SECS), stream.next()) => {
                match next {
                    Ok(frame) => frame,
                    Err(_) => {
                        log::warn!("[WS] read deadline exceeded: {}", participant_id);
                        break;
                    }
                }
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                if text.len() > MAX_MESSAGE_SIZE {
                    log::warn!(
                        "[WS] oversized frame ({} bytes) from {}, closing",
                        text.len(),
                        participant_id
                    );
                    break;
                }
                // Unparseable frames are dropped; reconnecting is cheaper
                // than negotiating with a broken client.
                let Ok(message) = serde_json::from_str::<WsMessage>(&text) else {
                    continue;
                };
                session.handle_message(participant_id, &message).await;
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {} // ping/pong/binary only refresh the deadline
        }
    }
}

/// Multiplexes the participant's send queue with the keep-alive ping.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval(Duration::from_secs(PING_PERIOD_SECS));
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; an early ping is harmless.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Flush anything already queued (e.g. session_ended) before
                // closing.
                while let Ok(queued) = rx.try_recv() {
                    if write_frame(&mut sink, Message::Text(queued.into())).await.is_err() {
                        return;
                    }
                }
                let _ = write_frame(&mut sink, Message::Close(None)).await;
                return;
            }
            queued = rx.recv() => {
                match queued {
                    Some(text) => {
                        if write_frame(&mut sink, Message::Text(text.into())).await.is_err() {
                            cancel.cancel();
                            return;
                        }
                    }
                    None => {
                        let _ = write_frame(&mut sink, Message::Close(None)).await;
                        return;
                    }
                }
            }
            _ = ping.tick() => {
                if write_frame(&mut sink, Message::Ping(Bytes::new())).await.is_err() {
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

/// One socket write, bounded by the write deadline.
async fn write_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
) -> Result<(), ()> {
    match tokio::time::timeout(Duration::from_secs(WRITE_WAIT_SECS), sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}
