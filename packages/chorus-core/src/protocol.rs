//! Wire protocol for the live-session WebSocket.
//!
//! Every frame is a JSON envelope `{type, action?, payload?}`. The payload
//! is carried as a raw [`serde_json::Value`] so it survives the envelope
//! round-trip verbatim; typed payload structs decode it at the consumer.
//!
//! `command` frames flow client→server; every other type flows
//! server→client.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommandError;

/// Message envelope exchanged over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Message category: `welcome`, `state`, `participants`, `remote`,
    /// `remote_requested`, `error`, `command`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sub-type. For `command` frames this selects the operation; for
    /// `state` frames it names the cause of the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Action-specific data, preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl WsMessage {
    fn server<P: Serialize>(kind: &str, action: Option<&str>, payload: &P) -> Self {
        Self {
            kind: kind.to_string(),
            action: action.map(str::to_string),
            payload: serde_json::to_value(payload).ok(),
        }
    }

    pub fn welcome(payload: &WelcomePayload) -> Self {
        Self::server("welcome", None, payload)
    }

    pub fn state(payload: &StatePayload) -> Self {
        Self::server("state", None, payload)
    }

    pub fn participants(payload: &ParticipantsPayload) -> Self {
        Self::server("participants", None, payload)
    }

    pub fn remote(payload: &RemotePayload) -> Self {
        Self::server("remote", None, payload)
    }

    pub fn remote_requested(payload: &RemoteRequestedPayload) -> Self {
        Self::server("remote_requested", None, payload)
    }

    pub fn error(message: &str) -> Self {
        Self::server(
            "error",
            None,
            &ErrorPayload {
                message: message.to_string(),
            },
        )
    }

    /// The terminal notification delivered before the session is torn down.
    pub fn session_ended() -> Self {
        Self {
            kind: "error".to_string(),
            action: Some("session_ended".to_string()),
            payload: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server→Client Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// One playable track pinned to a session, including its streaming token.
///
/// The track's position in the session `tracks` list is its stable identity
/// for the life of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    /// Signed streaming token for this track.
    pub token: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: f32,
    /// Original media file ID, kept for search/queue-add deduplication.
    pub media_file_id: String,
}

/// Complete playback snapshot broadcast after every state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    /// What triggered this update (e.g. `play`, `seek`, `queue_add`).
    /// Clients use it to decide whether to apply the position.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    pub current_track_index: usize,
    pub position: f64,
    pub is_playing: bool,
    pub queue: Vec<Track>,
}

/// Public projection of a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub is_host: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsPayload {
    pub participants: Vec<ParticipantInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePayload {
    pub holder_id: String,
    pub holder_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequestedPayload {
    pub from_id: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub your_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client→Server Commands
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of session commands.
///
/// Unknown actions yield [`CommandError::UnknownAction`]; there are no
/// extensibility hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Seek { position: f64 },
    SkipNext,
    SkipPrev,
    Sync { position: f64, track_index: i64 },
    PassRemote { participant_id: String },
    RequestRemote,
    AcceptRemoteRequest { participant_id: String },
    QueueAdd { media_file_id: String },
    QueueRemove { queue_position: i64 },
    QueueReorder { from: i64, to: i64 },
    EndSession,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeekPayload {
    position: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncPayload {
    position: f64,
    track_index: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantPayload {
    participant_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueAddPayload {
    media_file_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueRemovePayload {
    queue_position: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueReorderPayload {
    from: i64,
    to: i64,
}

fn decode<T: DeserializeOwned>(
    action: &'static str,
    payload: Option<&Value>,
) -> Result<T, CommandError> {
    payload
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .ok_or(CommandError::InvalidPayload(action))
}

impl Command {
    /// Decodes a command from its envelope action and payload.
    pub fn parse(action: &str, payload: Option<&Value>) -> Result<Self, CommandError> {
        match action {
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "seek" => decode::<SeekPayload>("seek", payload).map(|p| Self::Seek {
                position: p.position,
            }),
            "skip_next" => Ok(Self::SkipNext),
            "skip_prev" => Ok(Self::SkipPrev),
            "sync" => decode::<SyncPayload>("sync", payload).map(|p| Self::Sync {
                position: p.position,
                track_index: p.track_index,
            }),
            "pass_remote" => {
                decode::<ParticipantPayload>("pass_remote", payload).map(|p| Self::PassRemote {
                    participant_id: p.participant_id,
                })
            }
            "request_remote" => Ok(Self::RequestRemote),
            "accept_remote_request" => decode::<ParticipantPayload>("accept", payload)
                .map(|p| Self::AcceptRemoteRequest {
                    participant_id: p.participant_id,
                }),
            "queue_add" => {
                decode::<QueueAddPayload>("queue_add", payload).map(|p| Self::QueueAdd {
                    media_file_id: p.media_file_id,
                })
            }
            "queue_remove" => {
                decode::<QueueRemovePayload>("queue_remove", payload).map(|p| Self::QueueRemove {
                    queue_position: p.queue_position,
                })
            }
            "queue_reorder" => decode::<QueueReorderPayload>("queue_reorder", payload)
                .map(|p| Self::QueueReorder { from: p.from, to: p.to }),
            "end_session" => Ok(Self::EndSession),
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_preserves_payload_verbatim() {
        let raw = r#"{"type":"command","action":"seek","payload":{"position":42.5,"extra":"kept"}}"#;
        let msg: WsMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, "command");
        assert_eq!(msg.action.as_deref(), Some("seek"));
        assert_eq!(msg.payload.as_ref().unwrap()["extra"], "kept");

        let reencoded = serde_json::to_string(&msg).unwrap();
        let round: WsMessage = serde_json::from_str(&reencoded).unwrap();
        assert_eq!(round.payload.unwrap()["position"], 42.5);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let msg = WsMessage::error("boom");
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(!encoded.contains("\"action\""));
        assert!(encoded.contains("\"message\":\"boom\""));
    }

    #[test]
    fn session_ended_carries_action_only() {
        let encoded = serde_json::to_string(&WsMessage::session_ended()).unwrap();
        assert!(encoded.contains("\"type\":\"error\""));
        assert!(encoded.contains("\"action\":\"session_ended\""));
        assert!(!encoded.contains("payload"));
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(Command::parse("play", None).unwrap(), Command::Play);
        assert_eq!(Command::parse("pause", None).unwrap(), Command::Pause);
        assert_eq!(Command::parse("skip_next", None).unwrap(), Command::SkipNext);
        assert_eq!(
            Command::parse("end_session", None).unwrap(),
            Command::EndSession
        );
    }

    #[test]
    fn parses_seek_with_position() {
        let payload = json!({"position": 17.25});
        let cmd = Command::parse("seek", Some(&payload)).unwrap();
        assert_eq!(cmd, Command::Seek { position: 17.25 });
    }

    #[test]
    fn parses_queue_reorder() {
        let payload = json!({"from": 2, "to": 0});
        let cmd = Command::parse("queue_reorder", Some(&payload)).unwrap();
        assert_eq!(cmd, Command::QueueReorder { from: 2, to: 0 });
    }

    #[test]
    fn missing_payload_is_invalid() {
        let err = Command::parse("seek", None).unwrap_err();
        assert_eq!(err, CommandError::InvalidPayload("seek"));
    }

    #[test]
    fn malformed_payload_is_invalid() {
        let payload = json!({"position": "not a number"});
        let err = Command::parse("seek", Some(&payload)).unwrap_err();
        assert_eq!(err, CommandError::InvalidPayload("seek"));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = Command::parse("teleport", None).unwrap_err();
        assert_eq!(err, CommandError::UnknownAction("teleport".into()));
    }

    #[test]
    fn state_payload_serializes_camel_case() {
        let payload = StatePayload {
            action: "seek".into(),
            current_track_index: 1,
            position: 42.0,
            is_playing: true,
            queue: vec![],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["currentTrackIndex"], 1);
        assert_eq!(value["isPlaying"], true);
        assert_eq!(value["action"], "seek");
    }
}
