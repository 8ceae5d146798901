//! Live session state and command handling.
//!
//! A [`LiveSession`] is the single writer for everything a session's
//! clients observe: track list, queue order, playback position, the
//! participant set and the remote holder. All mutations happen under one
//! write lock; every broadcast is built from a snapshot taken under that
//! lock and enqueued only after the lock is released, so no I/O ever
//! happens while the lock is held.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CommandError;
use crate::hub::participant::{JoinedParticipant, Participant};
use crate::hub::Hub;
use crate::library::{MediaFile, SessionDescriptor};
use crate::protocol::{
    Command, ParticipantsPayload, RemotePayload, RemoteRequestedPayload, StatePayload, Track,
    WelcomePayload, WsMessage,
};
use crate::protocol_constants::{GRACE_PERIOD_SECS, SEND_QUEUE_CAPACITY};
use crate::token::StreamTokens;

/// Runtime state of one live listening session.
pub struct LiveSession {
    id: String,
    /// The authenticated user who created the session. Library reads for
    /// search and queue-add run under this user's authority.
    host_user_id: String,
    format: Option<String>,
    max_bit_rate: Option<u32>,
    hub: Weak<Hub>,
    tokens: Arc<StreamTokens>,
    state: RwLock<SessionState>,
}

struct SessionState {
    /// Append-only within a live session; a track's index here is its
    /// stable identity.
    tracks: Vec<Track>,
    /// Play order: indices into `tracks`, duplicate-free.
    queue: Vec<usize>,
    /// Position within `queue`, not `tracks`.
    current_index: usize,
    /// Last known playback offset in seconds.
    position: f64,
    is_playing: bool,
    participants: HashMap<String, Participant>,
    /// Participant ID holding the remote; empty only when the session is
    /// empty.
    remote_holder: String,
    /// Pending eviction, armed when the last participant leaves.
    grace: Option<CancellationToken>,
}

/// Live summary exposed over the session API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub participant_count: usize,
    pub queue_length: usize,
    pub is_playing: bool,
}

fn track_from_media(
    tokens: &StreamTokens,
    format: Option<&str>,
    max_bit_rate: Option<u32>,
    media: &MediaFile,
) -> Track {
    Track {
        id: media.id.clone(),
        token: tokens.mint(&media.id, format, max_bit_rate),
        title: media.title.clone(),
        artist: media.artist.clone(),
        album: media.album.clone(),
        duration: media.duration,
        media_file_id: media.id.clone(),
    }
}

impl LiveSession {
    pub(crate) fn from_descriptor(
        descriptor: &SessionDescriptor,
        hub: Weak<Hub>,
        tokens: Arc<StreamTokens>,
    ) -> Self {
        let tracks: Vec<Track> = descriptor
            .tracks
            .iter()
            .map(|media| {
                track_from_media(
                    &tokens,
                    descriptor.format.as_deref(),
                    descriptor.max_bit_rate,
                    media,
                )
            })
            .collect();
        let queue = (0..tracks.len()).collect();

        Self {
            id: descriptor.id.clone(),
            host_user_id: descriptor.user_id.clone(),
            format: descriptor.format.clone(),
            max_bit_rate: descriptor.max_bit_rate,
            hub,
            tokens,
            state: RwLock::new(SessionState {
                tracks,
                queue,
                current_index: 0,
                position: 0.0,
                is_playing: false,
                participants: HashMap::new(),
                remote_holder: String::new(),
                grace: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_user_id(&self) -> &str {
        &self.host_user_id
    }

    pub fn participant_count(&self) -> usize {
        self.state.read().participants.len()
    }

    pub fn summary(&self) -> SessionSummary {
        let st = self.state.read();
        SessionSummary {
            id: self.id.clone(),
            participant_count: st.participants.len(),
            queue_length: st.queue.len(),
            is_playing: st.is_playing,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Membership
    // ─────────────────────────────────────────────────────────────────────

    /// Admits a new participant.
    ///
    /// Cancels any pending grace timer, assigns the remote when the session
    /// has no holder (hosts always take it), queues the four-message welcome
    /// burst for the joiner, then broadcasts the updated participant list
    /// and remote holder to everyone.
    pub fn join(&self, name: &str, is_host: bool) -> JoinedParticipant {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();
        let participant = Participant::new(name, is_host, tx, cancel.clone());
        let id = participant.id.clone();

        let (joiner_tx, burst) = {
            let mut st = self.state.write();
            if let Some(grace) = st.grace.take() {
                grace.cancel();
                log::debug!("[Session] grace timer cancelled by rejoin: {}", self.id);
            }
            if st.remote_holder.is_empty() || is_host {
                st.remote_holder = id.clone();
            }
            let joiner_tx = participant.sender.clone();
            st.participants.insert(id.clone(), participant);

            let burst = vec![
                WsMessage::welcome(&WelcomePayload { your_id: id.clone() }),
                WsMessage::state(&st.snapshot("welcome")),
                WsMessage::participants(&st.participants_payload()),
                WsMessage::remote(&st.remote_payload()),
            ];
            (joiner_tx, burst)
        };

        for message in &burst {
            send_single(message, &joiner_tx);
        }

        log::info!(
            "[Session] {} ({}) joined {} ({} participants)",
            name,
            id,
            self.id,
            self.participant_count()
        );

        self.broadcast_participants();
        self.broadcast_remote();

        JoinedParticipant { id, rx, cancel }
    }

    /// Removes a participant, transferring the remote to the
    /// longest-connected survivor when the holder departs. The last
    /// departure arms the grace timer instead of broadcasting.
    pub fn leave(&self, participant_id: &str) {
        let (removed, remaining, transferred) = {
            let mut st = self.state.write();
            let Some(removed) = st.participants.remove(participant_id) else {
                return;
            };
            let mut transferred = false;
            if st.remote_holder == participant_id {
                st.remote_holder = st.longest_connected().unwrap_or_default();
                transferred = !st.remote_holder.is_empty();
            }
            (removed, st.participants.len(), transferred)
        };

        removed.cancel.cancel();
        log::info!(
            "[Session] {} ({}) left {} after {:?} ({} remaining)",
            removed.name,
            participant_id,
            self.id,
            removed.joined_at.elapsed(),
            remaining
        );

        if remaining == 0 {
            self.arm_grace_timer();
        } else {
            self.broadcast_participants();
            if transferred {
                self.broadcast_remote();
            }
        }
    }

    fn arm_grace_timer(&self) {
        let token = CancellationToken::new();
        {
            let mut st = self.state.write();
            if !st.participants.is_empty() {
                // Lost the race against a rejoin.
                return;
            }
            st.grace = Some(token.clone());
        }
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        let session_id = self.id.clone();
        log::info!("[Session] empty, grace timer armed: {}", session_id);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(GRACE_PERIOD_SECS)) => {
                    let still_empty = hub
                        .get(&session_id)
                        .map(|session| session.participant_count() == 0)
                        .unwrap_or(false);
                    if still_empty {
                        log::info!("[Session] expired after grace period: {}", session_id);
                        hub.remove(&session_id);
                    }
                }
            }
        });
    }

    /// Notifies every participant that the session is over, closes their
    /// connections and evicts the session from the hub.
    pub fn terminate(&self) {
        let (senders, cancels): (Vec<_>, Vec<_>) = {
            let mut st = self.state.write();
            st.remote_holder.clear();
            st.participants
                .drain()
                .map(|(_, p)| (p.sender, p.cancel))
                .unzip()
        };

        fan_out(&WsMessage::session_ended(), &senders);
        for cancel in &cancels {
            cancel.cancel();
        }

        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Command Dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Processes one inbound message from a participant. Failures are
    /// reported back to the sender as targeted `error` messages; other
    /// participants never observe them.
    pub async fn handle_message(&self, sender_id: &str, msg: &WsMessage) {
        let action = msg.action.as_deref().unwrap_or("");
        let cmd = match Command::parse(action, msg.payload.as_ref()) {
            Ok(cmd) => cmd,
            Err(err) => {
                // The holder pushes a sync every few seconds; a malformed or
                // racing sync must not spam it with errors.
                if action == "sync" {
                    return;
                }
                self.send_error(sender_id, &err.to_string());
                return;
            }
        };

        let result = match cmd {
            Command::Play => self.handle_play(sender_id),
            Command::Pause => self.handle_pause(sender_id),
            Command::Seek { position } => self.handle_seek(sender_id, position),
            Command::SkipNext => self.handle_skip(sender_id, 1),
            Command::SkipPrev => self.handle_skip(sender_id, -1),
            Command::Sync {
                position,
                track_index,
            } => self.handle_sync(sender_id, position, track_index),
            Command::PassRemote { participant_id } => {
                self.transfer_remote(sender_id, &participant_id, "pass the remote")
            }
            Command::RequestRemote => self.handle_request_remote(sender_id),
            Command::AcceptRemoteRequest { participant_id } => {
                self.transfer_remote(sender_id, &participant_id, "accept requests")
            }
            Command::QueueAdd { media_file_id } => {
                self.handle_queue_add(sender_id, &media_file_id).await
            }
            Command::QueueRemove { queue_position } => {
                self.handle_queue_remove(sender_id, queue_position)
            }
            Command::QueueReorder { from, to } => {
                self.handle_queue_reorder(sender_id, from, to)
            }
            Command::EndSession => self.handle_end_session(sender_id),
        };

        if let Err(err) = result {
            self.send_error(sender_id, &err.to_string());
        }
    }

    fn handle_play(&self, sender_id: &str) -> Result<(), CommandError> {
        let broadcast = {
            let mut st = self.state.write();
            st.require_holder(sender_id, "control playback")?;
            if st.queue.is_empty() {
                // Nothing to play; leaving is_playing unset keeps the
                // empty-queue invariant.
                return Ok(());
            }
            st.is_playing = true;
            st.state_broadcast("play")
        };
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    fn handle_pause(&self, sender_id: &str) -> Result<(), CommandError> {
        let broadcast = {
            let mut st = self.state.write();
            st.require_holder(sender_id, "control playback")?;
            st.is_playing = false;
            st.state_broadcast("pause")
        };
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    fn handle_seek(&self, sender_id: &str, position: f64) -> Result<(), CommandError> {
        let broadcast = {
            let mut st = self.state.write();
            st.require_holder(sender_id, "control playback")?;
            let duration = st
                .current_track()
                .map(|track| f64::from(track.duration))
                .unwrap_or(0.0)
                .max(0.0);
            st.position = position.clamp(0.0, duration);
            st.state_broadcast("seek")
        };
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    /// `skip_next` / `skip_prev`. Stepping past either end of the queue
    /// leaves the state unchanged; the broadcast still goes out as an
    /// idempotent refresh.
    fn handle_skip(&self, sender_id: &str, direction: i64) -> Result<(), CommandError> {
        let broadcast = {
            let mut st = self.state.write();
            st.require_holder(sender_id, "control playback")?;
            if direction > 0 {
                if st.current_index + 1 < st.queue.len() {
                    st.current_index += 1;
                    st.position = 0.0;
                }
            } else if st.current_index > 0 {
                st.current_index -= 1;
                st.position = 0.0;
            }
            st.state_broadcast(if direction > 0 { "skip_next" } else { "skip_prev" })
        };
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    /// Periodic position push from the holder. Updates the server snapshot
    /// for late joiners but never broadcasts: clients track their own
    /// position and only seek on explicit holder actions. Non-holder syncs
    /// are silently ignored so a client racing a remote transfer does not
    /// receive an error every few seconds.
    fn handle_sync(
        &self,
        sender_id: &str,
        position: f64,
        track_index: i64,
    ) -> Result<(), CommandError> {
        let mut st = self.state.write();
        if st.remote_holder != sender_id {
            return Ok(());
        }
        st.position = position;
        if track_index >= 0 && (track_index as usize) < st.queue.len() {
            st.current_index = track_index as usize;
        }
        Ok(())
    }

    fn transfer_remote(
        &self,
        sender_id: &str,
        target_id: &str,
        what: &'static str,
    ) -> Result<(), CommandError> {
        let broadcast = {
            let mut st = self.state.write();
            st.require_holder(sender_id, what)?;
            if !st.participants.contains_key(target_id) {
                return Err(CommandError::ParticipantNotFound);
            }
            st.remote_holder = target_id.to_string();
            st.remote_broadcast()
        };
        log::info!("[Session] remote passed to {} in {}", target_id, self.id);
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    /// Forwards a remote request to the current holder. No state change.
    fn handle_request_remote(&self, sender_id: &str) -> Result<(), CommandError> {
        let forwarded = {
            let st = self.state.read();
            let holder = st.participants.get(&st.remote_holder);
            let sender = st.participants.get(sender_id);
            match (holder, sender) {
                (Some(holder), Some(sender)) => Some((
                    holder.sender.clone(),
                    RemoteRequestedPayload {
                        from_id: sender.id.clone(),
                        from_name: sender.name.clone(),
                    },
                )),
                _ => None,
            }
        };
        if let Some((holder_tx, payload)) = forwarded {
            send_single(&WsMessage::remote_requested(&payload), &holder_tx);
        }
        Ok(())
    }

    async fn handle_queue_add(
        &self,
        sender_id: &str,
        media_file_id: &str,
    ) -> Result<(), CommandError> {
        {
            let st = self.state.read();
            st.require_holder(sender_id, "modify the queue")?;
        }

        let Some(hub) = self.hub.upgrade() else {
            return Ok(());
        };
        let media = match hub.library().get(media_file_id).await {
            Ok(media) if !media.missing => media,
            Ok(_) => return Err(CommandError::TrackNotFound),
            Err(err) => {
                log::warn!(
                    "[Session] queue_add lookup failed for {}: {}",
                    media_file_id,
                    err
                );
                return Err(CommandError::TrackNotFound);
            }
        };

        let track = track_from_media(
            &self.tokens,
            self.format.as_deref(),
            self.max_bit_rate,
            &media,
        );

        let broadcast = {
            let mut st = self.state.write();
            // The remote may have changed hands during the library lookup.
            st.require_holder(sender_id, "modify the queue")?;
            let index = st.tracks.len();
            st.tracks.push(track);
            st.queue.push(index);
            st.state_broadcast("queue_add")
        };
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    fn handle_queue_remove(
        &self,
        sender_id: &str,
        queue_position: i64,
    ) -> Result<(), CommandError> {
        let broadcast = {
            let mut st = self.state.write();
            st.require_holder(sender_id, "modify the queue")?;
            let Ok(position) = usize::try_from(queue_position) else {
                return Err(CommandError::OutOfRange);
            };
            if position >= st.queue.len() {
                return Err(CommandError::OutOfRange);
            }
            if position == st.current_index {
                return Err(CommandError::RemoveCurrent);
            }
            st.queue.remove(position);
            if position < st.current_index {
                st.current_index -= 1;
            }
            st.state_broadcast("queue_remove")
        };
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    fn handle_queue_reorder(
        &self,
        sender_id: &str,
        from: i64,
        to: i64,
    ) -> Result<(), CommandError> {
        let broadcast = {
            let mut st = self.state.write();
            st.require_holder(sender_id, "modify the queue")?;
            let (Ok(from), Ok(to)) = (usize::try_from(from), usize::try_from(to)) else {
                return Err(CommandError::ReorderOutOfRange);
            };
            if from >= st.queue.len() || to >= st.queue.len() {
                return Err(CommandError::ReorderOutOfRange);
            }

            let item = st.queue.remove(from);
            st.queue.insert(to, item);

            if from == st.current_index {
                st.current_index = to;
            } else if from < st.current_index && to >= st.current_index {
                st.current_index -= 1;
            } else if from > st.current_index && to <= st.current_index {
                st.current_index += 1;
            }
            st.state_broadcast("queue_reorder")
        };
        fan_out(&broadcast.0, &broadcast.1);
        Ok(())
    }

    fn handle_end_session(&self, sender_id: &str) -> Result<(), CommandError> {
        {
            let st = self.state.read();
            st.require_holder(sender_id, "end the session")?;
        }
        log::info!("[Session] ended by remote holder: {}", self.id);
        self.terminate();
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Broadcasts
    // ─────────────────────────────────────────────────────────────────────

    fn broadcast_participants(&self) {
        let broadcast = {
            let st = self.state.read();
            (
                WsMessage::participants(&st.participants_payload()),
                st.senders(),
            )
        };
        fan_out(&broadcast.0, &broadcast.1);
    }

    fn broadcast_remote(&self) {
        let broadcast = {
            let st = self.state.read();
            st.remote_broadcast()
        };
        fan_out(&broadcast.0, &broadcast.1);
    }

    fn send_error(&self, participant_id: &str, message: &str) {
        let target = {
            let st = self.state.read();
            st.participants
                .get(participant_id)
                .map(|p| p.sender.clone())
        };
        if let Some(tx) = target {
            send_single(&WsMessage::error(message), &tx);
        }
    }
}

impl SessionState {
    fn require_holder(&self, id: &str, what: &'static str) -> Result<(), CommandError> {
        if self.remote_holder == id {
            Ok(())
        } else {
            Err(CommandError::AuthorityDenied(what))
        }
    }

    fn current_track(&self) -> Option<&Track> {
        self.queue
            .get(self.current_index)
            .and_then(|&index| self.tracks.get(index))
    }

    fn longest_connected(&self) -> Option<String> {
        self.participants
            .values()
            .min_by_key(|p| p.seq)
            .map(|p| p.id.clone())
    }

    fn snapshot(&self, action: &str) -> StatePayload {
        let queue = self
            .queue
            .iter()
            .filter_map(|&index| self.tracks.get(index).cloned())
            .collect();
        StatePayload {
            action: action.to_string(),
            current_track_index: self.current_index,
            position: self.position,
            is_playing: self.is_playing,
            queue,
        }
    }

    fn participants_payload(&self) -> ParticipantsPayload {
        let mut members: Vec<&Participant> = self.participants.values().collect();
        members.sort_by_key(|p| p.seq);
        ParticipantsPayload {
            participants: members.into_iter().map(Participant::info).collect(),
        }
    }

    fn remote_payload(&self) -> RemotePayload {
        let holder_name = self
            .participants
            .get(&self.remote_holder)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        RemotePayload {
            holder_id: self.remote_holder.clone(),
            holder_name,
        }
    }

    fn senders(&self) -> Vec<mpsc::Sender<String>> {
        self.participants
            .values()
            .map(|p| p.sender.clone())
            .collect()
    }

    fn state_broadcast(&self, action: &str) -> (WsMessage, Vec<mpsc::Sender<String>>) {
        (WsMessage::state(&self.snapshot(action)), self.senders())
    }

    fn remote_broadcast(&self) -> (WsMessage, Vec<mpsc::Sender<String>>) {
        (WsMessage::remote(&self.remote_payload()), self.senders())
    }
}

/// Marshals a message once and enqueues it to every target without
/// blocking. Full queues are skipped; the next snapshot subsumes anything
/// dropped here.
fn fan_out(message: &WsMessage, targets: &[mpsc::Sender<String>]) {
    let encoded = match serde_json::to_string(message) {
        Ok(encoded) => encoded,
        Err(err) => {
            log::warn!("[Session] failed to encode {} message: {}", message.kind, err);
            return;
        }
    };
    for tx in targets {
        let _ = tx.try_send(encoded.clone());
    }
}

fn send_single(message: &WsMessage, target: &mpsc::Sender<String>) {
    fan_out(message, std::slice::from_ref(target));
}
