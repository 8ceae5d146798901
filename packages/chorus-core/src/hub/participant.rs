//! Participants: connected clients within a live session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::protocol::ParticipantInfo;

/// Monotonic join counter. `Instant` alone can tie for two joins in the
/// same scheduler tick, which would make remote transfer nondeterministic.
static JOIN_SEQ: AtomicU64 = AtomicU64::new(0);

/// One connected client.
///
/// The session addresses a participant only through its send queue and
/// cancellation token; the socket itself never leaves the connection layer.
#[derive(Debug)]
pub(crate) struct Participant {
    /// Server-issued opaque ID, distinct from any user account.
    pub id: String,
    /// Display name from the join URL. May collide between participants.
    pub name: String,
    pub is_host: bool,
    pub joined_at: Instant,
    /// Join order; used to pick the longest-connected participant on
    /// remote transfer.
    pub seq: u64,
    /// Bounded outbound queue. Enqueues are non-blocking and drop on full.
    pub sender: mpsc::Sender<String>,
    /// Cancelling this token tears down the participant's connection.
    pub cancel: CancellationToken,
}

impl Participant {
    pub fn new(
        name: &str,
        is_host: bool,
        sender: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            is_host,
            joined_at: Instant::now(),
            seq: JOIN_SEQ.fetch_add(1, Ordering::Relaxed),
            sender,
            cancel,
        }
    }

    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            is_host: self.is_host,
        }
    }
}

/// Handle returned to the connection layer after a join.
///
/// Owns the receiving half of the participant's send queue and a clone of
/// its cancellation token.
pub struct JoinedParticipant {
    pub id: String,
    pub rx: mpsc::Receiver<String>,
    pub cancel: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_ids_are_unique() {
        let (tx, _rx) = mpsc::channel(1);
        let a = Participant::new("A", false, tx.clone(), CancellationToken::new());
        let b = Participant::new("A", false, tx, CancellationToken::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn info_projects_public_fields() {
        let (tx, _rx) = mpsc::channel(1);
        let p = Participant::new("Dana", true, tx, CancellationToken::new());
        let info = p.info();
        assert_eq!(info.id, p.id);
        assert_eq!(info.name, "Dana");
        assert!(info.is_host);
    }
}
