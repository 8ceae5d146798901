//! The live session hub.
//!
//! The [`Hub`] is the registry of all live sessions, keyed by session ID.
//! It owns the sessions; each session owns its participants. The only
//! back-references are a `Weak` pointer from session to hub (set at
//! construction) and participant IDs, so dropping the hub drops everything
//! underneath it.

use std::sync::Arc;

use dashmap::DashMap;

use crate::library::{MediaLibrary, SessionDescriptor};
use crate::token::StreamTokens;

mod participant;
mod session;

pub use participant::JoinedParticipant;
pub use session::{LiveSession, SessionSummary};

/// Registry of live sessions.
///
/// Map operations never run while calling into a session, so session locks
/// and the registry shards cannot deadlock against each other. Live state
/// is never persisted; a session with no participants expires after its
/// grace period.
pub struct Hub {
    sessions: DashMap<String, Arc<LiveSession>>,
    /// Media library collaborator, consulted only on queue-add and search.
    library: Arc<dyn MediaLibrary>,
    tokens: Arc<StreamTokens>,
}

impl Hub {
    pub fn new(library: Arc<dyn MediaLibrary>, tokens: Arc<StreamTokens>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            library,
            tokens,
        })
    }

    /// Materializes a live session from a loaded descriptor.
    ///
    /// Idempotent on the descriptor ID: a session that is already live is
    /// returned untouched, its runtime state preserved.
    pub fn get_or_create(self: &Arc<Self>, descriptor: &SessionDescriptor) -> Arc<LiveSession> {
        if let Some(existing) = self.sessions.get(&descriptor.id) {
            return Arc::clone(&existing);
        }
        let session = Arc::new(LiveSession::from_descriptor(
            descriptor,
            Arc::downgrade(self),
            Arc::clone(&self.tokens),
        ));
        let session = {
            let entry = self
                .sessions
                .entry(descriptor.id.clone())
                .or_insert(session);
            Arc::clone(entry.value())
        };
        log::info!(
            "[Hub] session live: {} ({} total)",
            descriptor.id,
            self.sessions.len()
        );
        session
    }

    /// Looks up a live session by ID.
    pub fn get(&self, id: &str) -> Option<Arc<LiveSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(&entry))
    }

    /// Evicts a session. Called by the grace-timer callback and by session
    /// termination.
    pub(crate) fn remove(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            log::info!(
                "[Hub] session removed: {} ({} remaining)",
                id,
                self.sessions.len()
            );
        }
    }

    pub fn library(&self) -> Arc<dyn MediaLibrary> {
        Arc::clone(&self.library)
    }

    pub fn tokens(&self) -> Arc<StreamTokens> {
        Arc::clone(&self.tokens)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::library::{LibraryError, MediaFile};

    struct EmptyLibrary;

    #[async_trait]
    impl MediaLibrary for EmptyLibrary {
        async fn get(&self, id: &str) -> Result<MediaFile, LibraryError> {
            Err(LibraryError::NotFound(id.to_string()))
        }

        async fn search(
            &self,
            _user_id: &str,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<MediaFile>, LibraryError> {
            Ok(vec![])
        }
    }

    fn descriptor(id: &str) -> SessionDescriptor {
        SessionDescriptor {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            tracks: vec![MediaFile {
                id: "mf-0".to_string(),
                title: "Track 0".to_string(),
                artist: String::new(),
                album: String::new(),
                duration: 120.0,
                missing: false,
            }],
            format: Some("mp3".to_string()),
            max_bit_rate: Some(320),
        }
    }

    fn hub() -> Arc<Hub> {
        Hub::new(Arc::new(EmptyLibrary), Arc::new(StreamTokens::generate()))
    }

    #[test]
    fn get_or_create_is_idempotent_on_id() {
        let hub = hub();
        let first = hub.get_or_create(&descriptor("s1"));
        let second = hub.get_or_create(&descriptor("s1"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(hub.session_count(), 1);
    }

    #[tokio::test]
    async fn descriptor_tracks_get_decodable_stream_tokens() {
        let hub = hub();
        let session = hub.get_or_create(&descriptor("s1"));
        let mut joined = session.join("H", true);

        // Second message of the welcome burst is the state snapshot.
        let _welcome = joined.rx.try_recv().unwrap();
        let state_raw = joined.rx.try_recv().unwrap();
        let state: crate::protocol::WsMessage = serde_json::from_str(&state_raw).unwrap();
        let payload: crate::protocol::StatePayload =
            serde_json::from_value(state.payload.unwrap()).unwrap();

        let claims = hub.tokens().decode(&payload.queue[0].token).unwrap();
        assert_eq!(claims.id, "mf-0");
        assert_eq!(claims.f.as_deref(), Some("mp3"));
        assert_eq!(claims.b, Some(320));
    }

    #[test]
    fn get_returns_none_for_unknown_id() {
        let hub = hub();
        assert!(hub.get("nope").is_none());
    }

    #[test]
    fn remove_evicts_the_session() {
        let hub = hub();
        hub.get_or_create(&descriptor("s1"));
        hub.remove("s1");
        assert!(hub.get("s1").is_none());
        assert_eq!(hub.session_count(), 0);
    }
}
