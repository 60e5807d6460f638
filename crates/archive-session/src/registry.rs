//! The session registry: process-wide map from connection id to session.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself — it uses a plain
//! `HashMap`, not a concurrent one. The server owns it behind a single
//! `tokio::sync::Mutex` and every mutation goes through that lock;
//! keeping the registry lock-free internally avoids double locking.

use std::collections::HashMap;

use archive_transport::{ConnectionId, FrameSink};

use crate::{SessionError, SessionRecord};

/// Tracks every live session, keyed by connection id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, SessionRecord>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Registers a session at transport accept.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRegistered`] if the connection id
    /// is already present — connection ids are process-unique, so this
    /// indicates a transport bug.
    pub fn register(
        &mut self,
        record: SessionRecord,
    ) -> Result<(), SessionError> {
        let conn_id = record.conn_id;
        if self.sessions.contains_key(&conn_id) {
            return Err(SessionError::AlreadyRegistered(conn_id));
        }
        self.sessions.insert(conn_id, record);
        tracing::debug!(%conn_id, "session registered");
        Ok(())
    }

    /// Looks up a session by connection id.
    pub fn get(&self, conn_id: ConnectionId) -> Option<&SessionRecord> {
        self.sessions.get(&conn_id)
    }

    /// Mutable lookup, for handlers that update session state in place.
    pub fn get_mut(
        &mut self,
        conn_id: ConnectionId,
    ) -> Option<&mut SessionRecord> {
        self.sessions.get_mut(&conn_id)
    }

    /// Removes a session at transport close, returning its record so
    /// the caller can run room cleanup with the final state.
    pub fn unregister(
        &mut self,
        conn_id: ConnectionId,
    ) -> Option<SessionRecord> {
        let removed = self.sessions.remove(&conn_id);
        if removed.is_some() {
            tracing::debug!(%conn_id, "session unregistered");
        }
        removed
    }

    /// Clones the outbound sink for a session, if it exists.
    pub fn sink_of(&self, conn_id: ConnectionId) -> Option<FrameSink> {
        self.sessions.get(&conn_id).map(|s| s.sink.clone())
    }

    /// Marks a session authenticated and records its adopted identity.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no such session exists.
    pub fn set_authenticated(
        &mut self,
        conn_id: ConnectionId,
        player_id: i64,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;
        session.authenticated = true;
        session.player_id = Some(player_id);
        Ok(())
    }

    /// Updates a session's current room.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no such session exists.
    pub fn set_room(
        &mut self,
        conn_id: ConnectionId,
        room_id: Option<String>,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;
        session.room_id = room_id;
        Ok(())
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // -- Helpers ----------------------------------------------------------

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn record(id: u64) -> SessionRecord {
        let (sink, _rx) = mpsc::unbounded_channel();
        SessionRecord::new(cid(id), "127.0.0.1:9000".parse().unwrap(), sink)
    }

    // =====================================================================
    // register() / get() / unregister()
    // =====================================================================

    #[test]
    fn test_register_new_session_is_unauthenticated() {
        let mut registry = SessionRegistry::new();
        registry.register(record(1)).expect("should register");

        let session = registry.get(cid(1)).expect("should exist");
        assert!(!session.authenticated);
        assert_eq!(session.player_id, None);
        assert_eq!(session.room_id, None);
    }

    #[test]
    fn test_register_duplicate_id_returns_error() {
        let mut registry = SessionRegistry::new();
        registry.register(record(1)).unwrap();

        let result = registry.register(record(1));
        assert!(matches!(
            result,
            Err(SessionError::AlreadyRegistered(c)) if c == cid(1)
        ));
    }

    #[test]
    fn test_get_unknown_id_returns_none() {
        let registry = SessionRegistry::new();
        assert!(registry.get(cid(99)).is_none());
    }

    #[test]
    fn test_unregister_returns_final_record() {
        let mut registry = SessionRegistry::new();
        registry.register(record(1)).unwrap();
        registry.set_room(cid(1), Some("lobby".into())).unwrap();

        let removed = registry.unregister(cid(1)).expect("should remove");
        assert_eq!(removed.room_id.as_deref(), Some("lobby"));
        assert!(registry.get(cid(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_unknown_id_returns_none() {
        let mut registry = SessionRegistry::new();
        assert!(registry.unregister(cid(5)).is_none());
    }

    // =====================================================================
    // State mutators
    // =====================================================================

    #[test]
    fn test_set_authenticated_records_player_id() {
        let mut registry = SessionRegistry::new();
        registry.register(record(1)).unwrap();

        registry.set_authenticated(cid(1), 42).unwrap();

        let session = registry.get(cid(1)).unwrap();
        assert!(session.authenticated);
        assert_eq!(session.player_id, Some(42));
        assert_eq!(session.effective_player_id(), 42);
    }

    #[test]
    fn test_set_authenticated_unknown_session_returns_not_found() {
        let mut registry = SessionRegistry::new();
        let result = registry.set_authenticated(cid(9), 1);
        assert!(matches!(result, Err(SessionError::NotFound(c)) if c == cid(9)));
    }

    #[test]
    fn test_effective_player_id_falls_back_to_conn_id() {
        let mut registry = SessionRegistry::new();
        registry.register(record(7)).unwrap();
        assert_eq!(registry.get(cid(7)).unwrap().effective_player_id(), 7);
    }

    #[test]
    fn test_set_room_and_clear_room() {
        let mut registry = SessionRegistry::new();
        registry.register(record(1)).unwrap();

        registry.set_room(cid(1), Some("arena".into())).unwrap();
        assert_eq!(
            registry.get(cid(1)).unwrap().room_id.as_deref(),
            Some("arena")
        );

        registry.set_room(cid(1), None).unwrap();
        assert_eq!(registry.get(cid(1)).unwrap().room_id, None);
    }

    #[test]
    fn test_sink_of_delivers_to_session_channel() {
        let mut registry = SessionRegistry::new();
        let (sink, mut rx) = mpsc::unbounded_channel();
        let record = SessionRecord::new(
            cid(1),
            "127.0.0.1:9000".parse().unwrap(),
            sink,
        );
        registry.register(record).unwrap();

        let sink = registry.sink_of(cid(1)).expect("should have sink");
        sink.send(vec![1, 2, 3]).unwrap();
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_len_tracks_session_count() {
        let mut registry = SessionRegistry::new();
        assert_eq!(registry.len(), 0);
        registry.register(record(1)).unwrap();
        registry.register(record(2)).unwrap();
        assert_eq!(registry.len(), 2);
        registry.unregister(cid(1));
        assert_eq!(registry.len(), 1);
    }
}
