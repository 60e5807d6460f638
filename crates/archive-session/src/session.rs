//! Session types: the server's record of one connected peer.
//!
//! A session is created the moment the transport accepts a connection
//! and destroyed when the transport closes (or the peer sends a
//! DISCONNECT). It tracks:
//! - WHO the peer is (`player_id`, once authenticated)
//! - WHETHER they may use privileged messages (`authenticated`)
//! - WHERE they are (`room_id`)
//! - HOW to reach them (`sink`, the writer-task channel)

use std::collections::HashMap;
use std::net::SocketAddr;

use archive_protocol::Value;
use archive_transport::{ConnectionId, FrameSink};

/// One connected peer's state.
///
/// Authentication starts false; a session gains a `player_id` only by
/// completing the AUTH handshake, so `authenticated == true` implies
/// `player_id.is_some()`.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Server-assigned connection id, unique for the process lifetime.
    pub conn_id: ConnectionId,

    /// The peer's remote address, captured at accept.
    pub remote_addr: SocketAddr,

    /// Whether the AUTH handshake has completed successfully.
    pub authenticated: bool,

    /// The identity adopted at AUTH — the claimed PLAYER_ID, or the
    /// connection id when the client claimed none.
    pub player_id: Option<i64>,

    /// The room this session currently occupies, if any. Kept in sync
    /// with the room manager's member sets.
    pub room_id: Option<String>,

    /// Custom per-session property bag.
    pub properties: HashMap<String, Value>,

    /// Queue of outbound frames for this peer's writer task.
    pub sink: FrameSink,
}

impl SessionRecord {
    /// Creates an unauthenticated session for a freshly accepted
    /// connection.
    pub fn new(
        conn_id: ConnectionId,
        remote_addr: SocketAddr,
        sink: FrameSink,
    ) -> Self {
        Self {
            conn_id,
            remote_addr,
            authenticated: false,
            player_id: None,
            room_id: None,
            properties: HashMap::new(),
            sink,
        }
    }

    /// The identity to report for this session: the adopted player id,
    /// or the connection id before authentication.
    pub fn effective_player_id(&self) -> i64 {
        self.player_id
            .unwrap_or_else(|| self.conn_id.into_inner() as i64)
    }
}
