//! A single room: member set, property bag, and byte fan-out.

use std::collections::HashMap;

use archive_protocol::Value;
use archive_transport::{ConnectionId, FrameSink};

/// One member of a room: the identity it joined under and the channel
/// frames are delivered through.
#[derive(Debug, Clone)]
pub struct Member {
    /// The player identity adopted at AUTH.
    pub player_id: i64,
    /// Queue feeding the member's connection writer task.
    pub sink: FrameSink,
}

/// A named membership group with a shared property bag.
///
/// Rooms never re-encode frames: [`Room::broadcast`] clones the
/// original bytes to each recipient, so CRCs survive and every member
/// sees exactly what the sender produced.
#[derive(Debug, Default)]
pub struct Room {
    members: HashMap<ConnectionId, Member>,
    properties: HashMap<String, Value>,
}

impl Room {
    /// Creates an empty room. The manager immediately joins the owner,
    /// so an empty room is never observable from outside.
    pub(crate) fn new() -> Self {
        Self {
            members: HashMap::new(),
            properties: HashMap::new(),
        }
    }

    pub(crate) fn insert_member(
        &mut self,
        conn_id: ConnectionId,
        member: Member,
    ) {
        self.members.insert(conn_id, member);
    }

    pub(crate) fn remove_member(
        &mut self,
        conn_id: ConnectionId,
    ) -> Option<Member> {
        self.members.remove(&conn_id)
    }

    /// Returns `true` if `conn_id` is a member.
    pub fn contains(&self, conn_id: ConnectionId) -> bool {
        self.members.contains_key(&conn_id)
    }

    /// Number of members currently in the room.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The room's property bag.
    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    /// Shallow-merges `updates` into the property bag.
    pub(crate) fn merge_properties(
        &mut self,
        updates: impl IntoIterator<Item = (String, Value)>,
    ) {
        for (key, value) in updates {
            self.properties.insert(key, value);
        }
    }

    /// Sends `bytes` verbatim to every member except `exclude`.
    ///
    /// Members whose sink is gone (connection tearing down) are skipped
    /// silently — their disconnect cleanup removes them shortly after.
    /// Returns the number of members the frame was queued for.
    pub fn broadcast(
        &self,
        bytes: &[u8],
        exclude: Option<ConnectionId>,
    ) -> usize {
        let mut delivered = 0;
        for (conn_id, member) in &self.members {
            if Some(*conn_id) == exclude {
                continue;
            }
            if member.sink.send(bytes.to_vec()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}
