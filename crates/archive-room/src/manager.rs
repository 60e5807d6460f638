//! Room manager: lifecycle, membership, and replication broadcasts.
//!
//! # Concurrency note
//!
//! Like the session registry, `RoomManager` is a plain map owned behind
//! the server's `tokio::sync::Mutex`. Broadcasts only queue bytes onto
//! unbounded member sinks, so no network I/O happens under the lock.

use std::collections::HashMap;

use archive_protocol::{encode, op, param, MessageType, Params, Value};
use archive_transport::{ConnectionId, FrameSink};

use crate::room::Member;
use crate::{Room, RoomError};

/// Manages all active rooms and tracks which connection is in which room.
///
/// Invariants held at every return:
/// - every room has at least one member (empty rooms are deleted),
/// - a connection is in at most one room,
/// - the `member_rooms` reverse index mirrors the rooms' member sets.
#[derive(Debug, Default)]
pub struct RoomManager {
    /// Active rooms, keyed by the client-chosen room id.
    rooms: HashMap<String, Room>,

    /// Reverse index: which room each connection is currently in.
    member_rooms: HashMap<ConnectionId, String>,
}

impl RoomManager {
    /// Creates a new, empty room manager.
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            member_rooms: HashMap::new(),
        }
    }

    /// Creates a room and joins the owner in one step.
    ///
    /// # Errors
    /// - [`RoomError::InvalidId`] — empty room id.
    /// - [`RoomError::Exists`] — a room with this id already exists.
    pub fn create(
        &mut self,
        room_id: &str,
        owner: ConnectionId,
        player_id: i64,
        sink: FrameSink,
    ) -> Result<(), RoomError> {
        if room_id.is_empty() {
            return Err(RoomError::InvalidId);
        }
        if self.rooms.contains_key(room_id) {
            return Err(RoomError::Exists(room_id.to_string()));
        }

        // Creating a room while in another one implies leaving it.
        if self.member_rooms.contains_key(&owner) {
            self.leave(owner)?;
        }

        let mut room = Room::new();
        room.insert_member(owner, Member { player_id, sink });
        self.rooms.insert(room_id.to_string(), room);
        self.member_rooms.insert(owner, room_id.to_string());

        tracing::info!(room_id, %owner, "room created");
        Ok(())
    }

    /// Adds a connection to an existing room.
    ///
    /// A connection already in some other room leaves it first (the old
    /// room gets the usual LEAVE notification). Existing members of the
    /// target room are notified with a JOIN frame; the joiner is not.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if the room does not exist.
    pub fn join(
        &mut self,
        room_id: &str,
        conn_id: ConnectionId,
        player_id: i64,
        sink: FrameSink,
    ) -> Result<(), RoomError> {
        if !self.rooms.contains_key(room_id) {
            return Err(RoomError::NotFound(room_id.to_string()));
        }

        let current = self.member_rooms.get(&conn_id).cloned();
        match current.as_deref() {
            Some(current) if current == room_id => return Ok(()),
            Some(_) => {
                self.leave(conn_id)?;
            }
            None => {}
        }

        let notification = join_frame(player_id, room_id)?;
        let room = self
            .rooms
            .get_mut(room_id)
            .expect("checked above, leave() cannot remove another room");
        room.broadcast(&notification, None);
        room.insert_member(conn_id, Member { player_id, sink });
        self.member_rooms.insert(conn_id, room_id.to_string());

        tracing::info!(
            room_id,
            %conn_id,
            members = self.rooms[room_id].member_count(),
            "member joined room"
        );
        Ok(())
    }

    /// Removes a connection from its current room.
    ///
    /// Remaining members are notified with a LEAVE frame; the room is
    /// deleted when its member set empties. Returns the id of the room
    /// that was left.
    ///
    /// # Errors
    /// Returns [`RoomError::NotInRoom`] if the connection is not in any
    /// room.
    pub fn leave(
        &mut self,
        conn_id: ConnectionId,
    ) -> Result<String, RoomError> {
        let room_id = self
            .member_rooms
            .remove(&conn_id)
            .ok_or(RoomError::NotInRoom(conn_id))?;

        let Some(room) = self.rooms.get_mut(&room_id) else {
            // Index said the room exists; a missing room here is a bug.
            tracing::warn!(%room_id, %conn_id, "membership index out of sync");
            return Ok(room_id);
        };

        let member = room.remove_member(conn_id);

        if room.is_empty() {
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, "room destroyed (last member left)");
        } else if let Some(member) = member {
            let notification = leave_frame(member.player_id, &room_id)?;
            let room = &self.rooms[&room_id];
            room.broadcast(&notification, None);
            tracing::info!(
                %room_id,
                %conn_id,
                members = room.member_count(),
                "member left room"
            );
        }

        Ok(room_id)
    }

    /// Returns a sorted snapshot of all room ids.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Shallow-merges `updates` into a room's property bag and
    /// broadcasts the full resulting bag to every member.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if the room does not exist.
    pub fn set_properties(
        &mut self,
        room_id: &str,
        updates: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;

        room.merge_properties(updates);

        let notification = properties_frame(room_id, room.properties())?;
        room.broadcast(&notification, None);
        tracing::debug!(room_id, "room properties updated");
        Ok(())
    }

    /// Sends `bytes` verbatim to every member of `room_id` except
    /// `exclude`. Returns the number of members the frame was queued
    /// for.
    ///
    /// # Errors
    /// Returns [`RoomError::NotFound`] if the room does not exist.
    pub fn broadcast(
        &self,
        room_id: &str,
        bytes: &[u8],
        exclude: Option<ConnectionId>,
    ) -> Result<usize, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        Ok(room.broadcast(bytes, exclude))
    }

    /// The room a connection is currently in, if any.
    pub fn room_of(&self, conn_id: ConnectionId) -> Option<&str> {
        self.member_rooms.get(&conn_id).map(String::as_str)
    }

    /// Looks up a room by id.
    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Returns the number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

// ---------------------------------------------------------------------------
// Notification frames
// ---------------------------------------------------------------------------

/// ROOM.JOIN announcement sent to existing members when someone joins.
fn join_frame(player_id: i64, room_id: &str) -> Result<Vec<u8>, RoomError> {
    let params = Params::new()
        .with(param::PLAYER_ID, Value::Long(player_id))
        .with(param::ROOM_ID, Value::Str(room_id.to_string()));
    Ok(encode(MessageType::Room.code(), op::room::JOIN, &params)?)
}

/// ROOM.LEAVE announcement sent to remaining members when someone leaves.
fn leave_frame(player_id: i64, room_id: &str) -> Result<Vec<u8>, RoomError> {
    let params = Params::new()
        .with(param::PLAYER_ID, Value::Long(player_id))
        .with(param::ROOM_ID, Value::Str(room_id.to_string()));
    Ok(encode(MessageType::Room.code(), op::room::LEAVE, &params)?)
}

/// ROOM.PROPERTIES replication frame carrying the full property bag.
///
/// Keys are written in sorted order so the frame bytes are
/// deterministic for a given bag.
fn properties_frame(
    room_id: &str,
    properties: &HashMap<String, Value>,
) -> Result<Vec<u8>, RoomError> {
    let mut keys: Vec<&String> = properties.keys().collect();
    keys.sort();
    let pairs: Vec<(Value, Value)> = keys
        .into_iter()
        .map(|k| (Value::Str(k.clone()), properties[k].clone()))
        .collect();

    let params = Params::new()
        .with(param::ROOM_ID, Value::Str(room_id.to_string()))
        .with(param::PROPERTIES, Value::Dict(pairs));
    Ok(encode(
        MessageType::Room.code(),
        op::room::PROPERTIES,
        &params,
    )?)
}
