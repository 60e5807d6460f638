//! Integration tests for room lifecycle, notifications, and fan-out.
//!
//! Broadcasts land on each member's frame sink; the tests attach a
//! receiver per member and inspect exactly which bytes arrived where.

use archive_protocol::{decode, op, param, Value};
use archive_room::{RoomError, RoomManager};
use archive_transport::{ConnectionId, FrameSink};
use tokio::sync::mpsc::{self, UnboundedReceiver};

// =========================================================================
// Helpers
// =========================================================================

/// A connection id plus both ends of its frame channel.
fn member(id: u64) -> (ConnectionId, FrameSink, UnboundedReceiver<Vec<u8>>) {
    let (sink, rx) = mpsc::unbounded_channel();
    (ConnectionId::new(id), sink, rx)
}

/// Drains every frame currently queued for a member.
fn drain(rx: &mut UnboundedReceiver<Vec<u8>>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

// =========================================================================
// create()
// =========================================================================

#[test]
fn test_create_joins_owner_and_lists_room() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);

    rooms.create("arena", a, 10, sink_a).expect("should create");

    assert_eq!(rooms.list(), vec!["arena".to_string()]);
    assert_eq!(rooms.room_of(a), Some("arena"));
    assert_eq!(rooms.get("arena").unwrap().member_count(), 1);
}

#[test]
fn test_create_duplicate_id_returns_exists() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);
    let (b, sink_b, _rx_b) = member(2);
    rooms.create("arena", a, 10, sink_a).unwrap();

    let result = rooms.create("arena", b, 20, sink_b);
    assert!(matches!(result, Err(RoomError::Exists(id)) if id == "arena"));
    // The failed creator joined nothing.
    assert_eq!(rooms.room_of(b), None);
}

#[test]
fn test_create_empty_id_returns_invalid() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);
    assert!(matches!(
        rooms.create("", a, 10, sink_a),
        Err(RoomError::InvalidId)
    ));
}

#[test]
fn test_create_while_in_another_room_leaves_it_first() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);
    let (b, sink_b, mut rx_b) = member(2);
    rooms.create("first", a, 10, sink_a.clone()).unwrap();
    rooms.join("first", b, 20, sink_b).unwrap();
    drain(&mut rx_b);

    rooms.create("second", a, 10, sink_a).unwrap();

    assert_eq!(rooms.room_of(a), Some("second"));
    // B stays in "first" and hears A leave.
    assert_eq!(rooms.room_of(b), Some("first"));
    let frames = drain(&mut rx_b);
    assert_eq!(frames.len(), 1);
    let msg = decode(&frames[0]).unwrap();
    assert_eq!(msg.operation, op::room::LEAVE);
}

// =========================================================================
// join()
// =========================================================================

#[test]
fn test_join_missing_room_returns_not_found() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);
    let result = rooms.join("nowhere", a, 10, sink_a);
    assert!(matches!(result, Err(RoomError::NotFound(id)) if id == "nowhere"));
}

#[test]
fn test_join_notifies_existing_members_not_joiner() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, mut rx_a) = member(1);
    let (b, sink_b, mut rx_b) = member(2);
    rooms.create("arena", a, 10, sink_a).unwrap();

    rooms.join("arena", b, 20, sink_b).unwrap();

    // A (already inside) hears the join announcement.
    let frames = drain(&mut rx_a);
    assert_eq!(frames.len(), 1);
    let msg = decode(&frames[0]).unwrap();
    assert_eq!(msg.message_type, 0x07);
    assert_eq!(msg.operation, op::room::JOIN);
    assert_eq!(msg.params.get_i64(param::PLAYER_ID), Some(20));
    assert_eq!(msg.params.get_str(param::ROOM_ID), Some("arena"));

    // The joiner hears nothing about their own arrival.
    assert!(drain(&mut rx_b).is_empty());
}

#[test]
fn test_join_same_room_twice_is_idempotent() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, mut rx_a) = member(1);
    let (b, sink_b, _rx_b) = member(2);
    rooms.create("arena", a, 10, sink_a).unwrap();
    rooms.join("arena", b, 20, sink_b.clone()).unwrap();
    drain(&mut rx_a);

    rooms.join("arena", b, 20, sink_b).unwrap();

    assert_eq!(rooms.get("arena").unwrap().member_count(), 2);
    // No second announcement.
    assert!(drain(&mut rx_a).is_empty());
}

#[test]
fn test_join_switches_rooms_with_leave_notification() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, mut rx_a) = member(1);
    let (b, sink_b, _rx_b) = member(2);
    let (c, sink_c, _rx_c) = member(3);
    rooms.create("old", a, 10, sink_a).unwrap();
    rooms.create("new", b, 20, sink_b).unwrap();
    rooms.join("old", c, 30, sink_c.clone()).unwrap();
    drain(&mut rx_a);

    // C moves from "old" to "new".
    rooms.join("new", c, 30, sink_c).unwrap();

    assert_eq!(rooms.room_of(c), Some("new"));
    assert_eq!(rooms.get("old").unwrap().member_count(), 1);
    assert_eq!(rooms.get("new").unwrap().member_count(), 2);

    // A (still in "old") hears C leave.
    let frames = drain(&mut rx_a);
    assert_eq!(frames.len(), 1);
    let msg = decode(&frames[0]).unwrap();
    assert_eq!(msg.operation, op::room::LEAVE);
    assert_eq!(msg.params.get_i64(param::PLAYER_ID), Some(30));
}

// =========================================================================
// leave()
// =========================================================================

#[test]
fn test_leave_notifies_remaining_members() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, mut rx_a) = member(1);
    let (b, sink_b, _rx_b) = member(2);
    rooms.create("arena", a, 10, sink_a).unwrap();
    rooms.join("arena", b, 20, sink_b).unwrap();
    drain(&mut rx_a);

    let left = rooms.leave(b).expect("should leave");

    assert_eq!(left, "arena");
    assert_eq!(rooms.room_of(b), None);
    let frames = drain(&mut rx_a);
    assert_eq!(frames.len(), 1);
    let msg = decode(&frames[0]).unwrap();
    assert_eq!(msg.operation, op::room::LEAVE);
    assert_eq!(msg.params.get_i64(param::PLAYER_ID), Some(20));
    assert_eq!(msg.params.get_str(param::ROOM_ID), Some("arena"));
}

#[test]
fn test_last_leave_destroys_room() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);
    rooms.create("arena", a, 10, sink_a).unwrap();

    rooms.leave(a).unwrap();

    assert!(rooms.list().is_empty());
    assert_eq!(rooms.room_count(), 0);
    assert!(rooms.get("arena").is_none());
}

#[test]
fn test_leave_without_room_returns_not_in_room() {
    let mut rooms = RoomManager::new();
    let a = ConnectionId::new(1);
    assert!(matches!(
        rooms.leave(a),
        Err(RoomError::NotInRoom(c)) if c == a
    ));
}

// =========================================================================
// list()
// =========================================================================

#[test]
fn test_list_returns_sorted_snapshot() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);
    let (b, sink_b, _rx_b) = member(2);
    let (c, sink_c, _rx_c) = member(3);
    rooms.create("zeta", a, 10, sink_a).unwrap();
    rooms.create("alpha", b, 20, sink_b).unwrap();
    rooms.create("mid", c, 30, sink_c).unwrap();

    assert_eq!(rooms.list(), vec!["alpha", "mid", "zeta"]);
}

// =========================================================================
// broadcast()
// =========================================================================

#[test]
fn test_broadcast_excludes_sender_and_preserves_bytes() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, mut rx_a) = member(1);
    let (b, sink_b, mut rx_b) = member(2);
    let (c, sink_c, mut rx_c) = member(3);
    rooms.create("arena", a, 10, sink_a).unwrap();
    rooms.join("arena", b, 20, sink_b).unwrap();
    rooms.join("arena", c, 30, sink_c).unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    let frame = vec![0x08, 0x01, 0x00, 0x00, 0xAA, 0xBB];
    let delivered = rooms.broadcast("arena", &frame, Some(a)).unwrap();

    assert_eq!(delivered, 2);
    // Recipients get the identical bytes, the sender gets nothing.
    assert_eq!(drain(&mut rx_b), vec![frame.clone()]);
    assert_eq!(drain(&mut rx_c), vec![frame]);
    assert!(drain(&mut rx_a).is_empty());
}

#[test]
fn test_broadcast_without_exclusion_reaches_everyone() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, mut rx_a) = member(1);
    let (b, sink_b, mut rx_b) = member(2);
    rooms.create("arena", a, 10, sink_a).unwrap();
    rooms.join("arena", b, 20, sink_b).unwrap();
    drain(&mut rx_a);

    let delivered = rooms.broadcast("arena", &[1, 2, 3], None).unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(drain(&mut rx_a).len(), 1);
    assert_eq!(drain(&mut rx_b).len(), 1);
}

#[test]
fn test_broadcast_missing_room_returns_not_found() {
    let rooms = RoomManager::new();
    assert!(matches!(
        rooms.broadcast("nowhere", &[1], None),
        Err(RoomError::NotFound(_))
    ));
}

#[test]
fn test_broadcast_skips_dead_sinks() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, _rx_a) = member(1);
    let (b, sink_b, rx_b) = member(2);
    rooms.create("arena", a, 10, sink_a).unwrap();
    rooms.join("arena", b, 20, sink_b).unwrap();

    // B's connection is tearing down: its receiver is gone.
    drop(rx_b);

    let delivered = rooms.broadcast("arena", &[9], None).unwrap();
    assert_eq!(delivered, 1);
}

// =========================================================================
// set_properties()
// =========================================================================

#[test]
fn test_set_properties_merges_and_broadcasts_full_bag() {
    let mut rooms = RoomManager::new();
    let (a, sink_a, mut rx_a) = member(1);
    rooms.create("arena", a, 10, sink_a).unwrap();

    rooms
        .set_properties(
            "arena",
            vec![
                ("map".to_string(), Value::Str("dunes".into())),
                ("round".to_string(), Value::Int(1)),
            ],
        )
        .unwrap();
    rooms
        .set_properties("arena", vec![("round".to_string(), Value::Int(2))])
        .unwrap();

    let props = rooms.get("arena").unwrap().properties();
    assert_eq!(props.get("map"), Some(&Value::Str("dunes".into())));
    assert_eq!(props.get("round"), Some(&Value::Int(2)));

    // Two broadcasts; the second carries the merged bag.
    let frames = drain(&mut rx_a);
    assert_eq!(frames.len(), 2);
    let msg = decode(&frames[1]).unwrap();
    assert_eq!(msg.operation, op::room::PROPERTIES);
    assert_eq!(msg.params.get_str(param::ROOM_ID), Some("arena"));
    let dict = msg
        .params
        .get(param::PROPERTIES)
        .and_then(Value::as_dict)
        .expect("should carry a dictionary");
    assert_eq!(
        dict,
        &[
            (Value::Str("map".into()), Value::Str("dunes".into())),
            (Value::Str("round".into()), Value::Int(2)),
        ]
    );
}

#[test]
fn test_set_properties_missing_room_returns_not_found() {
    let mut rooms = RoomManager::new();
    assert!(matches!(
        rooms.set_properties("nowhere", vec![]),
        Err(RoomError::NotFound(_))
    ));
}
