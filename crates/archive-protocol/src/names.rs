//! Compile-time name tables for message types, operations, and parameters.
//!
//! The wire carries only numeric codes; names exist for logs, debugging,
//! and the name-view accessors on [`Params`](crate::Params). Nothing in
//! the protocol's behavior depends on a name — an unknown code still
//! decodes and dispatches, it just prints as `UNKNOWN`.

use std::fmt;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The closed set of frame message types (header byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Connection lifecycle: connect, auth, heartbeat, disconnect.
    System = 0x01,
    /// Application frame that is retransmitted until acknowledged.
    Reliable = 0x02,
    /// Application frame with no delivery guarantee.
    Unreliable = 0x03,
    /// Reserved for payloads split across frames. Dropped on receipt.
    Fragment = 0x04,
    /// Acknowledges a reliable frame's SEQUENCE.
    Ack = 0x05,
    /// Latency probe, echoed with a server timestamp.
    Ping = 0x06,
    /// Room lifecycle and property replication.
    Room = 0x07,
    /// Opaque game event, fanned out to the sender's room.
    Event = 0x08,
}

impl MessageType {
    /// Resolves a header byte to a message type, if it is a known one.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::System),
            0x02 => Some(Self::Reliable),
            0x03 => Some(Self::Unreliable),
            0x04 => Some(Self::Fragment),
            0x05 => Some(Self::Ack),
            0x06 => Some(Self::Ping),
            0x07 => Some(Self::Room),
            0x08 => Some(Self::Event),
            _ => None,
        }
    }

    /// The wire code for this message type.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// The canonical upper-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Reliable => "RELIABLE",
            Self::Unreliable => "UNRELIABLE",
            Self::Fragment => "FRAGMENT",
            Self::Ack => "ACK",
            Self::Ping => "PING",
            Self::Room => "ROOM",
            Self::Event => "EVENT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Operation codes
// ---------------------------------------------------------------------------

/// Operation codes, namespaced per message type. Each namespace starts
/// at `0x01`.
pub mod op {
    /// Operations under [`MessageType::System`](super::MessageType::System).
    pub mod system {
        pub const CONNECT: u8 = 0x01;
        pub const DISCONNECT: u8 = 0x02;
        pub const AUTH: u8 = 0x03;
        pub const HEARTBEAT: u8 = 0x04;
    }

    /// Operations under [`MessageType::Room`](super::MessageType::Room).
    pub mod room {
        pub const CREATE: u8 = 0x01;
        pub const JOIN: u8 = 0x02;
        pub const LEAVE: u8 = 0x03;
        pub const LIST: u8 = 0x04;
        pub const PROPERTIES: u8 = 0x05;
    }

    /// Operations under [`MessageType::Event`](super::MessageType::Event).
    pub mod event {
        pub const RAISE: u8 = 0x01;
        pub const STATE: u8 = 0x02;
        pub const SNAPSHOT: u8 = 0x03;
    }

    /// The single acknowledgement operation.
    pub mod ack {
        pub const ACK: u8 = 0x01;
    }

    /// The single ping operation.
    pub mod ping {
        pub const PING: u8 = 0x01;
    }
}

/// Resolves `(message_type, operation)` to a canonical operation name.
///
/// Unknown combinations — including any opcode under RELIABLE,
/// UNRELIABLE, or FRAGMENT, which carry no named operations — resolve
/// to `"UNKNOWN"`.
pub fn operation_name(message_type: u8, operation: u8) -> &'static str {
    match (MessageType::from_code(message_type), operation) {
        (Some(MessageType::System), op::system::CONNECT) => "CONNECT",
        (Some(MessageType::System), op::system::DISCONNECT) => "DISCONNECT",
        (Some(MessageType::System), op::system::AUTH) => "AUTH",
        (Some(MessageType::System), op::system::HEARTBEAT) => "HEARTBEAT",
        (Some(MessageType::Room), op::room::CREATE) => "CREATE",
        (Some(MessageType::Room), op::room::JOIN) => "JOIN",
        (Some(MessageType::Room), op::room::LEAVE) => "LEAVE",
        (Some(MessageType::Room), op::room::LIST) => "LIST",
        (Some(MessageType::Room), op::room::PROPERTIES) => "PROPERTIES",
        (Some(MessageType::Event), op::event::RAISE) => "RAISE",
        (Some(MessageType::Event), op::event::STATE) => "STATE",
        (Some(MessageType::Event), op::event::SNAPSHOT) => "SNAPSHOT",
        (Some(MessageType::Ack), op::ack::ACK) => "ACK",
        (Some(MessageType::Ping), op::ping::PING) => "PING",
        _ => "UNKNOWN",
    }
}

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// Canonical parameter codes shared by all message types.
pub mod param {
    pub const PLAYER_ID: u8 = 0x01;
    pub const ROOM_ID: u8 = 0x02;
    pub const TIMESTAMP: u8 = 0x03;
    pub const SEQUENCE: u8 = 0x04;
    pub const POSITION: u8 = 0x05;
    pub const ROTATION: u8 = 0x06;
    pub const VELOCITY: u8 = 0x07;
    pub const ACTION: u8 = 0x08;
    pub const TARGET_ID: u8 = 0x09;
    pub const HEALTH: u8 = 0x0A;
    pub const PROPERTIES: u8 = 0x0B;
}

/// Every canonical `(code, name)` pair. Single source of truth for the
/// two lookup directions below.
const PARAM_TABLE: &[(u8, &str)] = &[
    (param::PLAYER_ID, "PLAYER_ID"),
    (param::ROOM_ID, "ROOM_ID"),
    (param::TIMESTAMP, "TIMESTAMP"),
    (param::SEQUENCE, "SEQUENCE"),
    (param::POSITION, "POSITION"),
    (param::ROTATION, "ROTATION"),
    (param::VELOCITY, "VELOCITY"),
    (param::ACTION, "ACTION"),
    (param::TARGET_ID, "TARGET_ID"),
    (param::HEALTH, "HEALTH"),
    (param::PROPERTIES, "PROPERTIES"),
];

/// The canonical name for a parameter code, if one exists.
pub fn param_name(code: u8) -> Option<&'static str> {
    PARAM_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// The parameter code for a canonical name, if one exists.
pub fn param_code(name: &str) -> Option<u8> {
    PARAM_TABLE
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(c, _)| *c)
}

// =========================================================================
// Tests
// =========================================================================
