//! Error types for the room layer.

use archive_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A room with this id already exists.
    #[error("room {0:?} already exists")]
    Exists(String),

    /// The room does not exist.
    #[error("room {0:?} not found")]
    NotFound(String),

    /// The connection is not in any room.
    #[error("{0} is not in a room")]
    NotInRoom(ConnectionId),

    /// The room id is not acceptable (empty string).
    #[error("room id must be a non-empty string")]
    InvalidId,

    /// Building a notification frame failed.
    #[error("notification encode failed: {0}")]
    Codec(#[from] archive_protocol::CodecError),
}
