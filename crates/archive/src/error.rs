//! Unified error type for the ARCHIVE engine.

use archive_protocol::CodecError;
use archive_room::RoomError;
use archive_session::SessionError;
use archive_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `archive` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A codec-level error (truncated frame, CRC mismatch, bad value).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A session-level error (unknown connection, duplicate id).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (exists, not found, not in a room).
    #[error(transparent)]
    Room(#[from] RoomError),
}
