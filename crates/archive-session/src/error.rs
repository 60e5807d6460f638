//! Error types for the session layer.

use archive_transport::ConnectionId;

/// Errors that can occur during session bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection. Happens when an
    /// operation races the session's disconnect cleanup.
    #[error("no session for {0}")]
    NotFound(ConnectionId),

    /// The connection id is already registered. Connection ids are
    /// process-unique, so this indicates a transport bug.
    #[error("{0} is already registered")]
    AlreadyRegistered(ConnectionId),
}
