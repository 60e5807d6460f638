//! Error types for the transport layer.
//!
//! How these surface to embedders is decided above this crate: recv
//! failures become CONNECTION_ERROR events and end the session (the
//! registry entry is dropped and room cleanup runs), while send
//! failures become SEND_ERROR events from the connection's writer task
//! and stop the writer without tearing anything else down — the read
//! side notices the dead socket on its own.

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone. Reported as CONNECTION_ERROR; terminal for
    /// the session.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A frame could not be written. Reported as SEND_ERROR by the
    /// writer task, which stops draining its queue.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving the next frame failed. Reported as CONNECTION_ERROR;
    /// terminal for the session.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a connection failed. Surfaced
    /// only in the server's accept loop; no session exists yet.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
