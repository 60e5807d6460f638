//! Server and reliability configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SendOptions
// ---------------------------------------------------------------------------

/// Retransmission policy for one reliable send.
///
/// The server-wide defaults live in [`ServerConfig`]; individual sends
/// can override them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SendOptions {
    /// How long to wait for an ACK before retransmitting.
    pub timeout: Duration,

    /// How many retransmissions to attempt before giving up. A frame
    /// that is never acknowledged is transmitted `1 + max_retries`
    /// times in total.
    pub max_retries: u32,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            max_retries: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration for an [`ArchiveServer`](crate::ArchiveServer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Default retransmission policy for reliable sends.
    pub send_options: SendOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            send_options: SendOptions::default(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
