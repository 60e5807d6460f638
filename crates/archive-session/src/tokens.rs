//! One-shot auth tokens issued at CONNECT and redeemed at AUTH.
//!
//! The server issues a random token in its CONNECT reply; the client
//! must echo it back in AUTH to prove it received the reply on this
//! connection. A token is bound to the connection it was issued to and
//! is consumed by its first successful redemption.

use std::collections::HashMap;

use archive_transport::ConnectionId;
use rand::Rng;

/// Process-wide map from opaque token to the connection it was issued to.
///
/// Like the session registry, this is a plain map guarded by the
/// server's lock, not internally synchronized.
#[derive(Debug, Default)]
pub struct AuthTokens {
    tokens: HashMap<String, ConnectionId>,
}

impl AuthTokens {
    /// Creates an empty token table.
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// Issues a fresh token bound to `conn_id` and records it.
    pub fn issue(&mut self, conn_id: ConnectionId) -> String {
        let token = generate_token();
        self.tokens.insert(token.clone(), conn_id);
        tracing::debug!(%conn_id, "auth token issued");
        token
    }

    /// Redeems a token for `conn_id`.
    ///
    /// Returns `true` and consumes the token only when it exists AND
    /// was issued to this very connection. A token presented by any
    /// other connection stays in the table — the legitimate holder can
    /// still redeem it.
    pub fn consume(&mut self, token: &str, conn_id: ConnectionId) -> bool {
        match self.tokens.get(token) {
            Some(owner) if *owner == conn_id => {
                self.tokens.remove(token);
                true
            }
            _ => false,
        }
    }

    /// Drops every token issued to `conn_id`. Called on disconnect so
    /// unredeemed tokens don't accumulate.
    pub fn purge(&mut self, conn_id: ConnectionId) {
        self.tokens.retain(|_, owner| *owner != conn_id);
    }

    /// Returns the number of outstanding tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are outstanding.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Generates a random 32-character hex string (128 bits of entropy) —
/// enough that guessing a valid token is computationally infeasible.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
