//! Session management for ARCHIVE.
//!
//! This crate tracks who is connected and what they are allowed to do:
//!
//! 1. **Session records** ([`SessionRecord`]) — per-connection identity,
//!    authentication status, current room, property bag, and the
//!    outbound frame sink.
//! 2. **The registry** ([`SessionRegistry`]) — process-wide map from
//!    connection id to session, mutated at accept/close and by the
//!    AUTH and room handlers.
//! 3. **Auth tokens** ([`AuthTokens`]) — one-shot tokens issued at
//!    CONNECT and redeemed at AUTH.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← consults sessions for identity and membership
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Transport layer (below)  ← provides ConnectionId and the frame sink
//! ```

mod error;
mod registry;
mod session;
mod tokens;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::SessionRecord;
pub use tokens::AuthTokens;
