//! # ARCHIVE
//!
//! Server-side realtime engine for the ARCHIVE wire protocol: a
//! compact binary protocol for real-time multiplayer game networking,
//! terminated over a WebSocket transport.
//!
//! The engine is layered:
//! - frames are decoded by `archive-protocol` (typed parameters,
//!   CRC-16 integrity),
//! - each connection runs a reliability state machine
//!   ([`Connection`]) — sequence tracking, ACK emission, and
//!   retransmission with timers,
//! - decoded messages are routed by message type through the
//!   dispatcher into system handlers (auth, heartbeat) or the room
//!   layer (membership, property replication, verbatim broadcast).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archive::prelude::*;
//!
//! # async fn run() -> Result<(), ArchiveError> {
//! let server = ArchiveServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod connection;
mod dispatcher;
mod error;
mod handler;
mod server;

pub use config::{SendOptions, ServerConfig};
pub use connection::{Connection, ErrorEvent, ErrorKind};
pub use error::ArchiveError;
pub use server::{ArchiveServer, ArchiveServerBuilder};

/// Re-exports everything an embedder needs.
///
/// ```rust
/// use archive::prelude::*;
/// ```
pub mod prelude {
    // Meta-crate
    pub use crate::{
        ArchiveError, ArchiveServer, ArchiveServerBuilder, Connection,
        ErrorEvent, ErrorKind, SendOptions, ServerConfig,
    };

    // Protocol types
    pub use archive_protocol::{
        decode, encode, op, param, CodecError, DataType, Message,
        MessageType, Params, Value,
    };

    // Session types
    pub use archive_session::{
        AuthTokens, SessionError, SessionRecord, SessionRegistry,
    };

    // Room types
    pub use archive_room::{Member, Room, RoomError, RoomManager};

    // Transport types
    pub use archive_transport::{
        Connection as TransportConnection, ConnectionId, FrameSink,
        Transport, TransportError, WebSocketTransport,
    };
}
