//! `ArchiveServer` builder and accept loop.
//!
//! This is the entry point for running an ARCHIVE server. It ties
//! together all the layers: transport → protocol → connection →
//! session → room.

use std::sync::Arc;

use archive_room::RoomManager;
use archive_session::{AuthTokens, SessionRegistry};
use archive_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{ArchiveError, SendOptions, ServerConfig};

/// Shared engine state passed to each connection handler task.
///
/// The registry, room manager, and token table are process-wide with
/// explicit lifecycles — created here at server start, dropped at
/// shutdown. Each lives behind its own `Mutex`; handlers never hold
/// two locks at once.
pub(crate) struct ServerState {
    pub(crate) sessions: Mutex<SessionRegistry>,
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) tokens: Mutex<AuthTokens>,
    pub(crate) config: ServerConfig,
}

impl ServerState {
    pub(crate) fn new(config: ServerConfig) -> Self {
        Self {
            sessions: Mutex::new(SessionRegistry::new()),
            rooms: Mutex::new(RoomManager::new()),
            tokens: Mutex::new(AuthTokens::new()),
            config,
        }
    }
}

/// Builder for configuring and starting an ARCHIVE server.
///
/// # Example
///
/// ```rust,ignore
/// use archive::prelude::*;
///
/// let server = ArchiveServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ArchiveServerBuilder {
    config: ServerConfig,
}

impl ArchiveServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the default retransmission policy for reliable sends.
    pub fn send_options(mut self, options: SendOptions) -> Self {
        self.config.send_options = options;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the transport and builds the server.
    pub async fn build(self) -> Result<ArchiveServer, ArchiveError> {
        let transport =
            WebSocketTransport::bind(&self.config.bind_addr).await?;
        let state = Arc::new(ServerState::new(self.config));
        Ok(ArchiveServer { transport, state })
    }
}

impl Default for ArchiveServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running ARCHIVE server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ArchiveServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl ArchiveServer {
    /// Creates a new builder.
    pub fn builder() -> ArchiveServerBuilder {
        ArchiveServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), ArchiveError> {
        tracing::info!("ARCHIVE server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(handle_connection(conn, state));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
