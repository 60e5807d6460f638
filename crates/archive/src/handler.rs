//! Per-connection handler: session registration, the read loop, and
//! teardown.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler, plus a writer task that serializes outbound frames. The
//! flow is:
//!   1. Register an (unauthenticated) session and start the writer
//!   2. Loop: receive frames → reliability hooks → dispatch
//!   3. On exit, the drop guard releases registry/room/token state

use std::sync::Arc;

use archive_room::RoomError;
use archive_session::SessionRecord;
use archive_transport::{Connection as TransportConnection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::connection::{Connection, ErrorKind};
use crate::dispatcher::dispatch;
use crate::server::ServerState;

/// Drop guard that releases a connection's server-side state when the
/// handler exits, including when it exits abruptly. Since `Drop` is
/// synchronous, the async cleanup runs as a fire-and-forget task.
struct ConnectionGuard {
    connection: Connection,
    state: Arc<ServerState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        // Stops the timers and turns later sends into no-ops.
        self.connection.close();

        let conn_id = self.connection.id();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.tokens.lock().await.purge(conn_id);
            let record = state.sessions.lock().await.unregister(conn_id);
            if record.is_some() {
                let mut rooms = state.rooms.lock().await;
                match rooms.leave(conn_id) {
                    Ok(room_id) => {
                        tracing::info!(
                            %conn_id,
                            %room_id,
                            "room membership released on disconnect"
                        );
                    }
                    Err(RoomError::NotInRoom(_)) => {}
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "room cleanup failed");
                    }
                }
            }
        });
    }
}

/// Drives a single connection from accept to close.
pub(crate) async fn handle_connection(
    transport_conn: WebSocketConnection,
    state: Arc<ServerState>,
) {
    let conn_id = transport_conn.id();
    let remote_addr = transport_conn.remote_addr();
    tracing::debug!(%conn_id, %remote_addr, "handling new connection");

    // The writer task is the sole owner of transport writes; everyone
    // else (dispatcher, rooms, retransmission timers) queues frames
    // onto this channel.
    let (sink, outbound_rx) = mpsc::unbounded_channel();
    let (connection, mut errors) =
        Connection::new(conn_id, sink.clone(), state.config.send_options);

    {
        let mut sessions = state.sessions.lock().await;
        let record = SessionRecord::new(conn_id, remote_addr, sink);
        if let Err(e) = sessions.register(record) {
            tracing::error!(%conn_id, error = %e, "session registration failed");
            let _ = transport_conn.close().await;
            return;
        }
    }

    let transport_conn = Arc::new(transport_conn);
    let _writer = spawn_writer(
        Arc::clone(&transport_conn),
        outbound_rx,
        conn_id,
        &connection,
    );

    // Active from here on: any exit path below releases session, room,
    // and token state through the guard.
    let _guard = ConnectionGuard {
        connection: connection.clone(),
        state: Arc::clone(&state),
    };

    loop {
        tokio::select! {
            received = transport_conn.recv() => {
                match received {
                    Ok(Some(bytes)) => {
                        let Some(msg) = connection.process_inbound(&bytes)
                        else {
                            continue;
                        };
                        if dispatch(&state, &connection, &bytes, msg).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "transport error");
                        connection.report(
                            ErrorKind::ConnectionError,
                            e.to_string(),
                            None,
                        );
                        break;
                    }
                }
            }
            Some(event) = errors.recv() => {
                tracing::warn!(
                    %conn_id,
                    kind = %event.kind,
                    sequence = ?event.sequence,
                    "{}", event.message
                );
            }
        }
    }

    // _guard drops here → async cleanup releases shared state; the
    // writer drains its queue and closes the transport once the last
    // sink is gone.
}

/// Spawns the writer task: drains the outbound queue into the
/// transport, then closes it. Ends when every sink clone is dropped
/// (connection teardown) or a write fails.
fn spawn_writer(
    transport_conn: Arc<WebSocketConnection>,
    mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    conn_id: archive_transport::ConnectionId,
    connection: &Connection,
) -> tokio::task::JoinHandle<()> {
    // Only the error channel is cloned in — holding a full `Connection`
    // here would keep the outbound channel open forever.
    let errors = connection.errors_sender();
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = transport_conn.send(&frame).await {
                tracing::debug!(%conn_id, error = %e, "transport write failed");
                let _ = errors.send(crate::connection::ErrorEvent {
                    kind: ErrorKind::SendError,
                    message: e.to_string(),
                    sequence: None,
                });
                break;
            }
        }
        let _ = transport_conn.close().await;
        tracing::debug!(%conn_id, "writer task finished");
    })
}
