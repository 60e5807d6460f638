//! Message dispatch: routes decoded frames to the right handler.
//!
//! Routing policy by message type:
//!
//! | type        | policy                                              |
//! |-------------|-----------------------------------------------------|
//! | SYSTEM      | handled in place (connect, auth, heartbeat, bye)    |
//! | RELIABLE    | auth required; relayed to the sender's room         |
//! | UNRELIABLE  | auth required; relayed to the sender's room         |
//! | ROOM        | auth required; delegated to the room manager        |
//! | EVENT       | auth + room required; relayed to the sender's room  |
//! | PING        | echoed with a server timestamp                      |
//! | ACK         | consumed upstream by the connection; never seen     |
//! | FRAGMENT    | reserved; logged and dropped                        |
//!
//! Relays forward the sender's original bytes verbatim — the server
//! never re-encodes a frame on the fan-out path.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use archive_protocol::{
    encode, op, param, Message, MessageType, Params, Value,
};
use archive_room::RoomError;
use archive_transport::ConnectionId;

use crate::connection::Connection;
use crate::server::ServerState;

/// Current unix time in milliseconds, as carried in TIMESTAMP params.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Encodes and queues a reply on the connection. Encode failures are
/// logged, never propagated — no handler error reaches the transport.
fn reply(conn: &Connection, message_type: u8, operation: u8, params: &Params) {
    match encode(message_type, operation, params) {
        Ok(frame) => conn.send(frame),
        Err(e) => {
            tracing::error!(conn_id = %conn.id(), error = %e, "failed to encode reply");
        }
    }
}

/// Routes one decoded message. Returns `true` when the connection
/// should close (SYSTEM.DISCONNECT).
pub(crate) async fn dispatch(
    state: &Arc<ServerState>,
    conn: &Connection,
    raw: &[u8],
    msg: Message,
) -> bool {
    let conn_id = conn.id();

    let Some(kind) = msg.kind() else {
        tracing::debug!(
            %conn_id,
            message_type = msg.message_type,
            "unknown message type, dropping"
        );
        return false;
    };

    // Everything except SYSTEM and PING is privileged.
    let needs_auth = !matches!(kind, MessageType::System | MessageType::Ping);
    if needs_auth && !is_authenticated(state, conn_id).await {
        tracing::warn!(
            %conn_id,
            message_type = %kind,
            "unauthenticated message dropped"
        );
        return false;
    }

    match kind {
        MessageType::System => {
            return handle_system(state, conn, &msg).await;
        }
        MessageType::Reliable | MessageType::Unreliable => {
            relay_to_room(state, conn_id, raw, false).await;
        }
        MessageType::Room => {
            handle_room(state, conn, &msg).await;
        }
        MessageType::Event => {
            relay_to_room(state, conn_id, raw, true).await;
        }
        MessageType::Ping => {
            let params =
                Params::new().with(param::TIMESTAMP, Value::Long(now_millis()));
            reply(conn, MessageType::Ping.code(), msg.operation, &params);
        }
        MessageType::Ack => {
            // The connection consumes ACKs before dispatch.
            tracing::debug!(%conn_id, "stray ACK reached dispatcher, ignoring");
        }
        MessageType::Fragment => {
            tracing::debug!(%conn_id, "FRAGMENT is reserved, dropping");
        }
    }

    false
}

async fn is_authenticated(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) -> bool {
    state
        .sessions
        .lock()
        .await
        .get(conn_id)
        .is_some_and(|s| s.authenticated)
}

/// Forwards the sender's bytes to its current room, excluding the
/// sender. With `require_room`, a roomless sender is logged and
/// dropped; without it, the frame is silently discarded when there is
/// no room to relay into.
async fn relay_to_room(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    raw: &[u8],
    require_room: bool,
) {
    let rooms = state.rooms.lock().await;
    match rooms.room_of(conn_id) {
        Some(room_id) => {
            let _ = rooms.broadcast(room_id, raw, Some(conn_id));
        }
        None if require_room => {
            tracing::debug!(%conn_id, "EVENT from a session with no room, dropping");
        }
        None => {}
    }
}

// ---------------------------------------------------------------------------
// SYSTEM
// ---------------------------------------------------------------------------

/// Handles a SYSTEM frame. Returns `true` on DISCONNECT.
async fn handle_system(
    state: &Arc<ServerState>,
    conn: &Connection,
    msg: &Message,
) -> bool {
    let conn_id = conn.id();

    match msg.operation {
        op::system::CONNECT => {
            let token = state.tokens.lock().await.issue(conn_id);
            let params = Params::new()
                .with(
                    param::PLAYER_ID,
                    Value::Long(conn_id.into_inner() as i64),
                )
                .with(param::TIMESTAMP, Value::Long(now_millis()))
                .with(param::PROPERTIES, Value::Str(token));
            reply(conn, MessageType::System.code(), op::system::AUTH, &params);
        }

        op::system::AUTH => {
            handle_auth(state, conn, msg).await;
        }

        op::system::HEARTBEAT => {
            let params =
                Params::new().with(param::TIMESTAMP, Value::Long(now_millis()));
            reply(
                conn,
                MessageType::System.code(),
                op::system::HEARTBEAT,
                &params,
            );
        }

        op::system::DISCONNECT => {
            tracing::info!(%conn_id, "client requested disconnect");
            return true;
        }

        other => {
            // Catch-all for opcodes this version doesn't know.
            tracing::debug!(
                %conn_id,
                operation = other,
                "unhandled SYSTEM operation"
            );
        }
    }

    false
}

/// Verifies the token from CONNECT and upgrades the session.
///
/// On success the session adopts the claimed PLAYER_ID (or falls back
/// to its connection id) and the reply carries `PROPERTIES = true`. On
/// any failure the reply carries `PROPERTIES = false` and the session
/// stays unauthenticated.
async fn handle_auth(
    state: &Arc<ServerState>,
    conn: &Connection,
    msg: &Message,
) {
    let conn_id = conn.id();

    let token_ok = match msg.params.get_str(param::PROPERTIES) {
        Some(token) => state.tokens.lock().await.consume(token, conn_id),
        None => false,
    };

    if !token_ok {
        tracing::warn!(%conn_id, "AUTH rejected: bad or missing token");
        let params = Params::new()
            .with(param::TIMESTAMP, Value::Long(now_millis()))
            .with(param::PROPERTIES, Value::Bool(false));
        reply(conn, MessageType::System.code(), op::system::AUTH, &params);
        return;
    }

    let player_id = msg
        .params
        .get_i64(param::PLAYER_ID)
        .unwrap_or(conn_id.into_inner() as i64);

    if let Err(e) = state
        .sessions
        .lock()
        .await
        .set_authenticated(conn_id, player_id)
    {
        // Session vanished mid-handshake (disconnect race).
        tracing::debug!(%conn_id, error = %e, "AUTH raced session teardown");
        return;
    }

    tracing::info!(%conn_id, player_id, "session authenticated");
    let params = Params::new()
        .with(param::PLAYER_ID, Value::Long(player_id))
        .with(param::TIMESTAMP, Value::Long(now_millis()))
        .with(param::PROPERTIES, Value::Bool(true));
    reply(conn, MessageType::System.code(), op::system::AUTH, &params);
}

// ---------------------------------------------------------------------------
// ROOM
// ---------------------------------------------------------------------------

/// Delegates a ROOM frame to the room manager by opcode.
async fn handle_room(
    state: &Arc<ServerState>,
    conn: &Connection,
    msg: &Message,
) {
    let conn_id = conn.id();

    match msg.operation {
        op::room::CREATE => {
            let Some(room_id) = msg.params.get_str(param::ROOM_ID) else {
                room_status(conn, op::room::CREATE, None, false);
                return;
            };
            let Some((player_id, sink)) = session_identity(state, conn_id).await
            else {
                return;
            };

            let result = state
                .rooms
                .lock()
                .await
                .create(room_id, conn_id, player_id, sink);

            match result {
                Ok(()) => {
                    set_session_room(state, conn_id, Some(room_id)).await;
                    room_status(conn, op::room::CREATE, Some(room_id), true);
                }
                Err(e) => {
                    tracing::debug!(%conn_id, room_id, error = %e, "create failed");
                    room_status(conn, op::room::CREATE, Some(room_id), false);
                }
            }
        }

        op::room::JOIN => {
            let Some(room_id) = msg.params.get_str(param::ROOM_ID) else {
                room_status(conn, op::room::JOIN, None, false);
                return;
            };
            let Some((player_id, sink)) = session_identity(state, conn_id).await
            else {
                return;
            };

            let result = state
                .rooms
                .lock()
                .await
                .join(room_id, conn_id, player_id, sink);

            match result {
                Ok(()) => {
                    set_session_room(state, conn_id, Some(room_id)).await;
                    room_status(conn, op::room::JOIN, Some(room_id), true);
                }
                Err(e) => {
                    tracing::debug!(%conn_id, room_id, error = %e, "join failed");
                    room_status(conn, op::room::JOIN, Some(room_id), false);
                }
            }
        }

        op::room::LEAVE => {
            let result = state.rooms.lock().await.leave(conn_id);
            match result {
                Ok(room_id) => {
                    set_session_room(state, conn_id, None).await;
                    room_status(
                        conn,
                        op::room::LEAVE,
                        Some(room_id.as_str()),
                        true,
                    );
                }
                Err(RoomError::NotInRoom(_)) => {
                    room_status(conn, op::room::LEAVE, None, false);
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "leave failed");
                    room_status(conn, op::room::LEAVE, None, false);
                }
            }
        }

        op::room::LIST => {
            let ids = state.rooms.lock().await.list();
            // Room listings travel as a BYTE_ARRAY of UTF-8 JSON.
            match serde_json::to_vec(&ids) {
                Ok(json) => {
                    let params = Params::new()
                        .with(param::TIMESTAMP, Value::Long(now_millis()))
                        .with(param::PROPERTIES, Value::Bytes(json));
                    reply(
                        conn,
                        MessageType::Room.code(),
                        op::room::LIST,
                        &params,
                    );
                }
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "room list serialization failed");
                }
            }
        }

        op::room::PROPERTIES => {
            let Some(room_id) =
                msg.params.get_str(param::ROOM_ID).map(str::to_string)
            else {
                room_status(conn, op::room::PROPERTIES, None, false);
                return;
            };

            // Only string-keyed pairs are meaningful as property names.
            let updates: Vec<(String, Value)> = msg
                .params
                .get(param::PROPERTIES)
                .and_then(Value::as_dict)
                .map(|pairs| {
                    pairs
                        .iter()
                        .filter_map(|(k, v)| {
                            k.as_str().map(|k| (k.to_string(), v.clone()))
                        })
                        .collect()
                })
                .unwrap_or_default();

            let result =
                state.rooms.lock().await.set_properties(&room_id, updates);

            if let Err(e) = result {
                tracing::debug!(%conn_id, %room_id, error = %e, "set properties failed");
                room_status(
                    conn,
                    op::room::PROPERTIES,
                    Some(room_id.as_str()),
                    false,
                );
            }
            // On success the manager's PROPERTIES broadcast reaches the
            // requester along with everyone else; no extra reply.
        }

        other => {
            tracing::debug!(
                %conn_id,
                operation = other,
                "unhandled ROOM operation"
            );
        }
    }
}

/// Clones the identity bits a room operation needs from the session.
async fn session_identity(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
) -> Option<(i64, archive_transport::FrameSink)> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(conn_id)?;
    Some((session.effective_player_id(), session.sink.clone()))
}

/// Records the session's current room after a successful room op.
async fn set_session_room(
    state: &Arc<ServerState>,
    conn_id: ConnectionId,
    room_id: Option<&str>,
) {
    let _ = state
        .sessions
        .lock()
        .await
        .set_room(conn_id, room_id.map(str::to_string));
}

/// Replies to a room request with its outcome: the request opcode,
/// the room id where known, and PROPERTIES carrying the success flag.
fn room_status(
    conn: &Connection,
    operation: u8,
    room_id: Option<&str>,
    success: bool,
) {
    let mut params = Params::new();
    if let Some(room_id) = room_id {
        params.insert(param::ROOM_ID, Value::Str(room_id.to_string()));
    }
    params.insert(param::TIMESTAMP, Value::Long(now_millis()));
    params.insert(param::PROPERTIES, Value::Bool(success));
    reply(conn, MessageType::Room.code(), operation, &params);
}
