//! Per-connection reliability state machine.
//!
//! Each accepted transport session gets one [`Connection`]: it owns the
//! outbound frame queue, the monotonic sequence counter, and the
//! pending-ack table that drives retransmission.
//!
//! Lifecycle of one reliable send:
//!
//! ```text
//! send ──→ queued to writer ──→ pending entry + timer
//!                                   │
//!            ACK arrives ───────────┤──→ entry erased      (acknowledged)
//!            timer, retries < max ──┤──→ resend, rearm
//!            timer, retries ≥ max ──┴──→ entry erased,
//!                                        TRANSMISSION_FAILED  (failed)
//! ```
//!
//! Timers run as spawned tasks sleeping outside the table lock, so a
//! retransmission can never block the read loop or another send.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use archive_protocol::{
    decode, encode, op, param, MessageType, Message, Params, Value,
};
use archive_transport::{ConnectionId, FrameSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::SendOptions;

// ---------------------------------------------------------------------------
// Error events
// ---------------------------------------------------------------------------

/// Classifies the errors a connection surfaces to its embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A frame failed to decode. Local to that frame.
    ParseError,
    /// The transport failed. Terminal for the connection.
    ConnectionError,
    /// Writing a frame to the transport failed.
    SendError,
    /// Re-sending a tracked frame failed.
    RetransmitError,
    /// A reliable send exhausted its retries without an ACK.
    TransmissionFailed,
}

impl ErrorKind {
    /// The canonical upper-case name, as embedders see it.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ParseError => "PARSE_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::SendError => "SEND_ERROR",
            Self::RetransmitError => "RETRANSMIT_ERROR",
            Self::TransmissionFailed => "TRANSMISSION_FAILED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One error surfaced by a connection.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    /// The sequence number involved, for reliability errors.
    pub sequence: Option<u32>,
}

// ---------------------------------------------------------------------------
// Pending-ack table
// ---------------------------------------------------------------------------

/// Bookkeeping for one in-flight reliable send.
#[derive(Debug)]
struct PendingAck {
    /// The original frame bytes, re-sent verbatim on timeout.
    frame: Vec<u8>,
    /// Retransmissions performed so far.
    retries: u32,
    /// The timer task driving retransmission for this entry.
    timer: JoinHandle<()>,
}

type PendingTable = Arc<Mutex<HashMap<u32, PendingAck>>>;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Reliability state for one transport session.
///
/// Cheap to clone — all state is shared behind `Arc`s, so the handler,
/// the dispatcher, and the cleanup guard can each hold one.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbound: FrameSink,
    errors: mpsc::UnboundedSender<ErrorEvent>,
    pending: PendingTable,
    sequence: Arc<AtomicU32>,
    closed: Arc<AtomicBool>,
    defaults: SendOptions,
}

impl Connection {
    /// Creates the reliability state for a connection whose writer task
    /// drains `outbound`. Returns the receiver for surfaced errors.
    pub fn new(
        id: ConnectionId,
        outbound: FrameSink,
        defaults: SendOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ErrorEvent>) {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            outbound,
            errors: errors_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            sequence: Arc::new(AtomicU32::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            defaults,
        };
        (connection, errors_rx)
    }

    /// This connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the next outbound sequence number: starts at 1, wraps
    /// modulo 2³².
    pub fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Queues a frame for sending with the default retransmission
    /// policy. See [`Connection::send_with`].
    pub fn send(&self, frame: Vec<u8>) {
        self.send_with(frame, self.defaults);
    }

    /// Queues a frame for sending.
    ///
    /// If the frame is a RELIABLE frame carrying a SEQUENCE parameter,
    /// a pending-ack entry is installed and a retransmission timer
    /// started. Sending on a closed connection is a no-op, not an
    /// error.
    pub fn send_with(&self, frame: Vec<u8>, options: SendOptions) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        // Inspect the encoded frame itself — reliability is a property
        // of the bytes on the wire, not of who built them.
        let tracked = match decode(&frame) {
            Ok(msg) if msg.kind() == Some(MessageType::Reliable) => {
                msg.params.get_u32(param::SEQUENCE)
            }
            _ => None,
        };

        let Some(seq) = tracked else {
            let _ = self.outbound.send(frame);
            return;
        };

        if self.outbound.send(frame.clone()).is_err() {
            // Writer task is gone; the connection is tearing down.
            return;
        }

        let timer = tokio::spawn(retransmit_loop(
            self.id,
            seq,
            options,
            Arc::clone(&self.pending),
            self.outbound.clone(),
            self.errors.clone(),
        ));

        if let Ok(mut table) = self.pending.lock() {
            table.insert(
                seq,
                PendingAck {
                    frame,
                    retries: 0,
                    timer,
                },
            );
        }
    }

    /// Resolves the pending-ack entry for `sequence`: cancels its timer
    /// and erases the entry. Unknown sequences are ignored.
    pub fn handle_ack(&self, sequence: u32) {
        let entry = match self.pending.lock() {
            Ok(mut table) => table.remove(&sequence),
            Err(_) => None,
        };
        if let Some(entry) = entry {
            entry.timer.abort();
            tracing::trace!(conn_id = %self.id, sequence, "reliable send acknowledged");
        }
    }

    /// Processes one inbound frame.
    ///
    /// Decode failures surface a PARSE_ERROR and yield `None` — the
    /// connection continues. ACK frames are consumed here. RELIABLE
    /// frames carrying a SEQUENCE are answered with an ACK through the
    /// writer queue (never blocking the read loop). Everything non-ACK
    /// is returned for dispatch.
    pub fn process_inbound(&self, bytes: &[u8]) -> Option<Message> {
        let msg = match decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(conn_id = %self.id, error = %e, "frame failed to decode");
                self.report(ErrorKind::ParseError, e.to_string(), None);
                return None;
            }
        };

        match msg.kind() {
            Some(MessageType::Ack) => {
                if let Some(seq) = msg.params.get_u32(param::SEQUENCE) {
                    self.handle_ack(seq);
                }
                None
            }
            Some(MessageType::Reliable) => {
                if let Some(seq) = msg.params.get_u32(param::SEQUENCE) {
                    self.send_ack(seq);
                }
                Some(msg)
            }
            _ => Some(msg),
        }
    }

    /// Emits an ACK for an inbound reliable frame.
    fn send_ack(&self, sequence: u32) {
        let params =
            Params::new().with(param::SEQUENCE, Value::UInt(sequence));
        match encode(MessageType::Ack.code(), op::ack::ACK, &params) {
            Ok(frame) => {
                let _ = self.outbound.send(frame);
            }
            Err(e) => {
                tracing::error!(conn_id = %self.id, error = %e, "failed to encode ACK");
            }
        }
    }

    /// A sender for surfacing error events from outside the
    /// connection (the writer task).
    pub(crate) fn errors_sender(&self) -> mpsc::UnboundedSender<ErrorEvent> {
        self.errors.clone()
    }

    /// Surfaces an error event to the embedder.
    pub(crate) fn report(
        &self,
        kind: ErrorKind,
        message: String,
        sequence: Option<u32>,
    ) {
        let _ = self.errors.send(ErrorEvent {
            kind,
            message,
            sequence,
        });
    }

    /// Closes the connection: cancels every retransmission timer and
    /// drains the pending-ack table without firing callbacks. Idempotent;
    /// later sends become no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut table) = self.pending.lock() {
            for (_, entry) in table.drain() {
                entry.timer.abort();
            }
        }
        tracing::debug!(conn_id = %self.id, "connection closed");
    }

    /// Whether [`Connection::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of reliable sends currently awaiting an ACK.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|t| t.len()).unwrap_or(0)
    }
}

/// Timer task for one pending-ack entry.
///
/// Re-reads the table on every fire so an ACK landing between fires
/// ends the loop; the terminal transitions (acknowledged / failed) both
/// remove the entry.
async fn retransmit_loop(
    conn_id: ConnectionId,
    seq: u32,
    options: SendOptions,
    pending: PendingTable,
    outbound: FrameSink,
    errors: mpsc::UnboundedSender<ErrorEvent>,
) {
    loop {
        tokio::time::sleep(options.timeout).await;

        let frame = {
            let Ok(mut table) = pending.lock() else { return };
            match table.get_mut(&seq) {
                // Entry gone: acknowledged concurrently.
                None => return,
                Some(entry) if entry.retries < options.max_retries => {
                    entry.retries += 1;
                    tracing::debug!(
                        %conn_id,
                        sequence = seq,
                        retry = entry.retries,
                        "retransmitting reliable frame"
                    );
                    entry.frame.clone()
                }
                Some(_) => {
                    table.remove(&seq);
                    tracing::warn!(
                        %conn_id,
                        sequence = seq,
                        "reliable send failed after max retries"
                    );
                    let _ = errors.send(ErrorEvent {
                        kind: ErrorKind::TransmissionFailed,
                        message: format!(
                            "no ACK for sequence {seq} after {} retries",
                            options.max_retries
                        ),
                        sequence: Some(seq),
                    });
                    return;
                }
            }
        };

        if outbound.send(frame).is_err() {
            // Writer task is gone; drop the entry quietly.
            if let Ok(mut table) = pending.lock() {
                table.remove(&seq);
            }
            let _ = errors.send(ErrorEvent {
                kind: ErrorKind::RetransmitError,
                message: format!("writer gone while retransmitting {seq}"),
                sequence: Some(seq),
            });
            return;
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    // -- Helpers ----------------------------------------------------------

    fn fast_options() -> SendOptions {
        SendOptions {
            timeout: Duration::from_millis(50),
            max_retries: 2,
        }
    }

    fn connection() -> (
        Connection,
        UnboundedReceiver<Vec<u8>>,
        UnboundedReceiver<ErrorEvent>,
    ) {
        let (sink, outbound_rx) = mpsc::unbounded_channel();
        let (conn, errors_rx) =
            Connection::new(ConnectionId::new(1), sink, fast_options());
        (conn, outbound_rx, errors_rx)
    }

    /// A RELIABLE frame carrying the given sequence number.
    fn reliable_frame(seq: u32) -> Vec<u8> {
        let params = Params::new()
            .with(param::SEQUENCE, Value::UInt(seq))
            .with(param::ACTION, Value::Str("fire".into()));
        encode(MessageType::Reliable.code(), 0x01, &params).unwrap()
    }

    fn drain(rx: &mut UnboundedReceiver<Vec<u8>>) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    // =====================================================================
    // next_sequence()
    // =====================================================================

    #[tokio::test]
    async fn test_next_sequence_starts_at_one_and_increments() {
        let (conn, _out, _err) = connection();
        assert_eq!(conn.next_sequence(), 1);
        assert_eq!(conn.next_sequence(), 2);
        assert_eq!(conn.next_sequence(), 3);
    }

    #[tokio::test]
    async fn test_next_sequence_wraps_modulo_u32() {
        let (conn, _out, _err) = connection();
        conn.sequence.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(conn.next_sequence(), 0);
        assert_eq!(conn.next_sequence(), 1);
    }

    // =====================================================================
    // send() tracking
    // =====================================================================

    #[tokio::test]
    async fn test_send_reliable_frame_installs_pending_entry() {
        let (conn, mut out, _err) = connection();
        let frame = reliable_frame(7);

        conn.send(frame.clone());

        assert_eq!(conn.pending_count(), 1);
        assert_eq!(drain(&mut out), vec![frame]);
    }

    #[tokio::test]
    async fn test_send_unreliable_frame_is_not_tracked() {
        let (conn, mut out, _err) = connection();
        let params = Params::new().with(param::ACTION, Value::Str("x".into()));
        let frame =
            encode(MessageType::Unreliable.code(), 0x01, &params).unwrap();

        conn.send(frame);

        assert_eq!(conn.pending_count(), 0);
        assert_eq!(drain(&mut out).len(), 1);
    }

    #[tokio::test]
    async fn test_send_reliable_without_sequence_is_not_tracked() {
        let (conn, mut out, _err) = connection();
        let params = Params::new().with(param::ACTION, Value::Str("x".into()));
        let frame =
            encode(MessageType::Reliable.code(), 0x01, &params).unwrap();

        conn.send(frame);

        assert_eq!(conn.pending_count(), 0);
        assert_eq!(drain(&mut out).len(), 1);
    }

    // =====================================================================
    // ACK liveness
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_ack_before_timeout_cancels_retransmission() {
        let (conn, mut out, _err) = connection();
        conn.send(reliable_frame(7));
        drain(&mut out);

        conn.handle_ack(7);
        assert_eq!(conn.pending_count(), 0);

        // Well past several timeout windows: nothing is re-sent.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(drain(&mut out).is_empty());
    }

    #[tokio::test]
    async fn test_handle_ack_unknown_sequence_is_ignored() {
        let (conn, _out, _err) = connection();
        conn.handle_ack(999); // no panic, no effect
        assert_eq!(conn.pending_count(), 0);
    }

    // =====================================================================
    // Retry bound
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_unacked_send_transmits_one_plus_max_retries_times() {
        let (conn, mut out, mut err) = connection();
        let frame = reliable_frame(7);

        conn.send(frame.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;

        // timeout=50ms, max_retries=2: initial + 2 retries, identical bytes.
        let sent = drain(&mut out);
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|f| *f == frame));

        // The terminal failure carries the sequence number.
        let event = err.try_recv().expect("should surface failure");
        assert_eq!(event.kind, ErrorKind::TransmissionFailed);
        assert_eq!(event.sequence, Some(7));
        assert_eq!(conn.pending_count(), 0);
    }

    // =====================================================================
    // close()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_timers_and_drains_pending() {
        let (conn, mut out, mut err) = connection();
        conn.send(reliable_frame(1));
        conn.send(reliable_frame(2));
        drain(&mut out);

        conn.close();

        assert!(conn.is_closed());
        assert_eq!(conn.pending_count(), 0);
        // No retransmissions and no failure events after close.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(drain(&mut out).is_empty());
        assert!(err.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_send_becomes_noop() {
        let (conn, mut out, _err) = connection();
        conn.close();
        conn.close();

        conn.send(reliable_frame(5));
        assert!(drain(&mut out).is_empty());
        assert_eq!(conn.pending_count(), 0);
    }

    // =====================================================================
    // process_inbound()
    // =====================================================================

    #[tokio::test]
    async fn test_process_inbound_parse_error_surfaces_and_continues() {
        let (conn, _out, mut err) = connection();

        let result = conn.process_inbound(&[0x01, 0x02]);

        assert!(result.is_none());
        let event = err.try_recv().expect("should surface parse error");
        assert_eq!(event.kind, ErrorKind::ParseError);
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn test_process_inbound_ack_resolves_pending_and_is_consumed() {
        let (conn, mut out, _err) = connection();
        conn.send(reliable_frame(7));
        drain(&mut out);

        let ack = encode(
            MessageType::Ack.code(),
            op::ack::ACK,
            &Params::new().with(param::SEQUENCE, Value::UInt(7)),
        )
        .unwrap();
        let result = conn.process_inbound(&ack);

        // ACKs never reach the dispatcher.
        assert!(result.is_none());
        assert_eq!(conn.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_process_inbound_reliable_frame_is_acked() {
        let (conn, mut out, _err) = connection();

        let inbound = reliable_frame(42);
        let result = conn.process_inbound(&inbound);

        // The frame is returned for dispatch...
        let msg = result.expect("should be dispatched");
        assert_eq!(msg.kind(), Some(MessageType::Reliable));

        // ...and an ACK for its sequence was queued.
        let sent = drain(&mut out);
        assert_eq!(sent.len(), 1);
        let ack = decode(&sent[0]).unwrap();
        assert_eq!(ack.kind(), Some(MessageType::Ack));
        assert_eq!(ack.operation, op::ack::ACK);
        assert_eq!(ack.params.get_u32(param::SEQUENCE), Some(42));
    }

    #[tokio::test]
    async fn test_process_inbound_reliable_without_sequence_not_acked() {
        let (conn, mut out, _err) = connection();
        let params = Params::new().with(param::ACTION, Value::Str("x".into()));
        let frame =
            encode(MessageType::Reliable.code(), 0x01, &params).unwrap();

        let result = conn.process_inbound(&frame);

        assert!(result.is_some());
        assert!(drain(&mut out).is_empty());
    }

    #[tokio::test]
    async fn test_process_inbound_other_types_pass_through() {
        let (conn, mut out, _err) = connection();
        let frame = encode(
            MessageType::Ping.code(),
            op::ping::PING,
            &Params::new(),
        )
        .unwrap();

        let msg = conn.process_inbound(&frame).expect("should pass through");
        assert_eq!(msg.kind(), Some(MessageType::Ping));
        assert!(drain(&mut out).is_empty());
    }
}
