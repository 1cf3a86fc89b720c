use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::StreamError;
use crate::frames::StreamStatus;

/// Events a stream delivers to its associated request operation.
#[derive(Debug)]
pub enum StreamEvent {
    /// SYN_REPLY arrived; header pairs follow as `Header` events.
    Reply { fin: bool },
    /// One decoded header pair, from the reply block or a HEADERS frame.
    Header { name: Vec<u8>, value: Vec<u8> },
    /// One DATA payload.
    Data { payload: Bytes, fin: bool },
    /// Terminal event, delivered exactly once.
    Closed(Result<(), StreamError>),
}

/// Life cycle: IDLE until `open` assigns an id and windows, OPEN while both
/// directions live, half-closed per direction, CLOSED once both are. A
/// closed or reset stream is removed from the session's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

pub struct Stream {
    id: u32,
    local: bool,
    priority: u8,
    associated_stream_id: u32,
    send_window: i32,
    receive_window: i32,
    half_closed_local: bool,
    half_closed_remote: bool,
    received_reply: bool,
    /// Decoded header bytes so far, capped by `max_header_size`.
    header_bytes: usize,
    max_header_size: usize,
    /// Outbound body not yet written to the wire.
    pending: Bytes,
    /// FLAG_FIN still owed to the peer once `pending` drains.
    fin_pending: bool,
    events: mpsc::UnboundedSender<StreamEvent>,
    closed_delivered: bool,
    /// Ticket of the queued request operation this stream answers; zero for
    /// pushed streams.
    op_id: u64,
}

impl Stream {
    /// A locally-initiated stream. Idle until `open` assigns its id.
    pub fn new_local(
        priority: u8,
        body: Bytes,
        fin: bool,
        max_header_size: usize,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Self {
        Self {
            id: 0,
            local: true,
            priority,
            associated_stream_id: 0,
            send_window: 0,
            receive_window: 0,
            half_closed_local: false,
            half_closed_remote: false,
            received_reply: false,
            header_bytes: 0,
            max_header_size,
            pending: body,
            fin_pending: fin,
            events,
            closed_delivered: false,
            op_id: 0,
        }
    }

    /// A server-pushed stream. Unidirectional pushes begin half-closed on
    /// our side.
    pub fn new_remote(
        priority: u8,
        associated_stream_id: u32,
        unidirectional: bool,
        max_header_size: usize,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Self {
        Self {
            id: 0,
            local: false,
            priority,
            associated_stream_id,
            send_window: 0,
            receive_window: 0,
            half_closed_local: unidirectional,
            half_closed_remote: false,
            received_reply: false,
            header_bytes: 0,
            max_header_size,
            pending: Bytes::new(),
            fin_pending: false,
            events,
            closed_delivered: false,
            op_id: 0,
        }
    }

    /// IDLE → OPEN: assigns the id and seeds both windows from the
    /// session's current initial values.
    pub fn open(&mut self, id: u32, initial_send_window: i32, initial_receive_window: i32) {
        self.id = id;
        self.send_window = initial_send_window;
        self.receive_window = initial_receive_window;
        trace!(stream = id, send = initial_send_window, recv = initial_receive_window, "stream open");
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn associated_stream_id(&self) -> u32 {
        self.associated_stream_id
    }

    pub fn set_op_id(&mut self, op_id: u64) {
        self.op_id = op_id;
    }

    pub fn op_id(&self) -> u64 {
        self.op_id
    }

    pub fn state(&self) -> StreamState {
        match (self.id, self.half_closed_local, self.half_closed_remote) {
            (0, _, _) => StreamState::Idle,
            (_, true, true) => StreamState::Closed,
            (_, true, false) => StreamState::HalfClosedLocal,
            (_, false, true) => StreamState::HalfClosedRemote,
            (_, false, false) => StreamState::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == StreamState::Closed
    }

    pub fn is_half_closed_local(&self) -> bool {
        self.half_closed_local
    }

    pub fn is_half_closed_remote(&self) -> bool {
        self.half_closed_remote
    }

    pub fn has_received_reply(&self) -> bool {
        self.received_reply
    }

    pub fn close_locally(&mut self) {
        self.half_closed_local = true;
    }

    pub fn close_remotely(&mut self) {
        self.half_closed_remote = true;
    }

    /// Marks the reply received and delivers it. A second reply is a
    /// STREAM_IN_USE violation.
    pub fn on_reply(&mut self, fin: bool) -> Result<(), StreamStatus> {
        if self.received_reply {
            return Err(StreamStatus::STREAM_IN_USE);
        }
        self.received_reply = true;
        self.deliver(StreamEvent::Reply { fin });
        Ok(())
    }

    /// Accumulates one decoded header pair, enforcing the per-stream size
    /// limit.
    pub fn on_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), StreamError> {
        self.header_bytes += name.len() + value.len();
        if self.header_bytes > self.max_header_size {
            return Err(StreamError::HeadersTooLarge(self.max_header_size));
        }
        self.deliver(StreamEvent::Header {
            name: name.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    pub fn on_data(&mut self, payload: Bytes, fin: bool) {
        self.deliver(StreamEvent::Data { payload, fin });
    }

    /// Terminal: notifies the associated operation exactly once.
    pub fn close(&mut self, result: Result<(), StreamError>) {
        self.half_closed_local = true;
        self.half_closed_remote = true;
        if !self.closed_delivered {
            self.closed_delivered = true;
            self.deliver(StreamEvent::Closed(result));
        }
    }

    pub fn get_send_window(&self) -> i32 {
        self.send_window
    }

    pub fn get_receive_window(&self) -> i32 {
        self.receive_window
    }

    pub fn reduce_receive_window(&mut self, n: i32) {
        self.receive_window -= n;
    }

    pub fn increase_receive_window(&mut self, n: i32) {
        self.receive_window += n;
    }

    pub fn increase_send_window(&mut self, n: i32) {
        self.send_window += n;
    }

    pub fn reduce_send_window(&mut self, n: i32) {
        self.send_window -= n;
    }

    /// Applies an INITIAL_WINDOW_SIZE delta; may drive the window negative.
    pub fn adjust_send_window(&mut self, delta: i32) {
        self.send_window = self.send_window.saturating_add(delta);
    }

    pub fn has_pending_data(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn fin_pending(&self) -> bool {
        self.fin_pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Splits off up to `max` bytes of queued body. The final chunk clears
    /// `fin_pending`; the caller owns emitting FLAG_FIN for it.
    pub fn take_chunk(&mut self, max: usize) -> (Bytes, bool) {
        let take = max.min(self.pending.len());
        let chunk = self.pending.split_to(take);
        let last = self.pending.is_empty() && self.fin_pending;
        if last {
            self.fin_pending = false;
        }
        (chunk, last)
    }

    fn deliver(&mut self, event: StreamEvent) {
        // The receiver may be gone (application dropped the handle); that
        // only means nobody is listening anymore.
        let _ = self.events.send(event);
    }
}
