//! The session state machine. One `Session` multiplexes every stream of a
//! single SPDY/3.1 connection: it consumes decoded frame events (it is the
//! decoder's [`FrameSink`]), applies session- and stream-level flow control,
//! and queues encoded outbound frames for the driver to write.
//!
//! Everything here is synchronous. The driver in [`crate::connection`] runs
//! the session on one task, so no field needs a lock; the cross-thread
//! surfaces are the command channel feeding [`Session::queue`] and the
//! injected settings store.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::codec::{Encoder, FrameSink, SkipReason};
use crate::encode;
use crate::error::{SessionError, StreamError};
use crate::flags::{DataFlags, SettingEntryFlags, SynStreamFlags};
use crate::frames::{
    DEFAULT_INITIAL_WINDOW, GoAwayStatus, MAX_DATA_CHUNK, SESSION_STREAM_ID, Setting, SettingId,
    StreamStatus,
};
use crate::settings::{Origin, SettingsStore};
use crate::stream::{Stream, StreamEvent};
use crate::table::StreamTable;

/// Remote concurrency cap assumed until the peer's first SETTINGS.
const DEFAULT_REMOTE_MAX_CONCURRENT: u32 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    /// Session-level receive window this endpoint maintains. Values above
    /// the protocol default are advertised with a startup WINDOW_UPDATE.
    pub session_receive_window: i32,
    /// Per-stream receive window, advertised as INITIAL_WINDOW_SIZE.
    pub stream_receive_window: i32,
    /// Cap on streams the peer may push at us.
    pub max_concurrent_streams: u32,
    /// Cap on decoded header bytes per stream.
    pub max_header_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_receive_window: DEFAULT_INITIAL_WINDOW,
            stream_receive_window: DEFAULT_INITIAL_WINDOW,
            max_concurrent_streams: 100,
            max_header_size: 32 * 1024,
        }
    }
}

impl Config {
    /// Hard cap on one decompressed header block. The per-stream limit is
    /// enforced pair by pair; this only bounds decompressor memory, so it
    /// leaves room for length prefixes and the pair that trips the limit.
    pub(crate) fn max_header_block_size(&self) -> usize {
        2 * self.max_header_size + 1024
    }
}

/// One application request: a header list, an optional body, a priority.
/// The stream closes locally once the body (if any) is fully written.
#[derive(Debug, Clone)]
pub struct Request {
    pub headers: Vec<(Vec<u8>, Vec<u8>)>,
    pub body: Bytes,
    pub priority: u8,
}

impl Request {
    pub fn new(headers: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            headers,
            body: Bytes::new(),
            priority: 0,
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// A stream the server pushed at us, handed to the application through the
/// session's push channel.
#[derive(Debug)]
pub struct PushedStream {
    pub stream_id: u32,
    pub associated_stream_id: u32,
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
}

struct PendingRequest {
    op_id: u64,
    request: Request,
    events: mpsc::UnboundedSender<StreamEvent>,
}

pub struct Session {
    origin: Origin,
    config: Config,
    store: Arc<SettingsStore>,

    table: StreamTable,
    /// Next locally-issued stream id; odd, strictly increasing.
    next_stream_id: u32,
    /// Next ping id we originate; odd, strictly increasing.
    next_ping_id: u32,
    /// Highest remotely-issued stream id accepted so far.
    last_good_remote_id: u32,

    send_window: i32,
    receive_window: i32,
    /// Peer's INITIAL_WINDOW_SIZE, seeding new streams' send windows.
    initial_send_window: i32,
    remote_max_concurrent: u32,

    sent_pings: HashMap<u32, Instant>,
    latency: Option<Duration>,

    received_goaway: bool,
    sent_goaway: bool,
    /// True once any reply has been received on this session.
    active: bool,
    /// Set exactly once; the session is dead from then on.
    terminal: Option<Result<(), SessionError>>,

    encoder: Encoder,
    outbound: VecDeque<Bytes>,
    pending: VecDeque<PendingRequest>,
    /// Request ticket → assigned stream id, for cancellation.
    op_map: HashMap<u64, u32>,
    push_tx: mpsc::UnboundedSender<PushedStream>,
}

impl Session {
    pub fn new(
        origin: Origin,
        config: Config,
        store: Arc<SettingsStore>,
        push_tx: mpsc::UnboundedSender<PushedStream>,
    ) -> Self {
        let receive_window = config.session_receive_window;
        Self {
            origin,
            config,
            store,
            table: StreamTable::new(),
            next_stream_id: 1,
            next_ping_id: 1,
            last_good_remote_id: 0,
            send_window: DEFAULT_INITIAL_WINDOW,
            receive_window,
            initial_send_window: DEFAULT_INITIAL_WINDOW,
            remote_max_concurrent: DEFAULT_REMOTE_MAX_CONCURRENT,
            sent_pings: HashMap::new(),
            latency: None,
            received_goaway: false,
            sent_goaway: false,
            active: false,
            terminal: None,
            encoder: Encoder::new(),
            outbound: VecDeque::new(),
            pending: VecDeque::new(),
            op_map: HashMap::new(),
            push_tx,
        }
    }

    /// Queues the startup sequence: SETTINGS advertising our windows and
    /// concurrency cap, a liveness PING, and a WINDOW_UPDATE crediting the
    /// peer up to the configured session window.
    pub fn start(&mut self) {
        let entries = [
            Setting {
                id: SettingId::INITIAL_WINDOW_SIZE,
                value: self.config.stream_receive_window as u32,
                flags: SettingEntryFlags::empty(),
            },
            Setting {
                id: SettingId::MAX_CONCURRENT_STREAMS,
                value: self.config.max_concurrent_streams,
                flags: SettingEntryFlags::empty(),
            },
        ];
        self.outbound
            .push_back(encode::settings(Default::default(), &entries));

        let ping_id = self.next_ping_id;
        self.next_ping_id += 2;
        self.sent_pings.insert(ping_id, Instant::now());
        self.outbound.push_back(encode::ping(ping_id));

        let delta = self.config.session_receive_window - DEFAULT_INITIAL_WINDOW;
        if delta > 0 {
            self.outbound
                .push_back(encode::window_update(SESSION_STREAM_ID, delta as u32));
        }
        debug!(origin = %self.origin, "session started");
    }

    // ---- handle-facing operations (arriving over the command channel) ----

    /// Queues a request. A stream id is assigned once local concurrency
    /// permits; until then the request waits unassigned.
    pub fn queue(
        &mut self,
        op_id: u64,
        request: Request,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) {
        if let Some(err) = self.refusal() {
            let _ = events.send(StreamEvent::Closed(Err(StreamError::Session(err))));
            return;
        }
        self.pending.push_back(PendingRequest {
            op_id,
            request,
            events,
        });
        self.pump_pending();
    }

    /// Cancels a queued request: drops it if unassigned, resets the stream
    /// with CANCEL if it is on the wire.
    pub fn cancel(&mut self, op_id: u64) {
        if let Some(pos) = self.pending.iter().position(|p| p.op_id == op_id) {
            let pending = self.pending.remove(pos).unwrap();
            let _ = pending.events.send(StreamEvent::Closed(Err(StreamError::Rst(
                StreamStatus::CANCEL,
            ))));
            return;
        }
        if let Some(&stream_id) = self.op_map.get(&op_id) {
            self.reset_stream(stream_id, StreamStatus::CANCEL);
        }
    }

    /// Originates a liveness ping.
    pub fn ping(&mut self) {
        if self.terminal.is_some() {
            return;
        }
        let ping_id = self.next_ping_id;
        self.next_ping_id += 2;
        self.sent_pings.insert(ping_id, Instant::now());
        self.outbound.push_back(encode::ping(ping_id));
    }

    /// Graceful session-wide close: every active stream ends with a session
    /// exception, GOAWAY goes on the wire, and the driver drains outbound
    /// before closing the transport.
    pub fn close(&mut self, status: GoAwayStatus) {
        if self.terminal.is_some() {
            return;
        }
        let result = if status == GoAwayStatus::OK {
            Ok(())
        } else {
            Err(SessionError::GoAway(status))
        };
        for id in self.table.ids() {
            self.remove_stream(id, Err(StreamError::Session(SessionError::Closed)));
        }
        self.fail_pending(SessionError::Closed);
        self.outbound
            .push_back(encode::go_away(self.last_good_remote_id, status));
        self.sent_goaway = true;
        self.terminal = Some(result);
    }

    // ---- driver-facing state ----

    pub fn take_outbound(&mut self) -> Option<Bytes> {
        self.outbound.pop_front()
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn terminal(&self) -> Option<&Result<(), SessionError>> {
        self.terminal.as_ref()
    }

    pub fn received_goaway(&self) -> bool {
        self.received_goaway
    }

    pub fn sent_goaway(&self) -> bool {
        self.sent_goaway
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Streams the peer would still let us open.
    pub fn capacity(&self) -> u32 {
        self.remote_max_concurrent
            .saturating_sub(self.table.local_size() as u32)
    }

    /// Transport failed or ended: every stream dies with the cause, nothing
    /// more goes on the wire.
    pub fn fail(&mut self, err: SessionError) {
        if self.terminal.is_some() {
            return;
        }
        warn!(origin = %self.origin, error = %err, "session failed");
        for id in self.table.ids() {
            self.remove_stream(id, Err(StreamError::Session(err.clone())));
        }
        self.fail_pending(err.clone());
        self.outbound.clear();
        self.terminal = Some(Err(err));
    }

    /// Session-fatal error surfaced outside the frame handlers (decoder
    /// failures in the driver).
    pub fn fatal_error(&mut self, err: SessionError) {
        self.fatal(err);
    }

    /// Orderly end of stream from the peer. Clean only once GOAWAY has been
    /// exchanged and every stream is done.
    pub fn on_transport_eof(&mut self) {
        if self.terminal.is_some() {
            return;
        }
        if (self.received_goaway || self.sent_goaway) && self.table.size() == 0 {
            self.fail_pending(SessionError::Closed);
            self.terminal = Some(Ok(()));
        } else {
            self.fail(SessionError::Transport("unexpected end of stream".into()));
        }
    }

    // ---- internals ----

    fn refusal(&self) -> Option<SessionError> {
        if let Some(terminal) = &self.terminal {
            return Some(match terminal {
                Ok(()) => SessionError::Closed,
                Err(err) => err.clone(),
            });
        }
        if self.received_goaway {
            return Some(SessionError::GoAway(GoAwayStatus::OK));
        }
        None
    }

    /// Session-fatal error: GOAWAY with the status, every stream and
    /// pending request terminated, transport closed by the driver.
    fn fatal(&mut self, err: SessionError) {
        if self.terminal.is_some() {
            return;
        }
        warn!(origin = %self.origin, error = %err, "session-fatal error");
        self.outbound
            .push_back(encode::go_away(self.last_good_remote_id, err.goaway_status()));
        self.sent_goaway = true;
        for id in self.table.ids() {
            self.remove_stream(id, Err(StreamError::Session(err.clone())));
        }
        self.fail_pending(err.clone());
        self.terminal = Some(Err(err));
    }

    fn fail_pending(&mut self, err: SessionError) {
        for pending in self.pending.drain(..) {
            let _ = pending
                .events
                .send(StreamEvent::Closed(Err(StreamError::Session(err.clone()))));
        }
    }

    /// RST for a stream we do not track; nothing to clean up.
    fn send_rst(&mut self, stream_id: u32, status: StreamStatus) {
        trace!(stream = stream_id, ?status, "rst (untracked stream)");
        self.outbound.push_back(encode::rst_stream(stream_id, status));
    }

    /// Stream-local failure: RST on the wire, stream out of the table, the
    /// operation terminated with the status.
    fn reset_stream(&mut self, stream_id: u32, status: StreamStatus) {
        self.outbound.push_back(encode::rst_stream(stream_id, status));
        self.remove_stream(stream_id, Err(StreamError::Rst(status)));
    }

    fn remove_stream(&mut self, stream_id: u32, result: Result<(), StreamError>) {
        if let Some(mut stream) = self.table.remove(stream_id) {
            if stream.op_id() != 0 {
                self.op_map.remove(&stream.op_id());
            }
            stream.close(result);
        }
    }

    /// Assigns stream ids to queued requests while the peer's concurrency
    /// cap leaves room, writing SYN_STREAM (and body data) for each.
    fn pump_pending(&mut self) {
        while self.terminal.is_none()
            && !self.received_goaway
            && !self.pending.is_empty()
            && (self.table.local_size() as u32) < self.remote_max_concurrent
        {
            let PendingRequest {
                op_id,
                request,
                events,
            } = self.pending.pop_front().unwrap();

            let stream_id = self.next_stream_id;
            self.next_stream_id += 2;

            let has_body = !request.body.is_empty();
            let mut flags = SynStreamFlags::empty();
            if !has_body {
                flags |= SynStreamFlags::FIN;
            }

            let header_refs: Vec<(&[u8], &[u8])> = request
                .headers
                .iter()
                .map(|(name, value)| (name.as_slice(), value.as_slice()))
                .collect();
            let frame = match self.encoder.syn_stream(
                stream_id,
                0,
                request.priority,
                flags,
                &header_refs,
            ) {
                Ok(frame) => frame,
                Err(err) => {
                    let _ = events.send(StreamEvent::Closed(Err(StreamError::Session(
                        err.clone(),
                    ))));
                    self.fatal(err);
                    return;
                }
            };

            let mut stream = Stream::new_local(
                request.priority,
                request.body,
                has_body,
                self.config.max_header_size,
                events,
            );
            stream.open(
                stream_id,
                self.initial_send_window,
                self.config.stream_receive_window,
            );
            stream.set_op_id(op_id);
            if !has_body {
                stream.close_locally();
            }

            trace!(stream = stream_id, priority = request.priority, "syn_stream");
            self.outbound.push_back(frame);
            self.op_map.insert(op_id, stream_id);
            self.table.add(stream);

            if has_body {
                self.send_data(stream_id);
            }
        }
    }

    /// Writes as much queued body as both windows allow, chunked to the
    /// frame-size cap. The final chunk carries FLAG_FIN and half-closes the
    /// stream locally.
    fn send_data(&mut self, stream_id: u32) {
        loop {
            let Some(stream) = self.table.get_mut(stream_id) else {
                return;
            };
            if !stream.has_pending_data() {
                return;
            }
            if stream.get_send_window() <= 0 || self.send_window <= 0 {
                return;
            }

            let max = MAX_DATA_CHUNK
                .min(stream.get_send_window() as usize)
                .min(self.send_window as usize);
            let (chunk, last) = stream.take_chunk(max);
            let len = chunk.len() as i32;
            stream.reduce_send_window(len);
            self.send_window -= len;

            let flags = if last { DataFlags::FIN } else { DataFlags::empty() };
            trace!(stream = stream_id, len, last, "data out");
            self.outbound.push_back(encode::data(stream_id, flags, &chunk));

            if last {
                let fully_closed = {
                    let stream = self.table.get_mut(stream_id).unwrap();
                    stream.close_locally();
                    stream.is_closed()
                };
                if fully_closed {
                    self.remove_stream(stream_id, Ok(()));
                }
                return;
            }
        }
    }
}

impl FrameSink for Session {
    fn on_data(&mut self, stream_id: u32, fin: bool, payload: Bytes) {
        if self.terminal.is_some() {
            return;
        }
        let len = payload.len() as i32;

        if len > self.receive_window {
            self.fatal(SessionError::Protocol("session receive window violated"));
            return;
        }

        if !self.table.contains(stream_id) {
            if stream_id < self.last_good_remote_id {
                self.send_rst(stream_id, StreamStatus::PROTOCOL_ERROR);
            } else if !self.sent_goaway {
                self.send_rst(stream_id, StreamStatus::INVALID_STREAM);
            }
            return;
        }

        let (half_closed_remote, awaiting_reply, stream_window) = {
            let stream = self.table.get(stream_id).unwrap();
            (
                stream.is_half_closed_remote(),
                stream.is_local() && !stream.has_received_reply(),
                stream.get_receive_window(),
            )
        };
        if half_closed_remote {
            self.reset_stream(stream_id, StreamStatus::STREAM_ALREADY_CLOSED);
            return;
        }
        if awaiting_reply {
            self.reset_stream(stream_id, StreamStatus::PROTOCOL_ERROR);
            return;
        }
        if len > stream_window {
            self.reset_stream(stream_id, StreamStatus::FLOW_CONTROL_ERROR);
            return;
        }

        self.receive_window -= len;
        if self.receive_window <= self.config.session_receive_window / 2 {
            let delta = self.config.session_receive_window - self.receive_window;
            self.receive_window = self.config.session_receive_window;
            trace!(delta, "session window restore");
            self.outbound
                .push_back(encode::window_update(SESSION_STREAM_ID, delta as u32));
        }

        let stream = self.table.get_mut(stream_id).unwrap();
        stream.reduce_receive_window(len);
        let stream_window = stream.get_receive_window();
        if stream_window <= self.config.stream_receive_window / 2 {
            let delta = self.config.stream_receive_window - stream_window;
            stream.increase_receive_window(delta);
            self.outbound
                .push_back(encode::window_update(stream_id, delta as u32));
        }

        let stream = self.table.get_mut(stream_id).unwrap();
        stream.on_data(payload, fin);
        if fin {
            stream.close_remotely();
            if stream.is_closed() {
                self.remove_stream(stream_id, Ok(()));
            }
        }
        self.pump_pending();
    }

    fn on_syn_stream(
        &mut self,
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        fin: bool,
        unidirectional: bool,
    ) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        if stream_id <= self.last_good_remote_id || stream_id % 2 != 0 {
            self.fatal(SessionError::Protocol("invalid pushed stream id"));
            return false;
        }
        if self.received_goaway
            || self.table.remote_size() as u32 >= self.config.max_concurrent_streams
        {
            self.send_rst(stream_id, StreamStatus::REFUSED_STREAM);
            return false;
        }

        let (events, events_rx) = mpsc::unbounded_channel();
        let mut stream = Stream::new_remote(
            priority,
            associated_stream_id,
            unidirectional,
            self.config.max_header_size,
            events,
        );
        stream.open(
            stream_id,
            self.initial_send_window,
            self.config.stream_receive_window,
        );
        if fin {
            stream.close_remotely();
        }
        self.last_good_remote_id = stream_id;
        debug!(stream = stream_id, associated = associated_stream_id, "push accepted");
        self.table.add(stream);
        // Removal of an already-done push waits for on_headers_end so the
        // header pairs still find the stream in the table.
        let _ = self.push_tx.send(PushedStream {
            stream_id,
            associated_stream_id,
            events: events_rx,
        });
        true
    }

    fn on_syn_reply(&mut self, stream_id: u32, fin: bool) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        if !self.table.contains(stream_id) {
            self.send_rst(stream_id, StreamStatus::INVALID_STREAM);
            return false;
        }
        let result = self.table.get_mut(stream_id).unwrap().on_reply(fin);
        match result {
            Err(status) => {
                self.reset_stream(stream_id, status);
                false
            }
            Ok(()) => {
                self.active = true;
                if fin {
                    // Removal deferred to on_headers_end.
                    self.table.get_mut(stream_id).unwrap().close_remotely();
                }
                true
            }
        }
    }

    fn on_rst_stream(&mut self, stream_id: u32, status: StreamStatus) {
        if self.terminal.is_some() {
            return;
        }
        debug!(stream = stream_id, ?status, "stream reset by peer");
        // Never answer a RST with a RST.
        self.remove_stream(stream_id, Err(StreamError::Rst(status)));
        self.pump_pending();
    }

    fn on_settings(&mut self, clear_persisted: bool) {
        if self.terminal.is_some() {
            return;
        }
        if clear_persisted {
            self.store.clear(&self.origin);
        }
    }

    fn on_setting(&mut self, setting: Setting) {
        if self.terminal.is_some() {
            return;
        }
        if setting.flags.contains(SettingEntryFlags::PERSISTED) {
            self.fatal(SessionError::Protocol("server sent persisted settings bit"));
            return;
        }
        match setting.id {
            SettingId::MAX_CONCURRENT_STREAMS => {
                trace!(value = setting.value, "remote max concurrent streams");
                self.remote_max_concurrent = setting.value;
            }
            SettingId::INITIAL_WINDOW_SIZE => {
                if setting.value > i32::MAX as u32 {
                    self.fatal(SessionError::Protocol("INITIAL_WINDOW_SIZE out of range"));
                    return;
                }
                let delta = setting.value as i32 - self.initial_send_window;
                self.initial_send_window = setting.value as i32;
                let mut drainable = Vec::new();
                for (&id, stream) in self.table.iter_mut() {
                    if stream.is_half_closed_local() {
                        continue;
                    }
                    stream.adjust_send_window(delta);
                    if delta > 0 && stream.has_pending_data() {
                        drainable.push(id);
                    }
                }
                for id in drainable {
                    self.send_data(id);
                }
            }
            _ => {}
        }
        if setting.flags.contains(SettingEntryFlags::PERSIST_VALUE) {
            self.store.persist(&self.origin, &setting);
        }
    }

    fn on_settings_end(&mut self) {
        // A raised concurrency cap may unblock queued requests.
        self.pump_pending();
    }

    fn on_ping(&mut self, id: u32) {
        if self.terminal.is_some() {
            return;
        }
        if id % 2 == 0 {
            // Peer-initiated: echo straight back.
            self.outbound.push_back(encode::ping(id));
            return;
        }
        if let Some(sent_at) = self.sent_pings.remove(&id) {
            let latency = sent_at.elapsed();
            trace!(?latency, "ping echo");
            self.latency = Some(latency);
        }
    }

    fn on_go_away(&mut self, last_good_stream_id: u32, status: GoAwayStatus) {
        if self.terminal.is_some() {
            return;
        }
        debug!(last_good = last_good_stream_id, ?status, "goaway received");
        self.received_goaway = true;
        for id in self.table.ids() {
            let abandoned = self
                .table
                .get(id)
                .map(|s| s.is_local() && id > last_good_stream_id)
                .unwrap_or(false);
            if abandoned {
                self.remove_stream(
                    id,
                    Err(StreamError::Session(SessionError::GoAway(status))),
                );
            }
        }
        self.fail_pending(SessionError::GoAway(status));
    }

    fn on_headers(&mut self, stream_id: u32, fin: bool) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        if !self.table.contains(stream_id) {
            self.send_rst(stream_id, StreamStatus::INVALID_STREAM);
            return false;
        }
        if self.table.get(stream_id).unwrap().is_half_closed_remote() {
            self.reset_stream(stream_id, StreamStatus::INVALID_STREAM);
            return false;
        }
        if fin {
            // Removal deferred to on_headers_end.
            self.table.get_mut(stream_id).unwrap().close_remotely();
        }
        true
    }

    fn on_window_update(&mut self, stream_id: u32, delta: u32) {
        if self.terminal.is_some() {
            return;
        }
        let delta = delta as i32; // 31-bit on the wire

        if stream_id == SESSION_STREAM_ID {
            if self.send_window > i32::MAX - delta {
                self.fatal(SessionError::Protocol("session send window overflow"));
                return;
            }
            self.send_window += delta;
            for id in self.table.ids() {
                if self.send_window <= 0 {
                    break;
                }
                self.send_data(id);
            }
            self.pump_pending();
            return;
        }

        let Some(stream) = self.table.get(stream_id) else {
            return;
        };
        if stream.is_half_closed_local() {
            return;
        }
        if stream.get_send_window() > i32::MAX - delta {
            self.reset_stream(stream_id, StreamStatus::FLOW_CONTROL_ERROR);
            return;
        }
        self.table
            .get_mut(stream_id)
            .unwrap()
            .increase_send_window(delta);
        self.send_data(stream_id);
        self.pump_pending();
    }

    fn on_header(&mut self, stream_id: u32, name: &[u8], value: &[u8]) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        // The decoder only emits header pairs for frames this session
        // admitted, so the stream is present unless it failed mid-block.
        let Some(stream) = self.table.get_mut(stream_id) else {
            return false;
        };
        match stream.on_header(name, value) {
            Ok(()) => true,
            Err(err) => {
                debug!(stream = stream_id, error = %err, "header block rejected");
                self.outbound
                    .push_back(encode::rst_stream(stream_id, StreamStatus::INTERNAL_ERROR));
                self.remove_stream(stream_id, Err(err));
                false
            }
        }
    }

    fn on_headers_end(&mut self, stream_id: u32) {
        let closed = self
            .table
            .get(stream_id)
            .map(Stream::is_closed)
            .unwrap_or(false);
        if closed {
            self.remove_stream(stream_id, Ok(()));
        }
        self.pump_pending();
    }

    fn on_frame_skipped(&mut self, stream_id: u32, reason: SkipReason) {
        if self.terminal.is_some() {
            return;
        }
        match reason {
            SkipReason::UnsupportedVersion => {
                self.send_rst(stream_id, StreamStatus::UNSUPPORTED_VERSION);
            }
            SkipReason::MalformedHeaderBlock => {
                self.reset_stream(stream_id, StreamStatus::PROTOCOL_ERROR);
            }
            SkipReason::UnknownControlType(kind) => {
                debug!(kind, "ignored unknown control frame");
            }
        }
    }
}
