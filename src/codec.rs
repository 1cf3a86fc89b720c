//! The stateful halves of the frame codec: a pull decoder fed arbitrary
//! byte chunks that emits typed events to a [`FrameSink`] delegate, and an
//! encoder owning the header compressor for block-bearing frames.
//!
//! The delegate contract around header blocks is load-bearing: the decoder
//! only emits `on_header`/`on_headers_end` for a frame whose introducing
//! event (`on_syn_stream`, `on_syn_reply`, `on_headers`) returned `true`, so
//! the session's stream lookup is guaranteed to have happened before any
//! header pair reaches it. Rejected or cancelled blocks are still run
//! through the decompressor to keep the shared zlib state aligned with the
//! peer.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::{
    encode,
    error::SessionError,
    flags::{
        DataFlags, HeadersFlags, SettingsFlags, SynReplyFlags, SynStreamFlags,
    },
    frames::{
        ControlKind, FRAME_HEADER_SIZE, FrameHeader, GoAwayFrame, GoAwayStatus, HeadersFrame,
        PingFrame, RstStreamFrame, SPDY_VERSION, Setting, SettingsFrame, StreamStatus,
        SynReplyFrame, SynStreamFrame, WindowUpdateFrame,
    },
    zlib::{BlockResult, HeaderCompressor, HeaderDecompressor},
};

/// Why a recoverable frame was dropped instead of processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// SYN_STREAM advertising a version other than 3.
    UnsupportedVersion,
    /// A control type this crate does not speak (includes CREDENTIAL,
    /// removed in 3.1).
    UnknownControlType(u16),
    /// The frame's header block decompressed but did not parse.
    MalformedHeaderBlock,
}

/// Receiver of decoded frame events.
///
/// The bool-returning methods gate header delivery: returning `false`
/// suppresses the `on_header`/`on_headers_end` events for that frame.
/// `on_header` returning `false` cancels the remaining pairs of the block.
pub trait FrameSink {
    fn on_data(&mut self, stream_id: u32, fin: bool, payload: Bytes);
    fn on_syn_stream(
        &mut self,
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        fin: bool,
        unidirectional: bool,
    ) -> bool;
    fn on_syn_reply(&mut self, stream_id: u32, fin: bool) -> bool;
    fn on_rst_stream(&mut self, stream_id: u32, status: StreamStatus);
    fn on_settings(&mut self, clear_persisted: bool);
    fn on_setting(&mut self, setting: Setting);
    fn on_settings_end(&mut self);
    fn on_ping(&mut self, id: u32);
    fn on_go_away(&mut self, last_good_stream_id: u32, status: GoAwayStatus);
    fn on_headers(&mut self, stream_id: u32, fin: bool) -> bool;
    fn on_window_update(&mut self, stream_id: u32, delta: u32);
    fn on_header(&mut self, stream_id: u32, name: &[u8], value: &[u8]) -> bool;
    fn on_headers_end(&mut self, stream_id: u32);
    fn on_frame_skipped(&mut self, stream_id: u32, reason: SkipReason);
}

/// Pull decoder. Feed it whatever the transport produced; complete frames
/// are dispatched, a trailing partial frame waits in the buffer.
pub struct Decoder {
    buf: BytesMut,
    decompressor: HeaderDecompressor,
}

impl Decoder {
    pub fn new(max_header_block_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            decompressor: HeaderDecompressor::new(max_header_block_size),
        }
    }

    pub fn feed(
        &mut self,
        input: &[u8],
        sink: &mut dyn FrameSink,
    ) -> Result<(), SessionError> {
        self.buf.extend_from_slice(input);
        loop {
            if self.buf.len() < FRAME_HEADER_SIZE {
                return Ok(());
            }
            let (_, header) = FrameHeader::parse(&self.buf[..FRAME_HEADER_SIZE])
                .map_err(|_| SessionError::Protocol("unparseable frame header"))?;
            let frame_len = FRAME_HEADER_SIZE + header.length() as usize;
            if self.buf.len() < frame_len {
                return Ok(());
            }
            let frame = self.buf.split_to(frame_len).freeze();
            let payload = frame.slice(FRAME_HEADER_SIZE..);
            self.dispatch(header, payload, sink)?;
        }
    }

    fn dispatch(
        &mut self,
        header: FrameHeader,
        payload: Bytes,
        sink: &mut dyn FrameSink,
    ) -> Result<(), SessionError> {
        let control = match header {
            FrameHeader::Data(data) => {
                trace!(stream = data.stream_id, len = data.length, "data frame");
                sink.on_data(data.stream_id, data.flags.contains(DataFlags::FIN), payload);
                return Ok(());
            }
            FrameHeader::Control(control) => control,
        };

        if control.version != SPDY_VERSION {
            // Only a SYN_STREAM is recoverable on a version mismatch; its id
            // is enough to refuse the stream. Anything else leaves the
            // session state unknowable.
            if control.kind == ControlKind::SynStream {
                if let Ok((_, frame)) = SynStreamFrame::parse(&payload) {
                    sink.on_frame_skipped(frame.stream_id, SkipReason::UnsupportedVersion);
                    return Ok(());
                }
            }
            return Err(SessionError::Protocol("unsupported control frame version"));
        }

        match control.kind {
            ControlKind::SynStream => {
                let (_, frame) = SynStreamFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed SYN_STREAM"))?;
                let flags = SynStreamFlags::from_bits_truncate(control.flags);
                let deliver = sink.on_syn_stream(
                    frame.stream_id,
                    frame.associated_stream_id,
                    frame.priority,
                    flags.contains(SynStreamFlags::FIN),
                    flags.contains(SynStreamFlags::UNIDIRECTIONAL),
                );
                self.run_header_block(frame.stream_id, frame.header_block, deliver, sink)
            }
            ControlKind::SynReply => {
                let (_, frame) = SynReplyFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed SYN_REPLY"))?;
                let flags = SynReplyFlags::from_bits_truncate(control.flags);
                let deliver =
                    sink.on_syn_reply(frame.stream_id, flags.contains(SynReplyFlags::FIN));
                self.run_header_block(frame.stream_id, frame.header_block, deliver, sink)
            }
            ControlKind::Headers => {
                let (_, frame) = HeadersFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed HEADERS"))?;
                let flags = HeadersFlags::from_bits_truncate(control.flags);
                let deliver = sink.on_headers(frame.stream_id, flags.contains(HeadersFlags::FIN));
                self.run_header_block(frame.stream_id, frame.header_block, deliver, sink)
            }
            ControlKind::RstStream => {
                let (_, frame) = RstStreamFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed RST_STREAM"))?;
                sink.on_rst_stream(frame.stream_id, frame.status);
                Ok(())
            }
            ControlKind::Settings => {
                let (_, frame) = SettingsFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed SETTINGS"))?;
                let flags = SettingsFlags::from_bits_truncate(control.flags);
                sink.on_settings(flags.contains(SettingsFlags::CLEAR_SETTINGS));
                for entry in frame.entries {
                    sink.on_setting(entry);
                }
                sink.on_settings_end();
                Ok(())
            }
            ControlKind::Ping => {
                let (_, frame) = PingFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed PING"))?;
                sink.on_ping(frame.id);
                Ok(())
            }
            ControlKind::GoAway => {
                let (_, frame) = GoAwayFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed GOAWAY"))?;
                sink.on_go_away(frame.last_good_stream_id, frame.status);
                Ok(())
            }
            ControlKind::WindowUpdate => {
                let (_, frame) = WindowUpdateFrame::parse(&payload)
                    .map_err(|_| SessionError::Protocol("malformed WINDOW_UPDATE"))?;
                sink.on_window_update(frame.stream_id, frame.delta);
                Ok(())
            }
            ControlKind::Unknown(kind) => {
                trace!(kind, "skipping unknown control frame");
                sink.on_frame_skipped(0, SkipReason::UnknownControlType(kind));
                Ok(())
            }
        }
    }

    /// Runs one header block through the shared decompressor. `deliver`
    /// false (frame rejected by the session) silences every event; the
    /// block is consumed regardless.
    fn run_header_block(
        &mut self,
        stream_id: u32,
        block: &[u8],
        deliver: bool,
        sink: &mut dyn FrameSink,
    ) -> Result<(), SessionError> {
        let result = self.decompressor.decode_block(block, &mut |name, value| {
            deliver && sink.on_header(stream_id, name, value)
        })?;

        if !deliver {
            return Ok(());
        }
        match result {
            BlockResult::Complete => sink.on_headers_end(stream_id),
            BlockResult::Malformed(reason) => {
                trace!(stream = stream_id, reason, "malformed header block");
                sink.on_frame_skipped(stream_id, SkipReason::MalformedHeaderBlock);
            }
        }
        Ok(())
    }
}

/// Encoder. Stateless per frame apart from the header compressor feeding
/// SYN_STREAM and HEADERS blocks.
pub struct Encoder {
    compressor: HeaderCompressor,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            compressor: HeaderCompressor::new(),
        }
    }

    pub fn syn_stream(
        &mut self,
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        flags: SynStreamFlags,
        headers: &[(&[u8], &[u8])],
    ) -> Result<Bytes, SessionError> {
        let block = self.compressor.compress_block(headers)?;
        Ok(encode::syn_stream(
            stream_id,
            associated_stream_id,
            priority,
            flags,
            &block,
        ))
    }

    pub fn headers(
        &mut self,
        stream_id: u32,
        flags: HeadersFlags,
        headers: &[(&[u8], &[u8])],
    ) -> Result<Bytes, SessionError> {
        let block = self.compressor.compress_block(headers)?;
        Ok(encode::headers(stream_id, flags, &block))
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Sink that records every event, for decoding captured wire bytes in
    /// tests.
    #[derive(Debug, PartialEq, Eq)]
    pub enum Event {
        Data { stream_id: u32, fin: bool, payload: Vec<u8> },
        SynStream { stream_id: u32, associated_stream_id: u32, priority: u8, fin: bool, unidirectional: bool },
        SynReply { stream_id: u32, fin: bool },
        RstStream { stream_id: u32, status: StreamStatus },
        Settings { clear_persisted: bool },
        Setting(Setting),
        SettingsEnd,
        Ping { id: u32 },
        GoAway { last_good_stream_id: u32, status: GoAwayStatus },
        Headers { stream_id: u32, fin: bool },
        WindowUpdate { stream_id: u32, delta: u32 },
        Header { stream_id: u32, name: Vec<u8>, value: Vec<u8> },
        HeadersEnd { stream_id: u32 },
        Skipped { stream_id: u32, reason: SkipReason },
    }

    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Vec<Event>,
        /// Gate returned from the frame-introducing callbacks.
        pub deliver_headers: bool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self {
                events: Vec::new(),
                deliver_headers: true,
            }
        }
    }

    impl FrameSink for RecordingSink {
        fn on_data(&mut self, stream_id: u32, fin: bool, payload: Bytes) {
            self.events.push(Event::Data { stream_id, fin, payload: payload.to_vec() });
        }

        fn on_syn_stream(
            &mut self,
            stream_id: u32,
            associated_stream_id: u32,
            priority: u8,
            fin: bool,
            unidirectional: bool,
        ) -> bool {
            self.events.push(Event::SynStream {
                stream_id,
                associated_stream_id,
                priority,
                fin,
                unidirectional,
            });
            self.deliver_headers
        }

        fn on_syn_reply(&mut self, stream_id: u32, fin: bool) -> bool {
            self.events.push(Event::SynReply { stream_id, fin });
            self.deliver_headers
        }

        fn on_rst_stream(&mut self, stream_id: u32, status: StreamStatus) {
            self.events.push(Event::RstStream { stream_id, status });
        }

        fn on_settings(&mut self, clear_persisted: bool) {
            self.events.push(Event::Settings { clear_persisted });
        }

        fn on_setting(&mut self, setting: Setting) {
            self.events.push(Event::Setting(setting));
        }

        fn on_settings_end(&mut self) {
            self.events.push(Event::SettingsEnd);
        }

        fn on_ping(&mut self, id: u32) {
            self.events.push(Event::Ping { id });
        }

        fn on_go_away(&mut self, last_good_stream_id: u32, status: GoAwayStatus) {
            self.events.push(Event::GoAway { last_good_stream_id, status });
        }

        fn on_headers(&mut self, stream_id: u32, fin: bool) -> bool {
            self.events.push(Event::Headers { stream_id, fin });
            self.deliver_headers
        }

        fn on_window_update(&mut self, stream_id: u32, delta: u32) {
            self.events.push(Event::WindowUpdate { stream_id, delta });
        }

        fn on_header(&mut self, stream_id: u32, name: &[u8], value: &[u8]) -> bool {
            self.events.push(Event::Header {
                stream_id,
                name: name.to_vec(),
                value: value.to_vec(),
            });
            true
        }

        fn on_headers_end(&mut self, stream_id: u32) {
            self.events.push(Event::HeadersEnd { stream_id });
        }

        fn on_frame_skipped(&mut self, stream_id: u32, reason: SkipReason) {
            self.events.push(Event::Skipped { stream_id, reason });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Event, RecordingSink};
    use super::*;

    #[test]
    fn test_decode_across_chunk_boundaries() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut sink = RecordingSink::new();

        let frame = encode::ping(1);
        let (head, tail) = frame.split_at(3);
        decoder.feed(head, &mut sink).unwrap();
        assert!(sink.events.is_empty());
        decoder.feed(tail, &mut sink).unwrap();

        assert_eq!(sink.events, vec![Event::Ping { id: 1 }]);
    }

    #[test]
    fn test_decode_data_and_control_sequence() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut sink = RecordingSink::new();

        let mut wire = Vec::new();
        wire.extend_from_slice(&encode::data(1, DataFlags::FIN, b"hi"));
        wire.extend_from_slice(&encode::window_update(0, 100));
        decoder.feed(&wire, &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::Data { stream_id: 1, fin: true, payload: b"hi".to_vec() },
                Event::WindowUpdate { stream_id: 0, delta: 100 },
            ]
        );
    }

    #[test]
    fn test_syn_reply_header_block_events() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut encoder = Encoder::new();
        let mut sink = RecordingSink::new();

        // A SYN_REPLY is never sent by a client; build one with the raw
        // parts to exercise the decode path.
        let mut compressor = HeaderCompressor::new();
        let block = compressor
            .compress_block(&[(b":status", b"200"), (b"server", b"spdy")])
            .unwrap();
        let frame = encode::syn_reply(1, SynReplyFlags::empty(), &block);
        decoder.feed(&frame, &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![
                Event::SynReply { stream_id: 1, fin: false },
                Event::Header { stream_id: 1, name: b":status".to_vec(), value: b"200".to_vec() },
                Event::Header { stream_id: 1, name: b"server".to_vec(), value: b"spdy".to_vec() },
                Event::HeadersEnd { stream_id: 1 },
            ]
        );

        // The encoder half round-trips through the same decoder state pair.
        let frame = encoder
            .syn_stream(3, 0, 0, SynStreamFlags::FIN, &[(b":method", b"GET")])
            .unwrap();
        let mut request_side = Decoder::new(32 * 1024);
        let mut sink = RecordingSink::new();
        request_side.feed(&frame, &mut sink).unwrap();
        assert_eq!(sink.events.len(), 3);
        assert_eq!(
            sink.events[1],
            Event::Header { stream_id: 3, name: b":method".to_vec(), value: b"GET".to_vec() },
        );
    }

    #[test]
    fn test_rejected_frame_suppresses_headers_but_keeps_sync() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut compressor = HeaderCompressor::new();
        let mut sink = RecordingSink::new();
        sink.deliver_headers = false;

        let block = compressor.compress_block(&[(b"x", b"1")]).unwrap();
        decoder
            .feed(&encode::syn_reply(9, SynReplyFlags::empty(), &block), &mut sink)
            .unwrap();
        assert_eq!(sink.events, vec![Event::SynReply { stream_id: 9, fin: false }]);

        // Later blocks still decode: the rejected one was consumed.
        sink.deliver_headers = true;
        let block = compressor.compress_block(&[(b"y", b"2")]).unwrap();
        decoder
            .feed(&encode::syn_reply(11, SynReplyFlags::empty(), &block), &mut sink)
            .unwrap();
        assert!(sink.events.contains(&Event::Header {
            stream_id: 11,
            name: b"y".to_vec(),
            value: b"2".to_vec(),
        }));
    }

    #[test]
    fn test_unknown_control_type_is_skipped() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut sink = RecordingSink::new();

        // CREDENTIAL (type 10) was removed in 3.1.
        let wire: [u8; 8] = [0x80, 0x03, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x00];
        decoder.feed(&wire, &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![Event::Skipped { stream_id: 0, reason: SkipReason::UnknownControlType(10) }]
        );
    }

    #[test]
    fn test_wrong_version_syn_stream_is_skipped() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut sink = RecordingSink::new();

        let mut wire = vec![0x80, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0a];
        wire.extend_from_slice(&[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        decoder.feed(&wire, &mut sink).unwrap();

        assert_eq!(
            sink.events,
            vec![Event::Skipped { stream_id: 2, reason: SkipReason::UnsupportedVersion }]
        );
    }

    #[test]
    fn test_wrong_version_elsewhere_is_fatal() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut sink = RecordingSink::new();

        let wire: [u8; 12] = [
            0x80, 0x02, 0x00, 0x06, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01,
        ];
        let err = decoder.feed(&wire, &mut sink).unwrap_err();

        assert!(matches!(err, SessionError::Protocol(_)));
    }

    #[test]
    fn test_truncated_rst_stream_is_fatal() {
        let mut decoder = Decoder::new(32 * 1024);
        let mut sink = RecordingSink::new();

        let wire: [u8; 12] = [
            0x80, 0x03, 0x00, 0x03, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x05,
        ];
        let err = decoder.feed(&wire, &mut sink).unwrap_err();

        assert!(matches!(err, SessionError::Protocol(_)));
    }
}
