use bitfield_struct::bitfield;

use crate::flags::{DataFlags, SettingEntryFlags};

/// SPDY protocol version spoken by this crate.
pub const SPDY_VERSION: u16 = 3;

/// Size of every frame header, control or data.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a single frame may carry (24-bit length field).
pub const MAX_FRAME_PAYLOAD: u32 = (1 << 24) - 1;

/// Largest DATA chunk we emit. Peers must accept up to `MAX_FRAME_PAYLOAD`.
pub const MAX_DATA_CHUNK: usize = 16 * 1024 - FRAME_HEADER_SIZE;

/// Protocol-default flow-control window, session and stream alike.
pub const DEFAULT_INITIAL_WINDOW: i32 = 65_535;

/// Stream id zero addresses the session itself in WINDOW_UPDATE frames.
pub const SESSION_STREAM_ID: u32 = 0;

/// First word of a control frame: `[C:1|version:15|type:16]`.
#[bitfield(u32)]
pub struct ControlWord {
    #[bits(16)]
    pub kind: u16,

    #[bits(15)]
    pub version: u16,

    #[bits(1)]
    pub control: bool,
}

/// First word of a data frame, and the stream-id word inside control
/// payloads: `[X:1|stream_id:31]`.
#[bitfield(u32)]
pub struct StreamWord {
    #[bits(31)]
    pub stream_id: u32,

    #[bits(1)]
    pub control: bool,
}

/// Second word of every frame: `[flags:8|length:24]`.
#[bitfield(u32)]
pub struct LengthWord {
    #[bits(24)]
    pub length: u32,

    #[bits(8)]
    pub flags: u8,
}

/// WINDOW_UPDATE delta word: `[X:1|delta:31]`.
#[bitfield(u32)]
pub struct WindowWord {
    #[bits(31)]
    pub delta: u32,

    #[bits(1)]
    _reserved: bool,
}

/// Per-entry word of a SETTINGS frame: `[flags:8|id:24]`.
#[bitfield(u32)]
pub struct SettingWord {
    #[bits(24)]
    pub id: u32,

    #[bits(8)]
    pub flags: u8,
}

/// SYN_STREAM priority byte: `[priority:3|unused:5]`.
#[bitfield(u8)]
pub struct PriorityByte {
    #[bits(5)]
    _unused: u8,

    #[bits(3)]
    pub priority: u8,
}

/// Stream-level status codes carried by RST_STREAM.
#[allow(non_camel_case_types)]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// **Code 0x1**
    ///
    /// A generic error related to the stream, used when a more specific
    /// code is not available.
    PROTOCOL_ERROR = 0x1,

    /// **Code 0x2**
    ///
    /// Returned when a frame is received for a stream that is not active.
    INVALID_STREAM = 0x2,

    /// **Code 0x3**
    ///
    /// The stream was refused before any processing was performed on it.
    REFUSED_STREAM = 0x3,

    /// **Code 0x4**
    ///
    /// The recipient of a stream does not support the SPDY version requested.
    UNSUPPORTED_VERSION = 0x4,

    /// **Code 0x5**
    ///
    /// Used by the creator of a stream to indicate it is no longer needed.
    CANCEL = 0x5,

    /// **Code 0x6**
    ///
    /// The endpoint processing the stream experienced an internal failure.
    INTERNAL_ERROR = 0x6,

    /// **Code 0x7**
    ///
    /// The endpoint detected that its peer violated the flow control window
    /// of a stream.
    FLOW_CONTROL_ERROR = 0x7,

    /// **Code 0x8**
    ///
    /// The endpoint received a SYN_REPLY for a stream already open.
    STREAM_IN_USE = 0x8,

    /// **Code 0x9**
    ///
    /// The endpoint received a data or SYN_REPLY frame for a stream which
    /// is half closed.
    STREAM_ALREADY_CLOSED = 0x9,

    /// Unknown status code.
    UNKNOWN(u32),
}

impl From<u32> for StreamStatus {
    fn from(value: u32) -> Self {
        match value {
            0x1 => Self::PROTOCOL_ERROR,
            0x2 => Self::INVALID_STREAM,
            0x3 => Self::REFUSED_STREAM,
            0x4 => Self::UNSUPPORTED_VERSION,
            0x5 => Self::CANCEL,
            0x6 => Self::INTERNAL_ERROR,
            0x7 => Self::FLOW_CONTROL_ERROR,
            0x8 => Self::STREAM_IN_USE,
            0x9 => Self::STREAM_ALREADY_CLOSED,
            other => Self::UNKNOWN(other),
        }
    }
}

impl StreamStatus {
    pub fn code(&self) -> u32 {
        match *self {
            Self::PROTOCOL_ERROR => 0x1,
            Self::INVALID_STREAM => 0x2,
            Self::REFUSED_STREAM => 0x3,
            Self::UNSUPPORTED_VERSION => 0x4,
            Self::CANCEL => 0x5,
            Self::INTERNAL_ERROR => 0x6,
            Self::FLOW_CONTROL_ERROR => 0x7,
            Self::STREAM_IN_USE => 0x8,
            Self::STREAM_ALREADY_CLOSED => 0x9,
            Self::UNKNOWN(code) => code,
        }
    }
}

/// Session-level status codes carried by GOAWAY.
#[allow(non_camel_case_types)]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoAwayStatus {
    /// **Code 0x0**
    ///
    /// Graceful shutdown; the sender is done with this session.
    OK = 0x0,

    /// **Code 0x1**
    ///
    /// The sender detected a protocol violation by its peer.
    PROTOCOL_ERROR = 0x1,

    /// **Code 0x2**
    ///
    /// The sender experienced an internal failure.
    INTERNAL_ERROR = 0x2,

    /// Unknown status code.
    UNKNOWN(u32),
}

impl From<u32> for GoAwayStatus {
    fn from(value: u32) -> Self {
        match value {
            0x0 => Self::OK,
            0x1 => Self::PROTOCOL_ERROR,
            0x2 => Self::INTERNAL_ERROR,
            other => Self::UNKNOWN(other),
        }
    }
}

impl GoAwayStatus {
    pub fn code(&self) -> u32 {
        match *self {
            Self::OK => 0x0,
            Self::PROTOCOL_ERROR => 0x1,
            Self::INTERNAL_ERROR => 0x2,
            Self::UNKNOWN(code) => code,
        }
    }
}

/// Control frame types defined by SPDY/3.1.
///
/// CREDENTIAL (0xA) was removed in 3.1 and decodes as `Unknown`.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    SynStream = 0x1,
    SynReply = 0x2,
    RstStream = 0x3,
    Settings = 0x4,
    Ping = 0x6,
    GoAway = 0x7,
    Headers = 0x8,
    WindowUpdate = 0x9,
    Unknown(u16),
}

impl From<u16> for ControlKind {
    fn from(value: u16) -> Self {
        match value {
            0x1 => Self::SynStream,
            0x2 => Self::SynReply,
            0x3 => Self::RstStream,
            0x4 => Self::Settings,
            0x6 => Self::Ping,
            0x7 => Self::GoAway,
            0x8 => Self::Headers,
            0x9 => Self::WindowUpdate,
            other => Self::Unknown(other),
        }
    }
}

impl ControlKind {
    pub fn code(&self) -> u16 {
        match *self {
            Self::SynStream => 0x1,
            Self::SynReply => 0x2,
            Self::RstStream => 0x3,
            Self::Settings => 0x4,
            Self::Ping => 0x6,
            Self::GoAway => 0x7,
            Self::Headers => 0x8,
            Self::WindowUpdate => 0x9,
            Self::Unknown(code) => code,
        }
    }
}

/// Setting ids defined by SPDY/3.
#[allow(non_camel_case_types)]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    UPLOAD_BANDWIDTH = 0x1,
    DOWNLOAD_BANDWIDTH = 0x2,
    ROUND_TRIP_TIME = 0x3,
    MAX_CONCURRENT_STREAMS = 0x4,
    CURRENT_CWND = 0x5,
    DOWNLOAD_RETRANS_RATE = 0x6,
    INITIAL_WINDOW_SIZE = 0x7,
    CLIENT_CERTIFICATE_VECTOR_SIZE = 0x8,
    UNKNOWN(u32),
}

impl From<u32> for SettingId {
    fn from(value: u32) -> Self {
        match value {
            0x1 => Self::UPLOAD_BANDWIDTH,
            0x2 => Self::DOWNLOAD_BANDWIDTH,
            0x3 => Self::ROUND_TRIP_TIME,
            0x4 => Self::MAX_CONCURRENT_STREAMS,
            0x5 => Self::CURRENT_CWND,
            0x6 => Self::DOWNLOAD_RETRANS_RATE,
            0x7 => Self::INITIAL_WINDOW_SIZE,
            0x8 => Self::CLIENT_CERTIFICATE_VECTOR_SIZE,
            other => Self::UNKNOWN(other),
        }
    }
}

impl SettingId {
    pub fn code(&self) -> u32 {
        match *self {
            Self::UPLOAD_BANDWIDTH => 0x1,
            Self::DOWNLOAD_BANDWIDTH => 0x2,
            Self::ROUND_TRIP_TIME => 0x3,
            Self::MAX_CONCURRENT_STREAMS => 0x4,
            Self::CURRENT_CWND => 0x5,
            Self::DOWNLOAD_RETRANS_RATE => 0x6,
            Self::INITIAL_WINDOW_SIZE => 0x7,
            Self::CLIENT_CERTIFICATE_VECTOR_SIZE => 0x8,
            Self::UNKNOWN(code) => code,
        }
    }
}

/// One id/value entry of a SETTINGS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    pub value: u32,
    pub flags: SettingEntryFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub stream_id: u32,
    pub flags: DataFlags,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    pub version: u16,
    pub kind: ControlKind,
    pub flags: u8,
    pub length: u32,
}

/// The common 8-byte frame header; the high bit of the first word selects
/// the control or data layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    Control(ControlHeader),
    Data(DataHeader),
}

impl FrameHeader {
    pub fn length(&self) -> u32 {
        match self {
            Self::Control(header) => header.length,
            Self::Data(header) => header.length,
        }
    }
}

pub struct SynStreamFrame<'a> {
    pub stream_id: u32,
    pub associated_stream_id: u32,
    pub priority: u8,
    pub slot: u8,
    pub header_block: &'a [u8],
}

pub struct SynReplyFrame<'a> {
    pub stream_id: u32,
    pub header_block: &'a [u8],
}

pub struct RstStreamFrame {
    pub stream_id: u32,
    pub status: StreamStatus,
}

pub struct SettingsFrame {
    pub entries: Vec<Setting>,
}

pub struct PingFrame {
    pub id: u32,
}

pub struct GoAwayFrame {
    pub last_good_stream_id: u32,
    pub status: GoAwayStatus,
}

pub struct HeadersFrame<'a> {
    pub stream_id: u32,
    pub header_block: &'a [u8],
}

pub struct WindowUpdateFrame {
    pub stream_id: u32,
    pub delta: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_word_layout() {
        let word = ControlWord::new()
            .with_control(true)
            .with_version(SPDY_VERSION)
            .with_kind(0x1);

        assert_eq!(word.into_bits(), 0x8003_0001);
    }

    #[test]
    fn test_stream_word_masks_high_bit() {
        let word = StreamWord::from_bits(0x8000_0005);

        assert!(word.control());
        assert_eq!(word.stream_id(), 5);
    }

    #[test]
    fn test_length_word_layout() {
        let word = LengthWord::new().with_flags(0x01).with_length(10);

        assert_eq!(word.into_bits(), 0x0100_000a);
    }

    #[test]
    fn test_priority_byte() {
        let byte = PriorityByte::new().with_priority(7);

        assert_eq!(byte.into_bits(), 0xe0);
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(StreamStatus::from(0x8), StreamStatus::STREAM_IN_USE);
        assert_eq!(StreamStatus::STREAM_IN_USE.code(), 0x8);
        assert_eq!(StreamStatus::from(0xdead), StreamStatus::UNKNOWN(0xdead));
        assert_eq!(GoAwayStatus::from(0x0), GoAwayStatus::OK);
    }
}
