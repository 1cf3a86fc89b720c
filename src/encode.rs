//! Frame emitters. Header-block-bearing frames take the block already
//! compressed; see [`crate::codec::Encoder`] for the coupled half.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    flags::{DataFlags, HeadersFlags, SettingsFlags, SynReplyFlags, SynStreamFlags},
    frames::{
        ControlKind, ControlWord, FRAME_HEADER_SIZE, GoAwayStatus, LengthWord, PriorityByte,
        SPDY_VERSION, Setting, SettingWord, StreamStatus, StreamWord, WindowWord,
    },
};

fn put_control_header(out: &mut BytesMut, kind: ControlKind, flags: u8, length: usize) {
    let word = ControlWord::new()
        .with_control(true)
        .with_version(SPDY_VERSION)
        .with_kind(kind.code());
    out.put_u32(word.into_bits());
    out.put_u32(
        LengthWord::new()
            .with_flags(flags)
            .with_length(length as u32)
            .into_bits(),
    );
}

fn put_stream_word(out: &mut BytesMut, stream_id: u32) {
    out.put_u32(StreamWord::new().with_stream_id(stream_id).into_bits());
}

pub fn data(stream_id: u32, flags: DataFlags, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    put_stream_word(&mut out, stream_id);
    out.put_u32(
        LengthWord::new()
            .with_flags(flags.bits())
            .with_length(payload.len() as u32)
            .into_bits(),
    );
    out.put_slice(payload);
    out.freeze()
}

pub fn syn_stream(
    stream_id: u32,
    associated_stream_id: u32,
    priority: u8,
    flags: SynStreamFlags,
    header_block: &[u8],
) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + 10 + header_block.len());
    put_control_header(
        &mut out,
        ControlKind::SynStream,
        flags.bits(),
        10 + header_block.len(),
    );
    put_stream_word(&mut out, stream_id);
    put_stream_word(&mut out, associated_stream_id);
    out.put_u8(PriorityByte::new().with_priority(priority).into_bits());
    out.put_u8(0); // credential slot, unused in 3.1
    out.put_slice(header_block);
    out.freeze()
}

pub fn syn_reply(stream_id: u32, flags: SynReplyFlags, header_block: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + 4 + header_block.len());
    put_control_header(
        &mut out,
        ControlKind::SynReply,
        flags.bits(),
        4 + header_block.len(),
    );
    put_stream_word(&mut out, stream_id);
    out.put_slice(header_block);
    out.freeze()
}

pub fn rst_stream(stream_id: u32, status: StreamStatus) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + 8);
    put_control_header(&mut out, ControlKind::RstStream, 0, 8);
    put_stream_word(&mut out, stream_id);
    out.put_u32(status.code());
    out.freeze()
}

pub fn settings(flags: SettingsFlags, entries: &[Setting]) -> Bytes {
    let length = 4 + entries.len() * 8;
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + length);
    put_control_header(&mut out, ControlKind::Settings, flags.bits(), length);
    out.put_u32(entries.len() as u32);
    for entry in entries {
        out.put_u32(
            SettingWord::new()
                .with_flags(entry.flags.bits())
                .with_id(entry.id.code())
                .into_bits(),
        );
        out.put_u32(entry.value);
    }
    out.freeze()
}

pub fn ping(id: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + 4);
    put_control_header(&mut out, ControlKind::Ping, 0, 4);
    out.put_u32(id);
    out.freeze()
}

pub fn go_away(last_good_stream_id: u32, status: GoAwayStatus) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + 8);
    put_control_header(&mut out, ControlKind::GoAway, 0, 8);
    put_stream_word(&mut out, last_good_stream_id);
    out.put_u32(status.code());
    out.freeze()
}

pub fn headers(stream_id: u32, flags: HeadersFlags, header_block: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + 4 + header_block.len());
    put_control_header(
        &mut out,
        ControlKind::Headers,
        flags.bits(),
        4 + header_block.len(),
    );
    put_stream_word(&mut out, stream_id);
    out.put_slice(header_block);
    out.freeze()
}

pub fn window_update(stream_id: u32, delta: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + 8);
    put_control_header(&mut out, ControlKind::WindowUpdate, 0, 8);
    put_stream_word(&mut out, stream_id);
    out.put_u32(WindowWord::new().with_delta(delta).into_bits());
    out.freeze()
}
