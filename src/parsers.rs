use nom::{
    IResult,
    bytes::complete::take,
    number::complete::{be_u8, be_u32},
};

use crate::{
    flags::{DataFlags, SettingEntryFlags},
    frames::{
        ControlHeader, ControlKind, ControlWord, DataHeader, FRAME_HEADER_SIZE, FrameHeader,
        GoAwayFrame, GoAwayStatus, HeadersFrame, LengthWord, PingFrame, PriorityByte,
        RstStreamFrame, Setting, SettingId, SettingWord, SettingsFrame, StreamStatus, StreamWord,
        SynReplyFrame, SynStreamFrame, WindowUpdateFrame, WindowWord,
    },
};

fn parse_stream_word(bytes: &[u8]) -> IResult<&[u8], u32, nom::error::Error<&[u8]>> {
    be_u32(bytes).map(|(b, w)| (b, StreamWord::from_bits(w).stream_id()))
}

fn parse_window_word(bytes: &[u8]) -> IResult<&[u8], u32, nom::error::Error<&[u8]>> {
    be_u32(bytes).map(|(b, w)| (b, WindowWord::from_bits(w).delta()))
}

fn parse_setting(bytes: &[u8]) -> IResult<&[u8], Setting, nom::error::Error<&[u8]>> {
    let (bytes, word) = be_u32(bytes).map(|(b, w)| (b, SettingWord::from_bits(w)))?;
    let (bytes, value) = be_u32(bytes)?;

    Ok((
        bytes,
        Setting {
            id: SettingId::from(word.id()),
            value,
            flags: SettingEntryFlags::from_bits_truncate(word.flags()),
        },
    ))
}

impl FrameHeader {
    /// Parses the common 8-byte header shared by control and data frames.
    pub fn parse(bytes: &'_ [u8]) -> IResult<&[u8], Self, nom::error::Error<&[u8]>> {
        let (tail, bytes) = take(FRAME_HEADER_SIZE)(bytes)?;
        let (bytes, first) = be_u32(bytes)?;
        let (_, length_word) = be_u32(bytes).map(|(b, w)| (b, LengthWord::from_bits(w)))?;

        let header = if StreamWord::from_bits(first).control() {
            let word = ControlWord::from_bits(first);
            Self::Control(ControlHeader {
                version: word.version(),
                kind: ControlKind::from(word.kind()),
                flags: length_word.flags(),
                length: length_word.length(),
            })
        } else {
            Self::Data(DataHeader {
                stream_id: StreamWord::from_bits(first).stream_id(),
                flags: DataFlags::from_bits_truncate(length_word.flags()),
                length: length_word.length(),
            })
        };

        Ok((tail, header))
    }
}

impl<'a> SynStreamFrame<'a> {
    pub fn parse(bytes: &'a [u8]) -> IResult<&'a [u8], Self, nom::error::Error<&'a [u8]>> {
        let (bytes, stream_id) = parse_stream_word(bytes)?;
        let (bytes, associated_stream_id) = parse_stream_word(bytes)?;
        let (bytes, priority) = be_u8(bytes).map(|(b, v)| (b, PriorityByte::from_bits(v)))?;
        let (bytes, slot) = be_u8(bytes)?;

        Ok((
            &[],
            Self {
                stream_id,
                associated_stream_id,
                priority: priority.priority(),
                slot,
                header_block: bytes,
            },
        ))
    }
}

impl<'a> SynReplyFrame<'a> {
    pub fn parse(bytes: &'a [u8]) -> IResult<&'a [u8], Self, nom::error::Error<&'a [u8]>> {
        let (bytes, stream_id) = parse_stream_word(bytes)?;

        Ok((
            &[],
            Self {
                stream_id,
                header_block: bytes,
            },
        ))
    }
}

impl RstStreamFrame {
    pub fn parse(bytes: &[u8]) -> IResult<&[u8], Self, nom::error::Error<&[u8]>> {
        let (bytes, stream_id) = parse_stream_word(bytes)?;
        let (bytes, status) = be_u32(bytes).map(|(b, v)| (b, StreamStatus::from(v)))?;

        Ok((bytes, Self { stream_id, status }))
    }
}

impl SettingsFrame {
    pub fn parse(bytes: &[u8]) -> IResult<&[u8], Self, nom::error::Error<&[u8]>> {
        let (bytes, count) = be_u32(bytes)?;

        if bytes.len() != count as usize * 8 {
            return Err(nom::Err::Error(nom::error::Error::new(
                bytes,
                nom::error::ErrorKind::LengthValue,
            )));
        }

        let mut bytes = bytes;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (rest, entry) = parse_setting(bytes)?;
            entries.push(entry);
            bytes = rest;
        }

        Ok((bytes, Self { entries }))
    }
}

impl PingFrame {
    pub fn parse(bytes: &[u8]) -> IResult<&[u8], Self, nom::error::Error<&[u8]>> {
        let (bytes, id) = be_u32(bytes)?;

        Ok((bytes, Self { id }))
    }
}

impl GoAwayFrame {
    pub fn parse(bytes: &[u8]) -> IResult<&[u8], Self, nom::error::Error<&[u8]>> {
        let (bytes, last_good_stream_id) = parse_stream_word(bytes)?;
        let (bytes, status) = be_u32(bytes).map(|(b, v)| (b, GoAwayStatus::from(v)))?;

        Ok((
            bytes,
            Self {
                last_good_stream_id,
                status,
            },
        ))
    }
}

impl<'a> HeadersFrame<'a> {
    pub fn parse(bytes: &'a [u8]) -> IResult<&'a [u8], Self, nom::error::Error<&'a [u8]>> {
        let (bytes, stream_id) = parse_stream_word(bytes)?;

        Ok((
            &[],
            Self {
                stream_id,
                header_block: bytes,
            },
        ))
    }
}

impl WindowUpdateFrame {
    pub fn parse(bytes: &[u8]) -> IResult<&[u8], Self, nom::error::Error<&[u8]>> {
        let (bytes, stream_id) = parse_stream_word(bytes)?;
        let (bytes, delta) = parse_window_word(bytes)?;

        Ok((bytes, Self { stream_id, delta }))
    }
}

#[cfg(test)]
mod parse_tests {
    use super::*;

    #[test]
    fn test_parse_frame_header_from_bytes() {
        // SYN_STREAM control header, version 3, flags 0x01, length 16.
        let control: [u8; 8] = [0x80, 0x03, 0x00, 0x01, 0x01, 0x00, 0x00, 0x10];
        // DATA header for stream 5, FLAG_FIN, length 3.
        let data: [u8; 8] = [0x00, 0x00, 0x00, 0x05, 0x01, 0x00, 0x00, 0x03];
        let short: [u8; 7] = [0x80, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00];

        let (tail, parsed_control) = FrameHeader::parse(&control).unwrap();
        assert!(tail.is_empty());
        assert_eq!(
            parsed_control,
            FrameHeader::Control(ControlHeader {
                version: 3,
                kind: ControlKind::SynStream,
                flags: 0x01,
                length: 16,
            })
        );

        let (_, parsed_data) = FrameHeader::parse(&data).unwrap();
        assert_eq!(
            parsed_data,
            FrameHeader::Data(DataHeader {
                stream_id: 5,
                flags: DataFlags::FIN,
                length: 3,
            })
        );

        assert!(FrameHeader::parse(&short).is_err());
    }

    #[test]
    fn test_parse_syn_stream_payload() {
        let payload: [u8; 12] = [
            0x00, 0x00, 0x00, 0x02, // stream 2
            0x00, 0x00, 0x00, 0x01, // associated to stream 1
            0x40, 0x00, // priority 2, slot 0
            0xde, 0xad, // header block
        ];

        let (_, frame) = SynStreamFrame::parse(&payload).unwrap();
        assert_eq!(frame.stream_id, 2);
        assert_eq!(frame.associated_stream_id, 1);
        assert_eq!(frame.priority, 2);
        assert_eq!(frame.header_block, &[0xde, 0xad]);
    }

    #[test]
    fn test_parse_settings_payload() {
        let payload: [u8; 20] = [
            0x00, 0x00, 0x00, 0x02, // two entries
            0x00, 0x00, 0x00, 0x04, // MAX_CONCURRENT_STREAMS
            0x00, 0x00, 0x00, 0x64, // 100
            0x01, 0x00, 0x00, 0x07, // INITIAL_WINDOW_SIZE, PERSIST_VALUE
            0x00, 0x10, 0x00, 0x00, // 1 MiB
        ];

        let (_, frame) = SettingsFrame::parse(&payload).unwrap();
        assert_eq!(frame.entries.len(), 2);
        assert_eq!(frame.entries[0].id, SettingId::MAX_CONCURRENT_STREAMS);
        assert_eq!(frame.entries[0].value, 100);
        assert!(frame.entries[1].flags.contains(SettingEntryFlags::PERSIST_VALUE));
        assert_eq!(frame.entries[1].value, 0x0010_0000);
    }

    #[test]
    fn test_parse_settings_rejects_bad_count() {
        let payload: [u8; 12] = [
            0x00, 0x00, 0x00, 0x02, // claims two entries, carries one
            0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x64,
        ];

        assert!(SettingsFrame::parse(&payload).is_err());
    }

    #[test]
    fn test_parse_window_update_masks_reserved_bit() {
        let payload: [u8; 8] = [0x80, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x2a];

        let (_, frame) = WindowUpdateFrame::parse(&payload).unwrap();
        assert_eq!(frame.stream_id, 0);
        assert_eq!(frame.delta, 42);
    }

    #[test]
    fn test_parse_goaway_payload() {
        let payload: [u8; 8] = [0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01];

        let (_, frame) = GoAwayFrame::parse(&payload).unwrap();
        assert_eq!(frame.last_good_stream_id, 4);
        assert_eq!(frame.status, GoAwayStatus::PROTOCOL_ERROR);
    }
}
