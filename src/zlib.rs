//! Header-block compression. SPDY/3 name/value blocks travel zlib-compressed
//! with a protocol-fixed dictionary; compressor and decompressor each hold
//! streaming state shared across every block in their direction, so a block
//! must always be consumed in full even when its contents are rejected.

use bytes::{BufMut, BytesMut};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};

use crate::error::SessionError;

/// Zlib dictionary fixed by the SPDY/3 specification.
const DICTIONARY: &[u8] = b"\x00\x00\x00\x07options\x00\x00\x00\x04head\x00\x00\x00\x04post\
\x00\x00\x00\x03put\x00\x00\x00\x06delete\x00\x00\x00\x05trace\x00\x00\x00\x06accept\
\x00\x00\x00\x0eaccept-charset\x00\x00\x00\x0faccept-encoding\x00\x00\x00\x0faccept-language\
\x00\x00\x00\x0daccept-ranges\x00\x00\x00\x03age\x00\x00\x00\x05allow\x00\x00\x00\x0dauthorization\
\x00\x00\x00\x0dcache-control\x00\x00\x00\x0aconnection\x00\x00\x00\x0ccontent-base\
\x00\x00\x00\x10content-encoding\x00\x00\x00\x10content-language\x00\x00\x00\x0econtent-length\
\x00\x00\x00\x10content-location\x00\x00\x00\x0bcontent-md5\x00\x00\x00\x0dcontent-range\
\x00\x00\x00\x0ccontent-type\x00\x00\x00\x04date\x00\x00\x00\x04etag\x00\x00\x00\x06expect\
\x00\x00\x00\x07expires\x00\x00\x00\x04from\x00\x00\x00\x04host\x00\x00\x00\x08if-match\
\x00\x00\x00\x11if-modified-since\x00\x00\x00\x0dif-none-match\x00\x00\x00\x08if-range\
\x00\x00\x00\x13if-unmodified-since\x00\x00\x00\x0dlast-modified\x00\x00\x00\x08location\
\x00\x00\x00\x0cmax-forwards\x00\x00\x00\x06pragma\x00\x00\x00\x12proxy-authenticate\
\x00\x00\x00\x13proxy-authorization\x00\x00\x00\x05range\x00\x00\x00\x07referer\
\x00\x00\x00\x0bretry-after\x00\x00\x00\x06server\x00\x00\x00\x02te\x00\x00\x00\x07trailer\
\x00\x00\x00\x11transfer-encoding\x00\x00\x00\x07upgrade\x00\x00\x00\x0auser-agent\
\x00\x00\x00\x04vary\x00\x00\x00\x03via\x00\x00\x00\x07warning\x00\x00\x00\x10www-authenticate\
\x00\x00\x00\x06method\x00\x00\x00\x03get\x00\x00\x00\x06status\x00\x00\x00\x06200 OK\
\x00\x00\x00\x07version\x00\x00\x00\x08HTTP/1.1\x00\x00\x00\x03url\x00\x00\x00\x06public\
\x00\x00\x00\x0aset-cookie\x00\x00\x00\x0akeep-alive\x00\x00\x00\x06origin\
100101201202205206300302303304305306307402405406407408409410411412413414415416417502504505\
203 Non-Authoritative Information204 No Content301 Moved Permanently400 Bad Request\
401 Unauthorized403 Forbidden404 Not Found500 Internal Server Error501 Not Implemented\
503 Service UnavailableJan Feb Mar Apr May Jun Jul Aug Sept Oct Nov Dec 00:00:00 Mon, Tue, Wed, \
Thu, Fri, Sat, Sun, GMTchunked,text/html,image/png,image/jpg,image/gif,application/xml,\
application/xhtml+xml,text/plain,text/javascript,publicprivatemax-age=gzip,deflate,\
sdchcharset=utf-8charset=iso-8859-1,utf-,*,enq=0.";

/// A single name/value length field may not exceed the frame length space;
/// anything larger marks the block malformed rather than a memory hazard.
const MAX_FIELD_LEN: u32 = (1 << 24) - 1;

/// Outcome of decoding one header block. `Malformed` is a per-stream
/// failure; the zlib state is synchronized either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockResult {
    Complete,
    Malformed(&'static str),
}

pub struct HeaderCompressor {
    z: Compress,
    dict_set: bool,
}

impl HeaderCompressor {
    pub fn new() -> Self {
        Self {
            z: Compress::new(Compression::default(), true),
            dict_set: false,
        }
    }

    /// Serializes and compresses one name/value block, sync-flushed so the
    /// peer can decode it without end-of-stream.
    pub fn compress_block(&mut self, headers: &[(&[u8], &[u8])]) -> Result<Vec<u8>, SessionError> {
        // The dictionary must go in before the first byte of the stream.
        if !self.dict_set {
            self.z
                .set_dictionary(DICTIONARY)
                .map_err(|_| SessionError::Internal("header dictionary rejected"))?;
            self.dict_set = true;
        }

        let mut raw = BytesMut::new();
        raw.put_u32(headers.len() as u32);
        for (name, value) in headers {
            raw.put_u32(name.len() as u32);
            raw.put_slice(name);
            raw.put_u32(value.len() as u32);
            raw.put_slice(value);
        }

        let mut out = Vec::with_capacity(raw.len() / 2 + 32);
        let mut pos = 0usize;
        loop {
            out.reserve(256);
            let before_in = self.z.total_in();
            let before_out = self.z.total_out();
            self.z
                .compress_vec(&raw[pos..], &mut out, FlushCompress::Sync)
                .map_err(|_| SessionError::Internal("header compression failed"))?;
            pos += (self.z.total_in() - before_in) as usize;
            let produced = self.z.total_out() - before_out;
            if pos == raw.len() && produced == 0 {
                break;
            }
        }
        Ok(out)
    }
}

impl Default for HeaderCompressor {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HeaderDecompressor {
    z: Decompress,
    dict_set: bool,
    /// Hard cap on a block's decompressed size; beyond it the block is
    /// consumed into a scratch buffer and reported malformed.
    max_block_size: usize,
}

impl HeaderDecompressor {
    pub fn new(max_block_size: usize) -> Self {
        Self {
            z: Decompress::new(true),
            dict_set: false,
            max_block_size,
        }
    }

    /// Decompresses one header block, handing each (name, value) pair to
    /// `sink` as it is decoded. `sink` returning `false` cancels delivery of
    /// the remaining pairs; the block is still consumed in full so the
    /// shared dictionary state stays aligned with the peer. Zlib failures
    /// are session-fatal.
    pub fn decode_block(
        &mut self,
        block: &[u8],
        sink: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<BlockResult, SessionError> {
        let mut raw = Vec::new();
        let mut overflow = false;
        let mut pos = 0usize;
        loop {
            let before_in = self.z.total_in();
            let before_out = self.z.total_out();
            let step = if overflow {
                // Past the cap: inflate into scratch space purely to advance
                // the shared state.
                let mut scratch = Vec::with_capacity(4096);
                self.z
                    .decompress_vec(&block[pos..], &mut scratch, FlushDecompress::Sync)
            } else {
                raw.reserve(4096);
                self.z
                    .decompress_vec(&block[pos..], &mut raw, FlushDecompress::Sync)
            };
            pos += (self.z.total_in() - before_in) as usize;
            let produced = self.z.total_out() - before_out;

            if let Err(err) = step {
                // The zlib header names the dictionary; supply it once and
                // resume. Anything else is unrecoverable shared state.
                if !self.dict_set && err.needs_dictionary().is_some() {
                    self.z
                        .set_dictionary(DICTIONARY)
                        .map_err(|_| SessionError::Protocol("header dictionary rejected"))?;
                    self.dict_set = true;
                    continue;
                }
                return Err(SessionError::Protocol("header block decompression failed"));
            }
            if !overflow && raw.len() > self.max_block_size {
                overflow = true;
            }
            if pos == block.len() && produced == 0 {
                break;
            }
        }

        if overflow {
            return Ok(BlockResult::Malformed("header block too large"));
        }
        Ok(parse_block(&raw, sink))
    }
}

fn parse_block(raw: &[u8], sink: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> BlockResult {
    let mut cursor = raw;
    let Some(count) = read_u32(&mut cursor) else {
        return BlockResult::Malformed("truncated pair count");
    };

    let mut delivering = true;
    for _ in 0..count {
        let Some(name) = read_field(&mut cursor) else {
            return BlockResult::Malformed("truncated header name");
        };
        if name.is_empty() {
            return BlockResult::Malformed("zero-length header name");
        }
        let Some(value) = read_field(&mut cursor) else {
            return BlockResult::Malformed("truncated header value");
        };
        if delivering {
            delivering = sink(name, value);
        }
    }

    if !cursor.is_empty() {
        return BlockResult::Malformed("trailing bytes after final pair");
    }
    BlockResult::Complete
}

fn read_u32(cursor: &mut &[u8]) -> Option<u32> {
    if cursor.len() < 4 {
        return None;
    }
    let value = u32::from_be_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]);
    *cursor = &cursor[4..];
    Some(value)
}

fn read_field<'a>(cursor: &mut &'a [u8]) -> Option<&'a [u8]> {
    let len = read_u32(cursor)?;
    if len > MAX_FIELD_LEN || cursor.len() < len as usize {
        return None;
    }
    let (field, rest) = cursor.split_at(len as usize);
    *cursor = rest;
    Some(field)
}
