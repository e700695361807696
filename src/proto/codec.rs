//! Incremental RESP2 encoder and decoder.
//!
//! The decoder accumulates raw bytes with [`Decoder::append`] and hands
//! out complete frames from [`Decoder::decode`], returning `Ok(None)`
//! while a frame is still partial. No input is consumed until a whole
//! frame has parsed, so a partial frame survives across reads.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

const DEFAULT_FRAME_LIMIT: usize = 512 * 1024 * 1024;

/// A RESP2 encoder that accumulates frames into an internal buffer.
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates an encoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Appends the wire encoding of `frame` to the internal buffer.
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::Status(data) => {
                self.buf.put_u8(b'+');
                self.buf.extend_from_slice(data);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Error(message) => {
                self.buf.put_u8(b'-');
                self.buf.extend_from_slice(message.as_bytes());
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Integer(value) => {
                self.buf.put_u8(b':');
                self.buf.extend_from_slice(value.to_string().as_bytes());
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                self.buf.put_u8(b'$');
                self.buf.extend_from_slice(data.len().to_string().as_bytes());
                self.buf.extend_from_slice(b"\r\n");
                self.buf.extend_from_slice(data);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Array(items) => {
                self.buf.put_u8(b'*');
                self.buf.extend_from_slice(items.len().to_string().as_bytes());
                self.buf.extend_from_slice(b"\r\n");
                for item in items {
                    self.encode(item);
                }
            }
            Frame::Null => {
                self.buf.extend_from_slice(b"$-1\r\n");
            }
        }
    }

    /// Takes the encoded bytes, leaving the buffer empty for reuse.
    pub fn take(&mut self) -> BytesMut {
        self.buf.split()
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// A streaming RESP2 decoder.
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    frame_limit: usize,
}

impl Decoder {
    /// Creates a decoder with the default 512 MiB frame limit.
    pub fn new() -> Self {
        Self::with_frame_limit(DEFAULT_FRAME_LIMIT)
    }

    /// Creates a decoder that rejects frames larger than `frame_limit`
    /// bytes.
    pub fn with_frame_limit(frame_limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            frame_limit,
        }
    }

    /// Appends raw bytes received from the peer.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(Some(frame))` and consumes its bytes, `Ok(None)` if
    /// more input is needed, or an error for malformed input.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.len() > self.frame_limit {
            return Err(Error::protocol("frame exceeds size limit"));
        }

        let mut pos = 0;
        match parse_frame(&self.buf, &mut pos, self.frame_limit)? {
            Some(frame) => {
                self.buf.advance(pos);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one frame starting at `*pos`, advancing `*pos` past it.
/// Returns `Ok(None)` without committing when the input is incomplete.
fn parse_frame(buf: &[u8], pos: &mut usize, limit: usize) -> Result<Option<Frame>> {
    let line = match take_line(buf, pos) {
        Some(line) => line,
        None => return Ok(None),
    };
    if line.is_empty() {
        return Err(Error::protocol("empty frame header"));
    }

    let body = &line[1..];
    match line[0] {
        b'+' => Ok(Some(Frame::Status(Bytes::copy_from_slice(body)))),
        b'-' => Ok(Some(Frame::Error(
            String::from_utf8_lossy(body).into_owned(),
        ))),
        b':' => Ok(Some(Frame::Integer(parse_int(body)?))),
        b'$' => parse_bulk(buf, pos, body, limit),
        b'*' => parse_array(buf, pos, body, limit),
        marker => Err(Error::protocol(format!(
            "unknown frame marker: {}",
            marker as char
        ))),
    }
}

fn parse_bulk(buf: &[u8], pos: &mut usize, header: &[u8], limit: usize) -> Result<Option<Frame>> {
    let declared = parse_int(header)?;
    if declared == -1 {
        return Ok(Some(Frame::Null));
    }
    if declared < 0 {
        return Err(Error::protocol("negative bulk length"));
    }

    let len = declared as usize;
    if len > limit {
        return Err(Error::protocol("bulk payload exceeds size limit"));
    }
    if buf.len() < *pos + len + 2 {
        return Ok(None);
    }
    if buf[*pos + len] != b'\r' || buf[*pos + len + 1] != b'\n' {
        return Err(Error::protocol("bulk payload missing terminator"));
    }

    let data = Bytes::copy_from_slice(&buf[*pos..*pos + len]);
    *pos += len + 2;
    Ok(Some(Frame::Bulk(data)))
}

fn parse_array(buf: &[u8], pos: &mut usize, header: &[u8], limit: usize) -> Result<Option<Frame>> {
    let declared = parse_int(header)?;
    if declared == -1 {
        return Ok(Some(Frame::Null));
    }
    if declared < 0 {
        return Err(Error::protocol("negative array length"));
    }

    let count = declared as usize;
    // An element takes at least four bytes on the wire, so any count
    // beyond limit / 4 cannot fit inside an accepted frame.
    if count > limit / 4 {
        return Err(Error::protocol("array length exceeds size limit"));
    }

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        match parse_frame(buf, pos, limit)? {
            Some(frame) => items.push(frame),
            None => return Ok(None),
        }
    }
    Ok(Some(Frame::Array(items)))
}

/// Takes the next CRLF-terminated line, excluding the terminator.
fn take_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let start = *pos;
    let mut idx = start;
    while idx + 1 < buf.len() {
        if buf[idx] == b'\r' && buf[idx + 1] == b'\n' {
            *pos = idx + 2;
            return Some(&buf[start..idx]);
        }
        idx += 1;
    }
    None
}

fn parse_int(body: &[u8]) -> Result<i64> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| Error::protocol("malformed integer"))
}
