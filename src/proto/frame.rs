//! RESP2 frame types.
//!
//! A [`Frame`] is one unit of the wire protocol: a command on the way
//! out, a reply or a pub/sub push on the way in.

use bytes::Bytes;

/// A single RESP2 frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple status line (`+OK`).
    Status(Bytes),
    /// Error line (`-ERR ...`).
    Error(String),
    /// Signed integer (`:1000`).
    Integer(i64),
    /// Binary-safe bulk string (`$6\r\nfoobar`).
    Bulk(Bytes),
    /// Array of frames (`*2\r\n...`), used for commands, batch replies,
    /// and pub/sub pushes.
    Array(Vec<Frame>),
    /// Null bulk string or null array (`$-1`, `*-1`).
    Null,
}

impl Frame {
    /// Extracts the raw bytes of a status or bulk frame.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            Frame::Status(data) | Frame::Bulk(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Extracts a status or bulk frame as UTF-8 text.
    pub fn as_text(&self) -> Option<String> {
        self.as_bytes()
            .and_then(|data| String::from_utf8(data.to_vec()).ok())
    }

    /// Extracts an integer frame.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Frame::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Borrows the elements of an array frame.
    pub fn as_array(&self) -> Option<&[Frame]> {
        match self {
            Frame::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for the null frame.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null)
    }

    /// The message of an error frame, if this is one.
    pub(crate) fn error_message(&self) -> Option<&str> {
        match self {
            Frame::Error(message) => Some(message),
            _ => None,
        }
    }
}
