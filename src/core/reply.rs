use std::sync::Arc;

use bytes::Bytes;

use crate::proto::error::Error;
use crate::proto::frame::Frame;

/// The outcome of one command execution: a value or an error, never
/// both.
///
/// Replies are cheap to clone; the outcome is shared and immutable once
/// produced. Typed extractors return `None` when the value has a
/// different shape, mirroring how the server types replies per command.
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: Arc<Result<Frame, Error>>,
}

impl Reply {
    pub(crate) fn ok(frame: Frame) -> Self {
        Self {
            outcome: Arc::new(Ok(frame)),
        }
    }

    pub(crate) fn err(error: Error) -> Self {
        Self {
            outcome: Arc::new(Err(error)),
        }
    }

    /// Lifts a raw reply frame, turning an error frame into a
    /// [`Error::Server`] outcome.
    pub(crate) fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Error(message) => Self::err(Error::Server { message }),
            frame => Self::ok(frame),
        }
    }

    /// The outcome as a borrowed `Result`.
    pub fn result(&self) -> Result<&Frame, &Error> {
        self.outcome.as_ref().as_ref()
    }

    /// The reply value, absent when the reply carries an error.
    pub fn value(&self) -> Option<&Frame> {
        self.result().ok()
    }

    /// The reply error, absent when the reply carries a value.
    pub fn error(&self) -> Option<&Error> {
        self.result().err()
    }

    /// True when the reply carries a value.
    pub fn is_ok(&self) -> bool {
        self.result().is_ok()
    }

    /// True when the reply carries an error.
    pub fn is_err(&self) -> bool {
        self.result().is_err()
    }

    /// The value as raw bytes (status or bulk replies).
    pub fn bytes(&self) -> Option<Bytes> {
        self.value().and_then(Frame::as_bytes)
    }

    /// The value as UTF-8 text (status or bulk replies).
    pub fn text(&self) -> Option<String> {
        self.value().and_then(Frame::as_text)
    }

    /// The value as an integer.
    pub fn int(&self) -> Option<i64> {
        self.value().and_then(Frame::as_int)
    }

    /// The elements of an array-valued reply, as produced by batches.
    pub fn elements(&self) -> Option<&[Frame]> {
        self.value().and_then(Frame::as_array)
    }
}
