use bytes::Bytes;

use crate::proto::frame::Frame;

/// A command ready to be sent to the store.
///
/// Commands are built with the builder pattern and converted to wire
/// frames for transmission. The client validates nothing about arity or
/// argument types; the server is the authority on both.
///
/// # Example
///
/// ```
/// use poolis::{command, Cmd};
///
/// let cmd = Cmd::new("SET").arg("key").arg("value");
/// let shorthand = command::set("key", "value");
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends one argument.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Converts the command to its wire frame.
    #[inline]
    pub fn into_frame(self) -> Frame {
        Frame::Array(self.args.into_iter().map(Frame::Bulk).collect())
    }
}

/// Creates a PING command.
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// Creates a GET command.
#[inline]
pub fn get(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("GET").arg(key)
}

/// Creates a SET command.
#[inline]
pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("SET").arg(key).arg(value)
}

/// Creates a DEL command.
#[inline]
pub fn del(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("DEL").arg(key)
}

/// Creates an AUTH command.
#[inline]
pub fn auth(password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(password)
}

/// Creates a SELECT command.
#[inline]
pub fn select(database: i64) -> Cmd {
    Cmd::new("SELECT").arg(database.to_string())
}

/// Creates a PUBLISH command.
#[inline]
pub fn publish(channel: impl Into<Bytes>, payload: impl Into<Bytes>) -> Cmd {
    Cmd::new("PUBLISH").arg(channel).arg(payload)
}

pub(crate) fn multi() -> Cmd {
    Cmd::new("MULTI")
}

pub(crate) fn exec() -> Cmd {
    Cmd::new("EXEC")
}

pub(crate) fn discard() -> Cmd {
    Cmd::new("DISCARD")
}

pub(crate) fn subscribe(channels: &[String]) -> Cmd {
    let mut cmd = Cmd::new("SUBSCRIBE");
    for channel in channels {
        cmd = cmd.arg(channel.clone());
    }
    cmd
}

/// UNSUBSCRIBE with no channels drops every subscription on the
/// connection.
pub(crate) fn unsubscribe(channels: &[String]) -> Cmd {
    let mut cmd = Cmd::new("UNSUBSCRIBE");
    for channel in channels {
        cmd = cmd.arg(channel.clone());
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cmd() {
        assert_eq!(
            get("key").into_frame(),
            Frame::Array(vec![
                Frame::Bulk("GET".into()),
                Frame::Bulk("key".into()),
            ])
        );
    }

    #[test]
    fn test_set_cmd() {
        assert_eq!(
            set("key", "value").into_frame(),
            Frame::Array(vec![
                Frame::Bulk("SET".into()),
                Frame::Bulk("key".into()),
                Frame::Bulk("value".into()),
            ])
        );
    }

    #[test]
    fn test_select_cmd() {
        assert_eq!(
            select(3).into_frame(),
            Frame::Array(vec![Frame::Bulk("SELECT".into()), Frame::Bulk("3".into())])
        );
    }

    #[test]
    fn test_subscribe_cmd() {
        let channels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            subscribe(&channels).into_frame(),
            Frame::Array(vec![
                Frame::Bulk("SUBSCRIBE".into()),
                Frame::Bulk("a".into()),
                Frame::Bulk("b".into()),
            ])
        );
    }

    #[test]
    fn test_unsubscribe_all() {
        assert_eq!(
            unsubscribe(&[]).into_frame(),
            Frame::Array(vec![Frame::Bulk("UNSUBSCRIBE".into())])
        );
    }
}
