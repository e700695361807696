use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::core::command;
use crate::core::connection::Connection;
use crate::core::pool::Pool;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// An inbound message delivered to a subscription handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Channel the message arrived on.
    pub channel: String,
    /// Raw payload published to the channel.
    pub payload: Bytes,
}

/// Caller-supplied callback invoked once per inbound message.
///
/// Handlers run on the subscription's dispatch task, one message at a
/// time in per-channel arrival order; a handler that blocks stalls
/// delivery for its own subscription only.
pub type MessageHandler = Box<dyn FnMut(Message) + Send + 'static>;

enum Control {
    Subscribe(Vec<String>, oneshot::Sender<Result<()>>),
    Unsubscribe(Vec<String>, oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<()>),
}

enum Push {
    Subscribed(String),
    Unsubscribed(String, i64),
    Message(Message),
}

/// A long-lived pub/sub session over a dedicated connection.
///
/// The connection is withdrawn from the pool's rotation for the life of
/// the session and rejoins general circulation only when the session
/// ends — through [`close`](Subscription::close) or by dropping the
/// handle.
pub struct Subscription {
    control: mpsc::Sender<Control>,
    dispatch: JoinHandle<()>,
}

impl Subscription {
    pub(crate) async fn open(
        pool: Arc<Pool>,
        handler: MessageHandler,
        channels: &[&str],
    ) -> Result<Subscription> {
        let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        let mut conn = pool.acquire().await?;

        let mut subscribed = HashSet::new();
        if !channels.is_empty() {
            if let Err(error) = handshake(&mut conn, &channels).await {
                // No dangling lease on a failed handshake: the slot
                // goes back empty and the connection is dropped.
                pool.release(None);
                return Err(error);
            }
            subscribed.extend(channels);
        }

        let (control, requests) = mpsc::channel(8);
        let dispatch = tokio::spawn(run_dispatch(conn, pool, handler, subscribed, requests));
        Ok(Subscription { control, dispatch })
    }

    /// Adds channels to the session. The server's confirmations are
    /// consumed by the dispatch task.
    pub async fn subscribe(&self, channels: &[&str]) -> Result<()> {
        self.request(channels, true).await
    }

    /// Removes channels from the session.
    pub async fn unsubscribe(&self, channels: &[&str]) -> Result<()> {
        self.request(channels, false).await
    }

    async fn request(&self, channels: &[&str], subscribe: bool) -> Result<()> {
        let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        let (ack, done) = oneshot::channel();
        let control = if subscribe {
            Control::Subscribe(channels, ack)
        } else {
            Control::Unsubscribe(channels, ack)
        };
        self.control
            .send(control)
            .await
            .map_err(|_| Error::protocol("subscription has ended"))?;
        done.await
            .map_err(|_| Error::protocol("subscription has ended"))?
    }

    /// Ends the session: unsubscribes everything, drains the
    /// confirmations, and returns the dedicated connection to the
    /// pool.
    pub async fn close(self) {
        let (ack, done) = oneshot::channel();
        if self.control.send(Control::Close(ack)).await.is_ok() {
            let _ = done.await;
        }
        let _ = self.dispatch.await;
    }
}

async fn handshake(conn: &mut Connection, channels: &[String]) -> Result<()> {
    conn.write_frame(&command::subscribe(channels).into_frame())
        .await?;
    for _ in channels {
        match parse_push(&conn.read_frame().await?)? {
            Push::Subscribed(_) => {}
            _ => return Err(Error::protocol("unexpected reply to subscribe")),
        }
    }
    Ok(())
}

async fn run_dispatch(
    mut conn: Connection,
    pool: Arc<Pool>,
    mut handler: MessageHandler,
    mut subscribed: HashSet<String>,
    mut requests: mpsc::Receiver<Control>,
) {
    loop {
        tokio::select! {
            inbound = conn.read_push() => {
                let frame = match inbound {
                    Ok(frame) => frame,
                    Err(error) => {
                        error!(%error, "subscription connection lost");
                        pool.release(None);
                        return;
                    }
                };
                match parse_push(&frame) {
                    Ok(Push::Message(message)) => handler(message),
                    Ok(Push::Subscribed(channel)) => {
                        subscribed.insert(channel);
                    }
                    Ok(Push::Unsubscribed(channel, _)) => {
                        subscribed.remove(&channel);
                    }
                    Err(error) => {
                        error!(%error, "subscription received unexpected frame");
                        pool.release(None);
                        return;
                    }
                }
            }
            request = requests.recv() => {
                match request {
                    Some(Control::Subscribe(channels, ack)) => {
                        let outcome = conn
                            .write_frame(&command::subscribe(&channels).into_frame())
                            .await;
                        let _ = ack.send(outcome);
                    }
                    Some(Control::Unsubscribe(channels, ack)) => {
                        let outcome = conn
                            .write_frame(&command::unsubscribe(&channels).into_frame())
                            .await;
                        let _ = ack.send(outcome);
                    }
                    Some(Control::Close(ack)) => {
                        retire(conn, &pool, &mut handler, &subscribed).await;
                        let _ = ack.send(());
                        return;
                    }
                    // Handle dropped without close(); the connection
                    // still rejoins the pool.
                    None => {
                        retire(conn, &pool, &mut handler, &subscribed).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn retire(
    mut conn: Connection,
    pool: &Pool,
    handler: &mut MessageHandler,
    subscribed: &HashSet<String>,
) {
    if subscribed.is_empty() {
        pool.release(Some(conn));
        return;
    }

    if let Err(error) = conn
        .write_frame(&command::unsubscribe(&[]).into_frame())
        .await
    {
        debug!(%error, "unsubscribe on close failed");
        pool.release(None);
        return;
    }

    // Drain until the server confirms the last channel is gone. Payload
    // messages racing the unsubscribe still reach the handler in order.
    loop {
        let frame = match conn.read_frame().await {
            Ok(frame) => frame,
            Err(error) => {
                debug!(%error, "drain on close failed");
                pool.release(None);
                return;
            }
        };
        match parse_push(&frame) {
            Ok(Push::Message(message)) => handler(message),
            Ok(Push::Unsubscribed(_, remaining)) if remaining == 0 => break,
            Ok(_) => {}
            Err(error) => {
                debug!(%error, "drain on close failed");
                pool.release(None);
                return;
            }
        }
    }
    pool.release(Some(conn));
}

fn parse_push(frame: &Frame) -> Result<Push> {
    if let Some(message) = frame.error_message() {
        return Err(Error::server(message));
    }
    let items = frame
        .as_array()
        .ok_or_else(|| Error::protocol("push frame is not an array"))?;
    let kind = items
        .first()
        .and_then(Frame::as_bytes)
        .ok_or_else(|| Error::protocol("push frame missing kind"))?;
    let channel = items.get(1).and_then(Frame::as_text).unwrap_or_default();

    if kind.eq_ignore_ascii_case(b"message") {
        let payload = items
            .get(2)
            .and_then(Frame::as_bytes)
            .ok_or_else(|| Error::protocol("message push missing payload"))?;
        Ok(Push::Message(Message { channel, payload }))
    } else if kind.eq_ignore_ascii_case(b"subscribe") {
        Ok(Push::Subscribed(channel))
    } else if kind.eq_ignore_ascii_case(b"unsubscribe") {
        let remaining = items.get(2).and_then(Frame::as_int).unwrap_or(0);
        Ok(Push::Unsubscribed(channel, remaining))
    } else {
        Err(Error::protocol("unexpected push kind"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_frame(kind: &str, channel: &str, third: Frame) -> Frame {
        Frame::Array(vec![
            Frame::Bulk(Bytes::copy_from_slice(kind.as_bytes())),
            Frame::Bulk(Bytes::copy_from_slice(channel.as_bytes())),
            third,
        ])
    }

    #[test]
    fn test_parse_message_push() {
        let frame = push_frame("message", "news", Frame::Bulk(Bytes::from("hello")));
        match parse_push(&frame).unwrap() {
            Push::Message(message) => {
                assert_eq!(message.channel, "news");
                assert_eq!(message.payload, Bytes::from("hello"));
            }
            _ => panic!("expected a payload message"),
        }
    }

    #[test]
    fn test_parse_subscribe_confirmation() {
        let frame = push_frame("subscribe", "news", Frame::Integer(1));
        assert!(matches!(
            parse_push(&frame).unwrap(),
            Push::Subscribed(channel) if channel == "news"
        ));
    }

    #[test]
    fn test_parse_unsubscribe_confirmation() {
        let frame = push_frame("unsubscribe", "news", Frame::Integer(0));
        assert!(matches!(
            parse_push(&frame).unwrap(),
            Push::Unsubscribed(channel, 0) if channel == "news"
        ));
    }

    #[test]
    fn test_parse_rejects_error_frames() {
        let frame = Frame::Error("ERR denied".to_string());
        assert!(matches!(parse_push(&frame), Err(Error::Server { .. })));
    }

    #[test]
    fn test_parse_rejects_non_push_frames() {
        assert!(parse_push(&Frame::Integer(1)).is_err());
        let frame = push_frame("pmessage", "news", Frame::Integer(1));
        assert!(parse_push(&frame).is_err());
    }
}
