//! In-process scripted server for end-to-end tests.
//!
//! Binds an ephemeral TCP port, decodes incoming command frames, and
//! answers each command with whatever frames the test's responder
//! returns. No live store is involved anywhere in the test suite.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use poolis::proto::codec::{Decoder, Encoder};
use poolis::proto::frame::Frame;
use poolis::Configuration;

/// Commands the server has seen, in arrival order, as argument lists.
pub type CommandLog = Arc<Mutex<Vec<Vec<String>>>>;

type Responder = Arc<dyn Fn(&[String]) -> Vec<Frame> + Send + Sync>;

pub struct FakeServer {
    address: String,
    log: CommandLog,
    accepted: Arc<AtomicUsize>,
}

impl FakeServer {
    /// Starts a server that answers every decoded command through
    /// `respond`.
    pub async fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&[String]) -> Vec<Frame> + Send + Sync + 'static,
    {
        Self::spawn_with_delay(Duration::ZERO, respond).await
    }

    /// Same, but sleeps `delay` before answering each command, to make
    /// leasing overlap observable.
    pub async fn spawn_with_delay<F>(delay: Duration, respond: F) -> Self
    where
        F: Fn(&[String]) -> Vec<Frame> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let log: CommandLog = Arc::default();
        let accepted = Arc::new(AtomicUsize::new(0));
        let respond: Responder = Arc::new(respond);

        let conn_log = log.clone();
        let conn_count = accepted.clone();
        tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                conn_count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, conn_log.clone(), respond.clone(), delay));
            }
        });

        Self {
            address,
            log,
            accepted,
        }
    }

    /// A configuration pointing a client at this server.
    pub fn configuration(&self) -> Configuration {
        Configuration {
            address: Some(self.address.clone()),
            ..Default::default()
        }
    }

    /// Everything received so far, as argument lists.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().clone()
    }

    /// The command names received so far, uppercased.
    pub fn names(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter_map(|args| args.first())
            .map(|name| name.to_ascii_uppercase())
            .collect()
    }

    /// How many connections the server has accepted.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn serve(mut socket: TcpStream, log: CommandLog, respond: Responder, delay: Duration) {
    let mut decoder = Decoder::new();
    let mut encoder = Encoder::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.append(&buf[..n]);

        while let Ok(Some(frame)) = decoder.decode() {
            let args = frame_args(&frame);
            log.lock().unwrap().push(args.clone());

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            for reply in respond(&args) {
                encoder.encode(&reply);
            }
            let data = encoder.take();
            if !data.is_empty() && socket.write_all(&data).await.is_err() {
                return;
            }
        }
    }
}

fn frame_args(frame: &Frame) -> Vec<String> {
    frame
        .as_array()
        .map(|items| items.iter().filter_map(Frame::as_text).collect())
        .unwrap_or_default()
}

pub fn status(text: &str) -> Frame {
    Frame::Status(Bytes::copy_from_slice(text.as_bytes()))
}

pub fn bulk(text: &str) -> Frame {
    Frame::Bulk(Bytes::copy_from_slice(text.as_bytes()))
}

pub fn int(value: i64) -> Frame {
    Frame::Integer(value)
}

pub fn server_err(message: &str) -> Frame {
    Frame::Error(message.to_string())
}

pub fn nil() -> Frame {
    Frame::Null
}

/// A `subscribe` confirmation push.
pub fn subscribed(channel: &str, count: i64) -> Frame {
    Frame::Array(vec![bulk("subscribe"), bulk(channel), int(count)])
}

/// An `unsubscribe` confirmation push.
pub fn unsubscribed(channel: &str, remaining: i64) -> Frame {
    Frame::Array(vec![bulk("unsubscribe"), bulk(channel), int(remaining)])
}

/// A payload message push.
pub fn push_message(channel: &str, payload: &str) -> Frame {
    Frame::Array(vec![bulk("message"), bulk(channel), bulk(payload)])
}
