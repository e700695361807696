use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

use crate::core::command::{self, Cmd};
use crate::core::config::Configuration;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

const READ_CHUNK: usize = 4096;
const LOADING_RETRY_DELAY: Duration = Duration::from_millis(250);
const LOADING_RETRY_ATTEMPTS: u32 = 8;

/// An exclusively owned connection to the store.
///
/// At any instant a connection is idle in the pool, leased to one
/// caller, or dedicated to a subscription; it is never shared. Dialing
/// happens lazily, on the first lease of an empty pool slot, and runs
/// the AUTH / SELECT handshake before the connection is handed out.
pub(crate) struct Connection {
    transport: Transport,
    decoder: Decoder,
    encoder: Encoder,
    timeout: Option<Duration>,
    loading_retry: bool,
}

enum Transport {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Transport {
    async fn dial(config: &Configuration) -> Result<Self> {
        let limit = config.timeout;
        if let Some(address) = &config.address {
            let stream = bounded(limit, async { Ok(TcpStream::connect(address).await?) }).await?;
            return Ok(Transport::Tcp(stream));
        }
        if let Some(path) = &config.path {
            #[cfg(unix)]
            {
                let stream =
                    bounded(limit, async { Ok(UnixStream::connect(path).await?) }).await?;
                return Ok(Transport::Unix(stream));
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err(Error::config("unix socket paths need a unix platform"));
            }
        }
        Err(Error::config("no endpoint configured"))
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(stream) => stream.read(buf).await,
            #[cfg(unix)]
            Transport::Unix(stream) => stream.read(buf).await,
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Transport::Tcp(stream) => stream.write_all(data).await,
            #[cfg(unix)]
            Transport::Unix(stream) => stream.write_all(data).await,
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Transport::Tcp(stream) => stream.shutdown().await,
            #[cfg(unix)]
            Transport::Unix(stream) => stream.shutdown().await,
        }
    }
}

impl Connection {
    /// Dials the configured endpoint and runs the handshake.
    pub(crate) async fn connect(config: &Configuration) -> Result<Self> {
        let transport = Transport::dial(config).await?;
        let mut conn = Self {
            transport,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            timeout: config.timeout,
            loading_retry: !config.no_loading_retry,
        };
        conn.handshake(config).await?;
        Ok(conn)
    }

    async fn handshake(&mut self, config: &Configuration) -> Result<()> {
        if let Some(password) = &config.auth {
            let reply = self.execute(command::auth(password.clone())).await?;
            if reply.error_message().is_some() {
                return Err(Error::Auth);
            }
        }
        if config.database > 0 {
            let reply = self.execute(command::select(config.database)).await?;
            if let Some(message) = reply.error_message() {
                return Err(Error::server(message));
            }
        }
        Ok(())
    }

    /// Runs one command round trip on this connection.
    ///
    /// While the server reports it is still loading its dataset, the
    /// round trip is repeated a bounded number of times unless the
    /// configuration disables the retry; the last reply wins either
    /// way. Error replies are returned as frames, not as `Err` — only
    /// transport and framing failures are errors here.
    pub(crate) async fn execute(&mut self, cmd: Cmd) -> Result<Frame> {
        let frame = cmd.into_frame();
        let mut attempts = 0;
        loop {
            self.write_frame(&frame).await?;
            let reply = self.read_frame().await?;
            if self.loading_retry && attempts < LOADING_RETRY_ATTEMPTS && is_loading(&reply) {
                attempts += 1;
                debug!(attempts, "server loading dataset, retrying command");
                tokio::time::sleep(LOADING_RETRY_DELAY).await;
                continue;
            }
            return Ok(reply);
        }
    }

    pub(crate) async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.encoder.encode(frame);
        let data = self.encoder.take();
        let limit = self.timeout;
        bounded(limit, async {
            self.transport.write_all(&data).await?;
            Ok(())
        })
        .await
    }

    /// Reads the next frame within the configured timeout.
    pub(crate) async fn read_frame(&mut self) -> Result<Frame> {
        let limit = self.timeout;
        self.read_frame_inner(limit).await
    }

    /// Reads the next frame with no deadline. Subscription sessions
    /// idle between pushes for arbitrarily long.
    pub(crate) async fn read_push(&mut self) -> Result<Frame> {
        self.read_frame_inner(None).await
    }

    async fn read_frame_inner(&mut self, limit: Option<Duration>) -> Result<Frame> {
        bounded(limit, async {
            loop {
                if let Some(frame) = self.decoder.decode()? {
                    return Ok(frame);
                }
                let mut chunk = [0u8; READ_CHUNK];
                let n = self.transport.read(&mut chunk).await?;
                if n == 0 {
                    return Err(Error::protocol("connection closed by peer"));
                }
                self.decoder.append(&chunk[..n]);
            }
        })
        .await
    }

    /// Closes the connection, flushing nothing.
    pub(crate) async fn shutdown(mut self) {
        if let Err(error) = self.transport.shutdown().await {
            debug!(%error, "connection shutdown failed");
        }
    }
}

fn is_loading(frame: &Frame) -> bool {
    matches!(frame.error_message(), Some(message) if message.starts_with("LOADING"))
}

async fn bounded<T>(limit: Option<Duration>, work: impl Future<Output = Result<T>>) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| Error::Timeout)?,
        None => work.await,
    }
}
