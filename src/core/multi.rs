use crate::core::command::{self, Cmd};
use crate::core::connection::Connection;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// An ordered batch of commands bound to one leased connection.
///
/// The build callback passed to the batch entry points queues commands
/// here without sending anything; the accumulated sequence goes out in
/// one piece once the callback returns. A batch is consumed by sending
/// it, and its connection is released by the client on every terminal
/// outcome.
///
/// # Example
///
/// ```no_run
/// use poolis::{command, Client, Configuration};
///
/// # #[tokio::main]
/// # async fn main() -> poolis::Result<()> {
/// let client = Client::new(Configuration::default())?;
/// let reply = client
///     .transaction(|batch| {
///         batch.queue(command::set("a", "1"));
///         batch.queue(command::set("b", "2"));
///     })
///     .await;
/// assert!(reply.is_ok());
/// # Ok(())
/// # }
/// ```
pub struct MultiCommand {
    queued: Vec<Cmd>,
}

impl MultiCommand {
    pub(crate) fn new() -> Self {
        Self { queued: Vec::new() }
    }

    /// Appends a command to the batch.
    pub fn queue(&mut self, cmd: Cmd) {
        self.queued.push(cmd);
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// True when nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Sends the batch as one pipelined write and collects the replies
    /// into an array frame. Per-command error replies stay embedded as
    /// elements; only transport failures are errors.
    pub(crate) async fn send(self, conn: &mut Connection) -> Result<Frame> {
        let count = self.queued.len();
        if count == 0 {
            return Ok(Frame::Array(Vec::new()));
        }

        for cmd in self.queued {
            conn.write_frame(&cmd.into_frame()).await?;
        }
        let mut replies = Vec::with_capacity(count);
        for _ in 0..count {
            replies.push(conn.read_frame().await?);
        }
        Ok(Frame::Array(replies))
    }

    /// Sends the batch bracketed by MULTI/EXEC.
    ///
    /// Each queueing reply is checked; the first rejection rolls the
    /// batch back with a single DISCARD and surfaces the rejection, so
    /// EXEC is never issued for a partially accepted queue. A null EXEC
    /// reply means the server aborted the transaction.
    pub(crate) async fn send_transactional(self, conn: &mut Connection) -> Result<Frame> {
        if self.queued.is_empty() {
            return Ok(Frame::Array(Vec::new()));
        }

        let opened = conn.execute(command::multi()).await?;
        if let Some(message) = opened.error_message() {
            return Err(Error::server(message));
        }

        for cmd in self.queued {
            let queued = conn.execute(cmd).await?;
            if let Some(message) = queued.error_message() {
                let rejection = message.to_string();
                let discarded = conn.execute(command::discard()).await?;
                if let Some(message) = discarded.error_message() {
                    return Err(Error::server(message));
                }
                return Err(Error::server(rejection));
            }
        }

        let committed = conn.execute(command::exec()).await?;
        if let Some(message) = committed.error_message() {
            return Err(Error::server(message));
        }
        if committed.is_null() {
            return Err(Error::server("transaction aborted by the server"));
        }
        Ok(committed)
    }
}
