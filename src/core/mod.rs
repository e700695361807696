//! The coordination layer: configuration, connection leasing, command
//! execution, batching, and subscriptions.
//!
//! ## Modules
//!
//! - [`config`] - Connection parameters and defaulting
//! - [`pool`] - Bounded connection leasing
//! - [`command`] - Command builders
//! - [`reply`] - Command outcomes
//! - [`future`] - Asynchronous reply handles
//! - [`multi`] - Batches and transactions
//! - [`subscription`] - Pub/sub sessions

#![warn(missing_docs)]

/// Command construction helpers.
pub mod command;
/// Connection parameters and defaulting.
pub mod config;
pub(crate) mod connection;
/// Asynchronous reply handles.
pub mod future;
/// Batches and transactions.
pub mod multi;
/// Bounded connection leasing.
pub mod pool;
/// Command outcomes.
pub mod reply;
/// Pub/sub sessions.
pub mod subscription;

use std::sync::Arc;

use crate::core::command::Cmd;
use crate::core::config::Configuration;
use crate::core::future::AsyncReply;
use crate::core::multi::MultiCommand;
use crate::core::pool::{AcquirePolicy, Pool};
use crate::core::reply::Reply;
use crate::core::subscription::{Message, Subscription};
use crate::proto::error::Result;

/// Access point to the store: owns the configuration and the pool,
/// holds no per-command state.
///
/// Cloning is cheap and shares the pool, so one client can serve any
/// number of tasks. Every operation leases a connection for exactly its
/// own duration and releases it on every path, success or error.
///
/// # Example
///
/// ```no_run
/// use poolis::{command, Client, Configuration};
///
/// #[tokio::main]
/// async fn main() -> poolis::Result<()> {
///     let client = Client::new(Configuration::default())?;
///     let reply = client.command(command::set("greeting", "hello")).await;
///     assert!(reply.is_ok());
///     let reply = client.command(command::get("greeting")).await;
///     println!("{:?}", reply.text());
///     client.close().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<Configuration>,
    pool: Arc<Pool>,
}

impl Client {
    /// Creates a client, validating the configuration and filling its
    /// defaults once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) when both the
    /// TCP address and the Unix socket path are set. No connection is
    /// dialed here; dialing happens lazily on first use.
    pub fn new(config: Configuration) -> Result<Self> {
        Self::with_acquire_policy(config, AcquirePolicy::default())
    }

    /// Creates a client whose pool applies `policy` when every slot is
    /// leased.
    pub fn with_acquire_policy(config: Configuration, policy: AcquirePolicy) -> Result<Self> {
        let config = Arc::new(config.normalized()?);
        let pool = Arc::new(Pool::from_shared(config.clone(), policy));
        Ok(Self { config, pool })
    }

    /// The validated configuration this client runs with.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Executes one command and waits for its reply.
    ///
    /// If no connection can be leased the reply carries the
    /// acquisition error and nothing touches the wire. Otherwise the
    /// leased connection is released back to the pool on both success
    /// and failure before this returns — reusable connections as
    /// themselves, poisoned ones as an empty slot.
    pub async fn command(&self, cmd: Cmd) -> Reply {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(error) => return Reply::err(error),
        };
        match conn.execute(cmd).await {
            Ok(frame) => {
                self.pool.release(Some(conn));
                Reply::from_frame(frame)
            }
            Err(error) => {
                if error.poisons_connection() {
                    self.pool.release(None);
                } else {
                    self.pool.release(Some(conn));
                }
                Reply::err(error)
            }
        }
    }

    /// Executes one command in the background.
    ///
    /// Returns immediately; one spawned task performs the equivalent of
    /// [`command`](Client::command) and fulfills the handle exactly
    /// once. Callers beyond pool capacity wait inside the spawned task,
    /// never here. Discarding the handle discards only the reply — the
    /// work still completes and its connection is still released.
    pub fn async_command(&self, cmd: Cmd) -> AsyncReply {
        let handle = AsyncReply::new();
        let fulfill = handle.clone();
        let client = self.clone();
        tokio::spawn(async move {
            fulfill.fulfill(client.command(cmd).await);
        });
        handle
    }

    /// Queues commands via `build` and sends them as one pipelined
    /// batch over a single leased connection.
    ///
    /// The reply is array-valued, one element per queued command, with
    /// per-command error replies embedded as elements.
    pub async fn multi_command<F>(&self, build: F) -> Reply
    where
        F: FnOnce(&mut MultiCommand),
    {
        self.run_batch(false, build).await
    }

    /// Like [`multi_command`](Client::multi_command), but bracketed by
    /// MULTI/EXEC so that either every queued command takes effect or
    /// none does.
    ///
    /// A rejected queueing triggers exactly one DISCARD and the reply
    /// carries the rejection; a failed or aborted EXEC yields an error
    /// reply with nothing committed.
    pub async fn transaction<F>(&self, build: F) -> Reply
    where
        F: FnOnce(&mut MultiCommand),
    {
        self.run_batch(true, build).await
    }

    /// Runs [`multi_command`](Client::multi_command) in the background.
    pub fn async_multi_command<F>(&self, build: F) -> AsyncReply
    where
        F: FnOnce(&mut MultiCommand) + Send + 'static,
    {
        let handle = AsyncReply::new();
        let fulfill = handle.clone();
        let client = self.clone();
        tokio::spawn(async move {
            fulfill.fulfill(client.multi_command(build).await);
        });
        handle
    }

    /// Runs [`transaction`](Client::transaction) in the background.
    pub fn async_transaction<F>(&self, build: F) -> AsyncReply
    where
        F: FnOnce(&mut MultiCommand) + Send + 'static,
    {
        let handle = AsyncReply::new();
        let fulfill = handle.clone();
        let client = self.clone();
        tokio::spawn(async move {
            fulfill.fulfill(client.transaction(build).await);
        });
        handle
    }

    async fn run_batch<F>(&self, transactional: bool, build: F) -> Reply
    where
        F: FnOnce(&mut MultiCommand),
    {
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(error) => return Reply::err(error),
        };

        let mut batch = MultiCommand::new();
        build(&mut batch);

        let outcome = if transactional {
            batch.send_transactional(&mut conn).await
        } else {
            batch.send(&mut conn).await
        };
        match outcome {
            Ok(frame) => {
                self.pool.release(Some(conn));
                Reply::from_frame(frame)
            }
            Err(error) => {
                if error.poisons_connection() {
                    self.pool.release(None);
                } else {
                    self.pool.release(Some(conn));
                }
                Reply::err(error)
            }
        }
    }

    /// Opens a pub/sub session subscribed to `channels`.
    ///
    /// A dedicated connection is withdrawn from the pool for the life
    /// of the session; `handler` runs once per inbound message, in
    /// per-channel arrival order. A failed subscribe handshake is
    /// returned as an error and releases the withdrawn slot.
    pub async fn subscription<H>(&self, handler: H, channels: &[&str]) -> Result<Subscription>
    where
        H: FnMut(Message) + Send + 'static,
    {
        Subscription::open(self.pool.clone(), Box::new(handler), channels).await
    }

    /// Drains the pool and closes the idle connections it holds,
    /// returning how many slots were drained.
    ///
    /// Stops after `pool_size` drains or on the first slot that cannot
    /// be taken, so it terminates in bounded steps and closes at most
    /// `pool_size` connections. Known limitation: connections leased by
    /// in-flight operations are neither waited for nor closed here —
    /// their release re-enters the drained pool, and racing releases
    /// during the drain can leave stragglers open.
    pub async fn close(&self) -> usize {
        let mut drained = 0;
        while drained < self.config.pool_size {
            match self.pool.take_idle().await {
                Ok(slot) => {
                    drained += 1;
                    if let Some(conn) = slot {
                        conn.shutdown().await;
                    }
                }
                Err(_) => break,
            }
        }
        drained
    }
}
