use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::config::Configuration;
use crate::core::connection::Connection;
use crate::proto::error::{Error, Result};

/// How [`Pool::acquire`] behaves while every slot is leased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquirePolicy {
    /// Wait until another caller releases a slot.
    #[default]
    Wait,
    /// Fail immediately with [`Error::PoolExhausted`].
    NoWait,
}

/// A bounded pool of reusable connections.
///
/// The pool is a channel of `pool_size` slots, each holding an idle
/// connection or nothing. Leasing takes a slot; an empty slot dials a
/// fresh connection on the way out, so connections come into existence
/// lazily and the number of simultaneously leased connections can never
/// exceed `pool_size`. Releasing puts a slot back — with the connection
/// for reuse, or empty when the connection was discarded.
pub struct Pool {
    config: Arc<Configuration>,
    policy: AcquirePolicy,
    slots: mpsc::Sender<Option<Connection>>,
    idle: Mutex<mpsc::Receiver<Option<Connection>>>,
}

impl Pool {
    /// Creates a pool for `config`, validating it and filling its
    /// defaults the same way [`Client::new`](crate::Client::new) does.
    pub fn new(config: Configuration, policy: AcquirePolicy) -> Result<Self> {
        Ok(Self::from_shared(Arc::new(config.normalized()?), policy))
    }

    pub(crate) fn from_shared(config: Arc<Configuration>, policy: AcquirePolicy) -> Self {
        let size = config.pool_size;
        let (slots, idle) = mpsc::channel(size);
        for _ in 0..size {
            slots
                .try_send(None)
                .expect("pool channel sized to pool_size");
        }
        Self {
            config,
            policy,
            slots,
            idle: Mutex::new(idle),
        }
    }

    /// Leases a connection, dialing one if the taken slot is empty.
    ///
    /// When the dial fails the slot is returned before the error
    /// propagates, so a failed lease never costs capacity.
    pub async fn acquire(&self) -> Result<Connection> {
        match self.take_slot(self.policy).await? {
            Some(conn) => Ok(conn),
            None => match Connection::connect(&self.config).await {
                Ok(conn) => Ok(conn),
                Err(error) => {
                    self.release(None);
                    Err(error)
                }
            },
        }
    }

    /// Returns a slot to the pool: `Some` to offer the connection for
    /// reuse, `None` to record that the leased connection was
    /// discarded. Exactly one release per lease.
    pub fn release(&self, conn: Option<Connection>) {
        if self.slots.try_send(conn).is_err() {
            debug!("released slot dropped: pool is gone");
        }
    }

    /// Takes one slot without waiting and without dialing. Used by the
    /// draining close.
    pub(crate) async fn take_idle(&self) -> Result<Option<Connection>> {
        self.take_slot(AcquirePolicy::NoWait).await
    }

    async fn take_slot(&self, policy: AcquirePolicy) -> Result<Option<Connection>> {
        let mut idle = self.idle.lock().await;
        match policy {
            AcquirePolicy::Wait => idle.recv().await.ok_or(Error::PoolClosed),
            AcquirePolicy::NoWait => match idle.try_recv() {
                Ok(slot) => Ok(slot),
                Err(TryRecvError::Empty) => Err(Error::PoolExhausted),
                Err(TryRecvError::Disconnected) => Err(Error::PoolClosed),
            },
        }
    }
}
