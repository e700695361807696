use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

use crate::core::reply::Reply;

/// A single-assignment container for the [`Reply`] of a command running
/// in the background.
///
/// Returned immediately by the `async_*` client operations; the spawned
/// work fulfills it exactly once. Reading is safe concurrently with
/// fulfillment and may happen any number of times — every [`wait`]
/// after fulfillment resolves instantly with the same reply. A handle
/// that is never read does not hold up the background work or its
/// connection.
///
/// [`wait`]: AsyncReply::wait
#[derive(Clone)]
pub struct AsyncReply {
    shared: Arc<Shared>,
}

struct Shared {
    cell: OnceLock<Reply>,
    ready: Notify,
}

impl AsyncReply {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cell: OnceLock::new(),
                ready: Notify::new(),
            }),
        }
    }

    /// Writes the reply. Only the first fulfillment takes effect.
    pub(crate) fn fulfill(&self, reply: Reply) {
        if self.shared.cell.set(reply).is_ok() {
            self.shared.ready.notify_waiters();
        }
    }

    /// Waits for fulfillment and returns the reply.
    pub async fn wait(&self) -> Reply {
        loop {
            let pending = self.shared.ready.notified();
            tokio::pin!(pending);
            // Register before re-checking so a fulfillment between the
            // check and the await cannot be missed.
            pending.as_mut().enable();
            if let Some(reply) = self.shared.cell.get() {
                return reply.clone();
            }
            pending.await;
        }
    }

    /// Returns the reply if it has already been written.
    pub fn try_reply(&self) -> Option<Reply> {
        self.shared.cell.get().cloned()
    }
}

impl fmt::Debug for AsyncReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncReply")
            .field("fulfilled", &self.shared.cell.get().is_some())
            .finish()
    }
}
