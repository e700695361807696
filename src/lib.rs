//! # Poolis
//!
//! Pooled Redis client for Rust: bounded connection leasing, pipelined
//! batches, atomic MULTI/EXEC transactions, and pub/sub sessions with
//! handler dispatch.
//!
//! Connections are dialed lazily and leased from a bounded pool; every
//! operation releases its lease on every path, so the pool never leaks
//! capacity. The `async_*` operations return immediately with an
//! [`AsyncReply`] fulfilled by a background task.
//!
//! ## Example
//!
//! ```no_run
//! use poolis::{command, Client, Configuration};
//!
//! #[tokio::main]
//! async fn main() -> poolis::Result<()> {
//!     let client = Client::new(Configuration::default())?;
//!
//!     let reply = client.command(command::set("mykey", "hello")).await;
//!     assert!(reply.is_ok());
//!
//!     let pending = client.async_command(command::get("mykey"));
//!     let reply = pending.wait().await;
//!     println!("GET mykey: {:?}", reply.text());
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub(crate) mod core;
pub mod proto;

// Re-export the coordination layer types for convenience.
pub use crate::core::command::{self, Cmd};
pub use crate::core::config::{Configuration, DEFAULT_ADDRESS};
pub use crate::core::future::AsyncReply;
pub use crate::core::multi::MultiCommand;
pub use crate::core::pool::{AcquirePolicy, Pool};
pub use crate::core::reply::Reply;
pub use crate::core::subscription::{Message, MessageHandler, Subscription};
pub use crate::core::Client;
pub use crate::proto::error::{Error, Result};
