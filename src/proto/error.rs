use std::io;

use thiserror::Error;

/// Result type alias for poolis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client, the pool, and the wire codec.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred on a connection.
    #[error("io error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The peer sent data that does not form a valid frame, or closed
    /// the connection mid-frame.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// The server answered a command with an error reply.
    #[error("server error: {message}")]
    Server {
        /// Error message from the server.
        message: String,
    },

    /// Authentication was rejected during the connection handshake.
    #[error("authentication failed")]
    Auth,

    /// The configuration is contradictory or unusable. Surfaces only
    /// from [`Client::new`](crate::Client::new) and
    /// [`Configuration::from_url`](crate::Configuration::from_url).
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Every pool slot is leased and the pool was asked not to wait.
    #[error("no idle connection available")]
    PoolExhausted,

    /// The pool has been torn down and cannot lease connections.
    #[error("connection pool is closed")]
    PoolClosed,

    /// A connect, read, or write did not finish within the configured
    /// timeout.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn server(message: impl Into<String>) -> Self {
        Error::Server {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// True when the connection the error occurred on can no longer be
    /// trusted to frame replies correctly and must be discarded instead
    /// of returned to the pool.
    pub(crate) fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::Protocol { .. } | Error::Timeout
        )
    }
}
