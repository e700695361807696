use std::time::Duration;

use url::Url;

use crate::proto::error::{Error, Result};

/// Endpoint used when neither an address nor a socket path is given.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";

pub(crate) const DEFAULT_POOL_SIZE: usize = 10;

/// Connection parameters for a [`Client`](crate::Client).
///
/// A configuration names exactly one endpoint: a TCP `address` in
/// `host:port` form, or a Unix socket `path`. Setting both is a
/// construction error; setting neither selects [`DEFAULT_ADDRESS`].
/// Validation and defaulting happen once, inside
/// [`Client::new`](crate::Client::new), never per command.
///
/// # Example
///
/// ```
/// use poolis::Configuration;
///
/// let config = Configuration {
///     address: Some("cache.internal:6379".to_string()),
///     pool_size: 4,
///     ..Default::default()
/// };
/// assert!(config.auth.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// TCP endpoint in `host:port` form.
    pub address: Option<String>,
    /// Unix socket path, mutually exclusive with `address`.
    pub path: Option<String>,
    /// Logical database selected after connecting. Negative values are
    /// coerced to 0.
    pub database: i64,
    /// Password sent with AUTH during the handshake.
    pub auth: Option<String>,
    /// Upper bound on simultaneously leased connections. Zero is
    /// coerced to 10.
    pub pool_size: usize,
    /// Bound applied to connecting and to each command round trip.
    pub timeout: Option<Duration>,
    /// Disables retrying commands while the server reports that it is
    /// still loading its dataset.
    pub no_loading_retry: bool,
}

impl Configuration {
    /// Builds a configuration from a `redis://` URL.
    ///
    /// Recognized parts: host, port (default 6379), password, and a
    /// single path segment naming the database index, e.g.
    /// `redis://:secret@localhost:6380/3`.
    pub fn from_url(input: &str) -> Result<Self> {
        let parsed =
            Url::parse(input).map_err(|_| Error::config("invalid connection url"))?;

        if parsed.scheme() != "redis" {
            return Err(Error::config("invalid scheme, expected redis://"));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::config("missing host in connection url"))?;
        let port = parsed.port().unwrap_or(6379);

        let database = match parsed.path().trim_matches('/') {
            "" => 0,
            segment => segment
                .parse::<i64>()
                .map_err(|_| Error::config("database segment is not a number"))?,
        };

        Ok(Self {
            address: Some(format!("{}:{}", host, port)),
            database,
            auth: parsed.password().map(str::to_string),
            ..Default::default()
        })
    }

    /// Validates the endpoint choice and fills defaults. Called once
    /// when the client is constructed.
    pub(crate) fn normalized(mut self) -> Result<Self> {
        if self.address.is_some() && self.path.is_some() {
            return Err(Error::config(
                "both tcp address and unix socket path are set",
            ));
        }

        if self.address.is_none() && self.path.is_none() {
            self.address = Some(DEFAULT_ADDRESS.to_string());
        }
        if self.database < 0 {
            self.database = 0;
        }
        if self.pool_size == 0 {
            self.pool_size = DEFAULT_POOL_SIZE;
        }

        Ok(self)
    }
}
