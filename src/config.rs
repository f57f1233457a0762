//! Server configuration and listen options.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::server::ServerHandle;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_HOSTNAME: &str = "0.0.0.0";

/// Process-wide settings for one [`App`](crate::App).
///
/// Every field has a default, so a partial TOML document is enough:
///
/// ```rust
/// let config = nyxor::ServerConfig::from_toml(r#"
///     port = 3000
///     prefix = "/api"
/// "#).unwrap();
/// assert_eq!(config.hostname, "0.0.0.0");
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    /// Prepended to every route path registered after construction.
    pub prefix: Option<String>,
    /// Deadline for one request's pipeline, hooks and handler included.
    pub request_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            hostname: DEFAULT_HOSTNAME.to_owned(),
            prefix: None,
            request_timeout_ms: None,
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// `prefix + path`, with exactly one `/` at the seam.
    pub(crate) fn route_path(&self, path: &str) -> String {
        match self.prefix.as_deref().map(|p| p.trim_end_matches('/')) {
            Some(prefix) if !prefix.is_empty() => {
                format!("{prefix}/{}", path.trim_start_matches('/'))
            }
            _ => path.to_owned(),
        }
    }
}

type ReadyCallback = Box<dyn FnOnce(&ServerHandle) + Send + 'static>;

/// Options for [`App::listen`](crate::App::listen).
///
/// Anything left unset falls back to the app's [`ServerConfig`].
///
/// ```rust
/// use nyxor::Listen;
///
/// let opts = Listen::new()
///     .port(3000)
///     .hostname("127.0.0.1")
///     .on_ready(|server| println!("listening on {}", server.local_addr()));
/// ```
#[derive(Default)]
pub struct Listen {
    pub(crate) port: Option<u16>,
    pub(crate) hostname: Option<String>,
    pub(crate) on_ready: Option<ReadyCallback>,
}

impl Listen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Called exactly once, after the listener is bound and `onStart` ran.
    pub fn on_ready(mut self, f: impl FnOnce(&ServerHandle) + Send + 'static) -> Self {
        self.on_ready = Some(Box::new(f));
        self
    }
}

impl From<u16> for Listen {
    fn from(port: u16) -> Self {
        Self::new().port(port)
    }
}

impl fmt::Debug for Listen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listen")
            .field("port", &self.port)
            .field("hostname", &self.hostname)
            .field("on_ready", &self.on_ready.is_some())
            .finish()
    }
}
