//! Unified error type.

use std::time::Duration;

/// Boxed error accepted from handlers and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout nyxor.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by nyxor's fallible operations.
///
/// Routing misses are not errors: they become a `404` response directly.
/// Everything else that goes wrong while a request is in flight ends up here
/// and is handed to the `onError` hook chain.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding or accepting on the listener failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The request body could not be read from the transport.
    #[error("failed to read request body: {0}")]
    Body(#[source] BoxError),

    /// `application/json` body that is not valid JSON.
    #[error("malformed json body: {0}")]
    Json(#[from] serde_json::Error),

    /// A handler's value could not be serialized into a JSON reply.
    #[error("failed to serialize reply: {0}")]
    Serialize(#[source] serde_json::Error),

    /// `multipart/form-data` body that could not be decoded.
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] multer::Error),

    /// The request target and `Host` header do not form a valid URL.
    #[error("malformed request url: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration text could not be deserialized.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// The request pipeline did not finish before the configured deadline.
    #[error("request exceeded deadline of {0:?}")]
    Timeout(Duration),

    /// Failure raised by application code (a handler or a hook).
    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Wraps an application failure so it can be returned from a handler or hook.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }
}
