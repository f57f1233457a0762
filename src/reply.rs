//! Handler and hook return values, and their coercion into a [`Response`].

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BoxError, Error};
use crate::response::Response;

/// Everything a handler or a reply-typed hook may produce.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// A finished response, sent unchanged.
    Response(Response),
    /// Sent verbatim as `text/plain`.
    Text(String),
    /// Sent verbatim without a `content-type`.
    Bytes(Bytes),
    /// Structured data; objects and arrays go out as JSON text.
    Json(Value),
}

impl Reply {
    /// Serializes `value` into a [`Reply::Json`].
    pub fn json(value: impl Serialize) -> Result<Self, Error> {
        serde_json::to_value(value).map(Self::Json).map_err(Error::Serialize)
    }

    /// `null` and `false` count as "no value" when a hook yields them.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Json(Value::Null | Value::Bool(false)))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Resolves a finished response back into the plain value it carries.
    ///
    /// A JSON body becomes [`Reply::Json`], other UTF-8 text [`Reply::Text`],
    /// anything else [`Reply::Bytes`]. Status and headers are discarded.
    /// Non-response values are returned unchanged.
    pub fn into_plain(self) -> Self {
        let res = match self {
            Self::Response(res) => res,
            other => return other,
        };
        if let Ok(value) = serde_json::from_slice::<Value>(&res.body) {
            return Self::Json(value);
        }
        match std::str::from_utf8(&res.body) {
            Ok(text) => Self::Text(text.to_owned()),
            Err(_) => Self::Bytes(res.body),
        }
    }

    /// Final coercion into a wire response.
    ///
    /// Checked in order: a finished response passes through; text and bytes
    /// become the body verbatim; objects and arrays are serialized as JSON
    /// (no `content-type` is added); any other JSON scalar is stringified.
    pub fn into_response(self) -> Response {
        match self {
            Self::Response(res) => res,
            Self::Text(text) => Response::text(text),
            Self::Bytes(bytes) => Response::bytes(bytes),
            Self::Json(Value::String(text)) => Response::text(text),
            Self::Json(value @ (Value::Object(_) | Value::Array(_))) => {
                Response::bytes(value.to_string())
            }
            Self::Json(scalar) => Response::text(scalar.to_string()),
        }
    }
}

impl From<Response> for Reply {
    fn from(res: Response) -> Self { Self::Response(res) }
}

impl From<String> for Reply {
    fn from(text: String) -> Self { Self::Text(text) }
}

impl From<&'static str> for Reply {
    fn from(text: &'static str) -> Self { Self::Text(text.to_owned()) }
}

impl From<Bytes> for Reply {
    fn from(bytes: Bytes) -> Self { Self::Bytes(bytes) }
}

impl From<Vec<u8>> for Reply {
    fn from(bytes: Vec<u8>) -> Self { Self::Bytes(bytes.into()) }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self { Self::Json(value) }
}

// ── Json ─────────────────────────────────────────────────────────────────────

/// Typed structured reply: `async fn get(_: Arc<Context>) -> Json<User>`.
#[derive(Clone, Debug)]
pub struct Json<T>(pub T);

// ── IntoReply ────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into a [`Reply`].
///
/// Returning `Err` from a handler sends the error down the `onError` path.
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, Error>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self) }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self.into()) }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self.into()) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self.into()) }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self.into()) }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self.into()) }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self.into()) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoReply for StatusCode {
    fn into_reply(self) -> Result<Reply, Error> { Ok(Response::status(self).into()) }
}

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Reply, Error> { Reply::json(self.0) }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError>,
{
    fn into_reply(self) -> Result<Reply, Error> {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => {
                let err: BoxError = err.into();
                // Keep nyxor errors intact so `onError` can match on them.
                match err.downcast::<Error>() {
                    Ok(err) => Err(*err),
                    Err(err) => Err(Error::Other(err)),
                }
            }
        }
    }
}
