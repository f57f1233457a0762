//! Incoming HTTP request as handed over by the transport.

use bytes::Bytes;
use http::{HeaderMap, Uri, Version};
use http_body_util::BodyExt;

use crate::error::{BoxError, Error};

/// The raw request behind a [`Context`](crate::Context).
///
/// The body is read into memory once, before any parse hook runs, so every
/// hook and the default parsers see the same bytes instead of a half-read
/// stream. Hooks and handlers get read-only access through
/// [`Context::request`](crate::Context::request).
#[derive(Debug)]
pub struct RawRequest {
    method: http::Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl RawRequest {
    /// Splits an `http::Request` and collects its body.
    pub async fn from_http<B>(req: http::Request<B>) -> Result<Self, Error>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Error::Body(e.into()))?
            .to_bytes();

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
        })
    }

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Header lookup. Values that are not valid UTF-8 are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
