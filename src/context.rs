//! Per-request context and its construction.
//!
//! A [`Context`] is assembled once per request. Each part (body, params,
//! query, headers, cookies) asks its `onParse*` hook chain first and falls
//! back to the [`parse`](crate::parse) default only when the chain yields
//! nothing. The finished context is offered to `onTransformCtx`, whose
//! result, if any, replaces it for everything downstream.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::error::Error;
use crate::hooks::Hooks;
use crate::method::Method;
use crate::parse;
use crate::request::RawRequest;

/// Query-string style mapping shared by the URL query and form bodies.
pub type Query = HashMap<String, QueryValue>;

/// One query key's value(s).
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// The value when the key was given exactly once.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v.as_str()),
            Self::Many(_) => None,
        }
    }

    /// The last value given for the key.
    pub fn last(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v.as_str()),
            Self::Many(vs) => vs.last().map(String::as_str),
        }
    }

    pub(crate) fn push(&mut self, value: String) {
        match self {
            Self::One(first) => *self = Self::Many(vec![std::mem::take(first), value]),
            Self::Many(vs) => vs.push(value),
        }
    }
}

/// Decoded request body. The variant follows the negotiated content type.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
    /// Bodyless method, missing or unsupported content type.
    #[default]
    Empty,
    /// `application/json`
    Json(serde_json::Value),
    /// `text/plain`
    Text(String),
    /// `application/x-www-form-urlencoded`
    Form(Query),
    /// `application/octet-stream`
    Bytes(Bytes),
    /// `multipart/form-data`
    Multipart(HashMap<String, FormField>),
}

/// A multipart field: one part, or every part submitted under the same name.
#[derive(Clone, Debug, PartialEq)]
pub enum FormField {
    One(Part),
    Many(Vec<Part>),
}

/// A single multipart part.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Part {
    /// The part's data when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// URL decomposition of the request target.
///
/// Relative targets are resolved against the `Host` header. `pathname` is
/// always the path of the request target as received. `port` is empty
/// when the scheme's default port is in use; `hash` is empty unless the
/// target carried a fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub origin: String,
    pub href: String,
    pub protocol: String,
    pub host: String,
    pub hostname: String,
    pub port: String,
    pub pathname: String,
    pub hash: String,
    /// The request target exactly as received.
    pub url: String,
}

impl UrlParts {
    fn from_request(raw: &RawRequest) -> Result<(Self, url::Url), Error> {
        let uri = raw.uri();
        let absolute = if uri.scheme().is_some() && uri.authority().is_some() {
            url::Url::parse(&uri.to_string())?
        } else {
            let host = match raw.header("host") {
                Some(host) => plain_authority(host)?,
                None => uri.authority().map_or("localhost", |a| a.as_str()),
            };
            let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
            url::Url::parse(&format!("http://{host}{target}"))?
        };

        let hostname = absolute.host_str().unwrap_or_default().to_owned();
        let port = absolute.port().map(|p| p.to_string()).unwrap_or_default();
        let host = if port.is_empty() { hostname.clone() } else { format!("{hostname}:{port}") };

        let parts = Self {
            origin: absolute.origin().ascii_serialization(),
            href: absolute.as_str().to_owned(),
            protocol: format!("{}:", absolute.scheme()),
            host,
            hostname,
            port,
            pathname: uri.path().to_owned(),
            hash: absolute.fragment().map(|f| format!("#{f}")).unwrap_or_default(),
            url: uri.to_string(),
        };
        Ok((parts, absolute))
    }
}

/// Accepts a `Host` value only when it is a bare `host[:port]`.
fn plain_authority(host: &str) -> Result<&str, Error> {
    match host.parse::<http::uri::Authority>() {
        Ok(authority) if !authority.as_str().contains('@') => Ok(host),
        _ => Err(Error::Url(url::ParseError::InvalidDomainCharacter)),
    }
}

/// Everything a hook or handler knows about the request.
///
/// Fields are public so an `onTransformCtx` hook can clone the context,
/// rewrite parts of it, and hand back the replacement.
#[derive(Clone, Debug)]
pub struct Context {
    pub query: Query,
    pub params: HashMap<String, String>,
    pub body: Body,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub method: Method,
    pub url: UrlParts,
    request: Arc<RawRequest>,
}

impl Context {
    /// The raw request this context was built from.
    pub fn request(&self) -> &RawRequest {
        &self.request
    }

    /// Shared handle to the raw request.
    pub fn request_arc(&self) -> Arc<RawRequest> {
        Arc::clone(&self.request)
    }

    /// Request path, e.g. `/api/list`.
    pub fn path(&self) -> &str {
        &self.url.pathname
    }

    /// Header lookup by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Single-valued query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).and_then(QueryValue::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Always `None` unless an `onParseParams` hook fills the params.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Builds the context for `raw`, consulting the parse hooks at every step.
pub(crate) async fn build(
    hooks: &Hooks,
    raw: Arc<RawRequest>,
    method: Method,
) -> Result<Arc<Context>, Error> {
    let (url, absolute) = UrlParts::from_request(&raw)?;

    let body = match hooks.parse_body.trigger(Arc::clone(&raw)).await? {
        Some(body) => body,
        None => parse::body(&raw, method).await?,
    };
    let params = hooks
        .parse_params
        .trigger(Arc::clone(&raw))
        .await?
        .unwrap_or_default();
    let query = match hooks.parse_query.trigger(Arc::clone(&raw)).await? {
        Some(query) => query,
        None => parse::query(absolute.query().unwrap_or_default().as_bytes()),
    };
    let headers = match hooks.parse_headers.trigger(Arc::clone(&raw)).await? {
        Some(headers) => headers,
        None => parse::headers(raw.headers()),
    };
    let cookies = match hooks.parse_cookies.trigger(Arc::clone(&raw)).await? {
        Some(cookies) => cookies,
        None => parse::cookies(raw.headers()),
    };

    let ctx = Arc::new(Context { query, params, body, headers, cookies, method, url, request: raw });

    Ok(match hooks.transform_ctx.trigger(Arc::clone(&ctx)).await? {
        Some(replacement) => Arc::new(replacement),
        None => ctx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    async fn raw(req: http::Request<Full<Bytes>>) -> Arc<RawRequest> {
        Arc::new(RawRequest::from_http(req).await.unwrap())
    }

    #[tokio::test]
    async fn decomposes_relative_target_against_host() {
        let req = http::Request::builder()
            .uri("/api/list?page=2&tag=a&tag=b")
            .header("host", "example.com:8080")
            .header("cookie", "sid=42")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let ctx = build(&Hooks::default(), raw(req).await, Method::Get).await.unwrap();

        assert_eq!(ctx.url.pathname, "/api/list");
        assert_eq!(ctx.url.hostname, "example.com");
        assert_eq!(ctx.url.port, "8080");
        assert_eq!(ctx.url.host, "example.com:8080");
        assert_eq!(ctx.url.protocol, "http:");
        assert_eq!(ctx.url.origin, "http://example.com:8080");
        assert_eq!(ctx.url.href, "http://example.com:8080/api/list?page=2&tag=a&tag=b");
        assert_eq!(ctx.url.url, "/api/list?page=2&tag=a&tag=b");
        assert_eq!(ctx.url.hash, "");
        assert_eq!(ctx.query("page"), Some("2"));
        assert_eq!(ctx.query["tag"], QueryValue::Many(vec!["a".into(), "b".into()]));
        assert_eq!(ctx.cookie("sid"), Some("42"));
        assert_eq!(ctx.header("host"), Some("example.com:8080"));
        assert!(ctx.params.is_empty());
        assert_eq!(ctx.body, Body::Empty);
    }

    #[tokio::test]
    async fn host_header_cannot_reshape_the_path() {
        for host in ["x/admin", "x?", "x#frag", "user@x"] {
            let req = http::Request::builder()
                .uri("/secret")
                .header("host", host)
                .body(Full::new(Bytes::new()))
                .unwrap();

            let err = build(&Hooks::default(), raw(req).await, Method::Get).await.unwrap_err();
            assert!(matches!(err, Error::Url(_)), "{host}: {err:?}");
        }
    }

    #[tokio::test]
    async fn pathname_is_the_target_path_verbatim() {
        let req = http::Request::builder()
            .uri("/a/../b%20c")
            .header("host", "example.com")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let ctx = build(&Hooks::default(), raw(req).await, Method::Get).await.unwrap();

        assert_eq!(ctx.path(), "/a/../b%20c");
    }

    #[tokio::test]
    async fn default_port_is_omitted() {
        let req = http::Request::builder()
            .uri("/")
            .header("host", "example.com:80")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let ctx = build(&Hooks::default(), raw(req).await, Method::Get).await.unwrap();

        assert_eq!(ctx.url.port, "");
        assert_eq!(ctx.url.host, "example.com");
    }

    #[tokio::test]
    async fn parse_hook_overrides_default() {
        let mut hooks = Hooks::default();
        hooks.parse_cookies.push(|_raw, _acc| async move {
            Ok(Some(HashMap::from([("from".to_owned(), "hook".to_owned())])))
        });
        hooks.parse_params.push(|_raw, _acc| async move {
            Ok(Some(HashMap::from([("id".to_owned(), "7".to_owned())])))
        });

        let req = http::Request::builder()
            .uri("/users")
            .header("cookie", "sid=42")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let ctx = build(&hooks, raw(req).await, Method::Get).await.unwrap();

        assert_eq!(ctx.cookie("from"), Some("hook"));
        assert_eq!(ctx.cookie("sid"), None);
        assert_eq!(ctx.param("id"), Some("7"));
    }

    #[tokio::test]
    async fn declining_parse_hook_falls_back_to_default() {
        let mut hooks = Hooks::default();
        hooks.parse_query.push(|_raw, _acc| async move { Ok(None) });

        let req = http::Request::builder()
            .uri("/search?q=rust")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let ctx = build(&hooks, raw(req).await, Method::Get).await.unwrap();

        assert_eq!(ctx.query("q"), Some("rust"));
    }

    #[tokio::test]
    async fn transform_ctx_replacement_is_canonical() {
        let mut hooks = Hooks::default();
        hooks.transform_ctx.push(|ctx: Arc<Context>, _acc| async move {
            let mut next = (*ctx).clone();
            next.headers.insert("x-user".to_owned(), "alice".to_owned());
            Ok(Some(next))
        });

        let req = http::Request::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let ctx = build(&hooks, raw(req).await, Method::Get).await.unwrap();

        assert_eq!(ctx.header("x-user"), Some("alice"));
    }

    #[tokio::test]
    async fn parse_hook_error_propagates() {
        let mut hooks = Hooks::default();
        hooks.parse_body.push(|_raw, _acc| async move { Err(Error::other("bad body")) });

        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let err = build(&hooks, raw(req).await, Method::Post).await.unwrap_err();

        assert_eq!(err.to_string(), "bad body");
    }
}
