//! Default parsers behind the context parse steps.
//!
//! Each function here is what a request gets when no `onParse*` hook yields a
//! value. They are public so a hook can post-process the default result
//! instead of re-implementing it.

use std::collections::HashMap;
use std::convert::Infallible;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CONTENT_TYPE, COOKIE};

use crate::context::{Body, FormField, Part, Query, QueryValue};
use crate::error::Error;
use crate::method::Method;
use crate::request::RawRequest;

/// Parses `k=v&k2=v2` pairs, percent-decoding both sides.
///
/// A key seen once maps to [`QueryValue::One`]; a repeated key collects its
/// values, in order, into [`QueryValue::Many`].
pub fn query(input: &[u8]) -> Query {
    let mut query = Query::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        match query.get_mut(&*key) {
            Some(existing) => existing.push(value.into_owned()),
            None => {
                query.insert(key.into_owned(), QueryValue::One(value.into_owned()));
            }
        }
    }
    query
}

/// Flattens the header map. A repeated header name keeps its last value.
pub fn headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned())
        })
        .collect()
}

/// Parses every `Cookie` header into a flat `name -> value` map.
///
/// Pairs without a name are dropped. Values are kept as sent; surrounding
/// double quotes are stripped.
pub fn cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_owned(), value.to_owned()))
        })
        .collect()
}

/// Decodes the body according to the request's `content-type`.
///
/// `get` and `head` requests, a missing content type, and content types
/// outside the supported set all yield [`Body::Empty`]. Parameters such as
/// `charset` are ignored when matching.
pub async fn body(raw: &RawRequest, method: Method) -> Result<Body, Error> {
    if method.is_bodyless() {
        return Ok(Body::Empty);
    }
    let Some(content_type) = raw.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return Ok(Body::Empty);
    };

    let bytes = raw.body().clone();
    let body = match essence(content_type).as_str() {
        "application/json" => Body::Json(serde_json::from_slice(&bytes)?),
        "text/plain" => Body::Text(String::from_utf8_lossy(&bytes).into_owned()),
        "application/x-www-form-urlencoded" => Body::Form(query(&bytes)),
        "application/octet-stream" => Body::Bytes(bytes),
        "multipart/form-data" => Body::Multipart(multipart(content_type, bytes).await?),
        _ => Body::Empty,
    };
    Ok(body)
}

/// `"Text/Plain; charset=utf-8"` -> `"text/plain"`.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

async fn multipart(content_type: &str, body: Bytes) -> Result<HashMap<String, FormField>, Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut grouped: HashMap<String, Vec<Part>> = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(ToString::to_string);
        let data = field.bytes().await?;

        grouped
            .entry(name)
            .or_default()
            .push(Part { file_name, content_type, data });
    }

    Ok(grouped
        .into_iter()
        .map(|(name, mut parts)| {
            let field = if parts.len() == 1 {
                FormField::One(parts.remove(0))
            } else {
                FormField::Many(parts)
            };
            (name, field)
        })
        .collect())
}
