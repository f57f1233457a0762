//! # nyxor
//!
//! A minimal HTTP framework built around one thing: an ordered, user
//! extensible request lifecycle.
//!
//! ## The lifecycle
//!
//! Every request walks the same fixed path. Hooks registered at each point
//! run one after another, in registration order, and each sees what the
//! previous one produced:
//!
//! 1. **Context**: body, params, query, headers and cookies are parsed; each
//!    step asks its `onParse*` hooks first and falls back to the defaults in
//!    [`parse`]. `onTransformCtx` may then swap the whole [`Context`].
//! 2. **Routing**: exact match on method and path. A miss is a plain-text
//!    `404 Not Found` and ends the request; no further hooks run.
//! 3. **`onBeforeHandle`**, then the **handler**.
//! 4. **`onTransformResponse`**, then **`onAfterHandle`**: each may replace
//!    the result.
//! 5. **Coercion**: the final [`Reply`] becomes a [`Response`].
//!
//! Any error along the way goes to `onError`; without a recovery value the
//! client gets a bare `500`.
//!
//! What nyxor leaves to others: TLS termination, path parameters and
//! wildcards, content negotiation.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use nyxor::{App, Context, Listen, Reply};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), nyxor::Error> {
//!     let mut app = App::new();
//!
//!     app.on_after_handle(|_ctx, mut reply, _acc| async move {
//!         if let Some(obj) = reply.as_json_mut().and_then(|v| v.as_object_mut()) {
//!             obj.insert("served_by".into(), json!("nyxor"));
//!         }
//!         Ok(Some(reply))
//!     });
//!
//!     app.get("/api/list", list);
//!
//!     app.run(Listen::new().port(3000)).await
//! }
//!
//! async fn list(_ctx: Arc<Context>) -> Reply {
//!     Reply::Json(json!({ "code": 0, "data": ["a", "b"] }))
//! }
//! ```

mod app;
mod config;
mod context;
mod engine;
mod error;
mod handler;
mod hooks;
mod method;
mod reply;
mod request;
mod response;
mod router;
mod server;

pub mod parse;

pub use app::App;
pub use config::{Listen, ServerConfig, DEFAULT_HOSTNAME, DEFAULT_PORT};
pub use context::{Body, Context, FormField, Part, Query, QueryValue, UrlParts};
pub use engine::Engine;
pub use error::{BoxError, Error, Result};
pub use handler::Handler;
pub use hooks::{ErrorArgs, HookChain, HookKind, HookResult, HookValue, Hooks};
pub use method::Method;
pub use reply::{IntoReply, Json, Reply};
pub use request::RawRequest;
pub use response::{ContentType, Response, ResponseBuilder};
pub use router::{RouteInfo, Router};
pub use server::ServerHandle;
