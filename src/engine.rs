//! The request lifecycle engine.
//!
//! One call to [`Engine::handle`] walks a request through:
//!
//! ```text
//! RECEIVED ─▶ CONTEXT_BUILT ─▶ ROUTED ─▶ BEFORE_HANDLED ─▶ HANDLED
//!                                │
//!                                └─▶ 404 "Not Found" (no further hooks)
//!
//! HANDLED ─▶ RESPONSE_TRANSFORMED ─▶ AFTER_HANDLED ─▶ RESPONDED
//! ```
//!
//! Any error raised before `RESPONDED` is caught once, here, and offered to
//! the `onError` chain. Without a recovery value the client gets a bare
//! `500`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tracing::{debug, error};

use crate::context::{self, Context};
use crate::error::{BoxError, Error};
use crate::hooks::Hooks;
use crate::method::Method;
use crate::reply::Reply;
use crate::request::RawRequest;
use crate::response::Response;
use crate::router::Router;

/// How the pipeline ended when it did not fail.
enum Outcome {
    NotFound,
    Reply(Reply),
}

/// Routing table plus hook registry for one application.
///
/// Populated during setup, then shared read-only across every request.
#[derive(Default)]
pub struct Engine {
    pub(crate) router: Router,
    pub(crate) hooks: Hooks,
    pub(crate) timeout: Option<Duration>,
}

impl Engine {
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Handles one request end to end. Never fails: every error becomes a
    /// response.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        self.respond(req).await.into_http()
    }

    /// Like [`handle`](Engine::handle), returning nyxor's own [`Response`].
    pub async fn respond<B>(&self, req: http::Request<B>) -> Response
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let Some(method) = Method::from_http(req.method()) else {
            debug!(method = %req.method(), path = req.uri().path(), "unsupported method");
            return Response::not_found();
        };

        let mut ctx = None;
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(req, method, &mut ctx))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(limit))),
            None => self.run(req, method, &mut ctx).await,
        };

        match outcome {
            Ok(Outcome::NotFound) => Response::not_found(),
            Ok(Outcome::Reply(reply)) => reply.into_response(),
            Err(err) => self.recover(ctx, err).await,
        }
    }

    async fn run<B>(
        &self,
        req: http::Request<B>,
        method: Method,
        slot: &mut Option<Arc<Context>>,
    ) -> Result<Outcome, Error>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let raw = Arc::new(RawRequest::from_http(req).await?);
        let ctx = context::build(&self.hooks, raw, method).await?;
        *slot = Some(Arc::clone(&ctx));

        let Some((handler, route)) = self.router.lookup(ctx.method, ctx.path()) else {
            debug!(method = %ctx.method, path = ctx.path(), "no route");
            return Ok(Outcome::NotFound);
        };

        // Observed only: the handler runs whatever the chain yields.
        if let Some(vetoed) = self
            .hooks
            .before_handle
            .trigger((Arc::clone(&ctx), route.clone()))
            .await?
        {
            debug!(path = %route.path, value = ?vetoed, "onBeforeHandle yielded a value; ignoring");
        }

        let mut reply = handler.call(Arc::clone(&ctx)).await?;

        if !self.hooks.transform_response.is_empty() {
            let seen = reply.clone().into_plain();
            if let Some(next) = self.hooks.transform_response.trigger((Arc::clone(&ctx), seen)).await? {
                reply = next.into_plain();
            }
        }

        if !self.hooks.after_handle.is_empty() {
            let seen = reply.clone().into_plain();
            if let Some(next) = self.hooks.after_handle.trigger((Arc::clone(&ctx), seen)).await? {
                reply = next.into_plain();
            }
        }

        Ok(Outcome::Reply(reply))
    }

    async fn recover(&self, ctx: Option<Arc<Context>>, err: Error) -> Response {
        let path = ctx.as_ref().map(|c| c.path().to_owned()).unwrap_or_default();
        error!(%path, error = %err, "request failed");

        match self.hooks.error.trigger((ctx, Arc::new(err))).await {
            Ok(Some(reply)) => reply.into_response(),
            Ok(None) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(hook_err) => {
                error!(%path, error = %hook_err, "onError hook failed");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
