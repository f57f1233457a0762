//! Application setup: routes, hooks, plugins, and starting the transport.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::{Listen, ServerConfig};
use crate::context::{Body, Context, Query};
use crate::engine::Engine;
use crate::error::{BoxError, Error};
use crate::handler::Handler;
use crate::hooks::{HookKind, HookResult};
use crate::method::Method;
use crate::reply::Reply;
use crate::request::RawRequest;
use crate::response::Response;
use crate::router::RouteInfo;
use crate::server::{self, ServerHandle};

/// An application: one routing table, one hook registry, at most one server.
///
/// Everything is registered up front. Once [`listen`](App::listen) starts the
/// transport the engine is shared with it and further registrations are
/// ignored with a warning.
pub struct App {
    config: ServerConfig,
    engine: Arc<Engine>,
    server: Option<ServerHandle>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let engine = Engine { timeout: config.request_timeout(), ..Engine::default() };
        Self { config, engine: Arc::new(engine), server: None }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The running server, once [`listen`](App::listen) succeeded.
    pub fn server(&self) -> Option<&ServerHandle> {
        self.server.as_ref()
    }

    fn register(&mut self, what: impl fmt::Display, f: impl FnOnce(&mut Engine)) -> &mut Self {
        match Arc::get_mut(&mut self.engine) {
            Some(engine) => f(engine),
            None => warn!(%what, "server already started; registration ignored"),
        }
        self
    }

    // ── Routes ────────────────────────────────────────────────────────────────

    /// Registers `handler` for `method` and the exact `path` (after the
    /// configured prefix). Re-registering the same pair replaces the handler.
    pub fn route(&mut self, method: Method, path: &str, handler: impl Handler) -> &mut Self {
        let path = self.config.route_path(path);
        self.register(format_args!("{method} {path}"), |engine| {
            engine.router.insert(method, &path, handler)
        })
    }

    /// Any method, unless a method-specific route exists for the same path.
    pub fn all(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::All, path, handler)
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::Get, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::Post, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::Put, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::Delete, path, handler)
    }

    pub fn head(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::Head, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::Options, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.route(Method::Patch, path, handler)
    }

    /// Runs `plugin` against this app right away. Plugins mount routes and
    /// hooks exactly like application code does.
    pub fn use_plugin(&mut self, plugin: impl FnOnce(&mut App)) -> &mut Self {
        plugin(self);
        self
    }

    // ── Lifecycle hooks ───────────────────────────────────────────────────────

    /// Fires once, after the listener is bound.
    pub fn on_start<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(ServerHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(HookKind::Start, |engine| {
            engine.hooks.start.push(move |server, _| {
                let fut = f(server);
                async move {
                    fut.await;
                    Ok(None)
                }
            })
        })
    }

    /// Fires once, after shutdown drained every in-flight connection.
    pub fn on_stop<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(ServerHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(HookKind::Stop, |engine| {
            engine.hooks.stop.push(move |server, _| {
                let fut = f(server);
                async move {
                    fut.await;
                    Ok(None)
                }
            })
        })
    }

    /// Runs after routing, before the handler. The yielded value is logged
    /// and otherwise ignored: it cannot stop the handler from running.
    pub fn on_before_handle<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<Context>, RouteInfo, Option<Reply>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Reply>> + Send + 'static,
    {
        self.register(HookKind::BeforeHandle, |engine| {
            engine.hooks.before_handle.push(move |(ctx, route), acc| f(ctx, route, acc))
        })
    }

    /// Sees the handler's result; a yielded value replaces it.
    pub fn on_transform_response<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<Context>, Reply, Option<Reply>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Reply>> + Send + 'static,
    {
        self.register(HookKind::TransformResponse, |engine| {
            engine.hooks.transform_response.push(move |(ctx, reply), acc| f(ctx, reply, acc))
        })
    }

    /// Sees the result after `onTransformResponse`; a yielded value replaces it.
    pub fn on_after_handle<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<Context>, Reply, Option<Reply>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Reply>> + Send + 'static,
    {
        self.register(HookKind::AfterHandle, |engine| {
            engine.hooks.after_handle.push(move |(ctx, reply), acc| f(ctx, reply, acc))
        })
    }

    /// Sees the freshly built context; a yielded context replaces it.
    pub fn on_transform_ctx<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<Context>, Option<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Context>> + Send + 'static,
    {
        self.register(HookKind::TransformCtx, |engine| {
            engine.hooks.transform_ctx.push(f)
        })
    }

    /// Turns a failed request into a reply. The context is `None` when the
    /// failure happened while building it.
    pub fn on_error<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Option<Arc<Context>>, Arc<Error>, Option<Reply>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Reply>> + Send + 'static,
    {
        self.register(HookKind::Error, |engine| {
            engine.hooks.error.push(move |(ctx, err), acc| f(ctx, err, acc))
        })
    }

    // ── Parse hooks ───────────────────────────────────────────────────────────

    pub fn on_parse_query<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<RawRequest>, Option<Query>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Query>> + Send + 'static,
    {
        self.register(HookKind::ParseQuery, |engine| {
            engine.hooks.parse_query.push(f)
        })
    }

    pub fn on_parse_params<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<RawRequest>, Option<HashMap<String, String>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<HashMap<String, String>>> + Send + 'static,
    {
        self.register(HookKind::ParseParams, |engine| {
            engine.hooks.parse_params.push(f)
        })
    }

    pub fn on_parse_body<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<RawRequest>, Option<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Body>> + Send + 'static,
    {
        self.register(HookKind::ParseBody, |engine| {
            engine.hooks.parse_body.push(f)
        })
    }

    pub fn on_parse_headers<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<RawRequest>, Option<HashMap<String, String>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<HashMap<String, String>>> + Send + 'static,
    {
        self.register(HookKind::ParseHeaders, |engine| {
            engine.hooks.parse_headers.push(f)
        })
    }

    pub fn on_parse_cookies<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<RawRequest>, Option<HashMap<String, String>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<HashMap<String, String>>> + Send + 'static,
    {
        self.register(HookKind::ParseCookies, |engine| {
            engine.hooks.parse_cookies.push(f)
        })
    }

    // ── Serving ───────────────────────────────────────────────────────────────

    /// Binds the listener, starts serving, fires `onStart`, then the ready
    /// callback.
    ///
    /// Calling it again on a running app binds nothing and does not fire
    /// `onStart` again; the new ready callback still runs, with the existing
    /// handle.
    pub async fn listen(&mut self, opts: Listen) -> Result<ServerHandle, Error> {
        let Listen { port, hostname, on_ready } = opts;

        if let Some(server) = &self.server {
            debug!(addr = %server.local_addr(), "already listening");
            let server = server.clone();
            if let Some(ready) = on_ready {
                ready(&server);
            }
            return Ok(server);
        }

        if let Some(port) = port {
            self.config.port = port;
        }
        if let Some(hostname) = hostname {
            self.config.hostname = hostname;
        }

        let listener = TcpListener::bind((self.config.hostname.as_str(), self.config.port)).await?;
        let server = server::spawn(listener, Arc::clone(&self.engine))?;
        info!(addr = %server.local_addr(), "nyxor listening");
        self.server = Some(server.clone());

        if let Err(e) = self.engine.hooks.start.trigger(server.clone()).await {
            error!("onStart hook failed: {e}");
        }
        if let Some(ready) = on_ready {
            ready(&server);
        }
        Ok(server)
    }

    /// [`listen`](App::listen), then wait until the server has stopped.
    pub async fn run(mut self, opts: Listen) -> Result<(), Error> {
        let server = self.listen(opts).await?;
        server.stopped().await;
        Ok(())
    }

    /// Runs one request through the engine without a transport.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        self.engine.handle(req).await
    }

    /// Like [`handle`](App::handle), returning nyxor's own [`Response`].
    pub async fn respond<B>(&self, req: http::Request<B>) -> Response
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        self.engine.respond(req).await
    }
}
