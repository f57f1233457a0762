//! HTTP transport and graceful shutdown.
//!
//! The transport owns the socket side only: it accepts connections, lets
//! hyper speak HTTP/1.1 or HTTP/2 on them, and hands every request to
//! [`Engine::handle`]. Everything request-shaped happens in the engine.
//!
//! # Shutdown
//!
//! On SIGTERM, Ctrl-C or [`ServerHandle::shutdown`] the server:
//! 1. Immediately stops `listener.accept()`; no new connections are made.
//! 2. Tells every open connection to close once its in-flight request is
//!    answered, and waits for all of them.
//! 3. Fires the `onStop` hooks once, then marks the handle stopped.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::engine::Engine;
use crate::error::Error;

/// Handle to a running server. Cheap to clone.
///
/// Passed to `onStart`, `onStop` and the ready callback.
#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    stopped: watch::Receiver<bool>,
}

impl ServerHandle {
    /// The address the listener is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Asks the server to stop accepting and drain. Returns immediately.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Resolves once the server has drained and the `onStop` hooks ran.
    pub async fn stopped(&self) {
        let mut rx = self.inner.stopped.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.borrow()
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.inner.local_addr)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Spawns the accept loop on `listener` and returns its handle.
pub(crate) fn spawn(listener: TcpListener, engine: Arc<Engine>) -> Result<ServerHandle, Error> {
    let local_addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (stopped_tx, stopped_rx) = watch::channel(false);

    let handle = ServerHandle {
        inner: Arc::new(HandleInner { local_addr, shutdown: shutdown_tx, stopped: stopped_rx }),
    };

    let server = handle.clone();
    tokio::spawn(async move {
        serve(listener, Arc::clone(&engine), shutdown_rx).await;

        if let Err(e) = engine.hooks.stop.trigger(server.clone()).await {
            error!("onStop hook failed: {e}");
        }
        info!("nyxor stopped");
        stopped_tx.send_replace(true);
    });

    Ok(handle)
}

async fn serve(listener: TcpListener, engine: Arc<Engine>, shutdown_rx: watch::Receiver<bool>) {
    let builder = ConnBuilder::new(TokioExecutor::new());
    // Tracks every live connection so shutdown can ask each one to close
    // once its in-flight request is answered. Idle keep-alive connections
    // close immediately.
    let graceful = GracefulShutdown::new();
    let mut tasks = tokio::task::JoinSet::new();

    let shutdown = shutdown_signal(shutdown_rx);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Check shutdown first so a stop request wins over queued accepts.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let engine = Arc::clone(&engine);
                // Called once per request on the connection.
                let svc = service_fn(move |req| {
                    let engine = Arc::clone(&engine);
                    async move { Ok::<_, Infallible>(engine.handle(req).await) }
                });

                let conn = builder.serve_connection(TokioIo::new(stream), svc).into_owned();
                let conn = graceful.watch(conn);

                tasks.spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    drop(listener);
    graceful.shutdown().await;
    while tasks.join_next().await.is_some() {}
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first of: SIGTERM, Ctrl-C, or [`ServerHandle::shutdown`].
async fn shutdown_signal(mut requested: watch::Receiver<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let handle = async {
        loop {
            if *requested.borrow_and_update() {
                return;
            }
            // Sender gone: only a signal can stop us now.
            if requested.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
        () = handle  => {}
    }
}
