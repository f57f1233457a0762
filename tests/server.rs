//! Socket-level tests: the transport, `listen`, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nyxor::{App, Context, Listen};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn raw_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

fn local() -> Listen {
    Listen::new().hostname("127.0.0.1").port(0)
}

#[tokio::test]
async fn serves_routes_over_tcp() {
    let mut app = App::new();
    app.get("/ping", |_ctx: Arc<Context>| async { "pong" });

    let server = app.listen(local()).await.unwrap();
    let res = raw_get(server.local_addr(), "/ping").await;

    assert!(res.starts_with("HTTP/1.1 200"), "{res}");
    assert!(res.ends_with("pong"), "{res}");

    let res = raw_get(server.local_addr(), "/nope").await;
    assert!(res.starts_with("HTTP/1.1 404"), "{res}");
    assert!(res.ends_with("Not Found"), "{res}");

    server.shutdown();
    server.stopped().await;
}

#[tokio::test]
async fn second_listen_reuses_the_running_server() {
    let starts = Arc::new(AtomicUsize::new(0));
    let ready = Arc::new(AtomicUsize::new(0));

    let mut app = App::new();
    let s = Arc::clone(&starts);
    app.on_start(move |_server| {
        s.fetch_add(1, Ordering::SeqCst);
        async {}
    });

    let r = Arc::clone(&ready);
    let first = app
        .listen(local().on_ready(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .unwrap();

    let r = Arc::clone(&ready);
    let second = app
        .listen(Listen::new().port(0).on_ready(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .unwrap();

    assert_eq!(first.local_addr(), second.local_addr());
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(ready.load(Ordering::SeqCst), 2);

    first.shutdown();
    second.stopped().await;
}

#[tokio::test]
async fn registration_after_listen_is_ignored() {
    let mut app = App::new();
    app.get("/early", |_ctx: Arc<Context>| async { "early" });

    let server = app.listen(local()).await.unwrap();
    app.get("/late", |_ctx: Arc<Context>| async { "late" });

    assert!(raw_get(server.local_addr(), "/early").await.ends_with("early"));
    assert!(raw_get(server.local_addr(), "/late").await.starts_with("HTTP/1.1 404"));

    server.shutdown();
    server.stopped().await;
}

#[tokio::test]
async fn shutdown_fires_on_stop_once() {
    let stops = Arc::new(AtomicUsize::new(0));

    let mut app = App::new();
    let s = Arc::clone(&stops);
    app.on_stop(move |server| {
        assert!(!server.is_stopped());
        s.fetch_add(1, Ordering::SeqCst);
        async {}
    });

    let server = app.listen(local()).await.unwrap();
    assert!(!server.is_stopped());

    server.shutdown();
    server.shutdown();
    server.stopped().await;

    assert!(server.is_stopped());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(TcpStream::connect(server.local_addr()).await.is_err());
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let stops = Arc::new(AtomicUsize::new(0));

    let mut app = App::new();
    app.get("/ping", |_ctx: Arc<Context>| async { "pong" });
    let s = Arc::clone(&stops);
    app.on_stop(move |_server| {
        s.fetch_add(1, Ordering::SeqCst);
        async {}
    });

    let server = app.listen(local()).await.unwrap();

    // HTTP/1.1 keeps the connection open by default.
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let req = format!("GET /ping HTTP/1.1\r\nHost: {}\r\n\r\n", server.local_addr());
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut seen = Vec::new();
    let mut buf = [0u8; 1024];
    while !seen.ends_with(b"pong") {
        let n = stream.read(&mut buf).await.unwrap();
        assert_ne!(n, 0, "connection closed before the response");
        seen.extend_from_slice(&buf[..n]);
    }

    server.shutdown();
    tokio::time::timeout(Duration::from_secs(3), server.stopped())
        .await
        .expect("server did not drain an idle keep-alive connection");

    assert_eq!(stops.load(Ordering::SeqCst), 1);
    let n = tokio::time::timeout(Duration::from_secs(3), stream.read(&mut buf))
        .await
        .expect("connection left open after shutdown")
        .unwrap_or(0);
    assert_eq!(n, 0);
}
