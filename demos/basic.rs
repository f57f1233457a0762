//! Minimal nyxor example: JSON endpoints and response-rewriting hooks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8888/api/list
//!   curl -X POST http://localhost:8888/api/list \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'

use std::sync::Arc;
use std::time::Duration;

use nyxor::{App, Body, Context, Json, Listen, Reply, Response};
use serde_json::{Value, json};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), nyxor::Error> {
    tracing_subscriber::fmt::init();

    let mut app = App::new();

    // Every reply is swapped for a fixed JSON document...
    app.on_transform_response(|_ctx, reply, _acc| async move {
        info!(?reply, "transform response");
        Ok(Some(Reply::Response(Response::json(r#"{"code":211,"msg":"test"}"#))))
    });

    // ...which arrives here already decoded, so it can be edited in place.
    app.on_after_handle(|_ctx, mut reply, _acc| async move {
        info!(?reply, "after handle");
        if let Some(obj) = reply.as_json_mut().and_then(Value::as_object_mut) {
            obj.insert("code".into(), json!(9999));
        }
        Ok(Some(reply))
    });

    app.on_error(|_ctx, err, _acc| async move {
        Ok(Some(Reply::Json(json!({ "code": 1, "msg": err.to_string() }))))
    });

    app.get("/api/list", list);
    app.post("/api/list", create);

    app.run(Listen::new().on_ready(|server| {
        info!(addr = %server.local_addr(), "started");
    }))
    .await
}

// GET /api/list
async fn list(_ctx: Arc<Context>) -> Reply {
    Reply::Json(json!({ "code": 444, "data": "hello world" }))
}

// POST /api/list
async fn create(ctx: Arc<Context>) -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    let name = match &ctx.body {
        Body::Json(body) => body.get("name").cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    };
    Json(json!({ "code": 444, "data": "hello dog", "name": name }))
}
