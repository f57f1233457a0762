//! Lifecycle hook registry.
//!
//! Every lifecycle point is a [`HookKind`] with its own [`HookChain`], typed
//! by the arguments the point supplies and the value its callbacks may yield.
//!
//! # Trigger semantics
//!
//! ```text
//! acc = None
//! for cb in chain (registration order):
//!     out = cb(args, acc).await?      ← an error aborts the chain
//!     if out is non-empty: acc = out  ← "declining" keeps the previous acc
//! return acc
//! ```
//!
//! Callbacks run strictly one after another. Each sees the accumulator left
//! by the callbacks before it as its trailing argument.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Body, Context, Query};
use crate::error::Error;
use crate::reply::Reply;
use crate::request::RawRequest;
use crate::router::RouteInfo;
use crate::server::ServerHandle;

/// What a hook callback resolves to: `Ok(None)` declines to act.
pub type HookResult<T> = Result<Option<T>, Error>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type Callback<A, T> = Arc<dyn Fn(A, Option<T>) -> BoxFuture<HookResult<T>> + Send + Sync + 'static>;

/// The fixed set of lifecycle points.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HookKind {
    Start,
    BeforeHandle,
    TransformResponse,
    TransformCtx,
    AfterHandle,
    Stop,
    Error,
    ParseQuery,
    ParseParams,
    ParseBody,
    ParseHeaders,
    ParseCookies,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start             => "onStart",
            Self::BeforeHandle      => "onBeforeHandle",
            Self::TransformResponse => "onTransformResponse",
            Self::TransformCtx      => "onTransformCtx",
            Self::AfterHandle       => "onAfterHandle",
            Self::Stop              => "onStop",
            Self::Error             => "onError",
            Self::ParseQuery        => "onParseQuery",
            Self::ParseParams       => "onParseParams",
            Self::ParseBody         => "onParseBody",
            Self::ParseHeaders      => "onParseHeaders",
            Self::ParseCookies      => "onParseCookies",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values a hook chain can accumulate.
///
/// A yield that [`is_empty`](HookValue::is_empty) leaves the accumulator
/// untouched, the same as yielding `None`.
pub trait HookValue: Clone + Send + 'static {
    fn is_empty(&self) -> bool {
        false
    }
}

impl HookValue for () {}
impl HookValue for Context {}
impl HookValue for Query {}
impl HookValue for HashMap<String, String> {}

impl HookValue for Body {
    fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

impl HookValue for Reply {
    fn is_empty(&self) -> bool {
        Reply::is_empty(self)
    }
}

/// Ordered callbacks for one lifecycle point.
pub struct HookChain<A, T> {
    kind: HookKind,
    callbacks: Vec<Callback<A, T>>,
}

impl<A, T> HookChain<A, T>
where
    A: Clone + Send + 'static,
    T: HookValue,
{
    pub(crate) fn new(kind: HookKind) -> Self {
        Self { kind, callbacks: Vec::new() }
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Appends `f`. No deduplication: registering twice runs twice.
    pub fn push<F, Fut>(&mut self, f: F)
    where
        F: Fn(A, Option<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<T>> + Send + 'static,
    {
        self.callbacks.push(Arc::new(move |args: A, acc: Option<T>| -> BoxFuture<HookResult<T>> {
            Box::pin(f(args, acc))
        }));
    }

    /// Runs the chain and returns the accumulated result.
    ///
    /// The first callback error aborts the remaining callbacks and is
    /// returned as is.
    pub async fn trigger(&self, args: A) -> HookResult<T> {
        let mut acc: Option<T> = None;
        for callback in &self.callbacks {
            if let Some(out) = callback(args.clone(), acc.clone()).await? {
                if !out.is_empty() {
                    acc = Some(out);
                }
            }
        }
        if acc.is_some() {
            tracing::trace!(hook = %self.kind, callbacks = self.callbacks.len(), "hook chain yielded");
        }
        Ok(acc)
    }
}

/// Arguments handed to `onError` callbacks: the context, when the failure
/// happened after it was built, and the error itself.
pub type ErrorArgs = (Option<Arc<Context>>, Arc<Error>);

/// One chain per [`HookKind`], owned by a single engine.
pub struct Hooks {
    pub(crate) start: HookChain<ServerHandle, ()>,
    pub(crate) before_handle: HookChain<(Arc<Context>, RouteInfo), Reply>,
    pub(crate) transform_response: HookChain<(Arc<Context>, Reply), Reply>,
    pub(crate) transform_ctx: HookChain<Arc<Context>, Context>,
    pub(crate) after_handle: HookChain<(Arc<Context>, Reply), Reply>,
    pub(crate) stop: HookChain<ServerHandle, ()>,
    pub(crate) error: HookChain<ErrorArgs, Reply>,
    pub(crate) parse_query: HookChain<Arc<RawRequest>, Query>,
    pub(crate) parse_params: HookChain<Arc<RawRequest>, HashMap<String, String>>,
    pub(crate) parse_body: HookChain<Arc<RawRequest>, Body>,
    pub(crate) parse_headers: HookChain<Arc<RawRequest>, HashMap<String, String>>,
    pub(crate) parse_cookies: HookChain<Arc<RawRequest>, HashMap<String, String>>,
}

impl Hooks {
    /// Number of callbacks registered for `kind`.
    pub fn count(&self, kind: HookKind) -> usize {
        match kind {
            HookKind::Start             => self.start.len(),
            HookKind::BeforeHandle      => self.before_handle.len(),
            HookKind::TransformResponse => self.transform_response.len(),
            HookKind::TransformCtx      => self.transform_ctx.len(),
            HookKind::AfterHandle       => self.after_handle.len(),
            HookKind::Stop              => self.stop.len(),
            HookKind::Error             => self.error.len(),
            HookKind::ParseQuery        => self.parse_query.len(),
            HookKind::ParseParams       => self.parse_params.len(),
            HookKind::ParseBody         => self.parse_body.len(),
            HookKind::ParseHeaders      => self.parse_headers.len(),
            HookKind::ParseCookies      => self.parse_cookies.len(),
        }
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            start: HookChain::new(HookKind::Start),
            before_handle: HookChain::new(HookKind::BeforeHandle),
            transform_response: HookChain::new(HookKind::TransformResponse),
            transform_ctx: HookChain::new(HookKind::TransformCtx),
            after_handle: HookChain::new(HookKind::AfterHandle),
            stop: HookChain::new(HookKind::Stop),
            error: HookChain::new(HookKind::Error),
            parse_query: HookChain::new(HookKind::ParseQuery),
            parse_params: HookChain::new(HookKind::ParseParams),
            parse_body: HookChain::new(HookKind::ParseBody),
            parse_headers: HookChain::new(HookKind::ParseHeaders),
            parse_cookies: HookChain::new(HookKind::ParseCookies),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    fn chain() -> HookChain<u32, Reply> {
        HookChain::new(HookKind::AfterHandle)
    }

    #[tokio::test]
    async fn empty_chain_yields_nothing() {
        assert!(chain().trigger(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_callbacks_see_earlier_yields() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = chain();

        hooks.push(|_, _acc| async move { Ok(Some(Reply::Json(json!({"step": 1})))) });
        let log = Arc::clone(&seen);
        hooks.push(move |_, acc: Option<Reply>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(acc);
                Ok(Some(Reply::Json(json!({"step": 2}))))
            }
        });

        let out = hooks.trigger(0).await.unwrap();

        assert_eq!(out, Some(Reply::Json(json!({"step": 2}))));
        assert_eq!(*seen.lock().unwrap(), vec![Some(Reply::Json(json!({"step": 1})))]);
    }

    #[tokio::test]
    async fn declining_callback_keeps_previous_accumulator() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = chain();

        hooks.push(|_, _| async move { Ok(Some(Reply::Text("first".into()))) });
        hooks.push(|_, _| async move { Ok(None) });
        hooks.push(|_, _| async move { Ok(Some(Reply::Json(serde_json::Value::Null))) });
        let log = Arc::clone(&seen);
        hooks.push(move |_, acc: Option<Reply>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(acc);
                Ok(None)
            }
        });

        let out = hooks.trigger(0).await.unwrap();

        assert_eq!(out, Some(Reply::Text("first".into())));
        assert_eq!(*seen.lock().unwrap(), vec![Some(Reply::Text("first".into()))]);
    }

    #[tokio::test]
    async fn callbacks_receive_call_arguments_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = chain();
        for id in 0..3u32 {
            let order = Arc::clone(&order);
            hooks.push(move |arg, _| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push((id, arg));
                    Ok(None)
                }
            });
        }

        hooks.trigger(7).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[tokio::test]
    async fn error_aborts_remaining_callbacks() {
        let ran = Arc::new(Mutex::new(false));
        let mut hooks = chain();

        hooks.push(|_, _| async move { Err(Error::other("boom")) });
        let flag = Arc::clone(&ran);
        hooks.push(move |_, _| {
            let flag = Arc::clone(&flag);
            async move {
                *flag.lock().unwrap() = true;
                Ok(None)
            }
        });

        let err = hooks.trigger(0).await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert!(!*ran.lock().unwrap());
    }

    #[test]
    fn counts_per_kind() {
        let mut hooks = Hooks::default();
        hooks.after_handle.push(|_, _| async move { Ok(None) });
        hooks.after_handle.push(|_, _| async move { Ok(None) });

        assert_eq!(hooks.count(HookKind::AfterHandle), 2);
        assert_eq!(hooks.count(HookKind::BeforeHandle), 0);
        assert_eq!(HookKind::ParseCookies.to_string(), "onParseCookies");
    }
}
