//! Exact-match request router.
//!
//! One map per method, keyed by the literal path. No patterns, no
//! parameters, no ordering: a path either matches byte for byte or it does
//! not. Registering the same method and path again replaces the handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// Which route answered a request. Handed to `onBeforeHandle` hooks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteInfo {
    /// The method the route was registered under (may be [`Method::All`]).
    pub method: Method,
    pub path: String,
}

/// The routing table.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, HashMap<String, BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handler` under `(method, path)`, replacing any previous one.
    pub fn insert(&mut self, method: Method, path: &str, handler: impl Handler) {
        let replaced = self
            .routes
            .entry(method)
            .or_default()
            .insert(path.to_owned(), handler.into_boxed_handler());
        if replaced.is_some() {
            tracing::debug!(%method, path, "route replaced");
        }
    }

    /// Exact lookup. A method-specific route wins over an `all` route.
    pub fn lookup(&self, method: Method, path: &str) -> Option<(BoxedHandler, RouteInfo)> {
        [method, Method::All].into_iter().find_map(|m| {
            let handler = self.routes.get(&m)?.get(path)?;
            Some((Arc::clone(handler), RouteInfo { method: m, path: path.to_owned() }))
        })
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
