//! Radix-tree router with a render fallback.
//!
//! Named routes (health probes and the like) are matched first, one tree per
//! HTTP method. Everything else, any path and any method, goes to the
//! fallback, which for an SSR server is the [`Pipeline`].

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{Handler, SharedHandler};
use crate::pipeline::Pipeline;

/// The application router. Build it once at startup; pass it to
/// [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<SharedHandler>>,
    fallback: Option<SharedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), fallback: None }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered. Routes are fixed at startup, so this surfaces immediately.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, Arc::new(handler) as SharedHandler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Handler for every request no named route matches.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Send every unmatched request through the render pipeline.
    pub fn render(self, pipeline: Pipeline) -> Self {
        self.fallback(pipeline)
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(SharedHandler, HashMap<String, String>)> {
        let named = self.routes.get(method).and_then(|tree| tree.at(path).ok());
        match named {
            Some(matched) => {
                let params = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                Some((Arc::clone(matched.value), params))
            }
            None => self.fallback.as_ref().map(|h| (Arc::clone(h), HashMap::new())),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
