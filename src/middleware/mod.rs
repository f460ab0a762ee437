//! Middleware layer.
//!
//! Middleware runs ahead of the render step and is the place for
//! cross-cutting concerns: tracing, request ids, auth-header inspection,
//! maintenance pages. The chain is an ordered list; each link receives the
//! request and a [`Next`]. Awaiting `next.run(req)` passes control down the
//! chain and eventually to the renderer; returning without calling it
//! short-circuits everything after.
//!
//! ```rust,ignore
//! use isomorph::middleware::Next;
//! use isomorph::{RenderError, Request, Response};
//!
//! async fn maintenance(req: Request, next: Next) -> Result<Response, RenderError> {
//!     if std::env::var_os("MAINTENANCE").is_some() {
//!         return Ok(Response::html("<h1>Back soon</h1>"));
//!     }
//!     next.run(req).await
//! }
//! ```
//!
//! Built-in middleware:
//! - [`Trace`] — per-request span with method, path, status, latency

mod trace;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RenderError;
use crate::pipeline;
use crate::render::RenderOptions;
use crate::request::Request;
use crate::response::Response;

pub use trace::Trace;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: Request, next: Next) -> Result<Response, RenderError>;
}

#[async_trait]
impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, RenderError>> + Send + 'static,
{
    async fn handle(&self, req: Request, next: Next) -> Result<Response, RenderError> {
        self(req, next).await
    }
}

/// The remainder of the chain after the current middleware.
pub struct Next {
    options: Arc<RenderOptions>,
    index: usize,
}

impl Next {
    pub(crate) fn new(options: Arc<RenderOptions>) -> Self {
        Self { options, index: 0 }
    }

    /// Run the next middleware, or the render step once the list is exhausted.
    pub async fn run(self, req: Request) -> Result<Response, RenderError> {
        match self.options.middleware.get(self.index).cloned() {
            Some(middleware) => {
                let next = Self { options: Arc::clone(&self.options), index: self.index + 1 };
                middleware.handle(req, next).await
            }
            None => pipeline::render(self.options, req).await,
        }
    }
}
