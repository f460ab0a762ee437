//! What the router dispatches to.
//!
//! A route target is anything implementing [`Handler`]. Plain
//! `async fn(Request) -> impl IntoResponse` items qualify through the
//! blanket impl, which covers the health probes and any other auxiliary
//! endpoint. [`Pipeline`] implements it directly, so the render fallback is
//! stored as-is and borrowed for each request.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A route target.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<'_, Response>;
}

pub(crate) type SharedHandler = Arc<dyn Handler>;

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'_, Response> {
        let fut = self(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

impl Handler for Pipeline {
    fn call(&self, req: Request) -> BoxFuture<'_, Response> {
        Box::pin(self.handle(req))
    }
}
