use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, info, info_span, warn};

use super::{Middleware, Next};
use crate::error::RenderError;
use crate::request::Request;
use crate::response::Response;

/// Wraps the rest of the chain in an `http.request` span and logs one line
/// per request with its status and latency.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

#[async_trait]
impl Middleware for Trace {
    async fn handle(&self, req: Request, next: Next) -> Result<Response, RenderError> {
        let span = info_span!("http.request", method = %req.method(), path = %req.path());
        let start = Instant::now();

        let result = next.run(req).instrument(span.clone()).await;
        let elapsed_ms = start.elapsed().as_millis();

        span.in_scope(|| match &result {
            Ok(res) => info!(status = res.status_code().as_u16(), elapsed_ms, "request rendered"),
            Err(err) => warn!(
                status = err.status().map(|s| s.as_u16()),
                elapsed_ms,
                error = %err,
                "request failed"
            ),
        });
        result
    }
}
