//! The per-request render pipeline.
//!
//! ```text
//! handle(req)
//!   ├─ count request, start timers (overall + per URL)
//!   ├─ middleware[0] → middleware[1] → … → render step
//!   │                                        ├─ Redirect  → 302 Location
//!   │                                        ├─ Content   → status?, HTML body
//!   │                                        └─ Err       → error handler? → response
//!   ├─ Err escaping the chain → outer boundary
//!   │      ├─ development: diagnostic page (failure here is logged, ignored)
//!   │      └─ status or 500, message or "Internal error"
//!   └─ stop timers
//! ```
//!
//! Every request ends in exactly one of content, redirect, or error
//! response. No failure propagates past [`Pipeline::handle`]; a panic in
//! middleware, the renderer or the error handler is answered as a `500`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::{Method, StatusCode};
use tracing::error;

use crate::diagnostic::FailedRequest;
use crate::error::{GENERIC_MESSAGE, RenderError};
use crate::middleware::Next;
use crate::monitor::{ERROR, ERROR_HANDLED, REQUEST, TIME, URL_REQUEST, URL_TIME};
use crate::render::{ErrorContext, RenderContext, RenderOptions, RenderResult};
use crate::request::Request;
use crate::response::Response;

/// Render pipeline over a fixed set of [`RenderOptions`]. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Pipeline {
    options: Arc<RenderOptions>,
}

impl Pipeline {
    pub fn new(options: RenderOptions) -> Self {
        Self { options: Arc::new(options) }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Handle one request end to end. Never fails: errors become responses.
    pub async fn handle(&self, req: Request) -> Response {
        let monitor = &self.options.monitor;
        let key = metrics_key(req.raw_url()).to_owned();

        monitor.increment(REQUEST);
        monitor.increment(&format!("{URL_REQUEST}{key}"));
        // Guards: stopped below, or on drop if this future is abandoned.
        let total = monitor.started(TIME);
        let per_url = monitor.started(&format!("{URL_TIME}{key}"));

        let method = req.method().clone();
        let url = req.raw_url().to_owned();

        let chain = Next::new(Arc::clone(&self.options)).run(req);
        let response = match AssertUnwindSafe(chain).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => self.recover(error, &method, &url),
            Err(payload) => {
                error!(%method, url = %url, panic = panic_detail(payload.as_ref()), "render panicked");
                let error = RenderError::http(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE);
                self.recover(error, &method, &url)
            }
        };

        per_url.stop();
        total.stop();
        response
    }

    /// Outer error boundary.
    fn recover(&self, error: RenderError, method: &Method, url: &str) -> Response {
        let options = &self.options;
        options.monitor.increment(ERROR);
        self.report(&error, method, url);

        if options.development {
            let failure = FailedRequest { error: &error, method, url, verbose: options.print_error };
            match options.diagnostics.render(&failure) {
                Ok(page) => {
                    let status = page
                        .status
                        .or(error.status())
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    return Response::builder().status(status).html(page.html);
                }
                Err(failure) => error!(
                    %method,
                    url,
                    error = %failure,
                    "diagnostic page failed to render"
                ),
            }
        }

        Response::builder()
            .status(error.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
            .text(error.public_message())
    }

    fn report(&self, error: &RenderError, method: &Method, url: &str) {
        let status = error.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR).as_u16();
        if self.options.print_error {
            error!(%method, url, status, chain = ?error.chain(), "request failed: {error}");
        } else {
            error!(%method, url, status, error = %error, "request failed");
        }
        if let Some(log) = &self.options.log {
            log.error(error);
        }
    }
}

/// Terminal link of the middleware chain.
pub(crate) async fn render(options: Arc<RenderOptions>, req: Request) -> Result<Response, RenderError> {
    let error_ctx = ErrorContext { method: req.method().clone(), url: req.raw_url().to_owned() };
    let mut ctx = RenderContext::new(Arc::clone(&options), req);

    match options.renderer.render(&mut ctx).await {
        Ok(result) => {
            let mut response = interpret(result);
            response.append_cookies(ctx.into_outgoing_cookies());
            Ok(response)
        }
        Err(error) => {
            options.monitor.increment(ERROR_HANDLED);
            match &options.catch {
                Some(handler) => handler.catch(error, error_ctx).await,
                None => Err(error),
            }
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

fn interpret(result: RenderResult) -> Response {
    match result {
        RenderResult::Redirect(location) => Response::redirect(&location),
        RenderResult::Content { status, content } => {
            let mut response = Response::html(content);
            if let Some(status) = status {
                response.set_status(status);
            }
            response
        }
    }
}

/// Metrics label for a raw URL: a single trailing `?` is dropped.
pub(crate) fn metrics_key(raw_url: &str) -> &str {
    raw_url.strip_suffix('?').unwrap_or(raw_url)
}
