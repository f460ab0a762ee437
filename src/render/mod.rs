//! The render step and the collaborators the application plugs into it.
//!
//! The application supplies a [`Renderer`]. For every request that makes it
//! through the middleware chain, the pipeline builds a [`RenderContext`] and
//! hands it over; the renderer answers with a [`RenderResult`] or a
//! [`RenderError`]. Everything else here is optional: a [`Localize`]r, a
//! [`Preload`] hook and an [`ErrorHandler`].

mod options;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RenderError;
use crate::request::Request;
use crate::response::Response;

pub use options::{Application, Assets, Authentication, Html, RenderOptions, RenderOptionsBuilder};

/// Performs the actual UI render.
///
/// ```rust,ignore
/// struct App;
///
/// #[async_trait]
/// impl Renderer for App {
///     async fn render(&self, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
///         if ctx.request().path() == "/old-page" {
///             return Ok(RenderResult::redirect("/new-page"));
///         }
///         Ok(RenderResult::content(format!("<html>{}</html>", ctx.request().path())))
///     }
/// }
/// ```
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    async fn render(&self, ctx: &mut RenderContext) -> Result<RenderResult, RenderError>;
}

/// What a successful render asks the pipeline to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderResult {
    /// HTML body, with an optional status override (200 otherwise).
    Content { status: Option<StatusCode>, content: String },
    /// Redirect the client; nothing is rendered.
    Redirect(String),
}

impl RenderResult {
    pub fn content(content: impl Into<String>) -> Self {
        Self::Content { status: None, content: content.into() }
    }

    pub fn with_status(status: StatusCode, content: impl Into<String>) -> Self {
        Self::Content { status: Some(status), content: content.into() }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect(location.into())
    }
}

// ── Localization ──────────────────────────────────────────────────────────────

/// Locale picked for a request and the messages to render it with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Localization {
    pub locale: String,
    pub messages: serde_json::Value,
}

/// Picks a [`Localization`] from the request's preferred locales, most
/// preferred first. Implemented for any matching closure.
pub trait Localize: Send + Sync + 'static {
    fn localize(&self, preferred: &[String]) -> Option<Localization>;
}

impl<F> Localize for F
where
    F: Fn(&[String]) -> Option<Localization> + Send + Sync + 'static,
{
    fn localize(&self, preferred: &[String]) -> Option<Localization> {
        self(preferred)
    }
}

/// Data loading the renderer may trigger before rendering.
#[async_trait]
pub trait Preload: Send + Sync + 'static {
    async fn preload(&self, request: &Request) -> Result<(), RenderError>;
}

// ── Error handler ─────────────────────────────────────────────────────────────

/// What the error handler knows about the failed request.
#[derive(Clone, Debug)]
pub struct ErrorContext {
    pub method: Method,
    pub url: String,
}

impl ErrorContext {
    /// Redirect the client instead of showing an error.
    pub fn redirect(&self, location: &str) -> Response {
        Response::redirect(location)
    }
}

/// Application hook that turns a render failure into a response.
///
/// Returning `Err` hands the (possibly different) error to the generic
/// error response.
#[async_trait]
pub trait ErrorHandler: Send + Sync + 'static {
    async fn catch(&self, error: RenderError, ctx: ErrorContext) -> Result<Response, RenderError>;
}

#[async_trait]
impl<F, Fut> ErrorHandler for F
where
    F: Fn(RenderError, ErrorContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, RenderError>> + Send + 'static,
{
    async fn catch(&self, error: RenderError, ctx: ErrorContext) -> Result<Response, RenderError> {
        self(error, ctx).await
    }
}

// ── Cookies ───────────────────────────────────────────────────────────────────

/// Request cookies, plus the `Set-Cookie` values queued for the response.
#[derive(Debug, Default)]
pub struct Cookies {
    incoming: HashMap<String, String>,
    outgoing: Vec<String>,
}

impl Cookies {
    /// Current value of `name`, including values set during this request.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.incoming.get(name).map(String::as_str)
    }

    /// Queue `name=value` for the whole site. The value is percent-encoded
    /// on the wire; [`get`](Self::get) keeps returning it as given. A name
    /// that is not an HTTP token is refused and logged.
    pub fn set(&mut self, name: &str, value: &str) {
        if !is_cookie_name(name) {
            warn!(name, "refusing to set cookie with an invalid name");
            return;
        }
        self.set_raw(format!("{name}={}; Path=/", urlencoding::encode(value)));
        self.incoming.insert(name.to_owned(), value.to_owned());
    }

    /// Queue a full `Set-Cookie` value, attributes included.
    pub fn set_raw(&mut self, cookie: impl Into<String>) {
        self.outgoing.push(cookie.into());
    }

    pub fn remove(&mut self, name: &str) {
        if !is_cookie_name(name) {
            warn!(name, "refusing to remove cookie with an invalid name");
            return;
        }
        self.set_raw(format!("{name}=; Path=/; Max-Age=0"));
        self.incoming.remove(name);
    }
}

/// RFC 6265 cookie-name: a non-empty HTTP token.
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b))
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Everything the renderer gets for one request.
pub struct RenderContext {
    options: Arc<RenderOptions>,
    request: Request,
    locales: Vec<String>,
    cookies: Cookies,
}

impl RenderContext {
    pub(crate) fn new(options: Arc<RenderOptions>, request: Request) -> Self {
        let locales = request.preferred_locales();
        let cookies = Cookies { incoming: request.cookies(), outgoing: Vec::new() };
        Self { options, request, locales, cookies }
    }

    /// The application descriptor, if one of type `T` was configured.
    pub fn application<T: Any>(&self) -> Option<&T> {
        self.options.application.as_deref()?.downcast_ref()
    }

    pub fn assets(&self) -> &Assets { &self.options.assets }
    pub fn html(&self) -> &Html { &self.options.html }
    pub fn authentication(&self) -> &Authentication { &self.options.authentication }
    pub fn disabled(&self) -> bool { self.options.disable }
    pub fn loading(&self) -> Option<&str> { self.options.loading.as_deref() }
    pub fn request(&self) -> &Request { &self.request }
    pub fn preferred_locales(&self) -> &[String] { &self.locales }
    pub fn cookies(&self) -> &Cookies { &self.cookies }
    pub fn cookies_mut(&mut self) -> &mut Cookies { &mut self.cookies }

    /// Access token for the request, per the authentication settings.
    pub fn access_token(&self) -> Option<String> {
        self.options.authentication.access_token(&self.request)
    }

    /// Run the configured localizer against this request's preferred locales.
    pub fn localize(&self) -> Option<Localization> {
        self.options.localize.as_ref()?.localize(&self.locales)
    }

    /// Run the configured preload hook. A no-op when none is configured.
    pub async fn preload(&self) -> Result<(), RenderError> {
        match &self.options.preload {
            Some(preload) => preload.preload(&self.request).await,
            None => Ok(()),
        }
    }

    pub(crate) fn into_outgoing_cookies(self) -> Vec<String> {
        self.cookies.outgoing
    }
}
