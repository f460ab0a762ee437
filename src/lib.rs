//! # isomorph
//!
//! Request-handling glue for server-side rendering. isomorph accepts a
//! request, hands it to the application's [`Renderer`], and turns the
//! outcome into exactly one HTTP response: rendered HTML, a redirect, or
//! an error page.
//!
//! What isomorph owns:
//!
//! - **Result interpretation** — `Content` with an optional status, or `Redirect`
//! - **Error recovery** — application error handler first, then a generic
//!   `status + message` response, or a diagnostic page in development
//! - **Request metrics** — counters and per-URL timers behind [`Monitor`]
//! - **Locale and cookie plumbing** — preferred locales, access tokens, `Set-Cookie`
//! - **Extension chain** — ordered [`Middleware`](middleware::Middleware) ahead of the render
//!
//! What it leaves to the application: the UI framework's rendering, data
//! loading, and routing inside the app.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use http::Method;
//! use isomorph::{
//!     health, Pipeline, RenderContext, RenderError, RenderOptions, RenderResult, Renderer,
//!     Router, Server,
//! };
//!
//! struct App;
//!
//! #[async_trait]
//! impl Renderer for App {
//!     async fn render(&self, ctx: &mut RenderContext) -> Result<RenderResult, RenderError> {
//!         match ctx.request().path() {
//!             "/old-page" => Ok(RenderResult::redirect("/new-page")),
//!             path => Ok(RenderResult::content(format!("<html>{path}</html>"))),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), isomorph::Error> {
//!     let settings = isomorph::config::load(None)?;
//!     let options = RenderOptions::builder(App).settings(&settings.render)?.build();
//!
//!     let app = Router::new()
//!         .on(Method::GET, "/healthz", health::liveness)
//!         .render(Pipeline::new(options));
//!
//!     Server::bind(settings.server.addr).serve(app).await
//! }
//! ```

mod error;
mod handler;
mod log;
mod pipeline;
mod render;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod diagnostic;
pub mod health;
pub mod middleware;
pub mod monitor;
pub mod telemetry;

pub use error::{BoxError, Error, GENERIC_MESSAGE, RenderError};
pub use handler::Handler;
pub use log::ErrorLog;
pub use monitor::{Monitor, Timer};
pub use pipeline::Pipeline;
pub use render::{
    Application, Assets, Authentication, Cookies, ErrorContext, ErrorHandler, Html, Localization,
    Localize, Preload, RenderContext, RenderOptions, RenderOptionsBuilder, RenderResult, Renderer,
};
pub use request::{LOCALE_COOKIE, Request};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
