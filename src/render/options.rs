//! Process-wide render configuration.

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::diagnostic::{DiagnosticRenderer, StackTracePage};
use crate::error::Error;
use crate::log::ErrorLog;
use crate::middleware::Middleware;
use crate::monitor::{MetricsMonitor, Monitor};
use crate::request::Request;

use super::{ErrorHandler, Localize, Preload, Renderer};

/// Asset manifest emitted by the client build.
///
/// ```json
/// { "entry": "main", "javascript": ["/assets/main.3f2a.js"], "style": ["/assets/main.9b1c.css"] }
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Assets {
    pub entry: Option<String>,
    pub javascript: Vec<String>,
    pub style: Vec<String>,
}

impl Assets {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read(path)?;
        serde_json::from_slice(&raw).map_err(|source| Error::Assets { path: path.to_owned(), source })
    }
}

/// Markup injected into the page around the rendered application.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Html {
    pub head: Option<String>,
    pub body_start: Option<String>,
    pub body_end: Option<String>,
    pub style: Option<String>,
    /// Replaces the application markup entirely when set.
    pub body: Option<String>,
}

impl Html {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Where a request's access token is found.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Authentication {
    /// Cookie holding the token. Checked before the header.
    pub cookie: Option<String>,
    /// Header holding the token; a `Bearer ` prefix is stripped.
    pub header: String,
}

impl Default for Authentication {
    fn default() -> Self {
        Self { cookie: None, header: "authorization".to_owned() }
    }
}

impl Authentication {
    pub fn access_token(&self, req: &Request) -> Option<String> {
        if let Some(token) = self
            .cookie
            .as_deref()
            .and_then(|name| req.cookie(name))
            .filter(|t| !t.is_empty())
        {
            return Some(token);
        }
        let value = req.header(&self.header)?.trim();
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .unwrap_or(value)
            .trim();
        (!token.is_empty()).then(|| token.to_owned())
    }
}

/// Opaque application descriptor handed to the renderer.
pub type Application = Arc<dyn Any + Send + Sync>;

/// Immutable configuration shared by every request. Build it once with
/// [`RenderOptions::builder`].
pub struct RenderOptions {
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) application: Option<Application>,
    pub(crate) assets: Assets,
    pub(crate) preload: Option<Arc<dyn Preload>>,
    pub(crate) localize: Option<Arc<dyn Localize>>,
    pub(crate) authentication: Authentication,
    pub(crate) disable: bool,
    pub(crate) loading: Option<String>,
    pub(crate) html: Html,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) catch: Option<Arc<dyn ErrorHandler>>,
    pub(crate) log: Option<Arc<dyn ErrorLog>>,
    pub(crate) monitor: Arc<dyn Monitor>,
    pub(crate) diagnostics: Arc<dyn DiagnosticRenderer>,
    pub(crate) development: bool,
    pub(crate) print_error: bool,
}

impl RenderOptions {
    pub fn builder(renderer: impl Renderer) -> RenderOptionsBuilder {
        RenderOptionsBuilder {
            options: Self {
                renderer: Arc::new(renderer),
                application: None,
                assets: Assets::default(),
                preload: None,
                localize: None,
                authentication: Authentication::default(),
                disable: false,
                loading: None,
                html: Html::default(),
                middleware: Vec::new(),
                catch: None,
                log: None,
                monitor: Arc::new(MetricsMonitor),
                diagnostics: Arc::new(StackTracePage),
                development: false,
                print_error: false,
            },
        }
    }

    pub fn development(&self) -> bool { self.development }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("assets", &self.assets)
            .field("authentication", &self.authentication)
            .field("disable", &self.disable)
            .field("loading", &self.loading)
            .field("html", &self.html)
            .field("middleware", &self.middleware.len())
            .field("catch", &self.catch.is_some())
            .field("development", &self.development)
            .field("print_error", &self.print_error)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`RenderOptions`]. Every setter returns `self`.
pub struct RenderOptionsBuilder {
    options: RenderOptions,
}

impl RenderOptionsBuilder {
    pub fn application<T: Any + Send + Sync>(mut self, application: T) -> Self {
        self.options.application = Some(Arc::new(application));
        self
    }

    pub fn assets(mut self, assets: Assets) -> Self {
        self.options.assets = assets;
        self
    }

    pub fn preload(mut self, preload: impl Preload) -> Self {
        self.options.preload = Some(Arc::new(preload));
        self
    }

    pub fn localize(mut self, localize: impl Localize) -> Self {
        self.options.localize = Some(Arc::new(localize));
        self
    }

    pub fn authentication(mut self, authentication: Authentication) -> Self {
        self.options.authentication = authentication;
        self
    }

    /// Skip server rendering; the renderer should emit only the page shell.
    pub fn disable(mut self, disable: bool) -> Self {
        self.options.disable = disable;
        self
    }

    /// Markup shown while the client takes over.
    pub fn loading(mut self, loading: impl Into<String>) -> Self {
        self.options.loading = Some(loading.into());
        self
    }

    pub fn html(mut self, html: Html) -> Self {
        self.options.html = html;
        self
    }

    /// Append a middleware. Middleware runs in the order it is added, before
    /// the render step.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.options.middleware.push(Arc::new(middleware));
        self
    }

    /// Error handler consulted before the generic error response.
    pub fn catch(mut self, handler: impl ErrorHandler) -> Self {
        self.options.catch = Some(Arc::new(handler));
        self
    }

    pub fn log(mut self, log: impl ErrorLog) -> Self {
        self.options.log = Some(Arc::new(log));
        self
    }

    pub fn monitor(mut self, monitor: impl Monitor) -> Self {
        self.options.monitor = Arc::new(monitor);
        self
    }

    pub fn diagnostics(mut self, diagnostics: impl DiagnosticRenderer) -> Self {
        self.options.diagnostics = Arc::new(diagnostics);
        self
    }

    pub fn development(mut self, development: bool) -> Self {
        self.options.development = development;
        self
    }

    /// Log the full cause chain of every failed request.
    pub fn print_error(mut self, print_error: bool) -> Self {
        self.options.print_error = print_error;
        self
    }

    /// Apply the file/environment-driven part of the configuration.
    pub fn settings(self, settings: &crate::config::RenderSettings) -> Result<Self, Error> {
        let assets = match &settings.assets {
            Some(path) => Assets::load(path)?,
            None => Assets::default(),
        };
        let mut builder = self
            .assets(assets)
            .html(settings.html())
            .authentication(settings.authentication.clone())
            .disable(settings.disable)
            .development(settings.development)
            .print_error(settings.print_error);
        if let Some(loading) = &settings.loading {
            builder = builder.loading(loading.clone());
        }
        Ok(builder)
    }

    pub fn build(self) -> RenderOptions {
        self.options
    }
}
