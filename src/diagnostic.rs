//! Development-mode diagnostic pages.
//!
//! When the pipeline runs with `development` on, a failed request is answered
//! with an HTML page describing the error instead of the bare status line.
//! The page is produced by a [`DiagnosticRenderer`]; [`StackTracePage`] is the
//! default. Rendering the page may itself fail, in which case the pipeline
//! logs the failure and answers like production would.

use askama::Template;
use http::{Method, StatusCode};

use crate::error::RenderError;

/// A rendered diagnostic page.
#[derive(Debug)]
pub struct Diagnostic {
    /// Status the renderer wants to answer with. When `None` the pipeline uses
    /// the error's own status, then `500`, so a `403` error answers `403`
    /// with the page. Return `Some(StatusCode::INTERNAL_SERVER_ERROR)` to
    /// answer every diagnostic page with `500`.
    pub status: Option<StatusCode>,
    pub html: String,
}

/// The failed request a diagnostic page describes.
#[derive(Clone, Copy, Debug)]
pub struct FailedRequest<'a> {
    pub error: &'a RenderError,
    pub method: &'a Method,
    pub url: &'a str,
    /// Set by `print_error`: include the full debug trace.
    pub verbose: bool,
}

pub trait DiagnosticRenderer: Send + Sync + 'static {
    fn render(&self, failure: &FailedRequest<'_>) -> Result<Diagnostic, RenderError>;
}

/// Lists the error message and its cause chain. Verbose pages add the
/// error's debug representation.
#[derive(Clone, Copy, Debug, Default)]
pub struct StackTracePage;

#[derive(Template)]
#[template(path = "diagnostic.html")]
struct StackTraceTemplate<'a> {
    status: StatusCode,
    message: String,
    method: &'a Method,
    url: &'a str,
    causes: Vec<String>,
    verbose: bool,
    trace: String,
}

impl DiagnosticRenderer for StackTracePage {
    fn render(&self, failure: &FailedRequest<'_>) -> Result<Diagnostic, RenderError> {
        let error = failure.error;
        let template = StackTraceTemplate {
            status: error.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: error.public_message(),
            method: failure.method,
            url: failure.url,
            causes: error.chain().into_iter().skip(1).collect(),
            verbose: failure.verbose,
            trace: if failure.verbose { format!("{error:#?}") } else { String::new() },
        };
        let html = template.render().map_err(RenderError::other)?;
        Ok(Diagnostic { status: None, html })
    }
}
