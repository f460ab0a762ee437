//! Unified error types.
//!
//! Two families live here. [`Error`] surfaces infrastructure failures:
//! binding a port, reading configuration, loading the asset manifest.
//! [`RenderError`] is the per-request failure that the render pipeline
//! turns into a response and never lets escape the request.

use std::error::Error as StdError;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

/// A boxed, thread-safe error from an application collaborator.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The error type returned by isomorph's fallible start-up operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid asset manifest `{path}`: {source}")]
    Assets {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("telemetry: {0}")]
    Telemetry(String),
}

/// Message used when a failed request has nothing better to say.
pub const GENERIC_MESSAGE: &str = "Internal error";

/// A request-scoped failure raised by middleware, the renderer, or the
/// application error handler.
///
/// `Http` carries an explicit status code; anything else is `Other` and
/// answers `500`.
///
/// ```rust
/// use http::StatusCode;
/// use isomorph::RenderError;
///
/// let err = RenderError::http(StatusCode::FORBIDDEN, "Forbidden");
/// assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
/// assert_eq!(err.message(), "Forbidden");
/// ```
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error(transparent)]
    Other(BoxError),
}

impl RenderError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    pub fn other(error: impl Into<BoxError>) -> Self {
        Self::Other(error.into())
    }

    /// Status the failure asks for, if it names one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Other(_) => None,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Message shown to clients: the error's own, or [`GENERIC_MESSAGE`].
    pub fn public_message(&self) -> String {
        let message = self.message();
        if message.trim().is_empty() {
            GENERIC_MESSAGE.to_owned()
        } else {
            message
        }
    }

    /// The error followed by every `source()` beneath it.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = match self {
            Self::Http { .. } => None,
            Self::Other(inner) => inner.source(),
        };
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}

impl From<BoxError> for RenderError {
    fn from(error: BoxError) -> Self {
        Self::Other(error)
    }
}

impl From<std::io::Error> for RenderError {
    fn from(error: std::io::Error) -> Self {
        Self::Other(Box::new(error))
    }
}
