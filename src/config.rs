//! Configuration layer: typed settings with layered precedence
//! (built-in defaults → optional file → `ISOMORPH__*` environment).
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:3000"
//!
//! [render]
//! development = true
//! assets = "dist/assets.json"
//!
//! [render.html]
//! head = '<link rel="icon" href="/favicon.ico">'
//!
//! [logging]
//! level = "info,isomorph=debug"
//! format = "json"
//! ```
//!
//! Environment variables use `__` between segments:
//! `ISOMORPH__RENDER__DEVELOPMENT=true`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Error;
use crate::render::{Authentication, Html};

const ENV_PREFIX: &str = "ISOMORPH";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub render: RenderSettings,
    pub logging: LoggingSettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { addr: SocketAddr::from(DEFAULT_ADDR) }
    }
}

/// The file/environment-driven part of [`RenderOptions`](crate::RenderOptions).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Answer failures with diagnostic pages. Leaks error details.
    pub development: bool,
    pub print_error: bool,
    pub disable: bool,
    pub loading: Option<String>,
    /// Path to the client build's asset manifest.
    pub assets: Option<PathBuf>,
    pub authentication: Authentication,
    pub html: Option<Html>,
    // Legacy injection points, used only when `html` is absent.
    pub head: Option<String>,
    pub body: Option<String>,
    pub body_start: Option<String>,
    pub body_end: Option<String>,
    pub style: Option<String>,
}

impl RenderSettings {
    /// Injection points, folding the legacy top-level fields in when no
    /// `html` table is configured.
    pub fn html(&self) -> Html {
        match &self.html {
            Some(html) => html.clone(),
            None => Html {
                head: self.head.clone(),
                body_start: self.body_start.clone(),
                body_end: self.body_end.clone(),
                style: self.style.clone(),
                body: self.body.clone(),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives; `RUST_LOG` overrides them when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_owned(), format: LogFormat::default() }
    }
}

/// Load settings from `path` (optional; a missing file is an error only
/// when a path is given) and the process environment.
pub fn load(path: Option<&Path>) -> Result<Settings, Error> {
    load_from(path, None)
}

fn load_from(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Settings, Error> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env),
    );
    Ok(builder.build()?.try_deserialize()?)
}
