//! Global `tracing` subscriber installation.

use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};
use crate::error::Error;

/// Install the process-wide subscriber. `RUST_LOG` takes precedence over
/// the configured level. Fails if a subscriber is already installed.
pub fn init(logging: &LoggingSettings) -> Result<(), Error> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .map_err(|err| Error::Telemetry(format!("invalid log level `{}`: {err}", logging.level)))?,
    };

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| Error::Telemetry(format!("failed to install tracing subscriber: {err}")))
}
