//! Tracing setup.
//!
//! The webrtc engine logs through the `log` facade; `try_init` installs the
//! `tracing-log` bridge so those records land in the same subscriber.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter used when neither `--log-level` nor `RUST_LOG` is set
pub const DEFAULT_FILTER: &str =
    "reflect_server=info,reflect_webrtc=info,reflect_api=info,tower_http=info,webrtc=warn";

/// Build the filter: explicit level, then `RUST_LOG`, then [`DEFAULT_FILTER`]
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match &config.level {
        Some(level) => Ok(EnvFilter::try_new(level)?),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())),
    }
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;

    let (json, plain) = if config.json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()?;

    Ok(())
}
