//! Configuration system for the reflect server.
//!
//! Supports:
//! - CLI arguments (highest priority)
//! - Environment variables
//! - TOML config file
//! - Defaults (lowest priority)

use anyhow::{Context, Result};
use clap::Parser;
use reflect_api::ApiConfig;
use reflect_webrtc::ReflectConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when `--config` is not given (skipped if missing).
pub const DEFAULT_CONFIG_FILE: &str = "reflect.toml";

/// Command-line arguments for the reflect server.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "reflect-server")]
#[command(about = "Reflect Server - sends a browser's WebRTC video straight back to it")]
#[command(version)]
pub struct CliArgs {
    /// Signaling (HTTP/WebSocket) port
    #[arg(long, short = 'p', env = "REFLECT_PORT")]
    pub port: Option<u16>,

    /// Fixed local UDP port for media (0 lets the OS choose)
    #[arg(long)]
    pub media_port: Option<u16>,

    /// Configuration file path
    #[arg(long, short = 'c', env = "REFLECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `reflect_webrtc=debug,webrtc=warn`
    #[arg(long, env = "REFLECT_LOG")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// STUN server URL (repeatable)
    #[arg(long = "stun")]
    pub stun_servers: Vec<String>,

    /// Seconds between stats samples
    #[arg(long)]
    pub stats_interval: Option<u64>,

    /// Seconds between keyframe requests (0 disables)
    #[arg(long)]
    pub keyframe_interval: Option<u64>,

    /// Seconds to wait for the offer (0 waits forever)
    #[arg(long)]
    pub offer_timeout: Option<u64>,

    /// Seconds to wait for ICE gathering (0 waits forever)
    #[arg(long)]
    pub gathering_timeout: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives; `RUST_LOG` wins when this is left at the default
    pub level: Option<String>,
    /// JSON output
    pub json: bool,
}

/// Full server configuration (merged from all sources).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Signaling server settings
    pub api: ApiConfig,

    /// Media session settings
    pub reflect: ReflectConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Load configuration from CLI args and optional config file.
    ///
    /// Priority: CLI args > Environment > Config file > Defaults
    pub fn load(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.reflect.apply_env();
        config.apply_args(args);
        config.normalize();

        config
            .reflect
            .validate()
            .context("Invalid media configuration")?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: ServerConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    fn apply_args(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.api.port = port;
        }
        if let Some(port) = args.media_port {
            self.reflect.media_port = Some(port);
        }
        if !args.stun_servers.is_empty() {
            self.reflect.stun_servers = args.stun_servers.clone();
        }
        if let Some(secs) = args.stats_interval {
            self.reflect.stats_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = args.keyframe_interval {
            self.reflect.keyframe_interval = non_zero_secs(secs);
        }
        if let Some(secs) = args.offer_timeout {
            self.reflect.offer_timeout = non_zero_secs(secs);
        }
        if let Some(secs) = args.gathering_timeout {
            self.reflect.gathering_timeout = non_zero_secs(secs);
        }
        if let Some(level) = &args.log_level {
            self.logging.level = Some(level.clone());
        }
        if args.log_json {
            self.logging.json = true;
        }
    }

    // Port 0 means "any"; the engine takes that as no fixed port.
    fn normalize(&mut self) {
        if self.reflect.media_port == Some(0) {
            self.reflect.media_port = None;
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
