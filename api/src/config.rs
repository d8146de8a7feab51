//! Signaling server settings.

use serde::{Deserialize, Serialize};

/// Configuration for the signaling server.
///
/// # Example
///
/// ```rust
/// use reflect_api::ApiConfig;
///
/// let config = ApiConfig {
///     port: 8443,
///     enable_cors: true,
///     cors_origins: vec!["*".to_string()],
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Interface the signaling listener binds (default `0.0.0.0`)
    pub bind_address: String,

    /// Signaling listener port, shared by `/signal`, `/observer` and `/health` (default 8443)
    pub port: u16,

    /// Send CORS headers so a page served elsewhere can reach `/health`
    pub enable_cors: bool,

    /// Origins the page may be served from; `"*"` allows any
    pub cors_origins: Vec<String>,

    /// Largest WebSocket message accepted on `/signal`, in bytes.
    ///
    /// Default: 65536
    pub max_message_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8443,
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            max_message_bytes: 64 * 1024,
        }
    }
}

impl ApiConfig {
    /// Loopback-only configuration with permissive CORS.
    pub fn development() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            ..Default::default()
        }
    }

    /// `address:port` string to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
