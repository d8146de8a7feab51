//! Configuration types for the reflector

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ReflectError, ReflectResult};

/// Configuration for a reflector session
///
/// Covers the negotiated codec, the local network policy, background task
/// intervals, and the deadlines applied to the handshake's two waits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectConfig {
    /// The single video codec offered back to the peer
    pub codec: VideoCodec,

    /// Fixed local UDP port for media (`None` lets the OS choose)
    pub media_port: Option<u16>,

    /// STUN server URLs (empty for host candidates only)
    pub stun_servers: Vec<String>,

    /// Track id of the outbound track
    pub track_id: String,

    /// Stream id of the outbound track
    pub stream_id: String,

    /// How often each inbound track's statistics are sampled
    #[serde(with = "secs")]
    pub stats_interval: Duration,

    /// How often a keyframe is requested from the sender (`None` disables)
    #[serde(with = "opt_secs")]
    pub keyframe_interval: Option<Duration>,

    /// Deadline for the inbound offer (`None` waits indefinitely)
    #[serde(with = "opt_secs")]
    pub offer_timeout: Option<Duration>,

    /// Deadline for local ICE gathering (`None` waits indefinitely)
    #[serde(with = "opt_secs")]
    pub gathering_timeout: Option<Duration>,

    /// Buffer size for draining RTCP from the outbound sender
    pub rtcp_buffer_size: usize,

    /// Number of SDP observer messages replayed to late subscribers
    pub observer_backlog: usize,
}

impl Default for ReflectConfig {
    fn default() -> Self {
        Self {
            codec: VideoCodec::default(),
            media_port: Some(9000),
            stun_servers: vec![],
            track_id: "video".to_string(),
            stream_id: "reflect".to_string(),
            stats_interval: Duration::from_secs(5),
            keyframe_interval: Some(Duration::from_secs(3)),
            offer_timeout: None,
            gathering_timeout: Some(Duration::from_secs(30)),
            rtcp_buffer_size: 1500,
            observer_backlog: 16,
        }
    }
}

/// Video codec registered with the media engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCodec {
    /// MIME type, e.g. `video/VP8`
    pub mime_type: String,
    /// RTP clock rate in Hz
    pub clock_rate: u32,
    /// Dynamic payload type
    pub payload_type: u8,
    /// Optional fmtp line
    #[serde(default)]
    pub sdp_fmtp_line: String,
}

impl Default for VideoCodec {
    fn default() -> Self {
        Self {
            mime_type: "video/VP8".to_string(),
            clock_rate: 90_000,
            payload_type: 96,
            sdp_fmtp_line: String::new(),
        }
    }
}

impl ReflectConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `REFLECT_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("REFLECT_MEDIA_PORT") {
            self.media_port = match port.as_str() {
                "" | "0" | "any" => None,
                value => value.parse().ok().or(self.media_port),
            };
        }

        if let Some(secs) = env_secs("REFLECT_STATS_INTERVAL") {
            self.stats_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = env_secs("REFLECT_KEYFRAME_INTERVAL") {
            self.keyframe_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(secs) = env_secs("REFLECT_OFFER_TIMEOUT") {
            self.offer_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(secs) = env_secs("REFLECT_GATHERING_TIMEOUT") {
            self.gathering_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Ok(servers) = std::env::var("REFLECT_STUN_SERVERS") {
            self.stun_servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ReflectResult<()> {
        if !self.codec.mime_type.starts_with("video/") {
            return Err(ReflectError::Config(format!(
                "codec must be a video codec, got {}",
                self.codec.mime_type
            )));
        }

        if !(96..=127).contains(&self.codec.payload_type) {
            return Err(ReflectError::Config(format!(
                "payload type {} is outside the dynamic range 96-127",
                self.codec.payload_type
            )));
        }

        if self.stats_interval.is_zero() {
            return Err(ReflectError::Config("stats_interval must be > 0".to_string()));
        }

        if self.keyframe_interval.is_some_and(|d| d.is_zero()) {
            return Err(ReflectError::Config("keyframe_interval must be > 0".to_string()));
        }

        if self.rtcp_buffer_size == 0 {
            return Err(ReflectError::Config("rtcp_buffer_size must be > 0".to_string()));
        }

        if self.track_id.is_empty() || self.stream_id.is_empty() {
            return Err(ReflectError::Config("track_id and stream_id are required".to_string()));
        }

        Ok(())
    }
}

fn env_secs(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    // Zero means "no deadline" so TOML files can express it.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.filter(|s| *s > 0).map(Duration::from_secs))
    }
}
