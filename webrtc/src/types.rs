//! Type definitions shared by the adapter, the pump and observers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Peer connection state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not started
    New,
    /// ICE/DTLS in progress
    Connecting,
    /// Media can flow
    Connected,
    /// Transient loss of connectivity; may recover on its own
    Disconnected,
    /// Terminal failure
    Failed,
    /// Closed locally
    Closed,
}

impl ConnectionState {
    /// Convert connection state to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => Self::New,
            RTCPeerConnectionState::Connecting => Self::Connecting,
            RTCPeerConnectionState::Connected => Self::Connected,
            RTCPeerConnectionState::Disconnected => Self::Disconnected,
            RTCPeerConnectionState::Failed => Self::Failed,
            RTCPeerConnectionState::Closed => Self::Closed,
        }
    }
}

/// Description of an inbound media track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Synchronization source identifier
    pub ssrc: u32,

    /// RTP payload type
    pub payload_type: u8,

    /// Codec MIME type, e.g. `video/VP8`
    pub mime_type: String,

    /// Track id announced by the remote peer
    #[serde(default)]
    pub track_id: String,
}

/// Point-in-time receive counters for one SSRC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    /// Stream the counters belong to
    pub ssrc: u32,

    /// Media kind (`video` or `audio`)
    pub kind: String,

    /// RTP packets received
    pub packets_received: u64,

    /// Payload bytes received
    pub bytes_received: u64,

    /// RTP header bytes received
    pub header_bytes_received: u64,

    /// NACKs sent for this stream
    pub nack_count: u64,

    /// Full intra requests sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fir_count: Option<u64>,

    /// Picture loss indications sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pli_count: Option<u64>,

    /// When the sample was taken
    pub sampled_at: DateTime<Utc>,
}

/// Observer payload for one stats tick
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport<'a> {
    /// Track the sample was taken for
    pub track: &'a TrackInfo,
    /// Latest sample, if the engine has one yet
    pub sample: Option<&'a StatsSample>,
}
