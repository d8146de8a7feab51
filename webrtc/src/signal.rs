//! Session description codec
//!
//! The signaling envelope is `{"sdp": {"type": "...", "sdp": "..."}, "uuid": "..."}`
//! and the observer envelope is `{"type": "sdp", "data": {...}}`. Both are plain JSON
//! so any browser client can speak them without a schema.

use serde::{Deserialize, Serialize};
use webrtc::peer_connection::sdp::{
    sdp_type::RTCSdpType, session_description::RTCSessionDescription,
};

use crate::error::{ReflectError, ReflectResult};

/// Kind of session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    /// Offer from the initiating side
    Offer,
    /// Provisional answer
    Pranswer,
    /// Final answer
    Answer,
    /// Rollback to the last stable state
    Rollback,
}

impl SdpKind {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Pranswer => "pranswer",
            Self::Answer => "answer",
            Self::Rollback => "rollback",
        }
    }
}

impl std::fmt::Display for SdpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session payload: the SDP text plus its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Offer or answer
    #[serde(rename = "type")]
    pub kind: SdpKind,

    /// Raw SDP body
    pub sdp: String,
}

impl SessionPayload {
    /// Build a payload of the given kind
    pub fn new(kind: SdpKind, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }

    /// Whether the SDP body carries at least one ICE candidate line
    pub fn has_candidates(&self) -> bool {
        self.sdp.lines().any(|line| line.starts_with("a=candidate:"))
    }

    /// Convert into the engine's description, parsing the SDP body
    ///
    /// Rollback descriptions carry no session and cannot be applied here.
    pub fn to_rtc(&self) -> ReflectResult<RTCSessionDescription> {
        let parsed = match self.kind {
            SdpKind::Offer => RTCSessionDescription::offer(self.sdp.clone()),
            SdpKind::Answer => RTCSessionDescription::answer(self.sdp.clone()),
            SdpKind::Pranswer => RTCSessionDescription::pranswer(self.sdp.clone()),
            SdpKind::Rollback => {
                return Err(ReflectError::Protocol(
                    "rollback descriptions are not supported".to_string(),
                ))
            }
        };

        parsed.map_err(|e| ReflectError::Protocol(format!("Invalid {} SDP: {}", self.kind, e)))
    }

    /// Convert from the engine's description
    pub fn from_rtc(desc: &RTCSessionDescription) -> ReflectResult<Self> {
        let kind = match desc.sdp_type {
            RTCSdpType::Offer => SdpKind::Offer,
            RTCSdpType::Answer => SdpKind::Answer,
            RTCSdpType::Pranswer => SdpKind::Pranswer,
            RTCSdpType::Rollback => SdpKind::Rollback,
            RTCSdpType::Unspecified => {
                return Err(ReflectError::Protocol(
                    "session description has no type".to_string(),
                ))
            }
        };

        Ok(Self::new(kind, desc.sdp.clone()))
    }
}

/// Signaling envelope exchanged once in each direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    /// Session payload, carried verbatim
    pub sdp: SessionPayload,

    /// Correlation token chosen by the sender (opaque)
    #[serde(default)]
    pub uuid: String,
}

impl SignalEnvelope {
    /// Wrap a payload with an explicit correlation id
    pub fn new(sdp: SessionPayload, uuid: impl Into<String>) -> Self {
        Self {
            sdp,
            uuid: uuid.into(),
        }
    }

    /// Wrap a payload with a fresh random correlation id
    pub fn with_fresh_id(sdp: SessionPayload) -> Self {
        Self::new(sdp, uuid::Uuid::new_v4().to_string())
    }
}

/// Envelope published on the observer channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverEnvelope {
    /// Message type: `sdp` or `stats`
    #[serde(rename = "type")]
    pub kind: String,

    /// Message body
    pub data: serde_json::Value,
}

impl ObserverEnvelope {
    /// Observer message carrying a session description
    pub fn sdp(payload: &SessionPayload) -> ReflectResult<Self> {
        Ok(Self {
            kind: "sdp".to_string(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Observer message carrying an arbitrary serializable body
    pub fn of<T: Serialize>(kind: &str, data: &T) -> ReflectResult<Self> {
        Ok(Self {
            kind: kind.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Whether this message is a session description
    pub fn is_sdp(&self) -> bool {
        self.kind == "sdp"
    }
}

/// Serialize a value to its canonical JSON text
pub fn encode<T: Serialize>(value: &T) -> ReflectResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Parse JSON text; fails as a whole on malformed input or missing fields
pub fn decode<T: serde::de::DeserializeOwned>(text: &str) -> ReflectResult<T> {
    Ok(serde_json::from_str(text)?)
}
