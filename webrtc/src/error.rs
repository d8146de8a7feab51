//! Error types for the reflector core
//!
//! Every fallible operation in the crate returns [`ReflectResult`]. Media I/O errors
//! end the owning track's tasks only; the rest surface to the session owner.

use std::time::Duration;
use thiserror::Error;

use crate::session::{HandshakeState, WaitStage};

/// Result type for reflector operations
pub type ReflectResult<T> = Result<T, ReflectError>;

/// Errors that can occur while negotiating or pumping media
#[derive(Debug, Error)]
pub enum ReflectError {
    /// Signaling text is not valid JSON or lacks a required field
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Session description was rejected (bad codec, bad transport parameters)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Signaling channel read/write failure
    #[error("Signaling transport error: {0}")]
    Transport(String),

    /// Media packet read/write failure
    #[error("Media I/O error: {0}")]
    MediaIo(String),

    /// Outbound track has no bound receiver yet; the packet is dropped
    #[error("Outbound track unavailable: {0}")]
    SinkUnavailable(String),

    /// Inbound track reached end of stream
    #[error("Track ended: ssrc {ssrc}")]
    TrackEnded {
        /// SSRC of the track that ended
        ssrc: u32,
    },

    /// Peer connection reported a terminal failure
    #[error("Peer connection failed")]
    ConnectivityFailure,

    /// A bounded wait ran past its deadline
    #[error("Timed out waiting for {stage} after {after:?}")]
    Timeout {
        /// What we were waiting for
        stage: WaitStage,
        /// Configured deadline
        after: Duration,
    },

    /// Session was torn down while a wait was pending
    #[error("Session cancelled while waiting for {0}")]
    Cancelled(WaitStage),

    /// Transition not allowed from the current state
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// State the transition requires
        expected: HandshakeState,
        /// State the session is actually in
        actual: HandshakeState,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failure inside the WebRTC engine
    #[error("WebRTC engine error: {0}")]
    Engine(String),
}

impl From<webrtc::Error> for ReflectError {
    fn from(err: webrtc::Error) -> Self {
        Self::Engine(err.to_string())
    }
}
