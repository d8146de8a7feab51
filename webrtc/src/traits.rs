//! Traits at the seams between the core and its collaborators.
//!
//! The handshake and the media pump only talk to these traits. The WebRTC engine
//! implements them in `peer_connection`; tests implement them in-process.

use async_trait::async_trait;
use tokio::sync::mpsc;
use webrtc::rtp::packet::Packet;

use crate::error::ReflectResult;
use crate::signal::SessionPayload;
use crate::types::{StatsSample, TrackInfo};

/// Peer connection operations the handshake drives.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Apply the peer's offer as the remote description.
    async fn set_remote_description(&self, offer: &SessionPayload) -> ReflectResult<()>;

    /// Generate an answer for the applied offer.
    async fn create_answer(&self) -> ReflectResult<SessionPayload>;

    /// Receiver that yields (or closes) once local ICE gathering is complete.
    ///
    /// Must be obtained before the local description is set.
    async fn gathering_complete(&self) -> mpsc::Receiver<()>;

    /// Set the pending local description; starts candidate gathering.
    async fn set_local_description(&self, answer: SessionPayload) -> ReflectResult<()>;

    /// Current local description, including every gathered candidate.
    async fn local_description(&self) -> ReflectResult<SessionPayload>;

    /// Release the connection and its tracks. Safe to call more than once.
    async fn close(&self) -> ReflectResult<()>;
}

/// Message channel carrying the single offer in and the single answer out.
#[async_trait]
pub trait SignalingChannel: Send {
    /// Wait for the next inbound message.
    async fn recv(&mut self) -> ReflectResult<String>;

    /// Send one outbound message.
    async fn send(&mut self, message: String) -> ReflectResult<()>;
}

/// Inbound media track.
#[async_trait]
pub trait RtpSource: Send + Sync {
    /// Static description of the track.
    fn info(&self) -> TrackInfo;

    /// Read the next RTP packet.
    async fn next_packet(&self) -> ReflectResult<Packet>;
}

/// Outbound media track.
#[async_trait]
pub trait RtpSink: Send + Sync {
    /// Write one RTP packet unmodified.
    async fn write_packet(&self, packet: &Packet) -> ReflectResult<()>;
}

/// RTCP feedback path of an outbound sender.
#[async_trait]
pub trait RtcpSource: Send + Sync {
    /// Read one batch of feedback; returns the number of packets read.
    async fn read_feedback(&self, buf: &mut [u8]) -> ReflectResult<usize>;
}

/// Handle to the engine's per-stream statistics.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Latest sample for `ssrc`, if any has been recorded.
    async fn sample(&self, ssrc: u32) -> Option<StatsSample>;
}

/// Sends keyframe requests upstream.
#[async_trait]
pub trait KeyframeRequester: Send + Sync {
    /// Ask the sender of `media_ssrc` for a new keyframe.
    async fn request_keyframe(&self, media_ssrc: u32) -> ReflectResult<()>;
}

/// Receives stats ticks from the pump.
pub trait StatsObserver: Send + Sync {
    /// Called once per interval per track.
    fn on_stats(&self, track: &TrackInfo, sample: Option<&StatsSample>);
}
