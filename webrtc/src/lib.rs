//! Reflect WebRTC Crate
//!
//! Single-peer video reflector: every RTP packet a browser sends is written back
//! to it, unmodified, on one outbound VP8 track.
//!
//! # Architecture
//!
//! - [`signal`]: JSON codec for the offer/answer exchange and observer messages
//! - [`Handshake`]: one offer in, one complete (non-trickle) answer out
//! - [`MediaPump`]: per-track forwarding, stats sampling and keyframe requests
//! - [`WebRtcPeer`]: the webrtc engine behind the [`traits`] seams
//! - [`Reflector`] / [`ReflectSession`]: wiring and lifecycle
//!
//! # Usage
//!
//! ```rust,no_run
//! use reflect_webrtc::{signaling_channel, ReflectConfig, Reflector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reflector = Reflector::new(ReflectConfig::from_env());
//!     let session = reflector.start().await?;
//!
//!     // Hand `bridge` to a WebSocket handler; it delivers the browser's offer.
//!     let (channel, bridge) = signaling_channel();
//!     # drop(bridge);
//!     session.negotiate(channel).await?;
//!
//!     let reason = session.terminated().await;
//!     println!("session ended: {:?}", reason);
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod channel;
mod config;
mod error;
mod handshake;
mod manager;
mod observer;
mod peer_connection;
mod pump;
mod session;
mod types;
pub mod signal; // Public module for the wire codec
pub mod traits; // Public module for trait definitions

// Re-exports
pub use channel::{signaling_channel, ChannelSignaling, SignalBridge};
pub use config::{ReflectConfig, VideoCodec};
pub use error::{ReflectError, ReflectResult};
pub use handshake::{Handshake, HandshakeTimeouts};
pub use manager::{ReflectSession, Reflector};
pub use observer::ObserverHub;
pub use peer_connection::WebRtcPeer;
pub use pump::{ForwardEnd, ForwardSummary, MediaPump, PumpConfig, TrackHandle};
pub use session::{HandshakeState, SessionControl, TerminationReason, WaitStage};
pub use signal::{ObserverEnvelope, SdpKind, SessionPayload, SignalEnvelope};
pub use types::{ConnectionState, StatsReport, StatsSample, TrackInfo};

/// Re-exported so fakes can build packets without depending on `webrtc` directly
pub use webrtc::rtp::packet::Packet;
