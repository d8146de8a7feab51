//! Reflector session manager - wires the peer, the pump and the handshake together

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::ReflectConfig,
    error::ReflectResult,
    handshake::{Handshake, HandshakeTimeouts},
    observer::ObserverHub,
    peer_connection::WebRtcPeer,
    pump::{MediaPump, PumpConfig},
    session::{HandshakeState, SessionControl, TerminationReason},
    signal::SignalEnvelope,
    traits::{PeerTransport, SignalingChannel},
};

impl From<&ReflectConfig> for PumpConfig {
    fn from(config: &ReflectConfig) -> Self {
        Self {
            stats_interval: config.stats_interval,
            keyframe_interval: config.keyframe_interval,
            rtcp_buffer_size: config.rtcp_buffer_size,
        }
    }
}

impl From<&ReflectConfig> for HandshakeTimeouts {
    fn from(config: &ReflectConfig) -> Self {
        Self {
            offer: config.offer_timeout,
            gathering: config.gathering_timeout,
        }
    }
}

/// Builds reflector sessions
///
/// Holds the configuration and the observer hub shared with monitoring clients.
pub struct Reflector {
    config: ReflectConfig,
    observer: Arc<ObserverHub>,
}

impl Reflector {
    /// Create a reflector with its own observer hub
    pub fn new(config: ReflectConfig) -> Self {
        let observer = Arc::new(ObserverHub::new(config.observer_backlog));
        Self::with_observer(config, observer)
    }

    /// Create a reflector publishing to an existing observer hub
    pub fn with_observer(config: ReflectConfig, observer: Arc<ObserverHub>) -> Self {
        Self { config, observer }
    }

    /// Observer hub for monitoring clients
    pub fn observer(&self) -> Arc<ObserverHub> {
        self.observer.clone()
    }

    /// Create the peer connection and arm the session
    ///
    /// On success the session is in `AwaitingOffer`, with the outbound track added
    /// and the track and connection-state handlers registered.
    pub async fn start(&self) -> ReflectResult<ReflectSession> {
        let id = Uuid::new_v4();
        let control = SessionControl::new();
        let peer = Arc::new(WebRtcPeer::new(&self.config).await?);

        let mut pump = MediaPump::new(
            peer.outbound(),
            peer.stats(),
            self.observer.clone(),
            PumpConfig::from(&self.config),
            control.child_token(),
        );
        if self.config.keyframe_interval.is_some() {
            pump = pump.with_keyframes(peer.keyframes());
        }
        let pump = Arc::new(pump);

        pump.drain_feedback(peer.feedback());
        peer.on_inbound_track(pump.clone());
        peer.on_connection_state(control.clone());

        control.transition(HandshakeState::Idle, HandshakeState::AwaitingOffer)?;
        tracing::info!(session_id = %id, "Session ready, awaiting offer");

        Ok(ReflectSession {
            id,
            peer,
            pump,
            control,
            observer: self.observer.clone(),
            timeouts: HandshakeTimeouts::from(&self.config),
        })
    }
}

/// One reflector session: a single peer, a single offer/answer exchange
pub struct ReflectSession {
    id: Uuid,
    peer: Arc<WebRtcPeer>,
    pump: Arc<MediaPump>,
    control: SessionControl,
    observer: Arc<ObserverHub>,
    timeouts: HandshakeTimeouts,
}

impl ReflectSession {
    /// Session identifier (log correlation only)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Shared state and lifetime handle
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        self.control.state()
    }

    /// Exchange the offer and the answer over `channel`
    ///
    /// The channel is consumed: once the answer is sent it is dropped, so later
    /// offers are refused by the transport.
    pub async fn negotiate<C>(&self, mut channel: C) -> ReflectResult<SignalEnvelope>
    where
        C: SignalingChannel,
    {
        let handshake = Handshake::new(
            self.peer.clone(),
            self.control.clone(),
            self.observer.clone(),
            self.timeouts,
        );

        let result = handshake.run(&mut channel).await;
        if let Err(e) = &result {
            tracing::error!(session_id = %self.id, error = %e, "Handshake failed");
        }
        result
    }

    /// Wait until the connection fails or the session is closed
    pub async fn terminated(&self) -> TerminationReason {
        self.control.terminated().await
    }

    /// Stop every task and release the connection; idempotent
    pub async fn close(&self) -> ReflectResult<()> {
        self.control.close();
        self.pump.shutdown().await;
        self.peer.close().await?;
        tracing::info!(session_id = %self.id, "Session resources released");
        Ok(())
    }
}
