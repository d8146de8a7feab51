//! Shared state for the signaling routes.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use reflect_webrtc::{HandshakeState, ObserverHub, SessionControl, SignalBridge};

/// State handed to every route.
///
/// Signaling routes go through the bridge into the running session; observer
/// routes subscribe to the hub; health reads the session state.
#[derive(Clone)]
pub struct ApiState {
    /// Transport side of the session's signaling channel
    pub bridge: SignalBridge,
    /// Observer fan-out
    pub observer: Arc<ObserverHub>,
    /// Session whose state is reported on `/health`
    pub session: SessionControl,
    /// Cancelled when the server shuts down; long-lived sockets close on it
    pub shutdown: CancellationToken,
    /// Largest accepted signaling message, in bytes
    pub max_message_bytes: usize,
}

impl ApiState {
    /// Create API state for one reflector session
    pub fn new(bridge: SignalBridge, observer: Arc<ObserverHub>, session: SessionControl) -> Self {
        Self {
            bridge,
            observer,
            session,
            shutdown: CancellationToken::new(),
            max_message_bytes: 64 * 1024,
        }
    }

    /// Use an externally owned shutdown token
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Current handshake state
    pub fn session_state(&self) -> HandshakeState {
        self.session.state()
    }
}
