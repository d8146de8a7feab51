//! Session state and session-scoped control
//!
//! [`SessionControl`] is the single place where the handshake state lives. Every task
//! a session spawns holds a clone and listens to its cancellation token, so tearing
//! the session down stops them all.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{ReflectError, ReflectResult};
use crate::types::ConnectionState;

/// Handshake state of a reflector session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandshakeState {
    /// Engine not yet initialized
    Idle,

    /// Engine and outbound track ready, waiting for the peer's offer
    AwaitingOffer,

    /// Offer applied as remote description
    HaveRemoteOffer,

    /// Answer set as pending local description
    HaveLocalAnswer,

    /// Waiting for local candidate discovery to finish
    GatheringIce,

    /// Answer sent; media may flow
    Established,

    /// Peer connection failed
    Failed,

    /// Session released
    Closed,
}

impl HandshakeState {
    /// Convert handshake state to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingOffer => "awaiting_offer",
            Self::HaveRemoteOffer => "have_remote_offer",
            Self::HaveLocalAnswer => "have_local_answer",
            Self::GatheringIce => "gathering_ice",
            Self::Established => "established",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl std::fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two unbounded suspension points of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitStage {
    /// Waiting for the peer's offer
    Offer,
    /// Waiting for local ICE gathering
    IceGathering,
}

impl std::fmt::Display for WaitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offer => f.write_str("offer"),
            Self::IceGathering => f.write_str("ICE gathering"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Engine reported a terminal connectivity failure
    ConnectivityFailure,
    /// Closed locally (shutdown or fatal error elsewhere)
    Closed,
}

struct ControlInner {
    state: watch::Sender<HandshakeState>,
    cancel: CancellationToken,
    reason: OnceLock<TerminationReason>,
}

/// Shared handle to a session's state and lifetime
#[derive(Clone)]
pub struct SessionControl {
    inner: Arc<ControlInner>,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    /// Create a control block in the `Idle` state
    pub fn new() -> Self {
        let (state, _) = watch::channel(HandshakeState::Idle);
        Self {
            inner: Arc::new(ControlInner {
                state,
                cancel: CancellationToken::new(),
                reason: OnceLock::new(),
            }),
        }
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        *self.inner.state.borrow()
    }

    /// Watch handshake state changes
    pub fn subscribe(&self) -> watch::Receiver<HandshakeState> {
        self.inner.state.subscribe()
    }

    /// Move from `from` to `to`, failing if the session is elsewhere
    pub fn transition(&self, from: HandshakeState, to: HandshakeState) -> ReflectResult<()> {
        let mut result = Ok(());
        self.inner.state.send_if_modified(|current| {
            if *current != from {
                result = Err(ReflectError::InvalidState {
                    expected: from,
                    actual: *current,
                });
                return false;
            }
            *current = to;
            true
        });

        if result.is_ok() {
            tracing::debug!(from = %from, to = %to, "Handshake transition");
        }
        result
    }

    /// React to an engine connection state change
    ///
    /// Returns `true` only for the report that actually terminated the session;
    /// repeated failure reports are ignored.
    pub fn observe_connection_state(&self, state: ConnectionState) -> bool {
        tracing::info!(state = %state, "Peer connection state has changed");

        match state {
            ConnectionState::Failed => self.terminate(TerminationReason::ConnectivityFailure),
            ConnectionState::Disconnected => {
                tracing::warn!("Peer connection disconnected, waiting for it to recover or fail");
                false
            }
            _ => false,
        }
    }

    /// Move the session to `Closed`; idempotent
    ///
    /// Also applies after a connectivity failure, which stays the recorded
    /// [`TerminationReason`]. Returns `true` for the call that reached `Closed`.
    pub fn close(&self) -> bool {
        if self.terminate(TerminationReason::Closed) {
            return true;
        }

        let moved = self.inner.state.send_if_modified(|current| {
            if *current == HandshakeState::Closed {
                return false;
            }
            *current = HandshakeState::Closed;
            true
        });
        if moved {
            tracing::info!("Session closed after failure");
        }
        moved
    }

    fn terminate(&self, reason: TerminationReason) -> bool {
        if self.inner.reason.set(reason).is_err() {
            return false;
        }

        let terminal = match reason {
            TerminationReason::ConnectivityFailure => HandshakeState::Failed,
            TerminationReason::Closed => HandshakeState::Closed,
        };
        self.inner.state.send_replace(terminal);
        self.inner.cancel.cancel();

        match reason {
            TerminationReason::ConnectivityFailure => {
                tracing::error!("Peer connection has gone to failed, ending session")
            }
            TerminationReason::Closed => tracing::info!("Session closed"),
        }
        true
    }

    /// Why the session ended, if it has
    pub fn termination(&self) -> Option<TerminationReason> {
        self.inner.reason.get().copied()
    }

    /// Wait until the session ends
    pub async fn terminated(&self) -> TerminationReason {
        self.inner.cancel.cancelled().await;
        self.termination().unwrap_or(TerminationReason::Closed)
    }

    /// Token cancelled when the session ends
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Child token for a task owned by this session
    pub fn child_token(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }
}
