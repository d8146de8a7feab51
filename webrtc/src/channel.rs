//! In-process signaling channel
//!
//! The session owns a [`ChannelSignaling`]; the transport layer (WebSocket handler)
//! owns the matching [`SignalBridge`] and calls [`SignalBridge::exchange`] for each
//! message it receives from the peer.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::error::{ReflectError, ReflectResult};
use crate::traits::SignalingChannel;

/// Session side of the signaling channel
pub struct ChannelSignaling {
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
}

/// Transport side of the signaling channel
#[derive(Clone)]
pub struct SignalBridge {
    inbound: mpsc::Sender<String>,
    outbound: Arc<Mutex<mpsc::Receiver<String>>>,
}

/// Create a connected session/transport pair
pub fn signaling_channel() -> (ChannelSignaling, SignalBridge) {
    let (in_tx, in_rx) = mpsc::channel(1);
    let (out_tx, out_rx) = mpsc::channel(1);

    (
        ChannelSignaling {
            inbound: in_rx,
            outbound: out_tx,
        },
        SignalBridge {
            inbound: in_tx,
            outbound: Arc::new(Mutex::new(out_rx)),
        },
    )
}

#[async_trait]
impl SignalingChannel for ChannelSignaling {
    async fn recv(&mut self) -> ReflectResult<String> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| ReflectError::Transport("signaling transport closed".to_string()))
    }

    async fn send(&mut self, message: String) -> ReflectResult<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| ReflectError::Transport("signaling transport closed".to_string()))
    }
}

impl SignalBridge {
    /// Deliver one peer message and wait for the session's reply
    ///
    /// Exchanges are serialized; a second caller waits for the first to finish.
    /// Fails once the session has dropped its side of the channel.
    pub async fn exchange(&self, message: String) -> ReflectResult<String> {
        let mut replies = self.outbound.lock().await;

        self.inbound
            .send(message)
            .await
            .map_err(|_| ReflectError::Transport("session is not accepting offers".to_string()))?;

        replies
            .recv()
            .await
            .ok_or_else(|| ReflectError::Transport("session ended without answering".to_string()))
    }

    /// Whether the session side is still listening
    pub fn is_open(&self) -> bool {
        !self.inbound.is_closed()
    }
}
