//! Observer fan-out for monitoring clients
//!
//! SDP messages are retained so a monitor that connects after the exchange still
//! sees both descriptions. Stats messages are live only.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::broadcast;

use crate::error::ReflectResult;
use crate::signal::{encode, ObserverEnvelope, SessionPayload};
use crate::traits::StatsObserver;
use crate::types::{StatsReport, StatsSample, TrackInfo};

const LIVE_CAPACITY: usize = 64;

/// Broadcast hub for observer envelopes
pub struct ObserverHub {
    tx: broadcast::Sender<String>,
    backlog: Mutex<VecDeque<String>>,
    backlog_limit: usize,
}

impl ObserverHub {
    /// Create a hub retaining up to `backlog_limit` SDP messages
    pub fn new(backlog_limit: usize) -> Self {
        let (tx, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            tx,
            backlog: Mutex::new(VecDeque::with_capacity(backlog_limit)),
            backlog_limit,
        }
    }

    /// Publish a session description
    pub fn publish_sdp(&self, payload: &SessionPayload) -> ReflectResult<()> {
        self.publish(&ObserverEnvelope::sdp(payload)?)
    }

    /// Publish an envelope to every current subscriber
    pub fn publish(&self, envelope: &ObserverEnvelope) -> ReflectResult<()> {
        let message = encode(envelope)?;

        // Lock spans the send: a concurrent subscriber gets each message once,
        // in the backlog or on the live channel.
        let mut backlog = self.backlog.lock();
        if envelope.is_sdp() && self.backlog_limit > 0 {
            if backlog.len() == self.backlog_limit {
                backlog.pop_front();
            }
            backlog.push_back(message.clone());
        }
        let receivers = self.tx.send(message).unwrap_or(0);
        drop(backlog);

        tracing::debug!(kind = %envelope.kind, receivers, "Observer message published");
        Ok(())
    }

    /// Subscribe: retained SDP messages plus a live receiver
    pub fn subscribe(&self) -> (Vec<String>, broadcast::Receiver<String>) {
        let backlog = self.backlog.lock();
        let rx = self.tx.subscribe();
        (backlog.iter().cloned().collect(), rx)
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new(16)
    }
}

impl StatsObserver for ObserverHub {
    fn on_stats(&self, track: &TrackInfo, sample: Option<&StatsSample>) {
        match sample {
            Some(s) => tracing::info!(
                ssrc = track.ssrc,
                mime_type = %track.mime_type,
                packets_received = s.packets_received,
                bytes_received = s.bytes_received,
                nack_count = s.nack_count,
                "Stats for track"
            ),
            None => tracing::info!(
                ssrc = track.ssrc,
                mime_type = %track.mime_type,
                "No stats recorded for track yet"
            ),
        }

        let report = StatsReport { track, sample };
        let published = ObserverEnvelope::of("stats", &report).and_then(|env| self.publish(&env));
        if let Err(e) = published {
            tracing::warn!(error = %e, "Failed to publish stats");
        }
    }
}
