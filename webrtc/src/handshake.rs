//! Offer/answer handshake without trickle ICE
//!
//! One offer comes in over the signaling channel, one answer goes out. The answer
//! is sent only after local candidate gathering finishes, so it carries every
//! candidate and no further signaling is needed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ReflectError, ReflectResult};
use crate::observer::ObserverHub;
use crate::session::{HandshakeState, SessionControl, TerminationReason, WaitStage};
use crate::signal::{decode, encode, SdpKind, SignalEnvelope};
use crate::traits::{PeerTransport, SignalingChannel};

/// Deadlines for the handshake's two waits
#[derive(Debug, Clone, Copy, Default)]
pub struct HandshakeTimeouts {
    /// Deadline for the inbound offer
    pub offer: Option<Duration>,
    /// Deadline for ICE gathering
    pub gathering: Option<Duration>,
}

/// Drives one session through offer → answer
pub struct Handshake<P: PeerTransport + ?Sized> {
    peer: Arc<P>,
    control: SessionControl,
    observer: Arc<ObserverHub>,
    timeouts: HandshakeTimeouts,
}

impl<P: PeerTransport + ?Sized> Handshake<P> {
    /// Create a handshake over `peer`
    pub fn new(
        peer: Arc<P>,
        control: SessionControl,
        observer: Arc<ObserverHub>,
        timeouts: HandshakeTimeouts,
    ) -> Self {
        Self {
            peer,
            control,
            observer,
            timeouts,
        }
    }

    /// Run the whole exchange on `channel`
    ///
    /// Expects the session in `AwaitingOffer`; leaves it in `Established` and
    /// returns the answer that was sent.
    pub async fn run<C>(&self, channel: &mut C) -> ReflectResult<SignalEnvelope>
    where
        C: SignalingChannel + ?Sized,
    {
        let offer = self.receive_offer(channel).await?;
        self.answer(channel, &offer).await
    }

    /// Wait for the offer and apply it (`AwaitingOffer → HaveRemoteOffer`)
    pub async fn receive_offer<C>(&self, channel: &mut C) -> ReflectResult<SignalEnvelope>
    where
        C: SignalingChannel + ?Sized,
    {
        let text = self
            .bounded(WaitStage::Offer, self.timeouts.offer, channel.recv())
            .await?;

        tracing::debug!(bytes = text.len(), "Signal message received");
        self.accept_offer(&text).await
    }

    /// Decode and apply an offer
    ///
    /// Decoding happens before anything else: malformed text leaves the state
    /// untouched and publishes nothing.
    pub async fn accept_offer(&self, text: &str) -> ReflectResult<SignalEnvelope> {
        let actual = self.control.state();
        if actual != HandshakeState::AwaitingOffer {
            return Err(ReflectError::InvalidState {
                expected: HandshakeState::AwaitingOffer,
                actual,
            });
        }

        let offer: SignalEnvelope = decode(text)?;
        if offer.sdp.kind != SdpKind::Offer {
            return Err(ReflectError::Protocol(format!(
                "expected an offer, got {}",
                offer.sdp.kind
            )));
        }

        tracing::info!(uuid = %offer.uuid, "Offer received");
        self.observer.publish_sdp(&offer.sdp)?;

        self.peer.set_remote_description(&offer.sdp).await?;
        self.control
            .transition(HandshakeState::AwaitingOffer, HandshakeState::HaveRemoteOffer)?;

        Ok(offer)
    }

    /// Build, gather and send the answer (`HaveRemoteOffer → … → Established`)
    async fn answer<C>(
        &self,
        channel: &mut C,
        offer: &SignalEnvelope,
    ) -> ReflectResult<SignalEnvelope>
    where
        C: SignalingChannel + ?Sized,
    {
        let answer = self.peer.create_answer().await?;

        let mut gathered = self.peer.gathering_complete().await;
        self.peer.set_local_description(answer).await?;
        self.control
            .transition(HandshakeState::HaveRemoteOffer, HandshakeState::HaveLocalAnswer)?;

        self.control
            .transition(HandshakeState::HaveLocalAnswer, HandshakeState::GatheringIce)?;
        // The engine signals completion by sending or by dropping the sender.
        self.bounded(WaitStage::IceGathering, self.timeouts.gathering, async {
            gathered.recv().await;
            Ok(())
        })
        .await?;

        let local = self.peer.local_description().await?;
        let reply = SignalEnvelope::with_fresh_id(local);
        tracing::info!(
            offer_uuid = %offer.uuid,
            answer_uuid = %reply.uuid,
            candidates = reply.sdp.has_candidates(),
            "ICE gathering complete, sending answer"
        );

        channel.send(encode(&reply)?).await?;
        self.observer.publish_sdp(&reply.sdp)?;

        self.control
            .transition(HandshakeState::GatheringIce, HandshakeState::Established)?;
        Ok(reply)
    }

    /// Await `fut` with an optional deadline; aborts when the session ends
    ///
    /// A wait cut short by a connectivity failure reports that failure.
    async fn bounded<T, F>(
        &self,
        stage: WaitStage,
        limit: Option<Duration>,
        fut: F,
    ) -> ReflectResult<T>
    where
        F: Future<Output = ReflectResult<T>>,
    {
        let cancel = self.control.cancellation();
        let wait = async {
            match limit {
                Some(after) => tokio::time::timeout(after, fut)
                    .await
                    .map_err(|_| ReflectError::Timeout { stage, after })?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(match self.control.termination() {
                Some(TerminationReason::ConnectivityFailure) => ReflectError::ConnectivityFailure,
                _ => ReflectError::Cancelled(stage),
            }),
            result = wait => result,
        }
    }
}
