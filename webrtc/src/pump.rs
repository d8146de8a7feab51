//! Media pump: forwarding, statistics, keyframe and feedback tasks
//!
//! Each inbound track gets its own forwarder, stats reporter and (optionally)
//! keyframe requester, all tied to one per-track cancellation token that is a child
//! of the session token. When the forwarder stops, its siblings stop with it.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::ReflectError;
use crate::traits::{
    KeyframeRequester, RtcpSource, RtpSink, RtpSource, StatsObserver, StatsSource,
};
use crate::types::TrackInfo;

/// Intervals for the per-track background tasks
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    /// Stats sampling period
    pub stats_interval: Duration,
    /// Keyframe request period (`None` disables the requester)
    pub keyframe_interval: Option<Duration>,
    /// Buffer size for RTCP reads
    pub rtcp_buffer_size: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(5),
            keyframe_interval: Some(Duration::from_secs(3)),
            rtcp_buffer_size: 1500,
        }
    }
}

/// How a forwarding loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardEnd {
    /// Inbound track reached end of stream
    TrackEnded,
    /// Session or track was cancelled
    Cancelled,
    /// Unrecoverable read or write error
    Failed(String),
}

/// Per-track forwarding summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSummary {
    /// Track that was forwarded
    pub ssrc: u32,
    /// Packets written to the outbound track
    pub forwarded: u64,
    /// Packets dropped because the outbound track had no receiver
    pub dropped: u64,
    /// Why the loop stopped
    pub end: ForwardEnd,
}

/// Handle to one attached inbound track
pub struct TrackHandle {
    info: TrackInfo,
    cancel: CancellationToken,
    forwarder: JoinHandle<ForwardSummary>,
}

impl TrackHandle {
    /// Track description
    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// Stop every task belonging to this track
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Whether the track's tasks have been told to stop
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the forwarder to end
    pub async fn finished(self) -> ForwardSummary {
        let ssrc = self.info.ssrc;
        match self.forwarder.await {
            Ok(summary) => summary,
            Err(e) => ForwardSummary {
                ssrc,
                forwarded: 0,
                dropped: 0,
                end: ForwardEnd::Failed(format!("forwarder task aborted: {}", e)),
            },
        }
    }
}

/// Copies inbound media to the shared outbound track
pub struct MediaPump {
    sink: Arc<dyn RtpSink>,
    stats: Arc<dyn StatsSource>,
    observer: Arc<dyn StatsObserver>,
    keyframes: Option<Arc<dyn KeyframeRequester>>,
    config: PumpConfig,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl MediaPump {
    /// Create a pump writing to `sink`, scoped to `cancel`
    pub fn new(
        sink: Arc<dyn RtpSink>,
        stats: Arc<dyn StatsSource>,
        observer: Arc<dyn StatsObserver>,
        config: PumpConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sink,
            stats,
            observer,
            keyframes: None,
            config,
            cancel,
            tasks: TaskTracker::new(),
        }
    }

    /// Periodically request keyframes through `requester`
    pub fn with_keyframes(mut self, requester: Arc<dyn KeyframeRequester>) -> Self {
        self.keyframes = Some(requester);
        self
    }

    /// Start forwarding an inbound track
    pub fn attach(&self, source: Arc<dyn RtpSource>) -> TrackHandle {
        let info = source.info();
        let cancel = self.cancel.child_token();

        tracing::info!(
            ssrc = info.ssrc,
            payload_type = info.payload_type,
            mime_type = %info.mime_type,
            "Track has started"
        );

        self.tasks.spawn(report_stats(
            info.clone(),
            self.stats.clone(),
            self.observer.clone(),
            self.config.stats_interval,
            cancel.clone(),
        ));

        if let (Some(requester), Some(period)) =
            (self.keyframes.clone(), self.config.keyframe_interval)
        {
            self.tasks.spawn(request_keyframes(
                info.ssrc,
                requester,
                period,
                cancel.clone(),
            ));
        }

        let forwarder = self
            .tasks
            .spawn(forward(source, self.sink.clone(), cancel.clone()));

        TrackHandle {
            info,
            cancel,
            forwarder,
        }
    }

    /// Drain RTCP from an outbound sender until it closes
    pub fn drain_feedback(&self, feedback: Arc<dyn RtcpSource>) -> JoinHandle<u64> {
        let cancel = self.cancel.clone();
        let size = self.config.rtcp_buffer_size;

        self.tasks.spawn(async move {
            let mut buf = vec![0u8; size];
            let mut packets = 0u64;
            loop {
                let read = tokio::select! {
                    _ = cancel.cancelled() => break,
                    read = feedback.read_feedback(&mut buf) => read,
                };
                match read {
                    Ok(n) => packets += n as u64,
                    Err(e) => {
                        tracing::debug!(error = %e, "RTCP feedback path closed");
                        break;
                    }
                }
            }
            packets
        })
    }

    /// Cancel every task and wait for them to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Number of tasks still running
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }
}

async fn forward(
    source: Arc<dyn RtpSource>,
    sink: Arc<dyn RtpSink>,
    cancel: CancellationToken,
) -> ForwardSummary {
    let ssrc = source.info().ssrc;
    let mut forwarded = 0u64;
    let mut dropped = 0u64;

    let end = loop {
        let packet = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ForwardEnd::Cancelled,
            packet = source.next_packet() => packet,
        };

        let packet = match packet {
            Ok(packet) => packet,
            Err(ReflectError::TrackEnded { .. }) => break ForwardEnd::TrackEnded,
            Err(e) => {
                tracing::error!(ssrc, error = %e, "Failed to read RTP packet");
                break ForwardEnd::Failed(e.to_string());
            }
        };

        match sink.write_packet(&packet).await {
            Ok(()) => forwarded += 1,
            Err(ReflectError::SinkUnavailable(reason)) => {
                dropped += 1;
                tracing::trace!(ssrc, %reason, "Outbound track not bound, packet dropped");
            }
            Err(e) => {
                tracing::error!(ssrc, error = %e, "Failed to write RTP packet");
                break ForwardEnd::Failed(e.to_string());
            }
        }
    };

    // Siblings (stats, keyframes) share this token.
    cancel.cancel();
    tracing::info!(ssrc, forwarded, dropped, end = ?end, "Forwarding stopped");

    ForwardSummary {
        ssrc,
        forwarded,
        dropped,
        end,
    }
}

async fn report_stats(
    track: TrackInfo,
    stats: Arc<dyn StatsSource>,
    observer: Arc<dyn StatsObserver>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sample = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sample = stats.sample(track.ssrc) => sample,
        };
        observer.on_stats(&track, sample.as_ref());
    }

    tracing::debug!(ssrc = track.ssrc, "Stats reporting stopped");
}

async fn request_keyframes(
    ssrc: u32,
    requester: Arc<dyn KeyframeRequester>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = requester.request_keyframe(ssrc).await {
            tracing::debug!(ssrc, error = %e, "Keyframe request failed, stopping requester");
            break;
        }
    }
}
