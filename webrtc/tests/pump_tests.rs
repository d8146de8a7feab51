//! Media pump tests with in-process tracks

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reflect_webrtc::{
    traits::{KeyframeRequester, RtcpSource, RtpSink, RtpSource, StatsObserver, StatsSource},
    ForwardEnd, MediaPump, Packet, PumpConfig, ReflectError, ReflectResult, StatsSample, TrackInfo,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use webrtc::rtp::header::Header;

/// What a source does once its queued packets run out
#[derive(Clone)]
enum AfterQueue {
    End,
    Fail,
    Live,
}

struct FakeTrack {
    info: TrackInfo,
    queue: Mutex<VecDeque<Packet>>,
    after: AfterQueue,
}

impl FakeTrack {
    fn new(ssrc: u32, count: u16, after: AfterQueue) -> Arc<Self> {
        let queue = (1..=count).map(|seq| packet(ssrc, seq)).collect();
        Arc::new(Self {
            info: TrackInfo {
                ssrc,
                payload_type: 96,
                mime_type: "video/VP8".to_string(),
                track_id: format!("track-{}", ssrc),
            },
            queue: Mutex::new(queue),
            after,
        })
    }
}

fn packet(ssrc: u32, sequence_number: u16) -> Packet {
    Packet {
        header: Header {
            version: 2,
            payload_type: 96,
            sequence_number,
            timestamp: u32::from(sequence_number) * 3000,
            ssrc,
            ..Default::default()
        },
        payload: Bytes::from(vec![0x90, 0x80, sequence_number as u8]),
    }
}

#[async_trait]
impl RtpSource for FakeTrack {
    fn info(&self) -> TrackInfo {
        self.info.clone()
    }

    async fn next_packet(&self) -> ReflectResult<Packet> {
        let next = self.queue.lock().pop_front();
        if let Some(packet) = next {
            tokio::task::yield_now().await;
            return Ok(packet);
        }
        match self.after {
            AfterQueue::End => Err(ReflectError::TrackEnded {
                ssrc: self.info.ssrc,
            }),
            AfterQueue::Fail => Err(ReflectError::MediaIo("read failed".to_string())),
            AfterQueue::Live => std::future::pending().await,
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    written: Mutex<Vec<(u32, u16)>>,
    unavailable_for: AtomicUsize,
}

impl RecordingSink {
    fn unbound_for(writes: usize) -> Self {
        Self {
            unavailable_for: AtomicUsize::new(writes),
            ..Default::default()
        }
    }

    fn sequence_of(&self, ssrc: u32) -> Vec<u16> {
        self.written
            .lock()
            .iter()
            .filter(|(s, _)| *s == ssrc)
            .map(|(_, seq)| *seq)
            .collect()
    }
}

#[async_trait]
impl RtpSink for RecordingSink {
    async fn write_packet(&self, packet: &Packet) -> ReflectResult<()> {
        let unbound = self
            .unavailable_for
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if unbound {
            return Err(ReflectError::SinkUnavailable("no receiver".to_string()));
        }
        self.written
            .lock()
            .push((packet.header.ssrc, packet.header.sequence_number));
        Ok(())
    }
}

#[derive(Default)]
struct CountingStats {
    samples: AtomicUsize,
}

#[async_trait]
impl StatsSource for CountingStats {
    async fn sample(&self, ssrc: u32) -> Option<StatsSample> {
        let n = self.samples.fetch_add(1, Ordering::SeqCst) as u64;
        Some(StatsSample {
            ssrc,
            kind: "video".to_string(),
            packets_received: n * 10,
            bytes_received: n * 12_000,
            header_bytes_received: n * 120,
            nack_count: 0,
            fir_count: None,
            pli_count: Some(n),
            sampled_at: chrono::Utc::now(),
        })
    }
}

#[derive(Default)]
struct RecordingObserver {
    reports: Mutex<Vec<(u32, tokio::time::Instant)>>,
}

impl RecordingObserver {
    fn count(&self) -> usize {
        self.reports.lock().len()
    }
}

impl StatsObserver for RecordingObserver {
    fn on_stats(&self, track: &TrackInfo, sample: Option<&StatsSample>) {
        assert_eq!(sample.map(|s| s.ssrc), Some(track.ssrc));
        self.reports
            .lock()
            .push((track.ssrc, tokio::time::Instant::now()));
    }
}

#[derive(Default)]
struct CountingKeyframes {
    requests: AtomicUsize,
}

#[async_trait]
impl KeyframeRequester for CountingKeyframes {
    async fn request_keyframe(&self, _media_ssrc: u32) -> ReflectResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    pump: MediaPump,
    sink: Arc<RecordingSink>,
    observer: Arc<RecordingObserver>,
    cancel: CancellationToken,
}

fn harness(sink: RecordingSink, config: PumpConfig) -> Harness {
    let sink = Arc::new(sink);
    let observer = Arc::new(RecordingObserver::default());
    let cancel = CancellationToken::new();
    let pump = MediaPump::new(
        sink.clone(),
        Arc::new(CountingStats::default()),
        observer.clone(),
        config,
        cancel.clone(),
    );
    Harness {
        pump,
        sink,
        observer,
        cancel,
    }
}

fn no_keyframes() -> PumpConfig {
    PumpConfig {
        keyframe_interval: None,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_packets_are_forwarded_in_order() {
    let h = harness(RecordingSink::default(), no_keyframes());

    let handle = h.pump.attach(FakeTrack::new(1111, 200, AfterQueue::End));
    let summary = handle.finished().await;

    assert_eq!(summary.end, ForwardEnd::TrackEnded);
    assert_eq!(summary.forwarded, 200);
    assert_eq!(summary.dropped, 0);
    assert_eq!(h.sink.sequence_of(1111), (1..=200).collect::<Vec<u16>>());
}

#[tokio::test]
async fn test_failing_track_does_not_disturb_its_sibling() {
    let h = harness(RecordingSink::default(), no_keyframes());

    let failing = h.pump.attach(FakeTrack::new(1, 3, AfterQueue::Fail));
    let healthy = h.pump.attach(FakeTrack::new(2, 100, AfterQueue::End));

    let failed = failing.finished().await;
    assert!(matches!(failed.end, ForwardEnd::Failed(_)));
    assert_eq!(failed.forwarded, 3);

    let ok = healthy.finished().await;
    assert_eq!(ok.end, ForwardEnd::TrackEnded);
    assert_eq!(h.sink.sequence_of(2), (1..=100).collect::<Vec<u16>>());
    assert_eq!(h.sink.sequence_of(1), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_unbound_sink_drops_and_keeps_forwarding() {
    let h = harness(RecordingSink::unbound_for(4), no_keyframes());

    let summary = h
        .pump
        .attach(FakeTrack::new(7, 10, AfterQueue::End))
        .finished()
        .await;

    assert_eq!(summary.dropped, 4);
    assert_eq!(summary.forwarded, 6);
    assert_eq!(h.sink.sequence_of(7), (5..=10).collect::<Vec<u16>>());
}

#[tokio::test(start_paused = true)]
async fn test_stats_follow_the_interval_and_stop_with_the_track() {
    let config = PumpConfig {
        stats_interval: Duration::from_secs(5),
        ..no_keyframes()
    };
    let h = harness(RecordingSink::default(), config);

    let handle = h.pump.attach(FakeTrack::new(42, 0, AfterQueue::Live));

    tokio::time::sleep(Duration::from_secs(12)).await;
    // Ticks at 0s, 5s and 10s.
    assert_eq!(h.observer.count(), 3);

    let reports = h.observer.reports.lock().clone();
    for pair in reports.windows(2) {
        assert_eq!(pair[1].1 - pair[0].1, Duration::from_secs(5));
    }

    handle.stop();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.pump.running_tasks(), 0, "no task outlives the track");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.observer.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_track_end_stops_stats_within_one_interval() {
    let h = harness(RecordingSink::default(), no_keyframes());

    let summary = h
        .pump
        .attach(FakeTrack::new(9, 5, AfterQueue::End))
        .finished()
        .await;
    assert_eq!(summary.end, ForwardEnd::TrackEnded);

    let reported = h.observer.count();
    tokio::time::sleep(PumpConfig::default().stats_interval).await;

    assert_eq!(h.pump.running_tasks(), 0);
    assert!(h.observer.count() <= reported + 1);
    assert!(h.observer.count() <= 1);
}

#[tokio::test(start_paused = true)]
async fn test_keyframes_are_requested_periodically() {
    let keyframes = Arc::new(CountingKeyframes::default());
    let config = PumpConfig {
        keyframe_interval: Some(Duration::from_secs(3)),
        ..Default::default()
    };
    let sink = Arc::new(RecordingSink::default());
    let pump = MediaPump::new(
        sink,
        Arc::new(CountingStats::default()),
        Arc::new(RecordingObserver::default()),
        config,
        CancellationToken::new(),
    )
    .with_keyframes(keyframes.clone());

    let handle = pump.attach(FakeTrack::new(5, 0, AfterQueue::Live));
    tokio::time::sleep(Duration::from_secs(10)).await;
    // Requests at 0s, 3s, 6s and 9s.
    assert_eq!(keyframes.requests.load(Ordering::SeqCst), 4);

    handle.stop();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(keyframes.requests.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_shutdown_cancels_every_track() {
    let h = harness(RecordingSink::default(), no_keyframes());

    let first = h.pump.attach(FakeTrack::new(1, 2, AfterQueue::Live));
    let second = h.pump.attach(FakeTrack::new(2, 2, AfterQueue::Live));

    h.pump.shutdown().await;

    assert!(h.cancel.is_cancelled());
    assert!(first.is_stopped());
    assert_eq!(first.finished().await.end, ForwardEnd::Cancelled);
    assert_eq!(second.finished().await.end, ForwardEnd::Cancelled);
    assert_eq!(h.pump.running_tasks(), 0);
}

struct FiniteFeedback {
    remaining: AtomicUsize,
}

#[async_trait]
impl RtcpSource for FiniteFeedback {
    async fn read_feedback(&self, buf: &mut [u8]) -> ReflectResult<usize> {
        assert_eq!(buf.len(), 1500);
        match self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(_) => Ok(2),
            Err(_) => Err(ReflectError::MediaIo("sender closed".to_string())),
        }
    }
}

#[tokio::test]
async fn test_feedback_is_drained_until_the_sender_closes() {
    let h = harness(RecordingSink::default(), no_keyframes());

    let drained = h
        .pump
        .drain_feedback(Arc::new(FiniteFeedback {
            remaining: AtomicUsize::new(5),
        }))
        .await
        .unwrap();

    assert_eq!(drained, 10);
}
