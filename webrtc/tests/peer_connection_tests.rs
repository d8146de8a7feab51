//! Integration tests for real WebRTC peer connections
//!
//! A second webrtc peer plays the browser: it offers one VP8 track and expects
//! the reflector to answer with everything it needs in a single message.

use anyhow::Result;
use bytes::Bytes;
use reflect_webrtc::{
    signal::{decode, encode},
    signaling_channel, ConnectionState, HandshakeState, ReflectConfig, Reflector, SdpKind,
    SessionPayload, SignalEnvelope, TerminationReason,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use webrtc::{
    api::{media_engine::MediaEngine, APIBuilder},
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        sdp::session_description::RTCSessionDescription, RTCPeerConnection,
    },
    rtp::{header::Header, packet::Packet},
    rtp_transceiver::rtp_codec::RTCRtpCodecCapability,
    track::track_local::{track_local_static_rtp::TrackLocalStaticRTP, TrackLocal, TrackLocalWriter},
};

fn test_config() -> ReflectConfig {
    ReflectConfig {
        media_port: None,
        stats_interval: Duration::from_secs(1),
        ..Default::default()
    }
}

struct Browser {
    pc: Arc<RTCPeerConnection>,
    track: Arc<TrackLocalStaticRTP>,
}

async fn browser() -> Result<Browser> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let api = APIBuilder::new().with_media_engine(media_engine).build();

    let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);
    let track = Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: "video/VP8".to_string(),
            ..Default::default()
        },
        "camera".to_string(),
        "browser".to_string(),
    ));
    pc.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;

    Ok(Browser { pc, track })
}

/// Complete (non-trickle) offer, encoded as a signaling message
async fn complete_offer(pc: &RTCPeerConnection) -> Result<String> {
    let offer = pc.create_offer(None).await?;
    let mut gathered = pc.gathering_complete_promise().await;
    pc.set_local_description(offer).await?;
    let _ = gathered.recv().await;

    let local = pc
        .local_description()
        .await
        .ok_or_else(|| anyhow::anyhow!("offerer has no local description"))?;
    let payload = SessionPayload::from_rtc(&local)?;
    Ok(encode(&SignalEnvelope::new(payload, "browser-offer"))?)
}

#[tokio::test]
async fn test_session_starts_awaiting_offer() -> Result<()> {
    let reflector = Reflector::new(test_config());
    let session = reflector.start().await?;

    assert_eq!(session.state(), HandshakeState::AwaitingOffer);

    session.close().await?;
    assert_eq!(session.state(), HandshakeState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_invalid_codec_config_is_rejected() {
    let mut config = test_config();
    config.codec.mime_type = "audio/opus".to_string();

    let result = Reflector::new(config).start().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_answer_is_sent_once_for_a_real_offer() -> Result<()> {
    let reflector = Reflector::new(test_config());
    let observer = reflector.observer();
    let session = reflector.start().await?;
    let browser = browser().await?;

    let (channel, bridge) = signaling_channel();
    let offer = complete_offer(&browser.pc).await?;
    let exchange = tokio::spawn(async move { bridge.exchange(offer).await });

    let sent = session.negotiate(channel).await?;
    let received: SignalEnvelope = decode(&exchange.await??)?;

    assert_eq!(received, sent);
    assert_eq!(received.sdp.kind, SdpKind::Answer);
    assert_ne!(received.uuid, "browser-offer");
    assert!(received.sdp.sdp.contains("VP8/90000"));
    assert_eq!(session.state(), HandshakeState::Established);

    let (backlog, _) = observer.subscribe();
    assert_eq!(backlog.len(), 2);

    browser
        .pc
        .set_remote_description(RTCSessionDescription::answer(received.sdp.sdp)?)
        .await?;

    browser.pc.close().await?;
    session.close().await?;
    session.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "needs a routable network interface for host candidates"]
async fn test_media_is_reflected_back_to_the_sender() -> Result<()> {
    let reflector = Reflector::new(test_config());
    let session = reflector.start().await?;
    let browser = browser().await?;

    let (connected_tx, mut connected_rx) = mpsc::channel::<()>(1);
    browser
        .pc
        .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            if state == RTCPeerConnectionState::Connected {
                let _ = connected_tx.try_send(());
            }
            Box::pin(async {})
        }));

    let (reflected_tx, mut reflected_rx) = mpsc::channel::<u16>(16);
    browser.pc.on_track(Box::new(move |track, _, _| {
        let reflected_tx = reflected_tx.clone();
        Box::pin(async move {
            while let Ok((packet, _)) = track.read_rtp().await {
                if reflected_tx.send(packet.header.sequence_number).await.is_err() {
                    break;
                }
            }
        })
    }));

    let (channel, bridge) = signaling_channel();
    let offer = complete_offer(&browser.pc).await?;
    let exchange = tokio::spawn(async move { bridge.exchange(offer).await });
    session.negotiate(channel).await?;
    let answer: SignalEnvelope = decode(&exchange.await??)?;
    browser
        .pc
        .set_remote_description(answer.sdp.to_rtc()?)
        .await?;

    tokio::time::timeout(Duration::from_secs(20), connected_rx.recv()).await?;

    let writer = browser.track.clone();
    let sender = tokio::spawn(async move {
        for seq in 0u16..400 {
            let packet = Packet {
                header: Header {
                    version: 2,
                    sequence_number: seq,
                    timestamp: u32::from(seq) * 3000,
                    ..Default::default()
                },
                payload: Bytes::from_static(&[0x10, 0x00, 0x00]),
            };
            if writer.write_rtp(&packet).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let first = tokio::time::timeout(Duration::from_secs(20), reflected_rx.recv()).await?;
    assert!(first.is_some(), "reflected media should arrive");
    assert_eq!(
        session.control().termination(),
        None::<TerminationReason>
    );

    sender.abort();
    browser.pc.close().await?;
    session.close().await?;
    assert_ne!(
        ConnectionState::from(browser.pc.connection_state()),
        ConnectionState::Connected
    );
    Ok(())
}
