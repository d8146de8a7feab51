//! Real WebRTC peer connection handler using webrtc crate

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::{
    api::{
        interceptor_registry::register_default_interceptors,
        media_engine::MediaEngine,
        setting_engine::SettingEngine,
        APIBuilder, API,
    },
    ice::udp_network::{EphemeralUDP, UDPNetwork},
    ice_transport::ice_server::RTCIceServer,
    interceptor::registry::Registry,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        RTCPeerConnection,
    },
    rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication,
    rtp::packet::Packet,
    rtp_transceiver::{
        rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType},
        rtp_receiver::RTCRtpReceiver,
        rtp_sender::RTCRtpSender,
        RTCRtpTransceiver,
    },
    stats::StatsReportType,
    track::{
        track_local::{track_local_static_rtp::TrackLocalStaticRTP, TrackLocal, TrackLocalWriter},
        track_remote::TrackRemote,
    },
};

use crate::{
    config::ReflectConfig,
    error::{ReflectError, ReflectResult},
    pump::MediaPump,
    session::SessionControl,
    signal::SessionPayload,
    traits::{KeyframeRequester, PeerTransport, RtcpSource, RtpSink, RtpSource, StatsSource},
    types::{ConnectionState, StatsSample, TrackInfo},
};

/// Real WebRTC peer connection wrapper
///
/// Owns the connection, the outbound track the reflected video is written to, and
/// the sender carrying that track.
pub struct WebRtcPeer {
    /// Underlying WebRTC peer connection
    peer_connection: Arc<RTCPeerConnection>,

    /// Outbound track shared by every forwarder
    output_track: Arc<TrackLocalStaticRTP>,

    /// Sender for the outbound track (source of RTCP feedback)
    rtp_sender: Arc<RTCRtpSender>,

    closed: AtomicBool,
}

impl WebRtcPeer {
    /// Create the engine, the peer connection and the outbound track
    pub async fn new(config: &ReflectConfig) -> ReflectResult<Self> {
        config.validate()?;

        let api = build_api(config)?;

        let ice_servers = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = api.new_peer_connection(rtc_config).await.map_err(|e| {
            ReflectError::Engine(format!("Failed to create peer connection: {}", e))
        })?;
        let peer_connection = Arc::new(peer_connection);

        let output_track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: config.codec.mime_type.clone(),
                ..Default::default()
            },
            config.track_id.clone(),
            config.stream_id.clone(),
        ));

        let rtp_sender = peer_connection
            .add_track(Arc::clone(&output_track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| ReflectError::Engine(format!("Failed to add outbound track: {}", e)))?;

        tracing::info!(
            mime_type = %config.codec.mime_type,
            media_port = ?config.media_port,
            "Peer connection created"
        );

        Ok(Self {
            peer_connection,
            output_track,
            rtp_sender,
            closed: AtomicBool::new(false),
        })
    }

    /// Outbound track as a packet sink
    pub fn outbound(&self) -> Arc<dyn RtpSink> {
        self.output_track.clone()
    }

    /// RTCP feedback path of the outbound sender
    pub fn feedback(&self) -> Arc<dyn RtcpSource> {
        self.rtp_sender.clone()
    }

    /// Stats handle for inbound streams
    pub fn stats(&self) -> Arc<dyn StatsSource> {
        self.peer_connection.clone()
    }

    /// Keyframe requester for inbound streams
    pub fn keyframes(&self) -> Arc<dyn KeyframeRequester> {
        self.peer_connection.clone()
    }

    /// Forward connection state changes to `control`
    pub fn on_connection_state(&self, control: SessionControl) {
        self.peer_connection
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                control.observe_connection_state(ConnectionState::from(state));
                Box::pin(async {})
            }));
    }

    /// Hand every inbound track to `pump`
    pub fn on_inbound_track(&self, pump: Arc<MediaPump>) {
        self.peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                pump.attach(track);
                Box::pin(async {})
            },
        ));
    }

    /// Get connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.peer_connection.connection_state().into()
    }
}

fn build_api(config: &ReflectConfig) -> ReflectResult<API> {
    let mut media_engine = MediaEngine::default();

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: config.codec.mime_type.clone(),
                    clock_rate: config.codec.clock_rate,
                    channels: 0,
                    sdp_fmtp_line: config.codec.sdp_fmtp_line.clone(),
                    rtcp_feedback: vec![],
                },
                payload_type: config.codec.payload_type,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| ReflectError::Engine(format!("Failed to register codec: {}", e)))?;

    // NACK, RTCP reports and TWCC
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| ReflectError::Engine(format!("Failed to register interceptors: {}", e)))?;

    let mut setting_engine = SettingEngine::default();
    if let Some(port) = config.media_port {
        let ephemeral = EphemeralUDP::new(port, port)
            .map_err(|e| ReflectError::Config(format!("Invalid media port {}: {}", port, e)))?;
        setting_engine.set_udp_network(UDPNetwork::Ephemeral(ephemeral));
    }

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .with_setting_engine(setting_engine)
        .build())
}

#[async_trait]
impl PeerTransport for WebRtcPeer {
    async fn set_remote_description(&self, offer: &SessionPayload) -> ReflectResult<()> {
        let desc = offer.to_rtc()?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(|e| ReflectError::Protocol(format!("Failed to set remote description: {}", e)))
    }

    async fn create_answer(&self) -> ReflectResult<SessionPayload> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| ReflectError::Protocol(format!("Failed to create answer: {}", e)))?;
        SessionPayload::from_rtc(&answer)
    }

    async fn gathering_complete(&self) -> mpsc::Receiver<()> {
        self.peer_connection.gathering_complete_promise().await
    }

    async fn set_local_description(&self, answer: SessionPayload) -> ReflectResult<()> {
        let desc = answer.to_rtc()?;
        self.peer_connection
            .set_local_description(desc)
            .await
            .map_err(|e| ReflectError::Engine(format!("Failed to set local description: {}", e)))
    }

    async fn local_description(&self) -> ReflectResult<SessionPayload> {
        let desc = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| ReflectError::Engine("Local description not set".to_string()))?;
        SessionPayload::from_rtc(&desc)
    }

    async fn close(&self) -> ReflectResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.peer_connection.close().await.map_err(|e| {
            ReflectError::Engine(format!("Failed to close peer connection: {}", e))
        })
    }
}

#[async_trait]
impl RtpSource for TrackRemote {
    fn info(&self) -> TrackInfo {
        TrackInfo {
            ssrc: self.ssrc(),
            payload_type: self.payload_type(),
            mime_type: self.codec().capability.mime_type,
            track_id: self.id(),
        }
    }

    async fn next_packet(&self) -> ReflectResult<Packet> {
        match self.read_rtp().await {
            Ok((packet, _)) => Ok(packet),
            Err(webrtc::Error::ErrClosedPipe) => {
                Err(ReflectError::TrackEnded { ssrc: self.ssrc() })
            }
            Err(e) => Err(ReflectError::MediaIo(e.to_string())),
        }
    }
}

#[async_trait]
impl RtpSink for TrackLocalStaticRTP {
    // Returns the bytes written across all bindings; 0 means nothing is bound yet.
    async fn write_packet(&self, packet: &Packet) -> ReflectResult<()> {
        match self.write_rtp(packet).await {
            Ok(0) => Err(ReflectError::SinkUnavailable(
                "outbound track has no bound sender".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(ReflectError::MediaIo(e.to_string())),
        }
    }
}

#[async_trait]
impl RtcpSource for RTCRtpSender {
    async fn read_feedback(&self, buf: &mut [u8]) -> ReflectResult<usize> {
        let (packets, _) = self
            .read(buf)
            .await
            .map_err(|e| ReflectError::MediaIo(e.to_string()))?;
        Ok(packets.len())
    }
}

#[async_trait]
impl StatsSource for RTCPeerConnection {
    async fn sample(&self, ssrc: u32) -> Option<StatsSample> {
        let report = self.get_stats().await;
        report.reports.values().find_map(|entry| match entry {
            StatsReportType::InboundRTP(inbound) if inbound.ssrc == ssrc => Some(StatsSample {
                ssrc,
                kind: inbound.kind.to_string(),
                packets_received: inbound.packets_received,
                bytes_received: inbound.bytes_received,
                header_bytes_received: inbound.header_bytes_received,
                nack_count: inbound.nack_count,
                fir_count: inbound.fir_count,
                pli_count: inbound.pli_count,
                sampled_at: Utc::now(),
            }),
            _ => None,
        })
    }
}

#[async_trait]
impl KeyframeRequester for RTCPeerConnection {
    async fn request_keyframe(&self, media_ssrc: u32) -> ReflectResult<()> {
        self.write_rtcp(&[Box::new(PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc,
        })])
        .await?;
        Ok(())
    }
}
