use crate::config::IceConfig;
use crate::media::{LocalTrack, RemoteStream};
use crate::negotiation::{PeerConnectionState, PeerConnector, PeerEventSink, PeerTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use duet_core::{IceCandidate, SdpKind, SessionDescription};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Builds native peer connections with the `webrtc` crate.
#[derive(Debug, Default, Clone)]
pub struct RtcPeerConnector;

#[async_trait]
impl PeerConnector for RtcPeerConnector {
    async fn connect(
        &self,
        ice: &IceConfig,
        local_tracks: &[LocalTrack],
        hooks: PeerEventSink,
    ) -> Result<Box<dyn PeerTransport>> {
        let transport = RtcPeerTransport::new(ice, local_tracks, hooks).await?;
        Ok(Box::new(transport))
    }
}

pub struct RtcPeerTransport {
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcPeerTransport {
    pub async fn new(ice: &IceConfig, local_tracks: &[LocalTrack], hooks: PeerEventSink) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice
                .ice_servers()
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        if local_tracks.is_empty() {
            peer_connection
                .add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .context("Failed to add receive-only audio transceiver")?;
        }

        for track in local_tracks {
            let sender = peer_connection
                .add_track(Arc::clone(track))
                .await
                .context("Failed to attach local track")?;

            // RTCP has to be drained for the interceptors to work.
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1500];
                while let Ok((_, _)) = sender.read(&mut buf).await {}
            });
        }

        let state_hooks = hooks.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let hooks = state_hooks.clone();
                Box::pin(async move {
                    info!("Peer connection state for {:?}: {:?}", hooks.peer(), s);
                    if let Some(state) = map_state(s) {
                        hooks.state_changed(state);
                    }
                })
            },
        ));

        let ice_hooks = hooks.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let hooks = ice_hooks.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                match candidate.to_json() {
                    Ok(init) => hooks.local_candidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }),
                    Err(e) => warn!("Failed to serialize local candidate: {}", e),
                }
            })
        }));

        let track_hooks = hooks;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let hooks = track_hooks.clone();
                Box::pin(async move {
                    debug!(
                        "Remote track {} in stream {} from {:?}",
                        track.id(),
                        track.stream_id(),
                        hooks.peer()
                    );
                    hooks.remote_stream(RemoteStream {
                        stream_id: track.stream_id(),
                        track_id: track.id(),
                        track: Some(track),
                    });
                })
            },
        ));

        Ok(Self { peer_connection })
    }
}

fn map_state(state: RTCPeerConnectionState) -> Option<PeerConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(PeerConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(PeerConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(PeerConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(PeerConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(PeerConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(PeerConnectionState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(rtc)
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription> {
    match description.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(description.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(description.sdp)),
        other => anyhow::bail!("unsupported description type {other:?}"),
    }
}

#[async_trait]
impl PeerTransport for RtcPeerTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(description)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
