use crate::error::SfuError;
use crate::signaling::ControlSink;
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::TransportEvent;
use anyhow::Result;
use repeater_core::{PeerId, WsMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::TrackLocal;

/// One participant: its media transport plus the handle back to the control
/// channel that carries its offers and candidates.
///
/// The three negotiation operations are mutually exclusive on a single peer
/// (not across peers); everything else goes straight to the transport.
pub struct Peer {
    pub id: PeerId,
    sink: Arc<dyn ControlSink>,
    connection: Arc<RTCPeerConnection>,
    negotiation: Mutex<()>,
}

impl Peer {
    /// Build the peer transport: default codecs and interceptors, two
    /// receive-only transceivers (so an offer can be produced before any
    /// outbound sender exists), and the event callbacks. Returns the peer
    /// together with the receiving end of its transport-event channel.
    pub async fn connect(
        id: PeerId,
        config: &TransportConfig,
        sink: Arc<dyn ControlSink>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<TransportEvent>)> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let connection = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers: config.rtc_ice_servers(),
                ..Default::default()
            })
            .await?,
        );

        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            connection
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await?;
        }

        let (event_tx, event_rx) = mpsc::channel(256);

        let ice_tx = event_tx.clone();
        connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                // to_json keeps sdpMid intact; a plain struct dump does not.
                let Ok(init) = candidate.to_json() else { return };
                let Ok(json) = serde_json::to_string(&init) else {
                    return;
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(json)).await;
            })
        }));

        let state_tx = event_tx.clone();
        let uid_state = id.clone();
        let weak_connection = Arc::downgrade(&connection);
        connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();
                let weak = weak_connection.clone();

                Box::pin(async move {
                    info!("Connection state changed for peer {}: {}", uid, state);
                    match state {
                        RTCPeerConnectionState::Failed => {
                            // Close from a detached task: closing re-enters
                            // this handler with the `Closed` transition.
                            if let Some(connection) = weak.upgrade() {
                                tokio::spawn(async move {
                                    if let Err(e) = connection.close().await {
                                        warn!("Failed to close transport for peer {}: {}", uid, e);
                                    }
                                });
                            }
                        }
                        RTCPeerConnectionState::Closed => {
                            let _ = tx.send(TransportEvent::Closed).await;
                        }
                        _ => {}
                    }
                })
            },
        ));

        let track_tx = event_tx.clone();
        let uid_track = id.clone();
        connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            let uid = uid_track.clone();

            Box::pin(async move {
                info!(
                    "Got remote track from peer {}: kind={}, id={}",
                    uid,
                    track.kind(),
                    track.id()
                );

                // Hand the track off and return immediately: the handler must
                // not block, or the next track can never be delivered.
                let _ = tx.send(TransportEvent::TrackReceived(track)).await;
            })
        }));

        let uid_ice = id.clone();
        connection.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            let uid = uid_ice.clone();
            Box::pin(async move {
                info!("ICE connection state changed for peer {}: {}", uid, state);
            })
        }));

        let peer = Arc::new(Self {
            id,
            sink,
            connection,
            negotiation: Mutex::new(()),
        });

        Ok((peer, event_rx))
    }

    /// Produce a fresh offer and install it as the local description.
    pub async fn create_offer(&self) -> Result<RTCSessionDescription, SfuError> {
        let _guard = self.negotiation.lock().await;

        let offer = self
            .connection
            .create_offer(None)
            .await
            .map_err(|e| SfuError::NegotiationFailed(e.to_string()))?;

        self.connection
            .set_local_description(offer.clone())
            .await
            .map_err(|e| SfuError::NegotiationFailed(e.to_string()))?;

        Ok(offer)
    }

    /// Install the client's answer as the remote description.
    pub async fn apply_answer(&self, answer: RTCSessionDescription) -> Result<(), SfuError> {
        let _guard = self.negotiation.lock().await;

        self.connection
            .set_remote_description(answer)
            .await
            .map_err(|e| SfuError::NegotiationFailed(e.to_string()))
    }

    /// Add a remote ICE candidate.
    pub async fn apply_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), SfuError> {
        let _guard = self.negotiation.lock().await;

        self.connection
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| SfuError::CandidateRejected(e.to_string()))
    }

    /// Write one frame to the peer's control channel.
    pub async fn send(&self, msg: &WsMessage) -> Result<(), SfuError> {
        self.sink.send(msg).await
    }

    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.connection.connection_state()
    }

    pub async fn senders(&self) -> Vec<Arc<RTCRtpSender>> {
        self.connection.get_senders().await
    }

    pub async fn receivers(&self) -> Vec<Arc<RTCRtpReceiver>> {
        self.connection.get_receivers().await
    }

    pub async fn add_track(
        &self,
        track: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Result<(), webrtc::Error> {
        self.connection.add_track(track).await.map(|_| ())
    }

    pub async fn remove_sender(&self, sender: &Arc<RTCRtpSender>) -> Result<(), webrtc::Error> {
        self.connection.remove_track(sender).await
    }

    pub async fn write_rtcp(
        &self,
        packets: &[Box<dyn rtcp::packet::Packet + Send + Sync>],
    ) -> Result<(), webrtc::Error> {
        self.connection.write_rtcp(packets).await.map(|_| ())
    }

    pub async fn close(&self) -> Result<(), webrtc::Error> {
        self.connection.close().await
    }
}
