use crate::error::SfuError;
use crate::room::Room;
use crate::signaling::ControlSink;
use crate::transport::{Peer, TransportConfig};
use dashmap::DashMap;
use repeater_core::{PeerId, RoomId, WsMessage};
use std::sync::Arc;
use tracing::{error, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Process-wide room table plus the control-event dispatcher.
///
/// Rooms are created lazily on the first `join` that names them and destroyed
/// when their last peer is gone. The coordinator itself takes no lock: all
/// mutation crosses into a room, where the room lock governs.
pub struct Coordinator {
    rooms: DashMap<RoomId, Arc<Room>>,
    transport_config: TransportConfig,
}

impl Coordinator {
    pub fn new(transport_config: TransportConfig) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            transport_config,
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Route one inbound control frame to the right room and peer. Bad frames
    /// are logged and dropped; the connection stays open.
    pub async fn handle_event(self: &Arc<Self>, msg: WsMessage, sink: Arc<dyn ControlSink>) {
        let (peer_id, room_id) = match routing_fields(&msg) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Dropping control frame: {}", e);
                return;
            }
        };

        match msg.kind.as_str() {
            "join" => {
                info!("Peer {} joining room {}", peer_id, room_id);

                let room = self.room_or_create(&room_id);
                if let Err(e) = room.add_peer(peer_id.clone(), sink).await {
                    error!("Failed to add peer {} to room {}: {:#}", peer_id, room_id, e);
                    self.destroy_room_if_empty(&room_id).await;
                }
            }
            "leave" => {
                info!("Peer {} leaving room {}", peer_id, room_id);
                self.leave(&room_id, &peer_id).await;
            }
            "candidate" => {
                let Some(raw) = msg.data_str("candidate") else {
                    warn!("Candidate frame from peer {} has no candidate", peer_id);
                    return;
                };

                let candidate: RTCIceCandidateInit = match serde_json::from_str(raw) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        warn!("Failed to decode candidate from peer {}: {}", peer_id, e);
                        return;
                    }
                };

                let Some(peer) = self.peer(&room_id, &peer_id).await else {
                    warn!("Candidate for unknown peer {} in room {}", peer_id, room_id);
                    return;
                };

                if let Err(e) = peer.apply_candidate(candidate).await {
                    warn!("Candidate from peer {} rejected: {}", peer_id, e);
                }
            }
            "answer" => {
                let Some(raw) = msg.data_str("answer") else {
                    warn!("Answer frame from peer {} has no answer", peer_id);
                    return;
                };

                let answer: RTCSessionDescription = match serde_json::from_str(raw) {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!("Failed to decode answer from peer {}: {}", peer_id, e);
                        return;
                    }
                };

                let Some(peer) = self.peer(&room_id, &peer_id).await else {
                    warn!("Answer for unknown peer {} in room {}", peer_id, room_id);
                    return;
                };

                if let Err(e) = peer.apply_answer(answer).await {
                    warn!("Failed to apply answer from peer {}: {}", peer_id, e);
                }
            }
            other => {
                warn!("Ignoring control frame with unknown type {:?}", other);
            }
        }
    }

    /// Remove a room once it has no peers left. Also called by a room whose
    /// signaling pass reaped its last peer.
    pub(crate) async fn destroy_room_if_empty(&self, room_id: &RoomId) {
        let Some(room) = self.rooms.get(room_id).map(|r| Arc::clone(r.value())) else {
            return;
        };

        if room.is_empty().await {
            self.rooms.remove(room_id);
            info!("Destroyed empty room {}", room_id);
        }
    }

    fn room_or_create(self: &Arc<Self>, room_id: &RoomId) -> Arc<Room> {
        if let Some(room) = self.rooms.get(room_id) {
            return Arc::clone(room.value());
        }

        info!("Creating room {}", room_id);
        let room = Room::new(
            room_id.clone(),
            Arc::downgrade(self),
            self.transport_config.clone(),
        );

        let entry = self.rooms.entry(room_id.clone()).or_insert(room);
        Arc::clone(entry.value())
    }

    async fn peer(&self, room_id: &RoomId, peer_id: &PeerId) -> Option<Arc<Peer>> {
        let room = self.rooms.get(room_id).map(|r| Arc::clone(r.value()))?;
        room.peer(peer_id).await
    }

    async fn leave(&self, room_id: &RoomId, peer_id: &PeerId) {
        let Some(room) = self.rooms.get(room_id).map(|r| Arc::clone(r.value())) else {
            warn!("Leave for unknown room {}", room_id);
            return;
        };

        if !room.remove_peer(peer_id).await {
            warn!("Leave for unknown peer {} in room {}", peer_id, room_id);
        }

        self.destroy_room_if_empty(room_id).await;
    }
}

/// Every inbound frame must name the peer and room it concerns.
fn routing_fields(msg: &WsMessage) -> Result<(PeerId, RoomId), SfuError> {
    let peer_id = msg
        .data_str("peerId")
        .ok_or_else(|| SfuError::MalformedMessage(format!("{:?} frame without peerId", msg.kind)))?;
    let room_id = msg
        .data_str("roomId")
        .ok_or_else(|| SfuError::MalformedMessage(format!("{:?} frame without roomId", msg.kind)))?;

    Ok((PeerId::from(peer_id), RoomId::from(room_id)))
}
