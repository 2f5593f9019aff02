use crate::coordinator::Coordinator;
use crate::error::SfuError;
use crate::room::forwarder;
use crate::signaling::ControlSink;
use crate::transport::{Peer, TransportConfig, TransportEvent};
use anyhow::Result;
use repeater_core::{PeerId, RoomId, WsMessage};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;
use tracing::{debug, info, warn};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Convergence passes per `signal()` call before backing off.
const MAX_SYNC_ATTEMPTS: usize = 25;

/// Cool-down before re-entering a signaling round that hit the attempt cap.
const SYNC_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Cadence of the PLI pulse toward every active receiver.
const KEYFRAME_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Default)]
struct RoomState {
    peers: HashMap<PeerId, Arc<Peer>>,
    /// Forwardable tracks keyed by the id the incoming remote track reported.
    tracks: HashMap<String, Arc<TrackLocalStaticRTP>>,
}

/// One conference room: the peer map, the track registry, and the signaling
/// engine keeping every peer's senders in agreement with the registry.
///
/// One coarse lock covers both maps; the critical sections are short and the
/// contention set is O(participants).
pub struct Room {
    pub id: RoomId,
    state: Mutex<RoomState>,
    coordinator: Weak<Coordinator>,
    transport_config: TransportConfig,
}

impl Room {
    pub fn new(
        id: RoomId,
        coordinator: Weak<Coordinator>,
        transport_config: TransportConfig,
    ) -> Arc<Self> {
        let room = Arc::new(Self {
            id,
            state: Mutex::new(RoomState::default()),
            coordinator,
            transport_config,
        });

        // New subscribers joining mid-stream need an intra-coded frame before
        // they can decode anything; a periodic PLI bounds time-to-first-frame
        // without per-join coordination. The ticker holds a weak handle so it
        // dies with the room.
        let weak = Arc::downgrade(&room);
        tokio::spawn(async move {
            let mut ticker = interval(KEYFRAME_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(room) = weak.upgrade() else { break };
                room.dispatch_keyframes().await;
            }
        });

        room
    }

    /// Construct a transport for the peer, install it in the room, and start
    /// its supervisor. A second join with the same id replaces the first: the
    /// stale transport is closed and its tracks age out through the forwarder
    /// exit path.
    pub async fn add_peer(
        self: &Arc<Self>,
        peer_id: PeerId,
        sink: Arc<dyn ControlSink>,
    ) -> Result<()> {
        let (peer, events) = Peer::connect(peer_id.clone(), &self.transport_config, sink).await?;

        let replaced = {
            let mut state = self.state.lock().await;
            state.peers.insert(peer_id.clone(), Arc::clone(&peer))
        };

        if let Some(old) = replaced {
            info!("Replacing peer {} in room {}", peer_id, self.id);
            if let Err(e) = old.close().await {
                warn!("Failed to close replaced transport for {}: {}", peer_id, e);
            }
        }

        self.spawn_peer_supervisor(peer, events);
        self.signal().await;

        Ok(())
    }

    /// Remove a peer, close its transport, and renegotiate the remainder.
    /// Returns whether the peer was present.
    pub async fn remove_peer(self: &Arc<Self>, peer_id: &PeerId) -> bool {
        let peer = {
            let mut state = self.state.lock().await;
            state.peers.remove(peer_id)
        };

        let Some(peer) = peer else { return false };

        if let Err(e) = peer.close().await {
            warn!("Failed to close transport for peer {}: {}", peer_id, e);
        }

        self.signal().await;
        true
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.peers.is_empty()
    }

    pub async fn peer(&self, peer_id: &PeerId) -> Option<Arc<Peer>> {
        self.state.lock().await.peers.get(peer_id).map(Arc::clone)
    }

    /// Mint a forwardable track mirroring the remote's codec, track id, and
    /// stream id, install it in the registry, and renegotiate.
    pub async fn add_track(self: &Arc<Self>, remote: &TrackRemote) -> Arc<TrackLocalStaticRTP> {
        let local = Arc::new(TrackLocalStaticRTP::new(
            remote.codec().capability,
            remote.id(),
            remote.stream_id(),
        ));

        {
            let mut state = self.state.lock().await;
            state.tracks.insert(local.id().to_owned(), Arc::clone(&local));
        }

        info!("Track {} added to room {}", local.id(), self.id);
        self.signal().await;

        local
    }

    /// Drop a track from the registry and renegotiate. Called exactly once by
    /// the forwarder that owned the track, when its read loop exits.
    pub async fn remove_track(self: &Arc<Self>, track_id: &str) {
        let removed = {
            let mut state = self.state.lock().await;
            state.tracks.remove(track_id).is_some()
        };

        if removed {
            info!("Track {} removed from room {}", track_id, self.id);
            self.signal().await;
        }
    }

    /// Bring every peer's senders into agreement with the track registry.
    ///
    /// Each attempt takes the room lock, runs one `attempt_sync` pass, and
    /// releases the lock before retrying from a fresh snapshot, so membership
    /// and add/remove-track callers blocked on the lock interleave between
    /// attempts. Hitting the attempt cap defers to a retry after a cool-down.
    pub async fn signal(self: &Arc<Self>) {
        for _ in 0..MAX_SYNC_ATTEMPTS {
            let mutated = {
                let mut state = self.state.lock().await;
                self.attempt_sync(&mut state).await
            };

            if !mutated {
                self.dispatch_keyframes().await;
                self.reap_if_empty().await;
                return;
            }
        }

        warn!(
            "Room {} did not converge after {} attempts, retrying in {:?}",
            self.id, MAX_SYNC_ATTEMPTS, SYNC_RETRY_DELAY
        );
        self.schedule_resync();
    }

    /// One synchronization pass over every peer. Returns true when room state
    /// was mutated mid-pass and the caller should retry from a fresh snapshot.
    async fn attempt_sync(&self, state: &mut RoomState) -> bool {
        let peer_ids: Vec<PeerId> = state.peers.keys().cloned().collect();

        for peer_id in peer_ids {
            let Some(peer) = state.peers.get(&peer_id).map(Arc::clone) else {
                continue;
            };

            if peer.connection_state() == RTCPeerConnectionState::Closed {
                info!("Reaping closed peer {} from room {}", peer_id, self.id);
                state.peers.remove(&peer_id);
                return true;
            }

            // Track ids this peer already sends, so nothing is double-added.
            let mut already_bound = HashSet::new();

            for sender in peer.senders().await {
                let Some(track) = sender.track().await else {
                    continue;
                };
                let track_id = track.id().to_owned();
                already_bound.insert(track_id.clone());

                // A sender whose track left the registry is stale.
                if !state.tracks.contains_key(&track_id)
                    && peer.remove_sender(&sender).await.is_err()
                {
                    return true;
                }
            }

            // A peer's own uploads show up here as receivers; never loop
            // them back to their origin.
            for receiver in peer.receivers().await {
                let Some(track) = receiver.tracks().await.into_iter().next() else {
                    continue;
                };
                already_bound.insert(track.id());
            }

            for (track_id, track) in &state.tracks {
                if !already_bound.contains(track_id)
                    && peer
                        .add_track(Arc::clone(track) as Arc<dyn TrackLocal + Send + Sync>)
                        .await
                        .is_err()
                {
                    return true;
                }
            }

            let offer = match peer.create_offer().await {
                Ok(offer) => offer,
                Err(e) => {
                    warn!("Offer creation failed for peer {}: {}", peer_id, e);
                    return true;
                }
            };

            if self.send_offer(&peer, &offer).await.is_err() {
                return true;
            }
        }

        false
    }

    async fn send_offer(&self, peer: &Peer, offer: &RTCSessionDescription) -> Result<(), SfuError> {
        let json =
            serde_json::to_string(offer).map_err(|e| SfuError::NegotiationFailed(e.to_string()))?;

        info!("Peer: {}; Room: {}; offer sent", peer.id, self.id);
        peer.send(&WsMessage::offer(json)).await
    }

    /// Ask every sending peer for a keyframe: one PLI per active receiver
    /// SSRC. Fire-and-forget; write errors are swallowed.
    async fn dispatch_keyframes(&self) {
        let state = self.state.lock().await;

        for peer in state.peers.values() {
            for receiver in peer.receivers().await {
                let Some(track) = receiver.tracks().await.into_iter().next() else {
                    continue;
                };

                let pli = PictureLossIndication {
                    sender_ssrc: 0,
                    media_ssrc: track.ssrc(),
                };
                let _ = peer.write_rtcp(&[Box::new(pli)]).await;
            }
        }
    }

    fn schedule_resync(self: &Arc<Self>) {
        let room = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(SYNC_RETRY_DELAY).await;
            room.signal().await;
        });
    }

    /// A signaling pass that reaped the last peer leaves the room empty; hand
    /// it back to the coordinator for destruction.
    async fn reap_if_empty(&self) {
        if !self.is_empty().await {
            return;
        }

        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.destroy_room_if_empty(&self.id).await;
        }
    }

    /// Route transport events for one peer: candidates out through its
    /// control channel, incoming tracks into forwarders, closure into a
    /// signaling pass that reaps the peer.
    fn spawn_peer_supervisor(
        self: &Arc<Self>,
        peer: Arc<Peer>,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        let room = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::CandidateGenerated(candidate) => {
                        debug!("Sending candidate to peer {}: {}", peer.id, candidate);
                        if let Err(e) = peer.send(&WsMessage::candidate(candidate)).await {
                            warn!("Failed to send candidate to peer {}: {}", peer.id, e);
                        }
                    }
                    TransportEvent::TrackReceived(track) => {
                        tokio::spawn(forwarder::forward(Arc::clone(&room), track));
                    }
                    TransportEvent::Closed => {
                        room.signal().await;
                        break;
                    }
                }
            }
        });
    }
}
