use crate::room::Room;
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_remote::TrackRemote;

/// Large enough for one RTP packet on any sane path MTU.
const RTP_BUFFER_SIZE: usize = 1500;

/// Pump RTP from one incoming remote track into the room's forwardable track
/// until the source dries up, then retire the track from the registry.
pub(crate) async fn forward(room: Arc<Room>, remote: Arc<TrackRemote>) {
    let local = room.add_track(&remote).await;

    let mut buf = vec![0u8; RTP_BUFFER_SIZE];
    loop {
        let (mut packet, _) = match remote.read(&mut buf).await {
            Ok(read) => read,
            Err(e) => {
                debug!("RTP read ended for track {}: {}", remote.id(), e);
                break;
            }
        };

        // Header-extension ids are negotiated per peer connection and are not
        // valid across the fan-out; strip them instead of rewriting them for
        // each recipient.
        packet.header.extension = false;
        packet.header.extensions.clear();

        if let Err(e) = local.write_rtp(&packet).await {
            warn!("RTP write failed for track {}: {}", remote.id(), e);
            break;
        }
    }

    room.remove_track(&remote.id()).await;
}
