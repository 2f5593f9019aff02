use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Events a peer's media transport reports to its supervisor task.
pub enum TransportEvent {
    /// Local ICE candidate, already serialized in its canonical JSON form.
    CandidateGenerated(String),
    /// A remote track started flowing; a forwarder should take it over.
    TrackReceived(Arc<TrackRemote>),
    /// The transport reached its terminal state.
    Closed,
}
