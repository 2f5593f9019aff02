use thiserror::Error;

/// Failure modes of the control and media planes.
///
/// Errors never cross a room boundary: each resolves to dropping a control
/// frame, retrying a convergence pass, or removing a peer.
#[derive(Debug, Error)]
pub enum SfuError {
    /// Control frame missing required fields or carrying wrong types.
    #[error("malformed control message: {0}")]
    MalformedMessage(String),

    /// Offer/answer operation rejected by the peer transport.
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Remote ICE candidate rejected by the peer transport.
    #[error("ICE candidate rejected: {0}")]
    CandidateRejected(String),

    /// Control channel is no longer writable.
    #[error("control channel closed")]
    TransportClosed,
}
