use std::sync::Arc;

use crate::integration::{create_coordinator, init_tracing};
use crate::utils::{
    candidate_frame, join_frame, wait_for_offer, MockControlSink, SIGNAL_TIMEOUT_MS,
};

const HOST_CANDIDATE: &str =
    r#"{"candidate":"candidate:1 1 udp 2130706431 127.0.0.1 54321 typ host","sdpMid":"0","sdpMLineIndex":0}"#;

/// A candidate for a peer that never joined is dropped without side effects.
#[tokio::test]
async fn test_candidate_before_join_is_ignored() {
    init_tracing();

    let coordinator = create_coordinator();
    let (sink, mut frames) = MockControlSink::new();

    coordinator
        .handle_event(
            candidate_frame("ghost", "r1", HOST_CANDIDATE),
            Arc::clone(&sink) as _,
        )
        .await;

    assert_eq!(coordinator.room_count(), 0, "no room may appear");
    assert_eq!(sink.frame_count().await, 0);

    // The same connection can still join normally afterwards.
    coordinator
        .handle_event(join_frame("ghost", "r1"), Arc::clone(&sink) as _)
        .await;
    wait_for_offer(&mut frames, SIGNAL_TIMEOUT_MS)
        .await
        .expect("join after stray candidate should work");
}
