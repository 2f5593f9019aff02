use std::sync::Arc;
use std::time::Duration;

use crate::integration::{create_coordinator, init_tracing};
use crate::utils::{spawn_rtp_pump, MediaClient, MEDIA_TIMEOUT_MS, REAP_TIMEOUT_MS};

/// A peer whose transport dies without a `leave` frame is reaped once the
/// transport reports failure: its track drops out of the other peers' offers
/// while the room survives, and a later real leave destroys the room.
#[tokio::test]
async fn test_transport_failure_reaps_peer() {
    init_tracing();

    let coordinator = create_coordinator();

    let alice = MediaClient::new(Arc::clone(&coordinator), "r1", "a")
        .await
        .expect("client a");
    let bob = MediaClient::new(Arc::clone(&coordinator), "r1", "b")
        .await
        .expect("client b");

    let audio = bob
        .publish_audio("audio_b", "stream_b")
        .await
        .expect("publish audio_b");

    alice.join().await;
    bob.join().await;

    let pump = spawn_rtp_pump(audio, 3000);

    alice
        .wait_for_media("audio_b", MEDIA_TIMEOUT_MS)
        .await
        .expect("alice should receive bob's audio");

    // Kill bob's transport outright; no leave frame is ever sent. The failure
    // must surface through the connection-state machine and the next
    // signaling pass, not through control-channel cleanup.
    bob.close().await.expect("close bob's transport");

    let deadline = tokio::time::Instant::now() + Duration::from_millis(REAP_TIMEOUT_MS);
    loop {
        assert!(
            tokio::time::Instant::now() < deadline,
            "offers to alice should drop audio_b after bob's transport dies"
        );

        match alice.sink().offers().await.last() {
            Some(last) if !last.contains("audio_b") => break,
            _ => tokio::time::sleep(Duration::from_millis(500)).await,
        }
    }

    assert_eq!(
        coordinator.room_count(),
        1,
        "room must survive with alice still present"
    );

    alice.leave().await;
    assert_eq!(
        coordinator.room_count(),
        0,
        "leave after the reap destroys the room"
    );

    pump.abort();
    alice.close().await.expect("close a");
}
