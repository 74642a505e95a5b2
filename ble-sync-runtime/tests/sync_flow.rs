//! End-to-end actor tests: a full device wired up to the in-memory
//! fakes from `ble-sync-testing`, driven through the mailbox.

use std::sync::Arc;
use std::time::Duration;

use ble_sync_core::{DeviceId, EventCount, EventOffset, PageSize, SyncEngineConfig, SyncSnapshot};
use ble_sync_runtime::{Actor, Message};
use ble_sync_testing::{InMemoryBle, InMemoryDelivery, InMemoryStateStore, RecordingTelemetry, VirtualClock};

fn device() -> DeviceId {
    DeviceId::new("dev-1").expect("non-empty literal")
}

/// Best-effort: lets `RUST_LOG` surface the actor's `tracing` spans when
/// a test run needs diagnosing. Ignored if a subscriber is already
/// installed (tests in this file can run concurrently).
fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

#[tokio::test]
async fn a_fresh_device_syncs_fully_without_any_faults() {
    init_tracing();
    let ble = Arc::new(InMemoryBle::new());
    let delivery = Arc::new(InMemoryDelivery::new());
    let clock = Arc::new(VirtualClock::new(0));
    let store = Arc::new(InMemoryStateStore::new());
    let telemetry = Arc::new(RecordingTelemetry::new());

    ble.seed_events(&device(), EventCount::new(120));

    let (actor, handle) = Actor::new(
        device(),
        SyncEngineConfig::default(),
        Arc::clone(&ble),
        Arc::clone(&delivery),
        Arc::clone(&clock),
        Arc::clone(&store),
        Arc::clone(&telemetry),
    );

    let task = tokio::spawn(actor.run());
    handle.send(Message::Start).expect("mailbox open");
    handle.send(Message::Stop).expect("mailbox open");

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("actor did not stop in time")
        .expect("actor task panicked");

    assert_eq!(ble.acked_up_to(&device()), EventOffset::new(120));

    let delivered = delivery.delivered_ranges(&device());
    let total_delivered: u64 = delivered.iter().map(|r| r.count().value()).sum();
    assert_eq!(total_delivered, 120);
}

#[tokio::test]
async fn a_disconnect_mid_sync_resumes_after_reconnecting() {
    init_tracing();
    let ble = Arc::new(InMemoryBle::new());
    let delivery = Arc::new(InMemoryDelivery::new());
    let clock = Arc::new(VirtualClock::new(0));
    let store = Arc::new(InMemoryStateStore::new());
    let telemetry = Arc::new(RecordingTelemetry::new());

    ble.seed_events(&device(), EventCount::new(60));
    ble.connect_faults.push(Err(ble_sync_core::DomainError::Transport {
        message: "gatt timeout".to_string(),
        code: Some(8),
    }));

    let (actor, handle) = Actor::new(
        device(),
        SyncEngineConfig::default(),
        Arc::clone(&ble),
        Arc::clone(&delivery),
        Arc::clone(&clock),
        Arc::clone(&store),
        Arc::clone(&telemetry),
    );

    let task = tokio::spawn(actor.run());
    handle.send(Message::Start).expect("mailbox open");

    // Give the retry timer a chance to be scheduled, then advance past
    // its deadline so the actor retries the connection.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for token in clock.advance(60_000) {
        handle
            .send(Message::TimerFired(token))
            .expect("mailbox open");
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.send(Message::Stop).expect("mailbox open");

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("actor did not stop in time")
        .expect("actor task panicked");

    assert_eq!(ble.acked_up_to(&device()), EventOffset::new(60));
}

#[tokio::test]
async fn a_restarted_actor_resumes_reading_from_the_seeded_high_water_mark() {
    init_tracing();
    let ble = Arc::new(InMemoryBle::new());
    let delivery = Arc::new(InMemoryDelivery::new());
    let clock = Arc::new(VirtualClock::new(0));
    let store = Arc::new(InMemoryStateStore::new());
    let telemetry = Arc::new(RecordingTelemetry::new());

    store.seed(SyncSnapshot::new(
        device(),
        EventOffset::new(50),
        PageSize::new(50).expect("positive"),
        "Acked:50".to_string(),
    ));
    ble.seed_events(&device(), EventCount::new(120));

    let (mut actor, handle) = Actor::new(
        device(),
        SyncEngineConfig::default(),
        Arc::clone(&ble),
        Arc::clone(&delivery),
        Arc::clone(&clock),
        Arc::clone(&store),
        Arc::clone(&telemetry),
    );
    actor.restore().await.expect("seeded snapshot restores cleanly");

    let task = tokio::spawn(actor.run());
    handle.send(Message::Start).expect("mailbox open");
    handle.send(Message::Stop).expect("mailbox open");

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("actor did not stop in time")
        .expect("actor task panicked");

    assert!(
        telemetry.events().iter().any(|event| event.name == "snapshot_restored"),
        "restoring a seeded snapshot must emit snapshot_restored telemetry"
    );

    let first_read = ble.read_calls().first().copied();
    assert_eq!(
        first_read,
        Some((EventOffset::new(50), EventCount::new(50))),
        "resuming from a restored high-water mark must re-request the page starting where it left off"
    );
}
