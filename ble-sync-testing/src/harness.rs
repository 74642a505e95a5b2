//! Convenience wiring: a device actor pre-connected to one set of
//! in-memory fakes, the shape most tests in `ble-sync-runtime` want
//! instead of constructing each fake by hand.

use std::sync::Arc;

use ble_sync_core::{DeviceId, SyncEngineConfig};
use ble_sync_runtime::{Actor, ActorHandle};
use tokio::task::JoinHandle;

use crate::{InMemoryBle, InMemoryDelivery, InMemoryStateStore, RecordingTelemetry, VirtualClock};

/// The fakes backing a harness-spawned actor, kept alive and
/// accessible for assertions after the actor is spawned.
pub struct Harness {
    /// The fake BLE transport.
    pub ble: Arc<InMemoryBle>,
    /// The fake delivery sink.
    pub delivery: Arc<InMemoryDelivery>,
    /// The virtual clock driving the actor's notion of time.
    pub clock: Arc<VirtualClock>,
    /// The fake snapshot store.
    pub store: Arc<InMemoryStateStore>,
    /// The fake telemetry sink.
    pub telemetry: Arc<RecordingTelemetry>,
    /// A handle to the spawned actor's mailbox.
    pub handle: ActorHandle,
    /// The spawned actor task, joined by `Harness::shutdown`.
    pub task: JoinHandle<()>,
}

impl Harness {
    /// Spawn an actor for `device_id` wired to a fresh set of fakes,
    /// all starting at `start_ms` on the virtual clock.
    pub async fn spawn(device_id: DeviceId, config: SyncEngineConfig, start_ms: i64) -> Self {
        let ble = Arc::new(InMemoryBle::new());
        let delivery = Arc::new(InMemoryDelivery::new());
        let clock = Arc::new(VirtualClock::new(start_ms));
        let store = Arc::new(InMemoryStateStore::new());
        let telemetry = Arc::new(RecordingTelemetry::new());

        let (mut actor, handle) = Actor::new(
            device_id,
            config,
            Arc::clone(&ble),
            Arc::clone(&delivery),
            Arc::clone(&clock),
            Arc::clone(&store),
            Arc::clone(&telemetry),
        );
        actor.restore().await.expect("fresh store never fails to restore");

        let task = tokio::spawn(actor.run());

        Self {
            ble,
            delivery,
            clock,
            store,
            telemetry,
            handle,
            task,
        }
    }

    /// Advance the virtual clock and deliver any timers that fired as a
    /// result.
    pub fn advance_clock(&self, delta_ms: i64) {
        for token in self.clock.advance(delta_ms) {
            let _ = self.handle.send(ble_sync_runtime::Message::TimerFired(token));
        }
    }

    /// Signal the actor to stop and wait for its task to finish.
    ///
    /// # Panics
    ///
    /// Panics if the actor task itself panicked.
    pub async fn shutdown(self) {
        let _ = self.handle.send(ble_sync_runtime::Message::Stop);
        self.task.await.expect("actor task panicked");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ble_sync_core::{EventCount, EventOffset};
    use std::time::Duration;

    #[tokio::test]
    async fn harness_syncs_a_seeded_device_end_to_end() {
        let device_id = DeviceId::new("dev-1").expect("non-empty literal");
        let harness = Harness::spawn(device_id.clone(), SyncEngineConfig::default(), 0).await;
        harness.ble.seed_events(&device_id, EventCount::new(80));

        harness
            .handle
            .send(ble_sync_runtime::Message::Start)
            .expect("mailbox open");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(harness.ble.acked_up_to(&device_id), EventOffset::new(80));
        harness.shutdown().await;
    }
}
