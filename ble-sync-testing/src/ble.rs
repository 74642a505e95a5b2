//! An in-memory `BlePort` fake backed by a simulated device event log.

use std::collections::HashMap;
use std::sync::Mutex;

use ble_sync_core::{BlePort, DeviceId, DomainError, EventCount, EventOffset, EventRange};

use crate::fault::FaultScript;

#[derive(Debug, Default)]
struct DeviceState {
    bonded: bool,
    connected: bool,
    total_events: EventCount,
    acked_up_to: EventOffset,
}

/// A fake BLE transport. Each device starts unbonded and disconnected
/// with zero events; call `seed_events` to give it a log to sync, and
/// use the `FaultScript` fields to inject transient failures at each
/// stage.
#[derive(Default)]
pub struct InMemoryBle {
    devices: Mutex<HashMap<DeviceId, DeviceState>>,
    read_calls: Mutex<Vec<(EventOffset, EventCount)>>,
    /// Scripted outcomes for `bond`.
    pub bond_faults: FaultScript<()>,
    /// Scripted outcomes for `connect`.
    pub connect_faults: FaultScript<()>,
    /// Scripted outcomes for `read_event_count`.
    pub read_count_faults: FaultScript<EventCount>,
    /// Scripted outcomes for `read_events`.
    pub read_events_faults: FaultScript<EventRange>,
    /// Scripted outcomes for `acknowledge`.
    pub ack_faults: FaultScript<()>,
}

impl InMemoryBle {
    /// Construct an empty fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a device `total` events to report on its next count read.
    #[allow(clippy::missing_panics_doc)]
    pub fn seed_events(&self, device_id: &DeviceId, total: EventCount) {
        let mut devices = self.devices.lock().expect("ble fake mutex poisoned");
        devices.entry(device_id.clone()).or_default().total_events = total;
    }

    /// The offset the device has recorded as acknowledged, for test
    /// assertions.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn acked_up_to(&self, device_id: &DeviceId) -> EventOffset {
        self.devices
            .lock()
            .expect("ble fake mutex poisoned")
            .get(device_id)
            .map_or(EventOffset::ZERO, |state| state.acked_up_to)
    }

    /// Every `(offset, count)` pair `read_events` was called with, in
    /// call order, for tests that assert on exactly which page the actor
    /// requested next (e.g. resuming from a restored high-water mark).
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn read_calls(&self) -> Vec<(EventOffset, EventCount)> {
        self.read_calls.lock().expect("ble fake mutex poisoned").clone()
    }
}

impl BlePort for InMemoryBle {
    async fn bond(&self, device_id: &DeviceId) -> Result<(), DomainError> {
        if let Some(outcome) = self.bond_faults.take_next() {
            return outcome;
        }
        self.devices.lock().expect("ble fake mutex poisoned").entry(device_id.clone()).or_default().bonded = true;
        Ok(())
    }

    async fn connect(&self, device_id: &DeviceId) -> Result<(), DomainError> {
        if let Some(outcome) = self.connect_faults.take_next() {
            return outcome;
        }
        self.devices
            .lock()
            .expect("ble fake mutex poisoned")
            .entry(device_id.clone())
            .or_default()
            .connected = true;
        Ok(())
    }

    async fn read_event_count(&self, device_id: &DeviceId) -> Result<EventCount, DomainError> {
        if let Some(outcome) = self.read_count_faults.take_next() {
            return outcome;
        }
        Ok(self
            .devices
            .lock()
            .expect("ble fake mutex poisoned")
            .get(device_id)
            .map_or(EventCount::ZERO, |state| state.total_events))
    }

    async fn read_events(
        &self,
        device_id: &DeviceId,
        offset: EventOffset,
        count: EventCount,
    ) -> Result<EventRange, DomainError> {
        self.read_calls.lock().expect("ble fake mutex poisoned").push((offset, count));
        if let Some(outcome) = self.read_events_faults.take_next() {
            return outcome;
        }
        let _ = device_id;
        Ok(EventRange::from_offset_count(offset, count))
    }

    async fn acknowledge(&self, device_id: &DeviceId, up_to: EventOffset) -> Result<(), DomainError> {
        if let Some(outcome) = self.ack_faults.take_next() {
            return outcome;
        }
        self.devices
            .lock()
            .expect("ble fake mutex poisoned")
            .entry(device_id.clone())
            .or_default()
            .acked_up_to = up_to;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("dev-1").expect("non-empty literal")
    }

    #[tokio::test]
    async fn bond_then_connect_succeed_by_default() {
        let ble = InMemoryBle::new();
        assert!(ble.bond(&device()).await.is_ok());
        assert!(ble.connect(&device()).await.is_ok());
    }

    #[tokio::test]
    async fn seeded_count_is_reported_back() {
        let ble = InMemoryBle::new();
        ble.seed_events(&device(), EventCount::new(120));
        assert_eq!(ble.read_event_count(&device()).await.expect("ok"), EventCount::new(120));
    }

    #[tokio::test]
    async fn scripted_failure_is_returned_once() {
        let ble = InMemoryBle::new();
        ble.connect_faults.push(Err(DomainError::Transport {
            message: "timeout".into(),
            code: Some(8),
        }));

        assert!(ble.connect(&device()).await.is_err());
        assert!(ble.connect(&device()).await.is_ok());
    }

    #[tokio::test]
    async fn read_events_records_the_requested_offset_and_count() {
        let ble = InMemoryBle::new();
        ble.read_events(&device(), EventOffset::new(50), EventCount::new(20))
            .await
            .expect("ok");
        assert_eq!(ble.read_calls(), vec![(EventOffset::new(50), EventCount::new(20))]);
    }

    #[tokio::test]
    async fn acknowledge_records_the_high_water_mark() {
        let ble = InMemoryBle::new();
        ble.acknowledge(&device(), EventOffset::new(50)).await.expect("ok");
        assert_eq!(ble.acked_up_to(&device()), EventOffset::new(50));
    }
}
