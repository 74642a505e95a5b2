//! An in-memory `TelemetryPort` fake that records every event handed to
//! it, for tests that assert on the sequence of facts a host
//! application would have observed.

use std::sync::Mutex;

use ble_sync_core::{TelemetryEvent, TelemetryPort};

/// A fake telemetry sink. Never fails; `TelemetryPort::record` has no
/// error channel by contract.
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    /// Construct an empty fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event recorded so far, in arrival order.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().expect("telemetry fake mutex poisoned").clone()
    }
}

impl TelemetryPort for RecordingTelemetry {
    async fn record(&self, event: TelemetryEvent) {
        self.events.lock().expect("telemetry fake mutex poisoned").push(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use ble_sync_core::{DeviceId, TimestampMs};

    #[tokio::test]
    async fn recorded_events_preserve_arrival_order() {
        let telemetry = RecordingTelemetry::new();
        let device_id = DeviceId::new("dev-1").expect("non-empty literal");

        telemetry
            .record(TelemetryEvent {
                name: "snapshot_restored".to_string(),
                at: TimestampMs::new(0),
                device_id: device_id.clone(),
                data: HashMap::new(),
            })
            .await;
        telemetry
            .record(TelemetryEvent {
                name: "retry_scheduled".to_string(),
                at: TimestampMs::new(10),
                device_id: device_id.clone(),
                data: HashMap::from([("reason".to_string(), "RadioBusy".to_string())]),
            })
            .await;

        let recorded = telemetry.events();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].name, "snapshot_restored");
        assert_eq!(recorded[1].name, "retry_scheduled");
        assert_eq!(recorded[1].data.get("reason").map(String::as_str), Some("RadioBusy"));
    }
}
