//! An in-memory `DeliveryPort` fake that records every delivered range
//! so tests can assert on delivery order and on redelivery after a
//! simulated crash-restart.

use std::collections::HashMap;
use std::sync::Mutex;

use ble_sync_core::{DeliveryPort, DeviceId, DomainError, EventRange};

use crate::fault::FaultScript;

/// A fake delivery sink. Delivery is idempotent, matching the contract
/// `DeliveryPort::deliver` documents: redelivering a range already
/// recorded is not an error.
#[derive(Default)]
pub struct InMemoryDelivery {
    delivered: Mutex<HashMap<DeviceId, Vec<EventRange>>>,
    /// Scripted outcomes for `deliver`.
    pub faults: FaultScript<()>,
}

impl InMemoryDelivery {
    /// Construct an empty fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every range delivered to `device_id`, in delivery order.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn delivered_ranges(&self, device_id: &DeviceId) -> Vec<EventRange> {
        self.delivered
            .lock()
            .expect("delivery fake mutex poisoned")
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl DeliveryPort for InMemoryDelivery {
    async fn deliver(&self, device_id: &DeviceId, range: EventRange) -> Result<(), DomainError> {
        if let Some(outcome) = self.faults.take_next() {
            return outcome;
        }
        self.delivered
            .lock()
            .expect("delivery fake mutex poisoned")
            .entry(device_id.clone())
            .or_default()
            .push(range);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ble_sync_core::EventOffset;

    fn device() -> DeviceId {
        DeviceId::new("dev-1").expect("non-empty literal")
    }

    #[tokio::test]
    async fn delivered_ranges_are_recorded_in_order() {
        let delivery = InMemoryDelivery::new();
        let first = EventRange::new(EventOffset::new(0), EventOffset::new(50)).expect("valid");
        let second = EventRange::new(EventOffset::new(50), EventOffset::new(100)).expect("valid");

        delivery.deliver(&device(), first).await.expect("ok");
        delivery.deliver(&device(), second).await.expect("ok");

        assert_eq!(delivery.delivered_ranges(&device()), vec![first, second]);
    }

    #[tokio::test]
    async fn redelivering_the_same_range_is_not_an_error() {
        let delivery = InMemoryDelivery::new();
        let range = EventRange::new(EventOffset::new(0), EventOffset::new(50)).expect("valid");
        delivery.deliver(&device(), range).await.expect("ok");
        delivery.deliver(&device(), range).await.expect("ok");
        assert_eq!(delivery.delivered_ranges(&device()), vec![range, range]);
    }
}
