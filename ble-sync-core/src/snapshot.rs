//! The durable projection of a `SyncAggregate` persisted via
//! `StateStorePort`, written when `EventsAcked` or `Disconnected` is
//! applied (`spec.md` §4.6.4), not on every processed event. It omits
//! the full aggregate (breaker states, attempt counters, and
//! `last_error` are resynthesized rather than persisted; they converge
//! within a few events of a cold start). See `spec.md` §4.6.

use crate::value::{DeviceId, EventOffset, PageSize};

/// The minimal state needed to resume a device's sync after a restart.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncSnapshot {
    /// The device this snapshot concerns.
    pub device_id: DeviceId,
    /// The exclusive high-water mark at the time of the snapshot.
    pub last_acked_exclusive: EventOffset,
    /// The adaptive page size at the time of the snapshot.
    pub page_size: PageSize,
    /// Human-readable marker for observability, mirrors
    /// `SyncAggregate::saga_cursor`.
    pub saga_cursor: String,
}

impl SyncSnapshot {
    /// Build a snapshot from the fields of a `SyncAggregate` needed to
    /// resume after a restart.
    #[must_use]
    pub fn new(
        device_id: DeviceId,
        last_acked_exclusive: EventOffset,
        page_size: PageSize,
        saga_cursor: String,
    ) -> Self {
        Self {
            device_id,
            last_acked_exclusive,
            page_size,
            saga_cursor,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_carries_resumable_fields() {
        let snapshot = SyncSnapshot::new(
            DeviceId::new("dev-1").expect("non-empty literal"),
            EventOffset::new(120),
            PageSize::new(40).expect("positive"),
            "AwaitingAck".to_string(),
        );
        assert_eq!(snapshot.last_acked_exclusive, EventOffset::new(120));
        assert_eq!(snapshot.page_size.value(), 40);
    }
}
