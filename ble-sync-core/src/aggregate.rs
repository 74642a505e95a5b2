//! The per-device aggregate: authoritative state, replaced wholesale by
//! the reducer on each event. See `spec.md` §3 for field invariants.

use std::collections::HashMap;

use crate::error::DomainError;
use crate::value::{AttemptKey, DeviceId, EventCount, EventOffset, PageSize};

/// Whether the device has accepted a bonding request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BondStatus {
    /// Bond state has not yet been determined.
    #[default]
    Unknown,
    /// The device is known not to be bonded.
    NotBonded,
    /// A bonding dialog is in progress.
    Bonding,
    /// The device is bonded.
    Bonded,
}

/// The state of the GATT connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConnectionStatus {
    /// No connection is established.
    #[default]
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// The connection is established.
    Connected,
}

/// The phase of a circuit breaker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BreakerPhase {
    /// Calls pass through normally.
    #[default]
    Closed,
    /// Calls are rejected until the cool-down elapses.
    Open,
    /// A single probe call is allowed to test recovery.
    HalfOpen,
}

/// The state of one circuit breaker instance. A `SyncAggregate` holds
/// five of these: bond, connect, read, deliver, and ack.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakerState {
    /// Current phase.
    pub phase: BreakerPhase,
    /// When the breaker last opened, if it is currently open.
    pub opened_at: Option<crate::value::TimestampMs>,
    /// The most recent failure recorded against this breaker.
    pub last_failure: Option<DomainError>,
}

/// The page of events currently being read, tracked so the reducer can
/// clear it once the acknowledgement catches up to its end (the
/// resolution of `spec.md` §9 Open Question (a): clear `in_flight` when
/// `last_acked_exclusive >= offset + count`, not via a redundant
/// self-comparison).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InFlightRead {
    /// Start of the page being read.
    pub offset: EventOffset,
    /// Number of events requested in this page.
    pub count: EventCount,
}

impl InFlightRead {
    /// The exclusive end of the in-flight page.
    #[must_use]
    pub const fn end(self) -> EventOffset {
        self.offset.advance(self.count)
    }
}

/// The authoritative per-device snapshot. Immutable: the reducer
/// produces a new value on every event rather than mutating in place.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncAggregate {
    /// The device this aggregate tracks.
    pub device_id: DeviceId,
    /// Bonding status.
    pub bond_status: BondStatus,
    /// Connection status.
    pub connection_status: ConnectionStatus,
    /// Exclusive high-water mark: all offsets below this are durably
    /// delivered. Monotonic non-decreasing.
    pub last_acked_exclusive: EventOffset,
    /// The page currently being read, if any.
    pub in_flight: Option<InFlightRead>,
    /// Most recently observed device-side total event count.
    pub total_on_device: EventCount,
    /// Current adaptive page size.
    pub page_size: PageSize,
    /// Per-operation-family attempt counters.
    pub attempts: HashMap<AttemptKey, u32>,
    /// Breaker gating `BondDevice`.
    pub bond_breaker: BreakerState,
    /// Breaker gating `ConnectGatt`.
    pub connect_breaker: BreakerState,
    /// Breaker gating `ReadEventCount`/`ReadEvents`.
    pub read_breaker: BreakerState,
    /// Breaker gating `DeliverToApp`.
    pub deliver_breaker: BreakerState,
    /// Breaker gating `Acknowledge`.
    pub ack_breaker: BreakerState,
    /// The most recent failure observed, if any.
    pub last_error: Option<DomainError>,
    /// Human-readable marker for observability, updated on every event.
    pub saga_cursor: String,
}

impl SyncAggregate {
    /// The fresh aggregate an actor starts from when no snapshot exists.
    #[must_use]
    pub fn initial(device_id: DeviceId, page_size: PageSize) -> Self {
        Self {
            device_id,
            bond_status: BondStatus::Unknown,
            connection_status: ConnectionStatus::Disconnected,
            last_acked_exclusive: EventOffset::ZERO,
            in_flight: None,
            total_on_device: EventCount::ZERO,
            page_size,
            attempts: HashMap::new(),
            bond_breaker: BreakerState::default(),
            connect_breaker: BreakerState::default(),
            read_breaker: BreakerState::default(),
            deliver_breaker: BreakerState::default(),
            ack_breaker: BreakerState::default(),
            last_error: None,
            saga_cursor: "Initial".to_string(),
        }
    }

    /// Whether every event the device has reported has been durably
    /// acknowledged.
    #[must_use]
    pub fn is_fully_acked(&self) -> bool {
        self.last_acked_exclusive.value() >= self.total_on_device.value()
    }

    /// Whether a page read is currently outstanding.
    #[must_use]
    pub const fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("dev-1").expect("non-empty literal")
    }

    #[test]
    fn initial_aggregate_is_not_fully_acked_when_total_zero() {
        let agg = SyncAggregate::initial(device(), PageSize::new(50).expect("positive"));
        assert!(agg.is_fully_acked());
        assert!(!agg.has_in_flight());
    }

    #[test]
    fn in_flight_end_matches_offset_plus_count() {
        let in_flight = InFlightRead {
            offset: EventOffset::new(50),
            count: EventCount::new(20),
        };
        assert_eq!(in_flight.end(), EventOffset::new(70));
    }
}
