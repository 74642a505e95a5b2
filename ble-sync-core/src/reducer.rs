//! Pure event application. `apply` is total, deterministic, and
//! I/O-free: given an aggregate and an event it always returns a new
//! aggregate, never an error — unrecognized combinations are no-ops on
//! the relevant field (see `spec.md` §4.1).

use crate::aggregate::{BondStatus, ConnectionStatus, InFlightRead, SyncAggregate};
use crate::event::{SyncEvent, SyncEventKind};
use crate::value::AttemptKey;

/// Apply a single event to an aggregate, producing the next aggregate.
#[must_use]
pub fn apply(mut aggregate: SyncAggregate, event: &SyncEvent) -> SyncAggregate {
    match &event.kind {
        SyncEventKind::DeviceBonded => {
            aggregate.bond_status = BondStatus::Bonded;
            aggregate.saga_cursor = "Bonded".to_string();
        }
        SyncEventKind::DeviceConnected => {
            aggregate.connection_status = ConnectionStatus::Connected;
            aggregate.attempts.insert(AttemptKey::connect_gatt(), 0);
            aggregate.saga_cursor = "Connected".to_string();
        }
        SyncEventKind::EventCountLoaded { total } => {
            if total.value() < aggregate.total_on_device.value() {
                // spec.md §9 Open Question (b): totals are treated as
                // monotonic non-decreasing; a shrinking total is a
                // protocol violation, not silently accepted.
                aggregate.last_error = Some(crate::error::DomainError::Protocol(
                    "device-reported event count regressed".to_string(),
                ));
                aggregate.saga_cursor = "CountRegressed".to_string();
            } else {
                aggregate.total_on_device = *total;
                aggregate.saga_cursor = "CountLoaded".to_string();
            }
        }
        SyncEventKind::EventsRead { range } => {
            aggregate.in_flight = Some(InFlightRead {
                offset: range.start,
                count: range.count(),
            });
            aggregate.saga_cursor = format!("Read:{range}");
        }
        SyncEventKind::EventsDelivered { range } => {
            // Does not advance the high-water mark; delivery alone is
            // not durable until acknowledged.
            aggregate.saga_cursor = format!("Delivered:{range}");
        }
        SyncEventKind::EventsAcked { up_to } => {
            if *up_to <= aggregate.last_acked_exclusive {
                // An ack that regresses or equals the current high-water
                // mark MUST be a no-op.
                return aggregate;
            }
            aggregate.last_acked_exclusive = *up_to;
            if let Some(in_flight) = aggregate.in_flight {
                if aggregate.last_acked_exclusive >= in_flight.end() {
                    aggregate.in_flight = None;
                }
            }
            aggregate.saga_cursor = format!("Acked:{}", aggregate.last_acked_exclusive);
        }
        SyncEventKind::Disconnected { reason, gatt_code } => {
            aggregate.connection_status = ConnectionStatus::Disconnected;
            aggregate.last_error = Some(crate::error::DomainError::Transport {
                message: reason.message(),
                code: *gatt_code,
            });
            let attempts = aggregate
                .attempts
                .entry(AttemptKey::connect_gatt())
                .or_insert(0);
            *attempts += 1;
            aggregate.saga_cursor = "Disconnected".to_string();
        }
        SyncEventKind::RetryScheduled { after } => {
            aggregate.saga_cursor = format!("RetryScheduled@{after}");
        }
        SyncEventKind::SyncCompleted => {
            aggregate.saga_cursor = "Completed".to_string();
        }
        SyncEventKind::SyncFailed { reason } => {
            aggregate.last_error = Some(reason.clone());
            aggregate.saga_cursor = "Failed".to_string();
        }
    }
    aggregate
}
