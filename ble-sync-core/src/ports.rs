//! Port contracts the actor runtime depends on. Concrete adapters
//! (a real BLE stack, a database-backed store) live outside this crate;
//! `ble-sync-testing` provides in-memory fakes for tests. See
//! `spec.md` §5 and §7.
//!
//! Ports are defined with native `async fn` in traits rather than the
//! `async-trait` crate: every port here is consumed generically by the
//! runtime (one concrete adapter per actor), never stored as a trait
//! object, so there is no need to pay the boxing cost `async-trait`
//! exists to work around.

use std::collections::HashMap;

use crate::error::DomainError;
use crate::value::{DeviceId, EventCount, EventOffset, EventRange, TimestampMs};

/// Opaque handle to a scheduled timer, returned by `ClockPort::schedule`
/// and echoed back by the runtime when the timer fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TimerToken(pub u64);

/// A structured fact emitted to `TelemetryPort`, distinct from the
/// ambient `tracing`/`metrics` instrumentation scattered through the
/// runtime: this is the sink a host application subscribes to, the
/// ambient instrumentation is for operating the sync engine itself.
/// `name` is drawn from the fixed vocabulary in `spec.md` §6.3
/// (`snapshot_saved`, `snapshot_restored`, `retry_scheduled`,
/// `sync_failed`, `read_skipped_backpressure`, `unknown_command_ignored`,
/// plus the port-emitted names a concrete `BlePort` adapter records
/// itself), never a raw `SyncEventKind`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TelemetryEvent {
    /// The name of the fact being recorded, from the fixed vocabulary.
    pub name: String,
    /// When the fact occurred.
    pub at: TimestampMs,
    /// The device the fact concerns.
    pub device_id: DeviceId,
    /// Free-form string payload, shape depending on `name`.
    pub data: HashMap<String, String>,
}

/// Access to the BLE transport: connecting, bonding, and reading data
/// off the device.
pub trait BlePort: Send + Sync {
    /// Initiate (or confirm) bonding with the device.
    fn bond(&self, device_id: &DeviceId) -> impl Future<Output = Result<(), DomainError>> + Send;

    /// Establish a GATT connection.
    fn connect(&self, device_id: &DeviceId) -> impl Future<Output = Result<(), DomainError>> + Send;

    /// Read the device's total event count.
    fn read_event_count(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<EventCount, DomainError>> + Send;

    /// Read a page of events starting at `offset`.
    fn read_events(
        &self,
        device_id: &DeviceId,
        offset: EventOffset,
        count: EventCount,
    ) -> impl Future<Output = Result<EventRange, DomainError>> + Send;

    /// Acknowledge receipt up to (but excluding) `up_to`.
    fn acknowledge(
        &self,
        device_id: &DeviceId,
        up_to: EventOffset,
    ) -> impl Future<Output = Result<(), DomainError>> + Send;
}

/// Hands a page of events off to the host application.
pub trait DeliveryPort: Send + Sync {
    /// Deliver `range` to the host. Must be idempotent: the actor may
    /// redeliver a range it previously delivered but never acked, after
    /// a crash-restart.
    fn deliver(
        &self,
        device_id: &DeviceId,
        range: EventRange,
    ) -> impl Future<Output = Result<(), DomainError>> + Send;
}

/// Wall-clock access and timer scheduling, abstracted so tests can drive
/// virtual time deterministically.
pub trait ClockPort: Send + Sync {
    /// The current time.
    fn now(&self) -> TimestampMs;

    /// Schedule a wakeup at `at`, returning a token the runtime will see
    /// again when the timer fires.
    fn schedule(&self, at: TimestampMs) -> impl Future<Output = TimerToken> + Send;

    /// Cancel a previously scheduled timer. A no-op if it already fired.
    fn cancel(&self, token: TimerToken) -> impl Future<Output = ()> + Send;
}

/// Durable storage for per-device snapshots, consulted on actor start
/// and written after an `EventsAcked` or `Disconnected` event is applied
/// (`spec.md` §4.6).
pub trait StateStorePort: Send + Sync {
    /// Load the most recently persisted snapshot, if any.
    fn load(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<crate::snapshot::SyncSnapshot>, DomainError>> + Send;

    /// Persist a snapshot, replacing any prior one for the device.
    fn save(
        &self,
        snapshot: &crate::snapshot::SyncSnapshot,
    ) -> impl Future<Output = Result<(), DomainError>> + Send;
}

/// Sink for structured telemetry facts, distinct from the actor's
/// internal `tracing`/`metrics` instrumentation.
pub trait TelemetryPort: Send + Sync {
    /// Record a telemetry event. Must never block or fail the calling
    /// command; adapters that need durability should buffer internally.
    fn record(&self, event: TelemetryEvent) -> impl Future<Output = ()> + Send;
}

// Every port is implemented for `Arc<T>` so a single fake (or adapter)
// instance can be shared between the actor and the test driving it,
// without each port needing its own interior-mutable wrapper type.
mod arc_impls {
    use std::sync::Arc;

    use super::{BlePort, ClockPort, DeliveryPort, StateStorePort, TelemetryEvent, TelemetryPort, TimerToken};
    use crate::error::DomainError;
    use crate::snapshot::SyncSnapshot;
    use crate::value::{DeviceId, EventCount, EventOffset, EventRange, TimestampMs};

    impl<T: BlePort> BlePort for Arc<T> {
        async fn bond(&self, device_id: &DeviceId) -> Result<(), DomainError> {
            T::bond(self, device_id).await
        }

        async fn connect(&self, device_id: &DeviceId) -> Result<(), DomainError> {
            T::connect(self, device_id).await
        }

        async fn read_event_count(&self, device_id: &DeviceId) -> Result<EventCount, DomainError> {
            T::read_event_count(self, device_id).await
        }

        async fn read_events(
            &self,
            device_id: &DeviceId,
            offset: EventOffset,
            count: EventCount,
        ) -> Result<EventRange, DomainError> {
            T::read_events(self, device_id, offset, count).await
        }

        async fn acknowledge(&self, device_id: &DeviceId, up_to: EventOffset) -> Result<(), DomainError> {
            T::acknowledge(self, device_id, up_to).await
        }
    }

    impl<T: DeliveryPort> DeliveryPort for Arc<T> {
        async fn deliver(&self, device_id: &DeviceId, range: EventRange) -> Result<(), DomainError> {
            T::deliver(self, device_id, range).await
        }
    }

    impl<T: ClockPort> ClockPort for Arc<T> {
        fn now(&self) -> TimestampMs {
            T::now(self)
        }

        async fn schedule(&self, at: TimestampMs) -> TimerToken {
            T::schedule(self, at).await
        }

        async fn cancel(&self, token: TimerToken) {
            T::cancel(self, token).await;
        }
    }

    impl<T: StateStorePort> StateStorePort for Arc<T> {
        async fn load(&self, device_id: &DeviceId) -> Result<Option<SyncSnapshot>, DomainError> {
            T::load(self, device_id).await
        }

        async fn save(&self, snapshot: &SyncSnapshot) -> Result<(), DomainError> {
            T::save(self, snapshot).await
        }
    }

    impl<T: TelemetryPort> TelemetryPort for Arc<T> {
        async fn record(&self, event: TelemetryEvent) {
            T::record(self, event).await;
        }
    }
}
