//! Facts produced by executing a command or observed from a port, and
//! consumed by the reducer (`crate::reducer::apply`).

use crate::error::DomainError;
use crate::value::{DeviceId, EventCount, EventOffset, EventRange, TimestampMs};

/// Why a retry is being scheduled.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RetryReason {
    /// A GATT operation failed with a transient/recoverable error.
    TemporaryGattError,
    /// The radio stack reported it is busy with another operation.
    RadioBusy,
    /// Generic backoff after a failure not covered by the other reasons
    /// (e.g. the connect breaker denying a call).
    BackoffAfterFailure,
    /// A caller-supplied reason, for adapters with their own taxonomy.
    Custom(String),
}

/// Why the transport disconnected.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DisconnectReason {
    /// The peer device closed the connection.
    PeerClosed,
    /// The operation timed out waiting for the peer.
    Timeout,
    /// The underlying GATT stack reported an error.
    GattError,
    /// A caller-supplied reason, for adapters with their own taxonomy.
    Custom(String),
}

impl DisconnectReason {
    /// Render a human-readable message suitable for `DomainError::Transport`.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::PeerClosed => "peer closed the connection".to_string(),
            Self::Timeout => "connection timed out".to_string(),
            Self::GattError => "gatt stack reported an error".to_string(),
            Self::Custom(msg) => msg.clone(),
        }
    }
}

/// The payload-specific part of a `SyncEvent`. Every variant is paired
/// with a `device_id` and `at` timestamp by the enclosing `SyncEvent`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SyncEventKind {
    /// The device accepted the bonding request.
    DeviceBonded,
    /// The GATT connection was established.
    DeviceConnected,
    /// The device reported the total number of events in its log.
    EventCountLoaded {
        /// The device-reported total.
        total: EventCount,
    },
    /// A page of events was read from the device.
    EventsRead {
        /// The range that was read.
        range: EventRange,
    },
    /// A page of events was handed to the host application.
    EventsDelivered {
        /// The range that was delivered.
        range: EventRange,
    },
    /// The device acknowledged receipt up to (but excluding) an offset.
    EventsAcked {
        /// The new exclusive high-water mark, as reported by the ack.
        up_to: EventOffset,
    },
    /// The transport disconnected.
    Disconnected {
        /// Why the transport disconnected.
        reason: DisconnectReason,
        /// The raw platform GATT error code, if any.
        gatt_code: Option<i32>,
    },
    /// A previously scheduled retry timer fired.
    RetryScheduled {
        /// The time the retry was scheduled for.
        after: TimestampMs,
    },
    /// The device is fully synced and no further work remains.
    SyncCompleted,
    /// An unrecoverable failure occurred.
    SyncFailed {
        /// The failure.
        reason: DomainError,
    },
}

/// A fact about something that happened, carrying the device it concerns
/// and the time it was observed.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncEvent {
    /// The device this event concerns.
    pub device_id: DeviceId,
    /// When this event was observed or synthesized.
    pub at: TimestampMs,
    /// The event's payload.
    pub kind: SyncEventKind,
}

impl SyncEvent {
    /// Construct an event from its parts.
    #[must_use]
    pub const fn new(device_id: DeviceId, at: TimestampMs, kind: SyncEventKind) -> Self {
        Self { device_id, at, kind }
    }
}
