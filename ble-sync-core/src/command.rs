//! Intents to perform a side effect, produced by the saga and consumed
//! by the actor runtime's command executor.

use crate::event::RetryReason;
use crate::value::{EventCount, EventOffset, EventRange, TimestampMs};

/// An intent for the actor to carry out via one of its ports.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Command {
    /// Bond with the device.
    BondDevice,
    /// Establish a GATT connection.
    ConnectGatt,
    /// Read the device's total event count.
    ReadEventCount,
    /// Read a page of events starting at `offset`.
    ReadEvents {
        /// Offset to start reading from.
        offset: EventOffset,
        /// Number of events to request. Always positive; see
        /// `Command::read_events`.
        count: EventCount,
    },
    /// Hand a page of events to the host application.
    DeliverToApp {
        /// The range to deliver.
        range: EventRange,
    },
    /// Acknowledge receipt up to (but excluding) an offset.
    Acknowledge {
        /// The new exclusive high-water mark to acknowledge.
        up_to: EventOffset,
    },
    /// Schedule a retry timer.
    ScheduleRetry {
        /// When the timer should fire.
        after: TimestampMs,
        /// Why the retry is being scheduled.
        reason: RetryReason,
    },
    /// Stop the actor.
    Stop,
}

impl Command {
    /// Build a `ReadEvents` command, enforcing `count > 0` per the
    /// command's invariant.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero. The saga only ever builds `ReadEvents`
    /// from a `PageSize`, which is already non-zero by construction, so
    /// this is a programmer-error guard rather than a reachable runtime
    /// failure.
    #[must_use]
    pub fn read_events(offset: EventOffset, count: EventCount) -> Self {
        assert!(!count.is_zero(), "ReadEvents count must be positive");
        Self::ReadEvents { offset, count }
    }
}
