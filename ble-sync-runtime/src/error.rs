//! Errors the actor runtime itself can raise, distinct from
//! `ble_sync_core::DomainError` (which describes failures of the
//! *domain*, carried as event payloads rather than propagated as
//! `Result`s).

use ble_sync_core::DeviceId;
use thiserror::Error;

/// A failure in the runtime plumbing around an actor: mailbox wiring,
/// snapshot I/O at startup, or a caller misusing the handle after the
/// actor has shut down.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The actor's mailbox has been closed (the actor task ended) and
    /// can no longer accept messages.
    #[error("actor for device {device_id} is no longer running")]
    Stopped {
        /// The device whose actor stopped.
        device_id: DeviceId,
    },

    /// Loading the initial snapshot failed at actor startup.
    #[error("failed to restore snapshot for device {device_id}: {source}")]
    SnapshotRestoreFailed {
        /// The device whose snapshot failed to load.
        device_id: DeviceId,
        /// The underlying domain error.
        #[source]
        source: ble_sync_core::DomainError,
    },
}
