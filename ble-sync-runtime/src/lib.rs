//! # ble-sync-runtime
//!
//! The imperative shell around `ble-sync-core`'s pure domain: an actor
//! that owns one device's mailbox, executes the commands the saga
//! returns against concrete ports, and feeds the resulting events back
//! through the reducer. See `spec.md` §5 for the concurrency model and
//! §4.6 for the snapshot lifecycle this crate implements.

pub mod actor;
pub mod error;

pub use actor::{Actor, ActorHandle, Message};
pub use error::ActorError;
