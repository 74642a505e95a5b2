//! # ble-sync-testing
//!
//! In-memory fakes for every port `ble-sync-core` defines, plus
//! fault-injection scripting, so `ble-sync-runtime`'s actor can be
//! driven end-to-end in tests without a real BLE stack or clock.

pub mod ble;
pub mod clock;
pub mod delivery;
pub mod fault;
pub mod harness;
pub mod store;
pub mod telemetry;

pub use ble::InMemoryBle;
pub use clock::VirtualClock;
pub use delivery::InMemoryDelivery;
pub use fault::FaultScript;
pub use harness::Harness;
pub use store::InMemoryStateStore;
pub use telemetry::RecordingTelemetry;
