//! # ble-sync-core
//!
//! The functional core of a BLE peripheral event-log sync engine:
//! value types, the domain event/command vocabulary, the aggregate and
//! its reducer, the saga that decides what to do next, and the
//! policies (retry, circuit breaker, adaptive paging) the saga
//! consults. Nothing in this crate performs I/O — the imperative shell
//! that drives ports and schedules timers lives in `ble-sync-runtime`.
//!
//! ## Architecture
//!
//! - **Value types** (`value`): identifiers and scalars that make
//!   illegal states unrepresentable.
//! - **Events** (`event`) and **commands** (`command`): the facts a
//!   device/port reports and the intents the saga issues in response.
//! - **Aggregate** (`aggregate`) and **reducer** (`reducer`): the
//!   authoritative per-device state and the pure function that folds
//!   events into it.
//! - **Saga** (`saga`): `(state, last event, now) -> Vec<Command>`,
//!   consulting the **policies** (`policy`) for retry timing, breaker
//!   gating, and page sizing.
//! - **Ports** (`ports`): the trait contracts an actor runtime depends
//!   on; concrete adapters live outside this crate.
//! - **Snapshot** (`snapshot`) and **wire** (`wire`): the persisted
//!   resume format and the little-endian codec the reference BLE
//!   adapter speaks.
//! - **Config** (`config`): the engine-wide configuration assembled
//!   from each policy's config.

pub mod aggregate;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod policy;
pub mod ports;
pub mod reducer;
pub mod saga;
pub mod snapshot;
pub mod value;
pub mod wire;

pub use aggregate::{BondStatus, BreakerPhase, BreakerState, ConnectionStatus, InFlightRead, SyncAggregate};
pub use command::Command;
pub use config::SyncEngineConfig;
pub use error::DomainError;
pub use event::{DisconnectReason, RetryReason, SyncEvent, SyncEventKind};
pub use ports::{BlePort, ClockPort, DeliveryPort, StateStorePort, TelemetryPort, TelemetryEvent, TimerToken};
pub use saga::{decide, SagaPolicies};
pub use snapshot::SyncSnapshot;
pub use value::{AttemptKey, DeviceId, EventCount, EventOffset, EventRange, PageSize, TimestampMs};
