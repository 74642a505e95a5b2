//! An in-memory `StateStorePort` fake, the testing analogue of the
//! durable per-device snapshot store a real adapter would back with a
//! database or the host platform's key-value storage.

use std::collections::HashMap;
use std::sync::Mutex;

use ble_sync_core::{DeviceId, DomainError, StateStorePort, SyncSnapshot};

use crate::fault::FaultScript;

/// A fake snapshot store. `save` overwrites any prior snapshot for the
/// device; `load` returns `None` until something has been saved,
/// matching the real contract's "corrupted or absent reads as absent"
/// rule.
#[derive(Default)]
pub struct InMemoryStateStore {
    snapshots: Mutex<HashMap<DeviceId, SyncSnapshot>>,
    /// Scripted outcomes for `save`.
    pub save_faults: FaultScript<()>,
    /// Scripted outcomes for `load`.
    pub load_faults: FaultScript<Option<SyncSnapshot>>,
}

impl InMemoryStateStore {
    /// Construct an empty fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot directly, bypassing `save`, to simulate an
    /// actor restarting with state a previous run persisted.
    #[allow(clippy::missing_panics_doc)]
    pub fn seed(&self, snapshot: SyncSnapshot) {
        self.snapshots
            .lock()
            .expect("state store fake mutex poisoned")
            .insert(snapshot.device_id.clone(), snapshot);
    }
}

impl StateStorePort for InMemoryStateStore {
    async fn load(&self, device_id: &DeviceId) -> Result<Option<SyncSnapshot>, DomainError> {
        if let Some(outcome) = self.load_faults.take_next() {
            return outcome;
        }
        Ok(self.snapshots.lock().expect("state store fake mutex poisoned").get(device_id).cloned())
    }

    async fn save(&self, snapshot: &SyncSnapshot) -> Result<(), DomainError> {
        if let Some(outcome) = self.save_faults.take_next() {
            return outcome;
        }
        self.snapshots
            .lock()
            .expect("state store fake mutex poisoned")
            .insert(snapshot.device_id.clone(), snapshot.clone());
        Ok(())
    }
}
