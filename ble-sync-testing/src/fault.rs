//! Fault-injection scripting shared by the in-memory port fakes: queue
//! up the next N outcomes a fake should return before falling back to
//! its default success behaviour.

use std::collections::VecDeque;
use std::sync::Mutex;

use ble_sync_core::DomainError;

/// A queue of scripted `Result`s consumed one at a time by a fake port.
/// Once empty, callers fall back to their own default (usually
/// success).
#[derive(Debug, Default)]
pub struct FaultScript<T> {
    queued: Mutex<VecDeque<Result<T, DomainError>>>,
}

impl<T> FaultScript<T> {
    /// An empty script; every call falls through to the fake's default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue an outcome to be returned the next time the fake is
    /// called, before any outcomes already queued.
    #[allow(clippy::missing_panics_doc)]
    pub fn push(&self, outcome: Result<T, DomainError>) {
        self.queued.lock().expect("fault script mutex poisoned").push_back(outcome);
    }

    /// Queue `count` consecutive failures with the same error.
    pub fn push_failures(&self, count: usize, error: DomainError)
    where
        T: Clone,
    {
        for _ in 0..count {
            self.push(Err(error.clone()));
        }
    }

    /// Take the next scripted outcome, if any.
    #[allow(clippy::missing_panics_doc)]
    pub fn take_next(&self) -> Option<Result<T, DomainError>> {
        self.queued.lock().expect("fault script mutex poisoned").pop_front()
    }
}
