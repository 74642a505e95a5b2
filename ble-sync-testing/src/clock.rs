//! A virtual `ClockPort` with manually advanced time, the testing
//! analogue of `ble_sync_core`'s injectable `RandomSource`: production
//! code never gets to choose when time passes, so tests need a way to
//! drive it deterministically instead of sleeping in real time.

use std::collections::BTreeMap;
use std::sync::Mutex;

use ble_sync_core::{ClockPort, TimerToken};

#[derive(Debug, Default)]
struct Inner {
    now: i64,
    next_token: u64,
    scheduled: BTreeMap<u64, i64>,
}

/// A clock whose `now()` only changes when the test calls `advance`,
/// and whose `schedule`d timers are reported back to the test instead
/// of firing on their own.
#[derive(Debug, Default)]
pub struct VirtualClock {
    inner: Mutex<Inner>,
}

impl VirtualClock {
    /// Construct a clock starting at `start_ms`.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                now: start_ms,
                next_token: 0,
                scheduled: BTreeMap::new(),
            }),
        }
    }

    /// Move time forward by `delta_ms`, returning every timer token
    /// whose deadline is now at or before the new time, in the order
    /// they were scheduled to fire. The caller (a test) is responsible
    /// for delivering `Message::TimerFired` for each returned token.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn advance(&self, delta_ms: i64) -> Vec<TimerToken> {
        let mut inner = self.inner.lock().expect("clock mutex poisoned");
        inner.now += delta_ms;
        let now = inner.now;
        let due: Vec<u64> = inner
            .scheduled
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(&token, _)| token)
            .collect();
        for token in &due {
            inner.scheduled.remove(token);
        }
        due.into_iter().map(TimerToken).collect()
    }

    /// Whether a timer is still pending (has not fired or been
    /// cancelled).
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.inner.lock().expect("clock mutex poisoned").scheduled.contains_key(&token.0)
    }
}

impl ClockPort for VirtualClock {
    fn now(&self) -> ble_sync_core::TimestampMs {
        ble_sync_core::TimestampMs::new(self.inner.lock().expect("clock mutex poisoned").now)
    }

    async fn schedule(&self, at: ble_sync_core::TimestampMs) -> TimerToken {
        let mut inner = self.inner.lock().expect("clock mutex poisoned");
        let token = inner.next_token;
        inner.next_token += 1;
        inner.scheduled.insert(token, at.value());
        TimerToken(token)
    }

    async fn cancel(&self, token: TimerToken) {
        self.inner.lock().expect("clock mutex poisoned").scheduled.remove(&token.0);
    }
}
