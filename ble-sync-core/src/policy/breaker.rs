//! Circuit breaker policy: a pure, synchronous sibling of the teacher
//! workspace's async `CircuitBreaker`. Because the actor is
//! single-threaded, breaker state lives as a plain `BreakerState` value
//! on the aggregate instead of behind an `Arc<RwLock<_>>`. See
//! `spec.md` §4.3.

use crate::aggregate::{BreakerPhase, BreakerState};
use crate::error::DomainError;
use crate::value::TimestampMs;

/// Configuration for `ThresholdBreakerPolicy`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakerPolicyConfig {
    /// Number of failures (while closed) before the breaker opens.
    /// Must be at least 1.
    pub failures_to_open: u32,
    /// How long the breaker stays open before a probe is allowed, in
    /// milliseconds.
    pub cool_down_ms: i64,
}

impl Default for BreakerPolicyConfig {
    fn default() -> Self {
        Self {
            failures_to_open: 3,
            cool_down_ms: 5_000,
        }
    }
}

impl BreakerPolicyConfig {
    /// Start a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> BreakerPolicyConfigBuilder {
        BreakerPolicyConfigBuilder(Self::default())
    }
}

/// Builder for `BreakerPolicyConfig`.
#[derive(Clone, Copy, Debug)]
pub struct BreakerPolicyConfigBuilder(BreakerPolicyConfig);

impl BreakerPolicyConfigBuilder {
    /// Set the failure threshold that opens the breaker.
    #[must_use]
    pub const fn failures_to_open(mut self, value: u32) -> Self {
        self.0.failures_to_open = value;
        self
    }

    /// Set the cool-down duration, in milliseconds.
    #[must_use]
    pub const fn cool_down_ms(mut self, value: i64) -> Self {
        self.0.cool_down_ms = value;
        self
    }

    /// Build the config.
    #[must_use]
    pub const fn build(self) -> BreakerPolicyConfig {
        self.0
    }
}

/// Gates calls and tracks failure/success transitions for one breaker
/// instance. Every method is a pure function of the passed-in
/// `BreakerState`; the caller is responsible for persisting the
/// returned state back onto the aggregate.
pub trait BreakerPolicy: Send + Sync {
    /// Whether a call should be allowed right now.
    fn is_call_allowed(&self, now: TimestampMs, state: &BreakerState) -> bool;

    /// Record a successful call.
    fn on_success(&self, state: &BreakerState) -> BreakerState;

    /// Record a failed call.
    fn on_failure(&self, now: TimestampMs, state: &BreakerState, error: &DomainError) -> BreakerState;

    /// Transition `Open` to `HalfOpen` once the cool-down has elapsed,
    /// without recording a call outcome. The actor calls this before
    /// attempting a breaker-gated command so that the subsequent
    /// success/failure is judged against `HalfOpen`'s single-probe rule
    /// rather than `Open`'s retry-on-cooldown rule.
    fn move_to_half_open_if_cooled(&self, now: TimestampMs, state: &BreakerState) -> BreakerState;
}

/// The default breaker policy: opens after `failures_to_open`
/// consecutive failures, allows exactly one probe in `HalfOpen`.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdBreakerPolicy {
    config: BreakerPolicyConfig,
}

impl ThresholdBreakerPolicy {
    /// Construct a policy from its configuration.
    #[must_use]
    pub const fn new(config: BreakerPolicyConfig) -> Self {
        Self { config }
    }
}

impl BreakerPolicy for ThresholdBreakerPolicy {
    fn is_call_allowed(&self, now: TimestampMs, state: &BreakerState) -> bool {
        match state.phase {
            BreakerPhase::Closed | BreakerPhase::HalfOpen => true,
            BreakerPhase::Open => match state.opened_at {
                Some(opened_at) => now.since(opened_at) >= self.config.cool_down_ms,
                None => true,
            },
        }
    }

    fn on_success(&self, state: &BreakerState) -> BreakerState {
        tracing::debug!(?state.phase, "breaker call succeeded, closing");
        BreakerState {
            phase: BreakerPhase::Closed,
            opened_at: None,
            last_failure: None,
        }
    }

    fn on_failure(&self, now: TimestampMs, state: &BreakerState, error: &DomainError) -> BreakerState {
        match state.phase {
            BreakerPhase::Closed => {
                if self.config.failures_to_open <= 1 {
                    tracing::warn!(?error, "breaker opening after single failure");
                    BreakerState {
                        phase: BreakerPhase::Open,
                        opened_at: Some(now),
                        last_failure: Some(error.clone()),
                    }
                } else {
                    BreakerState {
                        phase: BreakerPhase::Closed,
                        opened_at: None,
                        last_failure: Some(error.clone()),
                    }
                }
            }
            BreakerPhase::Open => {
                // The caller attempted anyway (cool-down had elapsed);
                // restart the cool-down window.
                BreakerState {
                    phase: BreakerPhase::Open,
                    opened_at: Some(now),
                    last_failure: Some(error.clone()),
                }
            }
            BreakerPhase::HalfOpen => {
                tracing::warn!(?error, "probe failed, breaker re-opening");
                BreakerState {
                    phase: BreakerPhase::Open,
                    opened_at: Some(now),
                    last_failure: Some(error.clone()),
                }
            }
        }
    }

    fn move_to_half_open_if_cooled(&self, now: TimestampMs, state: &BreakerState) -> BreakerState {
        if state.phase != BreakerPhase::Open {
            return state.clone();
        }
        let cooled = state
            .opened_at
            .is_some_and(|opened_at| now.since(opened_at) >= self.config.cool_down_ms);
        if cooled {
            tracing::info!("breaker cool-down elapsed, allowing a probe");
            BreakerState {
                phase: BreakerPhase::HalfOpen,
                opened_at: state.opened_at,
                last_failure: state.last_failure.clone(),
            }
        } else {
            state.clone()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn policy(failures_to_open: u32, cool_down_ms: i64) -> ThresholdBreakerPolicy {
        ThresholdBreakerPolicy::new(
            BreakerPolicyConfig::builder()
                .failures_to_open(failures_to_open)
                .cool_down_ms(cool_down_ms)
                .build(),
        )
    }

    fn transport_error() -> DomainError {
        DomainError::Transport {
            message: "gatt timeout".into(),
            code: Some(8),
        }
    }

    #[test]
    fn closed_allows_calls() {
        let p = policy(1, 1000);
        assert!(p.is_call_allowed(TimestampMs::new(0), &BreakerState::default()));
    }

    #[test]
    fn single_failure_opens_when_threshold_is_one() {
        let p = policy(1, 1000);
        let state = p.on_failure(TimestampMs::new(0), &BreakerState::default(), &transport_error());
        assert_eq!(state.phase, BreakerPhase::Open);
    }

    #[test]
    fn denied_during_cooldown_allowed_after() {
        let p = policy(1, 500);
        let opened = p.on_failure(TimestampMs::new(5000), &BreakerState::default(), &transport_error());

        assert!(!p.is_call_allowed(TimestampMs::new(5000), &opened));
        assert!(!p.is_call_allowed(TimestampMs::new(5400), &opened));
        assert!(p.is_call_allowed(TimestampMs::new(5500), &opened));
        assert!(p.is_call_allowed(TimestampMs::new(6000), &opened));
    }

    #[test]
    fn half_open_failure_reopens() {
        let p = policy(1, 500);
        let opened = p.on_failure(TimestampMs::new(0), &BreakerState::default(), &transport_error());
        let half_open = p.move_to_half_open_if_cooled(TimestampMs::new(500), &opened);
        assert_eq!(half_open.phase, BreakerPhase::HalfOpen);

        let reopened = p.on_failure(TimestampMs::new(500), &half_open, &transport_error());
        assert_eq!(reopened.phase, BreakerPhase::Open);
    }

    #[test]
    fn half_open_success_closes() {
        let p = policy(1, 500);
        let opened = p.on_failure(TimestampMs::new(0), &BreakerState::default(), &transport_error());
        let half_open = p.move_to_half_open_if_cooled(TimestampMs::new(500), &opened);

        let closed = p.on_success(&half_open);
        assert_eq!(closed.phase, BreakerPhase::Closed);
        assert!(closed.opened_at.is_none());
        assert!(closed.last_failure.is_none());
    }

    #[test]
    fn multi_threshold_stays_closed_until_threshold_reached() {
        let p = policy(3, 500);
        let state = BreakerState::default();
        let state = p.on_failure(TimestampMs::new(0), &state, &transport_error());
        assert_eq!(state.phase, BreakerPhase::Closed);
        let state = p.on_failure(TimestampMs::new(0), &state, &transport_error());
        assert_eq!(state.phase, BreakerPhase::Closed);
    }
}
