//! Retry timing policy: exponential backoff with multiplicative jitter.
//! See `spec.md` §4.2.

use crate::event::RetryReason;
use crate::value::TimestampMs;

/// A pluggable uniform sampler. Production code samples real randomness;
/// tests inject a fixed or scripted value so retry decisions stay
/// deterministic (`spec.md` §9: "do not use ambient random state").
pub trait RandomSource: Send {
    /// Sample a value uniformly in `[lo, hi]`.
    fn sample(&mut self, lo: f64, hi: f64) -> f64;
}

/// A `RandomSource` that always returns the same value, for
/// deterministic tests (equivalent to `jitter_ratio = 0` regardless of
/// the configured ratio, since `sample` is never consulted for its
/// spread in that case, but useful when a non-zero ratio must still be
/// deterministic in a test).
#[derive(Clone, Copy, Debug)]
pub struct FixedRandomSource(pub f64);

impl RandomSource for FixedRandomSource {
    fn sample(&mut self, lo: f64, hi: f64) -> f64 {
        self.0.clamp(lo, hi)
    }
}

/// A `RandomSource` backed by `rand`'s thread-local generator, for
/// production use.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    fn sample(&mut self, lo: f64, hi: f64) -> f64 {
        use rand::Rng;
        if lo >= hi {
            return lo;
        }
        rand::thread_rng().gen_range(lo..=hi)
    }
}

/// The result of consulting a retry policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RetryDecision {
    /// Retry at the given time.
    Schedule(TimestampMs),
    /// Stop retrying; the caller should surface a terminal failure.
    GiveUp,
}

/// Configuration for `ExponentialBackoffRetryPolicy`, built with the
/// same builder shape the teacher workspace uses for its `RetryPolicy`
/// and `CircuitBreakerConfig`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicyConfig {
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Minimum backoff delay, in milliseconds.
    pub min_backoff_ms: i64,
    /// Maximum backoff delay, in milliseconds.
    pub max_backoff_ms: i64,
    /// Jitter spread as a fraction of the raw backoff, in `[0, 1]`.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_backoff_ms: 100,
            max_backoff_ms: 30_000,
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicyConfig {
    /// Start a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> RetryPolicyConfigBuilder {
        RetryPolicyConfigBuilder(Self::default())
    }
}

/// Builder for `RetryPolicyConfig`.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicyConfigBuilder(RetryPolicyConfig);

impl RetryPolicyConfigBuilder {
    /// Set the maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(mut self, value: u32) -> Self {
        self.0.max_attempts = value;
        self
    }

    /// Set the minimum backoff delay, in milliseconds.
    #[must_use]
    pub const fn min_backoff_ms(mut self, value: i64) -> Self {
        self.0.min_backoff_ms = value;
        self
    }

    /// Set the maximum backoff delay, in milliseconds.
    #[must_use]
    pub const fn max_backoff_ms(mut self, value: i64) -> Self {
        self.0.max_backoff_ms = value;
        self
    }

    /// Set the jitter spread ratio.
    #[must_use]
    pub const fn jitter_ratio(mut self, value: f64) -> Self {
        self.0.jitter_ratio = value;
        self
    }

    /// Build the config.
    #[must_use]
    pub const fn build(self) -> RetryPolicyConfig {
        self.0
    }
}

/// Decides when (or whether) to retry an operation family, consulted by
/// the saga through `AttemptKey`-bucketed counters on the aggregate.
pub trait RetryPolicy: Send {
    /// Decide the outcome for an operation that has already failed
    /// `attempts_for_op` times.
    fn decide(
        &mut self,
        now: TimestampMs,
        attempts_for_op: u32,
        reason: &RetryReason,
    ) -> RetryDecision;
}

/// The default retry policy: exponential backoff with multiplicative
/// jitter, per `spec.md` §4.2.
pub struct ExponentialBackoffRetryPolicy<R: RandomSource = ThreadRandomSource> {
    config: RetryPolicyConfig,
    random: R,
}

impl ExponentialBackoffRetryPolicy<ThreadRandomSource> {
    /// Construct the default policy with production randomness.
    #[must_use]
    pub fn new(config: RetryPolicyConfig) -> Self {
        Self {
            config,
            random: ThreadRandomSource,
        }
    }
}

impl<R: RandomSource> ExponentialBackoffRetryPolicy<R> {
    /// Construct a policy with an injected random source, for tests or
    /// alternative jitter strategies.
    #[must_use]
    pub fn with_random_source(config: RetryPolicyConfig, random: R) -> Self {
        Self { config, random }
    }
}

impl<R: RandomSource> RetryPolicy for ExponentialBackoffRetryPolicy<R> {
    fn decide(
        &mut self,
        now: TimestampMs,
        attempts_for_op: u32,
        reason: &RetryReason,
    ) -> RetryDecision {
        if attempts_for_op >= self.config.max_attempts {
            tracing::warn!(attempts_for_op, ?reason, "retry budget exhausted, giving up");
            return RetryDecision::GiveUp;
        }

        let next_index = attempts_for_op + 1;
        let raw = (self.config.min_backoff_ms as f64) * 2f64.powi((next_index - 1) as i32);
        let raw = raw.clamp(self.config.min_backoff_ms as f64, self.config.max_backoff_ms as f64);

        let jitter = self.config.jitter_ratio.clamp(0.0, 1.0);
        let factor = self
            .random
            .sample((1.0 - jitter).max(0.0), 1.0 + jitter);
        let delay = (raw * factor).clamp(
            self.config.min_backoff_ms as f64,
            self.config.max_backoff_ms as f64,
        );

        tracing::debug!(attempts_for_op, delay_ms = delay, ?reason, "scheduling retry");
        RetryDecision::Schedule(now.plus_millis(delay as i64))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn zero_jitter_policy() -> ExponentialBackoffRetryPolicy<FixedRandomSource> {
        let config = RetryPolicyConfig::builder()
            .max_attempts(3)
            .min_backoff_ms(100)
            .max_backoff_ms(10_000)
            .jitter_ratio(0.0)
            .build();
        ExponentialBackoffRetryPolicy::with_random_source(config, FixedRandomSource(1.0))
    }

    #[test]
    fn exponential_backoff_without_jitter_matches_table() {
        let mut policy = zero_jitter_policy();
        let now = TimestampMs::new(0);

        assert_eq!(
            policy.decide(now, 0, &RetryReason::TemporaryGattError),
            RetryDecision::Schedule(TimestampMs::new(100))
        );
        assert_eq!(
            policy.decide(now, 1, &RetryReason::TemporaryGattError),
            RetryDecision::Schedule(TimestampMs::new(200))
        );
    }

    #[test]
    fn gives_up_once_max_attempts_reached() {
        let mut policy = zero_jitter_policy();
        let now = TimestampMs::new(0);
        assert_eq!(
            policy.decide(now, 3, &RetryReason::TemporaryGattError),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn backoff_is_capped_at_max_backoff() {
        let config = RetryPolicyConfig::builder()
            .max_attempts(10)
            .min_backoff_ms(1000)
            .max_backoff_ms(2000)
            .jitter_ratio(0.0)
            .build();
        let mut policy =
            ExponentialBackoffRetryPolicy::with_random_source(config, FixedRandomSource(1.0));
        let now = TimestampMs::new(0);

        assert_eq!(
            policy.decide(now, 5, &RetryReason::RadioBusy),
            RetryDecision::Schedule(TimestampMs::new(2000))
        );
    }
}
