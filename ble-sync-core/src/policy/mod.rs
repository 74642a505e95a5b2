//! Timing, gating, and sizing policies consulted by the saga. Each
//! policy is a trait with a default implementation; see `spec.md` §4.2-4.4.

pub mod breaker;
pub mod paging;
pub mod retry;

pub use breaker::{BreakerPolicy, BreakerPolicyConfig, ThresholdBreakerPolicy};
pub use paging::{BoundedPageSizingPolicy, PageOutcome, PageSizingPolicy, PageSizingPolicyConfig};
pub use retry::{
    ExponentialBackoffRetryPolicy, FixedRandomSource, RandomSource, RetryDecision, RetryPolicy,
    RetryPolicyConfig, ThreadRandomSource,
};
