//! Top-level configuration for a sync engine instance, aggregating the
//! three policy configs plus the starting page size. Mirrors the
//! teacher workspace's pattern of a single `*Config` struct assembled
//! from its collaborators' configs and built through a builder.

use crate::policy::{BreakerPolicyConfig, PageSizingPolicyConfig, RetryPolicyConfig};
use crate::value::PageSize;

/// Configuration for one `SyncAggregate`'s worth of policies. Shared
/// across devices unless a caller constructs a distinct config per
/// device.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncEngineConfig {
    /// Page size an aggregate starts at before any adaptive sizing
    /// occurs.
    pub initial_page_size: PageSize,
    /// Retry timing for `ConnectGatt` and other retried operations.
    pub retry: RetryPolicyConfig,
    /// Circuit breaker thresholds, applied uniformly to all five
    /// per-stage breakers.
    pub breaker: BreakerPolicyConfig,
    /// Adaptive page sizing bounds and step sizes.
    pub paging: PageSizingPolicyConfig,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            #[allow(clippy::unwrap_used)]
            initial_page_size: PageSize::new(50).unwrap(),
            retry: RetryPolicyConfig::default(),
            breaker: BreakerPolicyConfig::default(),
            paging: PageSizingPolicyConfig::default(),
        }
    }
}

impl SyncEngineConfig {
    /// Start a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> SyncEngineConfigBuilder {
        SyncEngineConfigBuilder(Self::default())
    }
}

/// Builder for `SyncEngineConfig`.
#[derive(Clone, Copy, Debug)]
pub struct SyncEngineConfigBuilder(SyncEngineConfig);

impl SyncEngineConfigBuilder {
    /// Set the starting page size.
    #[must_use]
    pub const fn initial_page_size(mut self, value: PageSize) -> Self {
        self.0.initial_page_size = value;
        self
    }

    /// Set the retry timing config.
    #[must_use]
    pub const fn retry(mut self, value: RetryPolicyConfig) -> Self {
        self.0.retry = value;
        self
    }

    /// Set the breaker config.
    #[must_use]
    pub const fn breaker(mut self, value: BreakerPolicyConfig) -> Self {
        self.0.breaker = value;
        self
    }

    /// Set the paging config.
    #[must_use]
    pub const fn paging(mut self, value: PageSizingPolicyConfig) -> Self {
        self.0.paging = value;
        self
    }

    /// Build the config.
    #[must_use]
    pub const fn build(self) -> SyncEngineConfig {
        self.0
    }
}
