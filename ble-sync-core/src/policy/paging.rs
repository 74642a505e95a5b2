//! Adaptive page sizing policy. See `spec.md` §4.4.

use crate::value::PageSize;

/// The outcome classification the saga feeds into `PageSizingPolicy::next`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// The last page round-tripped cleanly with no observed error.
    Stable,
    /// The last page round-tripped but an error was recorded elsewhere
    /// on the aggregate (conservative growth).
    MostlyStable,
    /// A transient failure occurred; shrink moderately.
    TransientFailure,
    /// A hard failure occurred; shrink aggressively.
    HardFailure,
}

/// Configuration for `BoundedPageSizingPolicy`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageSizingPolicyConfig {
    /// Smallest page size ever returned.
    pub min_page: u32,
    /// Largest page size ever returned.
    pub max_page: u32,
    /// How much to grow the page by on a stable outcome.
    pub grow_step: u32,
    /// How much to shrink the page by on a transient failure (a hard
    /// failure shrinks by twice this amount).
    pub shrink_step: u32,
}

impl Default for PageSizingPolicyConfig {
    fn default() -> Self {
        Self {
            min_page: 20,
            max_page: 500,
            grow_step: 20,
            shrink_step: 20,
        }
    }
}

impl PageSizingPolicyConfig {
    /// Start a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> PageSizingPolicyConfigBuilder {
        PageSizingPolicyConfigBuilder(Self::default())
    }
}

/// Builder for `PageSizingPolicyConfig`.
#[derive(Clone, Copy, Debug)]
pub struct PageSizingPolicyConfigBuilder(PageSizingPolicyConfig);

impl PageSizingPolicyConfigBuilder {
    /// Set the minimum page size.
    #[must_use]
    pub const fn min_page(mut self, value: u32) -> Self {
        self.0.min_page = value;
        self
    }

    /// Set the maximum page size.
    #[must_use]
    pub const fn max_page(mut self, value: u32) -> Self {
        self.0.max_page = value;
        self
    }

    /// Set the grow step.
    #[must_use]
    pub const fn grow_step(mut self, value: u32) -> Self {
        self.0.grow_step = value;
        self
    }

    /// Set the shrink step.
    #[must_use]
    pub const fn shrink_step(mut self, value: u32) -> Self {
        self.0.shrink_step = value;
        self
    }

    /// Build the config.
    #[must_use]
    pub const fn build(self) -> PageSizingPolicyConfig {
        self.0
    }
}

/// Decides the next page size given the current one and the last
/// outcome.
pub trait PageSizingPolicy: Send + Sync {
    /// Compute the next page size.
    fn next(&self, current: PageSize, outcome: PageOutcome) -> PageSize;
}

/// The default page sizing policy: bounded growth/shrink steps.
#[derive(Clone, Copy, Debug)]
pub struct BoundedPageSizingPolicy {
    config: PageSizingPolicyConfig,
}

impl BoundedPageSizingPolicy {
    /// Construct a policy from its configuration.
    #[must_use]
    pub const fn new(config: PageSizingPolicyConfig) -> Self {
        Self { config }
    }
}

impl PageSizingPolicy for BoundedPageSizingPolicy {
    fn next(&self, current: PageSize, outcome: PageOutcome) -> PageSize {
        let current = current.value();
        let next = match outcome {
            PageOutcome::Stable => (current + self.config.grow_step).min(self.config.max_page),
            PageOutcome::MostlyStable => {
                (current + self.config.grow_step.div_ceil(2).max(1)).min(self.config.max_page)
            }
            PageOutcome::TransientFailure => {
                current.saturating_sub(self.config.shrink_step).max(self.config.min_page)
            }
            PageOutcome::HardFailure => current
                .saturating_sub(self.config.shrink_step.saturating_mul(2))
                .max(self.config.min_page),
        };
        #[allow(clippy::expect_used)]
        PageSize::new(next.max(1)).expect("bounded result is always positive")
    }
}
