//! Identifiers and scalar value types for the sync domain.
//!
//! Every type here is a small, immutable value. None of them perform I/O;
//! they exist to make illegal states (a zero page size, a negative offset,
//! an empty device id) unrepresentable at the type level wherever the
//! underlying primitive allows it.

use std::fmt;

use crate::error::DomainError;

/// Non-empty opaque identifier for a peripheral device. Used as the
/// storage key for snapshots and as the actor's routing key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a `DeviceId`, rejecting the empty string.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` if `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::Protocol("device id must not be empty".into()));
        }
        Ok(Self(id))
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-negative position in a device's append-only event log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct EventOffset(u64);

impl EventOffset {
    /// The zero offset, i.e. the start of the log.
    pub const ZERO: Self = Self(0);

    /// Construct an offset from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Offset this position forward by `count` events.
    #[must_use]
    pub const fn advance(self, count: EventCount) -> Self {
        Self(self.0 + count.0)
    }
}

impl fmt::Display for EventOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative count of events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct EventCount(u64);

impl EventCount {
    /// The zero count.
    pub const ZERO: Self = Self(0);

    /// Construct a count from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this count is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<PageSize> for EventCount {
    fn from(page: PageSize) -> Self {
        Self(u64::from(page.value()))
    }
}

impl fmt::Display for EventCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly-positive page size used when requesting a page of events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PageSize(u32);

impl PageSize {
    /// Construct a page size, rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` if `value` is zero.
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::Protocol("page size must be positive".into()));
        }
        Ok(Self(value))
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer milliseconds since the Unix epoch, as used throughout the
/// domain's clock and scheduling code. Kept as a plain integer (rather
/// than `chrono::DateTime`) so the domain crate stays free of any
/// particular wall-clock representation; host adapters translate to and
/// from their own clock types at the port boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TimestampMs(i64);

impl TimestampMs {
    /// Construct a timestamp from raw epoch milliseconds.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// This timestamp advanced forward by `delay_ms` milliseconds.
    #[must_use]
    pub const fn plus_millis(self, delay_ms: i64) -> Self {
        Self(self.0 + delay_ms)
    }

    /// Milliseconds elapsed between `earlier` and `self` (saturates at 0
    /// if `self` is not after `earlier`).
    #[must_use]
    pub fn since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).max(0)
    }
}

impl fmt::Display for TimestampMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open range `[start, end)` of event offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventRange {
    /// Inclusive start of the range.
    pub start: EventOffset,
    /// Exclusive end of the range.
    pub end: EventOffset,
}

impl EventRange {
    /// Construct a range, rejecting `end < start`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` if `end` is before `start`.
    pub fn new(start: EventOffset, end: EventOffset) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::Protocol(format!(
                "event range end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a range from a start offset and a page of `count` events.
    #[must_use]
    pub const fn from_offset_count(start: EventOffset, count: EventCount) -> Self {
        Self {
            start,
            end: start.advance(count),
        }
    }

    /// Number of events covered by this range.
    #[must_use]
    pub const fn count(self) -> EventCount {
        EventCount(self.end.0 - self.start.0)
    }
}

impl fmt::Display for EventRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Opaque label bucketing retry-attempt counters by operation family,
/// e.g. `AttemptKey::new("ConnectGatt")`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AttemptKey(String);

impl AttemptKey {
    /// Construct an attempt key from a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The well-known key bucketing `ConnectGatt` attempts, the only
    /// attempt family the saga's decision table consults directly.
    #[must_use]
    pub fn connect_gatt() -> Self {
        Self::new("ConnectGatt")
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn device_id_rejects_empty() {
        assert!(DeviceId::new("").is_err());
        assert!(DeviceId::new("dev-1").is_ok());
    }

    #[test]
    fn page_size_rejects_zero() {
        assert!(PageSize::new(0).is_err());
        assert!(PageSize::new(50).is_ok());
    }

    #[test]
    fn event_range_rejects_inverted_bounds() {
        let start = EventOffset::new(10);
        let end = EventOffset::new(5);
        assert!(EventRange::new(start, end).is_err());
    }

    #[test]
    fn event_range_count_matches_span() {
        let range = EventRange::from_offset_count(EventOffset::new(50), EventCount::new(20));
        assert_eq!(range.end, EventOffset::new(70));
        assert_eq!(range.count(), EventCount::new(20));
    }

    #[test]
    fn offset_advance_is_additive() {
        let offset = EventOffset::new(50).advance(EventCount::new(20));
        assert_eq!(offset, EventOffset::new(70));
    }
}
