//! The domain's error taxonomy.
//!
//! Errors are values threaded through events (`SyncFailed`, `Disconnected`)
//! and the aggregate's `last_error` field, never exceptions. See `spec.md`
//! §7 for how each variant is retried, breaker-gated, and surfaced.

use thiserror::Error;

/// A domain-level failure, carried by `SyncFailed` and `Disconnected`
/// events and recorded on the aggregate as `last_error`.
#[derive(Clone, Debug, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DomainError {
    /// The host OS permission named by `permission` has not been granted.
    /// Never retried; surfaced to the UI for a prompt.
    #[error("permission required: {0}")]
    PermissionRequired(String),

    /// The user must take the action named by `action` (e.g. confirm a
    /// pairing dialog) before sync can proceed. Never retried.
    #[error("user action required: {0}")]
    UserActionRequired(String),

    /// A transport-level failure, optionally carrying the platform's raw
    /// GATT/host-stack error code. Retried (bounded) and breaker-gated.
    #[error("transport error: {message}{}", code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Transport {
        /// Human-readable description of the failure.
        message: String,
        /// Raw platform error code, if the transport exposed one.
        code: Option<i32>,
    },

    /// The wire protocol was violated (malformed payload, inconsistent
    /// lengths). Never retried; indicates a configuration problem.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An unclassified failure. Retried cautiously and breaker-gated.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl DomainError {
    /// Whether this error class is ever eligible for a scheduled retry,
    /// per the table in `spec.md` §7.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Unexpected(_))
    }

    /// Whether this error class is gated by a circuit breaker, per the
    /// table in `spec.md` §7.
    #[must_use]
    pub const fn is_breaker_gated(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Protocol(_) | Self::Unexpected(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn permission_and_user_action_are_never_retried() {
        assert!(!DomainError::PermissionRequired("BLUETOOTH_SCAN".into()).is_retryable());
        assert!(!DomainError::UserActionRequired("confirm pairing".into()).is_retryable());
    }

    #[test]
    fn transport_and_unexpected_are_retried_and_gated() {
        let transport = DomainError::Transport {
            message: "gatt timeout".into(),
            code: Some(8),
        };
        assert!(transport.is_retryable());
        assert!(transport.is_breaker_gated());

        let unexpected = DomainError::Unexpected("unknown failure".into());
        assert!(unexpected.is_retryable());
        assert!(unexpected.is_breaker_gated());
    }

    #[test]
    fn protocol_is_gated_but_not_retried() {
        let protocol = DomainError::Protocol("short payload".into());
        assert!(!protocol.is_retryable());
        assert!(protocol.is_breaker_gated());
    }

    #[test]
    fn transport_display_includes_code_when_present() {
        let err = DomainError::Transport {
            message: "gatt busy".into(),
            code: Some(19),
        };
        assert_eq!(err.to_string(), "transport error: gatt busy (code 19)");
    }
}
