//! Little-endian codec helpers for the wire protocol a `BlePort`
//! adapter speaks over GATT, and the transport-code-to-domain-error
//! mapping used at that boundary. See `spec.md` §6.2.

use crate::error::DomainError;
use crate::value::{EventCount, EventOffset};

/// Decode a count-read payload: the first 4 bytes, little-endian.
///
/// # Errors
///
/// Returns `DomainError::Protocol` if `payload` is shorter than 4 bytes.
pub fn decode_count(payload: &[u8]) -> Result<EventCount, DomainError> {
    let bytes: [u8; 4] = payload
        .get(0..4)
        .ok_or_else(|| DomainError::Protocol("count payload shorter than 4 bytes".into()))?
        .try_into()
        .expect("slice of length 4 converts infallibly");
    Ok(EventCount::new(u64::from(u32::from_le_bytes(bytes))))
}

/// Encode a page-request write payload: `uint32 offset || uint32 count`,
/// little-endian.
///
/// # Panics
///
/// Panics if `offset` or `count` exceed `u32::MAX`; the domain never
/// constructs values that large in practice (event offsets track a
/// device's on-board log, bounded by on-device storage).
#[must_use]
pub fn encode_page_request(offset: EventOffset, count: EventCount) -> [u8; 8] {
    let offset = u32::try_from(offset.value()).expect("offset fits in u32 for any real device log");
    let count = u32::try_from(count.value()).expect("count fits in u32 for any real page size");
    let mut buf = [0u8; 8];
    buf[0..4].copy_from_slice(&offset.to_le_bytes());
    buf[4..8].copy_from_slice(&count.to_le_bytes());
    buf
}

/// Decode a page-request write payload back into its offset and count,
/// the inverse of `encode_page_request`. Used by in-memory test fakes
/// that accept the same wire shape real adapters would.
///
/// # Errors
///
/// Returns `DomainError::Protocol` if `payload` is shorter than 8 bytes.
pub fn decode_page_request(payload: &[u8]) -> Result<(EventOffset, EventCount), DomainError> {
    let offset_bytes: [u8; 4] = payload
        .get(0..4)
        .ok_or_else(|| DomainError::Protocol("page request payload shorter than 8 bytes".into()))?
        .try_into()
        .expect("slice of length 4 converts infallibly");
    let count_bytes: [u8; 4] = payload
        .get(4..8)
        .ok_or_else(|| DomainError::Protocol("page request payload shorter than 8 bytes".into()))?
        .try_into()
        .expect("slice of length 4 converts infallibly");
    Ok((
        EventOffset::new(u64::from(u32::from_le_bytes(offset_bytes))),
        EventCount::new(u64::from(u32::from_le_bytes(count_bytes))),
    ))
}

/// Encode an ack write payload: `uint32 upTo`, little-endian.
///
/// # Panics
///
/// Panics if `up_to` exceeds `u32::MAX`; see `encode_page_request`.
#[must_use]
pub fn encode_ack(up_to: EventOffset) -> [u8; 4] {
    let up_to = u32::try_from(up_to.value()).expect("offset fits in u32 for any real device log");
    up_to.to_le_bytes()
}

/// Decode an ack write payload back into its offset, the inverse of
/// `encode_ack`.
///
/// # Errors
///
/// Returns `DomainError::Protocol` if `payload` is shorter than 4 bytes.
pub fn decode_ack(payload: &[u8]) -> Result<EventOffset, DomainError> {
    let bytes: [u8; 4] = payload
        .get(0..4)
        .ok_or_else(|| DomainError::Protocol("ack payload shorter than 4 bytes".into()))?
        .try_into()
        .expect("slice of length 4 converts infallibly");
    Ok(EventOffset::new(u64::from(u32::from_le_bytes(bytes))))
}

/// Map a raw platform GATT transport code to a `DomainError`, per the
/// reference adapter table in `spec.md` §6.2.
#[must_use]
pub fn transport_code_to_domain_error(code: i32, message: impl Into<String>) -> DomainError {
    let message = message.into();
    match code {
        8 | 19 => DomainError::Transport {
            message,
            code: Some(code),
        },
        133 => DomainError::Unexpected(format!("platform unavailable (code {code}): {message}")),
        _ => DomainError::Protocol(format!("unrecognized transport code {code}: {message}")),
    }
}
