//! UUID v7 utilities for time-ordered identifiers.
//!
//! Lists, items, and values are keyed by UUIDv7, which embeds a
//! millisecond-precision timestamp in the first 48 bits. New rows sort
//! after old ones and creation time is recoverable from the id itself,
//! so the tables carry no separate created-at column.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use tessera_core::uuid_utils::new_v7;
///
/// let id = new_v7();
/// // IDs generated later will be lexicographically greater
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Extract the embedded timestamp from a UUIDv7.
///
/// Returns `None` if the UUID is not version 7.
pub fn extract_timestamp(uuid: &Uuid) -> Option<DateTime<Utc>> {
    let bytes = uuid.as_bytes();
    if (bytes[6] >> 4) != 7 {
        return None;
    }

    // 48-bit millisecond timestamp in the first 6 bytes
    let millis = ((bytes[0] as u64) << 40)
        | ((bytes[1] as u64) << 32)
        | ((bytes[2] as u64) << 24)
        | ((bytes[3] as u64) << 16)
        | ((bytes[4] as u64) << 8)
        | (bytes[5] as u64);

    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Check if a UUID is version 7.
#[inline]
pub fn is_v7(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 7
}

/// Check if a UUID is version 4 (random).
#[inline]
pub fn is_v4(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 4
}
