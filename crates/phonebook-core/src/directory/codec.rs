//! Normalization of raw directory attribute values.
//!
//! Active Directory hands back binary GUIDs, generalized-time strings with
//! varying zone suffixes, and raw JPEG bytes. Everything here converts those
//! into the canonical, comparable forms stored on a [`RemoteRecord`].
//!
//! [`RemoteRecord`]: crate::models::RemoteRecord

use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

/// Convert a 16-byte `objectGUID` into its braced string form.
///
/// AD stores the first three groups little-endian, so the bytes are read the
/// way Windows renders them: `{d4c3b2a1-f6e5-h8g7-...}`.
pub fn guid_from_bytes(bytes: &[u8]) -> Option<String> {
    let bytes: [u8; 16] = bytes.try_into().ok()?;
    let uuid = Uuid::from_bytes_le(bytes);
    Some(format!("{{{}}}", uuid.hyphenated()))
}

/// Parse a braced (or bare) GUID string back into `objectGUID` wire bytes.
pub fn guid_to_bytes(guid: &str) -> Option<[u8; 16]> {
    let trimmed = guid.trim().trim_start_matches('{').trim_end_matches('}');
    let uuid = Uuid::parse_str(trimmed).ok()?;
    Some(uuid.to_bytes_le())
}

/// Build an escaped LDAP filter value (`\xx` per byte) matching a GUID.
pub fn guid_filter_value(guid: &str) -> Option<String> {
    let bytes = guid_to_bytes(guid)?;
    let mut value = String::with_capacity(48);
    for byte in bytes {
        let _ = write!(value, "\\{byte:02x}");
    }
    Some(value)
}

/// Canonicalize a GUID string for comparisons: lowercase and braced.
pub fn canonical_guid(guid: &str) -> Option<String> {
    guid_to_bytes(guid).and_then(|bytes| guid_from_bytes(&bytes))
}

/// Base64-encode a binary photo payload.
pub fn encode_photo(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(STANDARD.encode(bytes))
    }
}

/// Parse an LDAP generalized-time value into UTC.
///
/// Accepts `YYYYMMDDHH[MM[SS]][.fraction](Z|±HH[MM])`. Values without a
/// zone are taken as UTC. Fractions are dropped, since watermarks have whole
/// second resolution.
pub fn parse_generalized_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let (body, offset) = split_zone(raw)?;

    let digits: &str = body.split(['.', ',']).next()?;
    if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| -> Option<u32> { digits.get(range)?.parse().ok() };
    let (hour, minute, second) = match digits.len() {
        10 => (field(8..10)?, 0, 0),
        12 => (field(8..10)?, field(10..12)?, 0),
        14 => (field(8..10)?, field(10..12)?, field(12..14)?),
        _ => return None,
    };
    let year = i32::try_from(field(0..4)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?;
    let naive: NaiveDateTime = date.and_hms_opt(hour, minute, second)?;

    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

fn split_zone(raw: &str) -> Option<(&str, FixedOffset)> {
    if let Some(body) = raw.strip_suffix(['Z', 'z']) {
        return Some((body, FixedOffset::east_opt(0)?));
    }

    if let Some(index) = raw.rfind(['+', '-']) {
        let (body, zone) = raw.split_at(index);
        let sign = if zone.starts_with('-') { -1 } else { 1 };
        let zone = &zone[1..];
        if !zone.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        let (hours, minutes) = match zone.len() {
            2 => (zone.parse::<i32>().ok()?, 0),
            4 => (zone[..2].parse::<i32>().ok()?, zone[2..].parse::<i32>().ok()?),
            _ => return None,
        };
        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
        return Some((body, offset));
    }

    Some((raw, FixedOffset::east_opt(0)?))
}
