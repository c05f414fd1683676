//! Small helpers shared by the packet modules.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

use crate::errors::{format_err, Result};

/// Converts an OpenPGP timestamp into a date.
pub(crate) fn dt_from_timestamp(ts: u32) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(i64::from(ts), 0)
        .single()
        .ok_or_else(|| format_err!("invalid timestamp {}", ts))
}

/// Converts a date into an OpenPGP timestamp, clamping dates outside the u32 range.
pub(crate) fn dt_to_timestamp(dt: &DateTime<Utc>) -> u32 {
    u32::try_from(dt.timestamp()).unwrap_or(if dt.timestamp() < 0 { 0 } else { u32::MAX })
}

/// The current time, at the one second resolution OpenPGP timestamps have.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Lossy conversion of user id style strings, invalid UTF-8 is replaced.
pub(crate) fn read_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
