//! Timestamp conversion utilities
//!
//! Replication messages carry timestamps as `i64` microseconds since the
//! PostgreSQL epoch (2000-01-01T00:00:00Z). These helpers convert between
//! that representation and wall-clock instants.

use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::errors::{WalError, WalResult};

/// Microseconds since the PostgreSQL epoch (2000-01-01 UTC)
pub type PgTimestamp = i64;

/// Microseconds between the Unix epoch (1970) and the PostgreSQL epoch (2000)
pub const PG_EPOCH_OFFSET_MICROS: i64 = 946_684_800_000_000;

/// Sentinel for `-infinity`
pub const TIMESTAMP_NEG_INFINITY: PgTimestamp = i64::MIN;

/// Sentinel for `+infinity`
pub const TIMESTAMP_POS_INFINITY: PgTimestamp = i64::MAX;

pub fn is_infinite(ts: PgTimestamp) -> bool {
    ts == TIMESTAMP_NEG_INFINITY || ts == TIMESTAMP_POS_INFINITY
}

/// Current wall-clock time as a PostgreSQL timestamp.
///
/// Used for the client clock in standby status updates.
pub fn now_pg_timestamp() -> PgTimestamp {
    let since_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    since_unix.as_micros() as i64 - PG_EPOCH_OFFSET_MICROS
}

/// Convert a PostgreSQL timestamp to a wall-clock instant.
///
/// The sentinels are not instants; converting one fails with
/// `InvalidArgument`. Use [`pg_timestamp_to_datetime_clamped`] to map them
/// to the representable extremes instead.
pub fn pg_timestamp_to_datetime(ts: PgTimestamp) -> WalResult<DateTime<Utc>> {
    if is_infinite(ts) {
        return Err(WalError::invalid(format!(
            "timestamp {} is infinite",
            if ts == TIMESTAMP_POS_INFINITY { "+" } else { "-" }
        )));
    }
    let unix_micros = ts
        .checked_add(PG_EPOCH_OFFSET_MICROS)
        .ok_or_else(|| WalError::invalid("timestamp out of range"))?;
    DateTime::from_timestamp_micros(unix_micros)
        .ok_or_else(|| WalError::invalid("timestamp out of range"))
}

/// Like [`pg_timestamp_to_datetime`] but maps the infinity sentinels to the
/// minimum/maximum representable instants.
pub fn pg_timestamp_to_datetime_clamped(ts: PgTimestamp) -> DateTime<Utc> {
    match ts {
        TIMESTAMP_NEG_INFINITY => DateTime::<Utc>::MIN_UTC,
        TIMESTAMP_POS_INFINITY => DateTime::<Utc>::MAX_UTC,
        _ => pg_timestamp_to_datetime(ts).unwrap_or_else(|_| {
            if ts < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            }
        }),
    }
}

/// Convert a wall-clock instant to a PostgreSQL timestamp
pub fn datetime_to_pg_timestamp(dt: DateTime<Utc>) -> PgTimestamp {
    dt.timestamp_micros() - PG_EPOCH_OFFSET_MICROS
}
