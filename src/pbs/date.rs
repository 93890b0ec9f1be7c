// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Date normalization between PBS text timestamps and comparable values.
//!
//! PBS reports times like `Wed Sep 25 14:30:45 2024` in the server's local
//! time. All comparisons happen on naive local wall-clock values; the
//! database keeps them as seconds since the epoch of that wall clock.
//! Poll timestamps are the exception: they are taken in UTC.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike, Utc};

/// strftime format used by `qstat`/`pbsnodes` for date attributes
pub const PBS_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Format of poll timestamps written to the database.
///
/// Stamps are UTC; the dedup window compares them as text.
pub const POLL_STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Source of the current wall-clock time, replaceable in tests
pub type Clock = fn() -> NaiveDateTime;

/// Current local wall-clock time, truncated to whole seconds
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Current UTC time, truncated to whole seconds
pub fn now_utc() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parse a PBS date string. Returns `None` for anything unparseable.
///
/// Runs of whitespace are collapsed first, since some PBS builds pad the
/// day of month (`Sep  5`). A bare integer is taken as epoch seconds.
pub fn parse_pbs_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = text.parse().ok()?;
        return DateTime::from_timestamp(secs, 0)
            .map(|utc| utc.with_timezone(&Local).naive_local());
    }

    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, PBS_DATE_FORMAT).ok()
}

/// Render a timestamp the way PBS does
pub fn format_pbs_date(dt: NaiveDateTime) -> String {
    dt.format(PBS_DATE_FORMAT).to_string()
}

/// Render only the calendar day (`YYYY-MM-DD`)
pub fn format_day(dt: NaiveDateTime) -> String {
    dt.format(DAY_FORMAT).to_string()
}

/// Parse a user-supplied calendar day (`YYYY-MM-DD`)
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DAY_FORMAT).ok()
}

/// Render a poll timestamp for storage
pub fn poll_stamp(dt: NaiveDateTime) -> String {
    dt.format(POLL_STAMP_FORMAT).to_string()
}

/// Parse a stored poll timestamp. Fractional seconds (older databases) are accepted.
pub fn parse_poll_stamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, POLL_STAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Seconds since the epoch of the naive wall clock
pub fn to_epoch(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

/// Inverse of [`to_epoch`]
pub fn from_epoch(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Parse a PBS date straight into its stored epoch form
pub fn pbs_date_epoch(text: &str) -> Option<i64> {
    parse_pbs_date(text).map(to_epoch)
}
