//! Posted-time parsing
//!
//! Deal boards render a listing's age three ways: a full timestamp, a
//! bare time for today's posts, and a bare date for older ones. This
//! module turns any of those into the canonical timestamp as one pure
//! function; the orchestration core never sees a raw date string.

use crate::SweepError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

/// Parses a board's raw posted-time text into a canonical timestamp
///
/// Tries, in order:
/// 1. the source's hinted format
/// 2. `HH:MM:SS` / `HH:MM` - today's posts, resolved against `now`
/// 3. `YYYY-MM-DD` / `YYYY.MM.DD` - midnight of that day
/// 4. `MM-DD` / `MM.DD` - midnight, current year from `now`
///
/// `now` is a parameter rather than the wall clock so the function is
/// pure and testable.
pub fn parse_posted_at(
    raw: &str,
    format_hint: &str,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, SweepError> {
    let raw = raw.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format_hint) {
        return Ok(dt);
    }

    // Today's posts show only the time
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, fmt) {
            return Ok(now.date().and_time(t));
        }
    }

    // Older posts show only the date
    for fmt in ["%Y-%m-%d", "%Y.%m.%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }

    // Month-day forms borrow the current year
    for (sep, fmt) in [("-", "%Y-%m-%d"), (".", "%Y.%m.%d")] {
        let parts: Vec<&str> = raw.split(sep).collect();
        if parts.len() == 2 {
            let with_year = format!("{}{}{}", now.year(), sep, raw);
            if let Ok(d) = NaiveDate::parse_from_str(&with_year, fmt) {
                return Ok(d.and_time(NaiveTime::MIN));
            }
        }
    }

    Err(SweepError::DateParse {
        raw: raw.to_string(),
        hint: format_hint.to_string(),
    })
}
