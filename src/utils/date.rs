//! Front-matter date and time handling.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

/// Time used for dateless timestamps and feed item creation.
pub const NOON: NaiveTime = match NaiveTime::from_hms_opt(12, 0, 0) {
    Some(time) => time,
    None => NaiveTime::MIN,
};

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date `{s}`, expected YYYY-MM-DD"))
}

/// Parse a `HH:MM` or `HH:MM:SS` time. `HH:MM` gains `:00`.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    let full = if s.len() == 5 {
        format!("{s}:00")
    } else {
        s.to_owned()
    };
    NaiveTime::parse_from_str(&full, "%H:%M:%S")
        .with_context(|| format!("invalid time `{s}`, expected HH:MM or HH:MM:SS"))
}

#[inline]
pub fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[inline]
pub fn fmt_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Archive key: `YYYY-MM`.
pub fn fmt_year_and_month(year: i32, month: u32) -> String {
    format!("{year}-{month:02}")
}

#[inline]
pub fn archive_key(date: NaiveDate) -> String {
    fmt_year_and_month(date.year(), date.month())
}

/// UTC timestamp of a post, falling back to noon when no time is set.
pub fn timestamp(date: NaiveDate, time: Option<NaiveTime>) -> DateTime<Utc> {
    date.and_time(time.unwrap_or(NOON)).and_utc()
}
