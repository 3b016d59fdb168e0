//! Time tokens relative to a reference date.
//!
//! `04:05` is on the reference day, `+1 00:30` one day later, `-1 23:50`
//! one day earlier.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use std::sync::LazyLock;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([+-]\d+)\s+)?(\d{1,2}):(\d{2})$").expect("valid time regex")
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?$").expect("valid duration regex")
});

pub fn format_time(t: NaiveDateTime, reference: NaiveDate) -> String {
    let days = (t.date() - reference).num_days();
    let hm = format!("{:02}:{:02}", t.hour(), t.minute());
    if days == 0 {
        hm
    } else {
        format!("{:+} {}", days, hm)
    }
}

pub fn parse_time(token: &str, reference: NaiveDate) -> Option<NaiveDateTime> {
    let caps = TIME_RE.captures(token.trim())?;

    let days: i64 = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let hour: u32 = caps[2].parse().ok()?;
    let minute: u32 = caps[3].parse().ok()?;

    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let date = reference.checked_add_signed(Duration::try_days(days)?)?;
    Some(date.and_time(time))
}

/// Durations as written in pause lines: `90m`, `1h`, `1h30m`, or bare
/// minutes (`45`).
pub fn parse_duration(token: &str) -> Option<Duration> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if token.bytes().all(|b| b.is_ascii_digit()) {
        return Duration::try_minutes(token.parse().ok()?);
    }

    let caps = DURATION_RE.captures(token)?;
    let hours: i64 = caps.get(1).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    let minutes: i64 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    Duration::try_minutes(hours.checked_mul(60)?.checked_add(minutes)?)
}
