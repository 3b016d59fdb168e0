//! Path index: `<records>/<YYYY>/<MM>/<DD>/<HH-MM>.<ext>`.
//!
//! The directory tree is the only index the store has. Listing a level and
//! reading entry names as numbers is the one index operation; entries that
//! are not numeric directories are skipped.

use crate::errors::{AppError, AppResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn year_dir(records_dir: &Path, year: i32) -> PathBuf {
    records_dir.join(format!("{:04}", year))
}

pub fn month_dir(records_dir: &Path, year: i32, month: u32) -> PathBuf {
    year_dir(records_dir, year).join(format!("{:02}", month))
}

pub fn day_dir(records_dir: &Path, date: NaiveDate) -> PathBuf {
    month_dir(records_dir, date.year(), date.month()).join(format!("{:02}", date.day()))
}

pub fn file_name(ts: NaiveDateTime, extension: &str) -> String {
    format!("{:02}-{:02}.{}", ts.hour(), ts.minute(), extension)
}

pub fn record_path(records_dir: &Path, extension: &str, ts: NaiveDateTime) -> PathBuf {
    day_dir(records_dir, ts.date()).join(file_name(ts, extension))
}

/// Inverse of [`record_path`]: the extension is ignored, the stem must be
/// `HH-MM`.
pub fn time_from_path(year: i32, month: u32, day: u32, file_name: &str) -> AppResult<NaiveDateTime> {
    let invalid = || {
        AppError::InvalidRecordPath(format!(
            "{:04}/{:02}/{:02}/{}",
            year, month, day, file_name
        ))
    };

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    let stem = file_name.split_once('.').map_or(file_name, |(s, _)| s);
    let (h, m) = stem.split_once('-').ok_or_else(invalid)?;

    if h.len() != 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;

    Ok(date.and_time(time))
}

// ---------------------------
// Directory enumeration
// ---------------------------

/// Numeric sub-directory names of `dir`, ascending.
pub fn list_numeric_dirs(dir: &Path) -> io::Result<Vec<u32>> {
    let mut out = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(n) = name.parse::<u32>() {
            out.push(n);
        }
    }

    out.sort_unstable();
    Ok(out)
}

/// Years present in the store. A missing records root is an empty store.
pub fn list_years(records_dir: &Path) -> io::Result<Vec<i32>> {
    if !records_dir.exists() {
        return Ok(Vec::new());
    }
    Ok(list_numeric_dirs(records_dir)?
        .into_iter()
        .filter_map(|y| i32::try_from(y).ok())
        .collect())
}

pub fn list_months(records_dir: &Path, year: i32) -> io::Result<Vec<u32>> {
    Ok(list_numeric_dirs(&year_dir(records_dir, year))?
        .into_iter()
        .filter(|m| (1..=12).contains(m))
        .collect())
}

pub fn list_days(records_dir: &Path, year: i32, month: u32) -> io::Result<Vec<NaiveDate>> {
    Ok(list_numeric_dirs(&month_dir(records_dir, year, month))?
        .into_iter()
        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .collect())
}

/// Record timestamps stored under one day directory, ascending. Files
/// without the store extension are ignored.
pub fn list_record_times(
    records_dir: &Path,
    date: NaiveDate,
    extension: &str,
) -> AppResult<Vec<NaiveDateTime>> {
    let suffix = format!(".{}", extension);
    let mut out = Vec::new();

    for entry in fs::read_dir(day_dir(records_dir, date))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.ends_with(&suffix) {
            continue;
        }
        out.push(time_from_path(date.year(), date.month(), date.day(), name)?);
    }

    out.sort_unstable();
    Ok(out)
}
