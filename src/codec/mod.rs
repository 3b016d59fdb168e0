//! Text form of a record.
//!
//! ```text
//! # Record 2001-02-03
//! 04:05 - 05:05
//!     - 04:20 - 04:35 / coffee
//!     - 04:50 - 10m
//! acme
//! Sprint planning +meeting +client=acme
//! ```
//!
//! Line one is the record range, indented `- ` lines are pauses, the next
//! line is the project and everything after it is the note. Lines starting
//! with `#` are ignored anywhere. Times are relative to a reference date
//! (see [`timefmt`]); an open end is written as `?`. A pause end may be read
//! as a duration but is always written as a time.

pub mod timefmt;

use crate::models::{Pause, Record, parse_tags};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use timefmt::{format_time, parse_duration, parse_time};

pub const COMMENT_MARKER: char = '#';
const OPEN_MARKER: &str = "?";
const PAUSE_INDENT: &str = "    ";
const NOTE_SEPARATOR: &str = " / ";

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S.*?)\s+-\s+(\S.*?)\s*$").expect("valid range regex"));

static PAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+-\s+(.*?)(?:\s+/\s*(.*))?$").expect("valid pause regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct FormatError {
    pub line: usize,
    pub reason: String,
}

impl FormatError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Comment line written on top of every record file.
pub fn header_line(date: NaiveDate) -> String {
    format!("{} Record {}", COMMENT_MARKER, date.format("%Y-%m-%d"))
}

pub fn serialize(record: &Record, reference: NaiveDate) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} - {}\n",
        format_time(record.start, reference),
        format_end(record.end, reference)
    ));

    for p in &record.pauses {
        out.push_str(&format!(
            "{}- {} - {}",
            PAUSE_INDENT,
            format_time(p.start, reference),
            format_end(p.end, reference)
        ));
        if !p.note.is_empty() {
            out.push_str(NOTE_SEPARATOR);
            out.push_str(&p.note);
        }
        out.push('\n');
    }

    out.push_str(&record.project);
    out.push('\n');

    if !record.note.is_empty() {
        out.push_str(&record.note);
        out.push('\n');
    }

    out
}

pub fn deserialize(text: &str, reference: NaiveDate) -> Result<Record, FormatError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.starts_with(COMMENT_MARKER))
        .peekable();

    // -----------------------------
    // Record range
    // -----------------------------
    let (first_no, first) = lines
        .next()
        .ok_or_else(|| FormatError::new(1, "missing time range"))?;

    let (start, end) = parse_range(first, reference, false)
        .ok_or_else(|| FormatError::new(first_no, format!("invalid time range '{}'", first)))?;

    // -----------------------------
    // Pauses
    // -----------------------------
    let mut pauses = Vec::new();
    let mut last_no = first_no;

    while let Some(&(no, line)) = lines.peek() {
        if line.trim().is_empty() {
            lines.next();
            continue;
        }
        if !is_pause_line(line) {
            break;
        }
        lines.next();
        last_no = no;
        pauses.push(parse_pause(line, reference).ok_or_else(|| {
            FormatError::new(no, format!("invalid pause '{}'", line.trim()))
        })?);
    }

    // -----------------------------
    // Project and note
    // -----------------------------
    let (project_no, project) = lines
        .next()
        .ok_or_else(|| FormatError::new(last_no + 1, "missing project name"))?;

    let note_lines: Vec<&str> = lines.map(|(_, l)| l).collect();
    let note = note_lines.join("\n").trim().to_string();

    let tags = parse_tags(&note).map_err(|reason| FormatError::new(project_no + 1, reason))?;

    Ok(Record {
        project: project.trim().to_string(),
        start,
        end,
        note,
        tags,
        pauses,
    })
}

fn format_end(end: Option<NaiveDateTime>, reference: NaiveDate) -> String {
    match end {
        Some(t) => format_time(t, reference),
        None => OPEN_MARKER.to_string(),
    }
}

fn is_pause_line(line: &str) -> bool {
    line.starts_with(char::is_whitespace) && line.trim_start().starts_with('-')
}

/// `<start> - <end|?>`; with `allow_duration` the end may also be a
/// duration counted from the start.
fn parse_range(
    text: &str,
    reference: NaiveDate,
    allow_duration: bool,
) -> Option<(NaiveDateTime, Option<NaiveDateTime>)> {
    let caps = RANGE_RE.captures(text.trim())?;
    let start = parse_time(&caps[1], reference)?;
    let end_token = &caps[2];

    if end_token == OPEN_MARKER {
        return Some((start, None));
    }
    if let Some(end) = parse_time(end_token, reference) {
        return Some((start, Some(end)));
    }
    if allow_duration {
        let d = parse_duration(end_token)?;
        return Some((start, Some(start.checked_add_signed(d)?)));
    }
    None
}

fn parse_pause(line: &str, reference: NaiveDate) -> Option<Pause> {
    let caps = PAUSE_RE.captures(line)?;
    let (start, end) = parse_range(&caps[1], reference, true)?;
    let note = caps.get(2).map_or("", |m| m.as_str());

    Some(Pause {
        start,
        end,
        note: note.trim().to_string(),
    })
}
