use super::pause::Pause;
use super::tags::{Tags, parse_tags};
use crate::codec::COMMENT_MARKER;
use crate::errors::{AppError, AppResult};
use crate::utils::{format_minutes, truncate_to_minute};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// One tracked work interval.
///
/// The start timestamp is the record's identity: it decides the file the
/// record lives in, so two records never share a start minute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub project: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>, // None ⇔ running
    pub note: String,
    /// Derived from `note`; use [`Record::set_note`] to keep both in sync.
    pub tags: Tags,
    pub pauses: Vec<Pause>,
}

impl Record {
    /// New open record. The start is truncated to the minute.
    pub fn new(project: impl Into<String>, start: NaiveDateTime) -> Self {
        Self {
            project: project.into().trim().to_string(),
            start: truncate_to_minute(start),
            end: None,
            note: String::new(),
            tags: Tags::new(),
            pauses: Vec::new(),
        }
    }

    /// Replace the note and re-derive its tags.
    pub fn set_note(&mut self, note: &str) -> AppResult<()> {
        let note = note.trim();
        let tags = parse_tags(note).map_err(AppError::InvalidTag)?;
        self.note = note.to_string();
        self.tags = tags;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.pauses.last().is_some_and(Pause::is_open)
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Close the record at `at`. A trailing open pause is closed too.
    pub fn stop(&mut self, at: NaiveDateTime) -> AppResult<()> {
        let at = truncate_to_minute(at);

        if let Some(end) = self.end {
            return Err(AppError::Consistency(format!(
                "record {} already stopped at {}",
                self.start, end
            )));
        }
        if at < self.start {
            return Err(AppError::Consistency(format!(
                "end {} is before start {}",
                at, self.start
            )));
        }

        if let Some(last) = self.pauses.last_mut()
            && last.is_open()
        {
            if at < last.start {
                return Err(AppError::Consistency(format!(
                    "end {} is before the open pause started at {}",
                    at, last.start
                )));
            }
            last.end = Some(at);
        }

        self.end = Some(at);
        Ok(())
    }

    /// Start a new pause at `at`.
    pub fn pause(&mut self, at: NaiveDateTime, note: &str) -> AppResult<()> {
        let at = truncate_to_minute(at);

        if !self.is_open() {
            return Err(AppError::Consistency(
                "cannot pause a stopped record".into(),
            ));
        }
        if at < self.start {
            return Err(AppError::Consistency(format!(
                "pause {} starts before the record start {}",
                at, self.start
            )));
        }

        if let Some(last) = self.pauses.last() {
            match last.end {
                None => {
                    return Err(AppError::Consistency(format!(
                        "record is already paused since {}",
                        last.start
                    )));
                }
                Some(prev_end) if at < prev_end => {
                    return Err(AppError::Consistency(format!(
                        "pause {} starts before the previous pause ended at {}",
                        at, prev_end
                    )));
                }
                Some(_) => {}
            }
        }

        self.pauses.push(Pause::new(at, note));
        Ok(())
    }

    /// End the trailing open pause at `at`.
    pub fn resume(&mut self, at: NaiveDateTime) -> AppResult<()> {
        let at = truncate_to_minute(at);

        match self.pauses.last_mut() {
            Some(last) if last.is_open() => {
                if at < last.start {
                    return Err(AppError::Consistency(format!(
                        "resume {} is before the pause started at {}",
                        at, last.start
                    )));
                }
                last.end = Some(at);
                Ok(())
            }
            _ => Err(AppError::Consistency("record is not paused".into())),
        }
    }

    pub fn pop_pause(&mut self) -> Option<Pause> {
        self.pauses.pop()
    }

    pub fn pause_duration(&self, now: NaiveDateTime) -> Duration {
        self.pauses
            .iter()
            .fold(Duration::zero(), |acc, p| acc + p.duration(now))
    }

    /// Worked time: the record interval minus its pauses. Open intervals
    /// are measured up to `now`.
    pub fn duration(&self, now: NaiveDateTime) -> Duration {
        let end = self.end.unwrap_or(now);
        let gross = if end > self.start {
            end - self.start
        } else {
            Duration::zero()
        };
        let net = gross - self.pause_duration(now);
        net.max(Duration::zero())
    }

    /// Does the record intersect `[from, to)`? Missing bounds are unbounded,
    /// a running record extends forever.
    pub fn overlaps(&self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> bool {
        let starts_before_end = to.is_none_or(|to| self.start < to);
        let ends_after_start = match (from, self.end) {
            (None, _) | (_, None) => true,
            // zero-length records behave like points
            (Some(from), Some(end)) => end > from || self.start >= from,
        };
        starts_before_end && ends_after_start
    }

    /// Validate the ordering rules between the record and its pauses, and
    /// that every field survives the text form unchanged.
    pub fn check(&self) -> AppResult<()> {
        if self.project.is_empty() {
            return Err(AppError::Consistency(format!(
                "record {} has no project",
                self.start
            )));
        }

        self.check_text()?;
        self.check_minutes()?;

        if let Some(end) = self.end
            && end < self.start
        {
            return Err(AppError::Consistency(format!(
                "end {} is before start {}",
                end, self.start
            )));
        }

        let last_idx = self.pauses.len().saturating_sub(1);
        let mut previous: Option<&Pause> = None;

        for (i, p) in self.pauses.iter().enumerate() {
            if p.start < self.start {
                return Err(AppError::Consistency(format!(
                    "pause {} starts before the record start {}",
                    p.start, self.start
                )));
            }

            if let Some(end) = p.end
                && end < p.start
            {
                return Err(AppError::Consistency(format!(
                    "pause {} ends before it starts ({})",
                    p.start, end
                )));
            }

            if p.is_open() && i != last_idx {
                return Err(AppError::Consistency(format!(
                    "only the last pause may be open, pause {} is not the last",
                    p.start
                )));
            }

            if let Some(prev) = previous {
                if p.start <= prev.start {
                    return Err(AppError::Consistency(format!(
                        "pause {} is not after pause {}",
                        p.start, prev.start
                    )));
                }
                if let Some(prev_end) = prev.end
                    && p.start < prev_end
                {
                    return Err(AppError::Consistency(format!(
                        "pause {} overlaps the previous pause ending at {}",
                        p.start, prev_end
                    )));
                }
            }

            if let Some(end) = self.end {
                match p.end {
                    None => {
                        return Err(AppError::Consistency(format!(
                            "stopped record has an open pause at {}",
                            p.start
                        )));
                    }
                    Some(p_end) if p_end > end => {
                        return Err(AppError::Consistency(format!(
                            "pause ending {} exceeds record end {}",
                            p_end, end
                        )));
                    }
                    Some(_) => {}
                }
            }

            previous = Some(p);
        }

        Ok(())
    }

    fn check_text(&self) -> AppResult<()> {
        let project = self.project.as_str();
        if project.contains('\n') || project.trim() != project {
            return Err(AppError::Consistency(format!(
                "project {:?} must be a single trimmed line",
                project
            )));
        }
        if project.starts_with(COMMENT_MARKER) {
            return Err(AppError::Consistency(format!(
                "project {:?} starts with the comment marker '{}'",
                project, COMMENT_MARKER
            )));
        }

        if self.note.trim() != self.note {
            return Err(AppError::Consistency(
                "note has leading or trailing whitespace".into(),
            ));
        }
        if let Some(line) = self
            .note
            .lines()
            .find(|l| l.starts_with(COMMENT_MARKER))
        {
            return Err(AppError::Consistency(format!(
                "note line {:?} starts with the comment marker '{}'",
                line, COMMENT_MARKER
            )));
        }

        for p in &self.pauses {
            if p.note.contains('\n') || p.note.trim() != p.note {
                return Err(AppError::Consistency(format!(
                    "note of pause {} must be a single trimmed line",
                    p.start
                )));
            }
        }

        Ok(())
    }

    /// Files store minutes only.
    fn check_minutes(&self) -> AppResult<()> {
        let times = std::iter::once(Some(self.start))
            .chain(std::iter::once(self.end))
            .chain(self.pauses.iter().flat_map(|p| [Some(p.start), p.end]))
            .flatten();

        for t in times {
            if truncate_to_minute(t) != t {
                return Err(AppError::Consistency(format!(
                    "time {} is not a whole minute",
                    t
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = match self.end {
            Some(e) => e.format("%H:%M").to_string(),
            None => "?".to_string(),
        };
        write!(
            f,
            "{} - {} [{}]",
            self.start.format("%Y-%m-%d %H:%M"),
            end,
            self.project
        )?;
        if let Some(end) = self.end {
            write!(f, " ({})", format_minutes(self.duration(end).num_minutes()))?;
        }
        Ok(())
    }
}
