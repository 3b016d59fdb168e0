use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

/// A sub-interval of a record during which work was suspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pause {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>, // None ⇔ still paused
    pub note: String,
}

impl Pause {
    pub fn new(start: NaiveDateTime, note: impl Into<String>) -> Self {
        Self {
            start,
            end: None,
            note: note.into().trim().to_string(),
        }
    }

    pub fn closed(start: NaiveDateTime, end: NaiveDateTime, note: impl Into<String>) -> Self {
        Self {
            end: Some(end),
            ..Self::new(start, note)
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Length of the pause; an open pause is measured up to `now`.
    pub fn duration(&self, now: NaiveDateTime) -> Duration {
        let end = self.end.unwrap_or(now);
        if end > self.start {
            end - self.start
        } else {
            Duration::zero()
        }
    }
}
