//! Record filters.
//!
//! A [`Filter`] is an optional `[start, end)` window plus any number of
//! opaque predicates. The window also yields [`CoarseBounds`], which the
//! lister uses to skip whole year/month/day directories before a single
//! file is read.

use crate::models::Record;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Records may run past midnight: a record stored under the day before the
/// window can still overlap it.
pub const SPAN_LOOKBACK_DAYS: i64 = 1;

pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct Filter {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    predicates: Vec<Predicate>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records overlapping `[start, end)`.
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::new().since(start).until(end)
    }

    pub fn since(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with<F>(self, f: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.with_predicate(Arc::new(f))
    }

    pub fn with_predicate(mut self, p: Predicate) -> Self {
        self.predicates.push(p);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.predicates.is_empty()
    }

    /// Full check on a loaded record: window overlap and every predicate.
    pub fn matches(&self, record: &Record) -> bool {
        record.overlaps(self.start, self.end) && self.predicates.iter().all(|p| p(record))
    }

    pub fn coarse_bounds(&self) -> CoarseBounds {
        CoarseBounds {
            from: self.start.and_then(|s| {
                s.date()
                    .checked_sub_signed(Duration::days(SPAN_LOOKBACK_DAYS))
            }),
            to: self.end.map(|e| e.date()),
        }
    }

    pub fn year_in_range(&self, year: i32) -> bool {
        self.coarse_bounds().year_ok(year)
    }

    pub fn date_in_range(&self, date: NaiveDate) -> bool {
        self.coarse_bounds().date_ok(date)
    }
}

/// Inclusive date bounds at directory granularity. Necessary, not
/// sufficient: a date inside the bounds may still hold no match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoarseBounds {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl CoarseBounds {
    pub fn year_ok(&self, year: i32) -> bool {
        self.from.is_none_or(|f| year >= f.year()) && self.to.is_none_or(|t| year <= t.year())
    }

    pub fn month_ok(&self, year: i32, month: u32) -> bool {
        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return false;
        };
        let last = match month {
            12 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
            _ => NaiveDate::from_ymd_opt(year, month + 1, 1),
        }
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);

        self.from.is_none_or(|f| last >= f) && self.to.is_none_or(|t| first <= t)
    }

    pub fn date_ok(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }
}

// ---------------------------
// Common predicates
// ---------------------------

pub fn project_in<I, S>(projects: I) -> Predicate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: BTreeSet<String> = projects.into_iter().map(Into::into).collect();
    Arc::new(move |r: &Record| set.contains(&r.project))
}

pub fn any_tag<I, S>(keys: I) -> Predicate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    Arc::new(move |r: &Record| keys.iter().any(|k| r.has_tag(k)))
}

pub fn all_tags<I, S>(keys: I) -> Predicate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    Arc::new(move |r: &Record| keys.iter().all(|k| r.has_tag(k)))
}

pub fn tag_equals(key: impl Into<String>, value: impl Into<String>) -> Predicate {
    let key = key.into();
    let value = value.into();
    Arc::new(move |r: &Record| r.tag(&key) == Some(value.as_str()))
}

pub fn overlapping(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Predicate {
    Arc::new(move |r: &Record| r.overlaps(start, end))
}

pub fn is_open() -> Predicate {
    Arc::new(Record::is_open)
}
