//! Lazy year → month → day → file walk over the records tree.

use super::cancel::CancelToken;
use super::paths;
use crate::errors::AppResult;
use crate::filter::CoarseBounds;
use chrono::{NaiveDate, NaiveDateTime};
use crossbeam_channel::Receiver;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// The whole tree, pruned by the coarse bounds.
    All,
    /// A single day directory.
    Day(NaiveDate),
}

/// Candidate record timestamps in ascending order, or descending when
/// `reversed`. Each level is read only when the walk reaches it and is
/// reversed on its own, so a reversed walk never lists the whole tree up
/// front.
///
/// The sequence ends after the first I/O error, and as soon as the cancel
/// token is set.
pub struct Lister {
    records_dir: PathBuf,
    extension: String,
    scope: ListScope,
    bounds: CoarseBounds,
    reversed: bool,
    cancel: CancelToken,

    started: bool,
    finished: bool,
    years: VecDeque<i32>,
    months: VecDeque<(i32, u32)>,
    days: VecDeque<NaiveDate>,
    files: VecDeque<NaiveDateTime>,
}

impl Lister {
    pub fn new(
        records_dir: PathBuf,
        extension: impl Into<String>,
        scope: ListScope,
        bounds: CoarseBounds,
        reversed: bool,
        cancel: CancelToken,
    ) -> Self {
        Self {
            records_dir,
            extension: extension.into(),
            scope,
            bounds,
            reversed,
            cancel,
            started: false,
            finished: false,
            years: VecDeque::new(),
            months: VecDeque::new(),
            days: VecDeque::new(),
            files: VecDeque::new(),
        }
    }

    fn ordered<T>(&self, mut items: Vec<T>) -> VecDeque<T> {
        if self.reversed {
            items.reverse();
        }
        items.into()
    }

    fn start(&mut self) -> io::Result<()> {
        match self.scope {
            ListScope::All => {
                let years: Vec<i32> = paths::list_years(&self.records_dir)?
                    .into_iter()
                    .filter(|y| self.bounds.year_ok(*y))
                    .collect();
                self.years = self.ordered(years);
            }
            ListScope::Day(date) => {
                if self.bounds.date_ok(date) && paths::day_dir(&self.records_dir, date).is_dir() {
                    self.days.push_back(date);
                }
            }
        }
        Ok(())
    }

    fn enter_year(&mut self, year: i32) -> io::Result<()> {
        let months: Vec<(i32, u32)> = paths::list_months(&self.records_dir, year)?
            .into_iter()
            .filter(|m| self.bounds.month_ok(year, *m))
            .map(|m| (year, m))
            .collect();
        trace!(year, months = months.len(), "listing year");
        self.months = self.ordered(months);
        Ok(())
    }

    fn enter_month(&mut self, year: i32, month: u32) -> io::Result<()> {
        let days: Vec<NaiveDate> = paths::list_days(&self.records_dir, year, month)?
            .into_iter()
            .filter(|d| self.bounds.date_ok(*d))
            .collect();
        self.days = self.ordered(days);
        Ok(())
    }

    fn enter_day(&mut self, date: NaiveDate) -> AppResult<()> {
        let files = paths::list_record_times(&self.records_dir, date, &self.extension)?;
        self.files = self.ordered(files);
        Ok(())
    }

    fn step(&mut self) -> Option<AppResult<NaiveDateTime>> {
        loop {
            if self.finished {
                return None;
            }

            if self.cancel.is_cancelled() {
                debug!("record listing cancelled");
                self.finished = true;
                return None;
            }

            let res = if !self.started {
                self.started = true;
                self.start().map_err(Into::into)
            } else if let Some(ts) = self.files.pop_front() {
                return Some(Ok(ts));
            } else if let Some(date) = self.days.pop_front() {
                self.enter_day(date)
            } else if let Some((year, month)) = self.months.pop_front() {
                self.enter_month(year, month).map_err(Into::into)
            } else if let Some(year) = self.years.pop_front() {
                self.enter_year(year).map_err(Into::into)
            } else {
                self.finished = true;
                return None;
            };

            if let Err(e) = res {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

impl Iterator for Lister {
    type Item = AppResult<NaiveDateTime>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

/// Run `lister` on its own producer thread, feeding a bounded channel of
/// `capacity` slots. The thread exits when the walk ends or the receiver
/// is dropped.
pub fn spawn(lister: Lister, capacity: usize) -> io::Result<Receiver<AppResult<NaiveDateTime>>> {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));

    thread::Builder::new()
        .name("record-lister".to_string())
        .spawn(move || {
            for item in lister {
                if tx.send(item).is_err() {
                    break;
                }
            }
        })?;

    Ok(rx)
}
