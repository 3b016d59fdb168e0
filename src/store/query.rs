//! High-level queries: each one is a traversal direction, a filter and a
//! stop policy on top of the lister and the scanner.

use super::cancel::CancelToken;
use super::lister::{self, ListScope, Lister};
use super::paths;
use super::scanner::{self, RecordStream};
use super::RecordStore;
use crate::errors::{AppError, AppResult};
use crate::filter::Filter;
use crate::models::Record;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

impl RecordStore {
    /// Stream every record matching `filter`, oldest first or, when
    /// `reversed`, newest first.
    pub fn scan(&self, filter: &Filter, reversed: bool) -> AppResult<RecordStream> {
        self.scan_scope(ListScope::All, filter, reversed)
    }

    fn scan_scope(&self, scope: ListScope, filter: &Filter, reversed: bool) -> AppResult<RecordStream> {
        let cancel = CancelToken::new();
        let lister = Lister::new(
            self.records_dir.clone(),
            self.extension.clone(),
            scope,
            filter.coarse_bounds(),
            reversed,
            cancel.clone(),
        );
        let candidates = lister::spawn(lister, self.workers)?;

        scanner::scan(
            Arc::new(self.clone()),
            candidates,
            filter.clone(),
            self.workers,
            cancel,
        )
    }

    pub fn load_all(&self, filter: &Filter) -> AppResult<Vec<Record>> {
        self.scan(filter, false)?.into_vec()
    }

    /// Records stored under `date`'s day directory.
    pub fn load_for_date(&self, date: NaiveDate, filter: &Filter) -> AppResult<Vec<Record>> {
        if !paths::day_dir(&self.records_dir, date).is_dir() {
            return Err(AppError::NoRecordsForDate(date.format("%Y-%m-%d").to_string()));
        }
        self.scan_scope(ListScope::Day(date), filter, false)?
            .into_vec()
    }

    /// The record with the greatest start, found by descending into the
    /// last year, month and day. `None` when any of those levels is empty.
    pub fn latest(&self) -> AppResult<Option<Record>> {
        let Some(year) = paths::list_years(&self.records_dir)?.pop() else {
            return Ok(None);
        };
        let Some(month) = paths::list_months(&self.records_dir, year)?.pop() else {
            return Ok(None);
        };
        let Some(day) = paths::list_days(&self.records_dir, year, month)?.pop() else {
            return Ok(None);
        };
        let Some(start) = paths::list_record_times(&self.records_dir, day, &self.extension)?.pop()
        else {
            return Ok(None);
        };

        self.load(start).map(Some)
    }

    /// Newest record accepted by `pred`. The scan stops at the first hit.
    pub fn find_latest_matching<F>(&self, pred: F) -> AppResult<Option<Record>>
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.find_first(&Filter::new().with(pred), true)
    }

    /// First record of a scan in the given direction, cancelling the rest.
    pub fn find_first(&self, filter: &Filter, reversed: bool) -> AppResult<Option<Record>> {
        let mut stream = self.scan(filter, reversed)?;
        let first = stream.next();
        let state = stream.close();
        debug!(?state, found = first.is_some(), "first-match scan closed");
        first.transpose()
    }

    /// The running record, if the latest one has no end.
    pub fn open_record(&self) -> AppResult<Option<Record>> {
        Ok(self.latest()?.filter(Record::is_open))
    }
}
