#![allow(dead_code)]
use chrono::{NaiveDate, NaiveDateTime};
use rtimetrace::{Config, Record, RecordStore};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Parse "YYYY-MM-DD HH:MM"
pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("valid test datetime")
}

/// Parse "YYYY-MM-DD"
pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

/// Isolated store inside a fresh temp dir. Keep the TempDir alive for the
/// duration of the test.
pub fn setup_store(workers: usize) -> (TempDir, RecordStore) {
    let tmp = TempDir::new().expect("create temp dir");
    let cfg = Config {
        workers,
        ..Config::with_root(tmp.path())
    };
    let store = RecordStore::new(&cfg).expect("open store");
    (tmp, store)
}

/// Closed record `start`..`end` on `project`.
pub fn closed(project: &str, start: &str, end: &str) -> Record {
    let mut r = Record::new(project, dt(start));
    r.stop(dt(end)).expect("stop record");
    r
}

pub fn open(project: &str, start: &str) -> Record {
    Record::new(project, dt(start))
}

pub fn save_all(store: &RecordStore, records: &[Record]) {
    for r in records {
        store.save(r, false).expect("save record");
    }
}

/// One record per hour on `day`, starting at 01:00.
pub fn hourly(store: &RecordStore, day: &str, count: u32) -> Vec<Record> {
    let mut out = Vec::new();
    for h in 1..=count {
        let r = closed(
            "test",
            &format!("{day} {h:02}:00"),
            &format!("{day} {h:02}:30"),
        );
        store.save(&r, false).expect("save record");
        out.push(r);
    }
    out
}

/// Overwrite the file backing `start` with garbage.
pub fn corrupt(store: &RecordStore, start: &str) -> PathBuf {
    let path = store.record_path(dt(start));
    fs::write(&path, "\nthis is not a record\n").expect("corrupt record file");
    path
}

pub fn starts(records: &[Record]) -> Vec<NaiveDateTime> {
    records.iter().map(|r| r.start).collect()
}
