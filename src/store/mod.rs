//! Flat-file record store.
//!
//! One file per record under `records/<YYYY>/<MM>/<DD>/<HH-MM>.<ext>`.
//! Nothing is cached: every read parses the file again.

pub mod cancel;
pub mod lister;
pub mod paths;
mod query;
pub mod scanner;

pub use cancel::CancelToken;
pub use lister::{ListScope, Lister};
pub use scanner::{RecordStream, ScanState};

use crate::codec::{self, header_line};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::Record;
use crate::utils::truncate_to_minute;
use chrono::NaiveDateTime;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RecordStore {
    records_dir: PathBuf,
    extension: String,
    workers: usize,
}

impl RecordStore {
    pub fn new(config: &Config) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            records_dir: config.records_dir(),
            extension: config.record_extension().to_string(),
            workers: config.workers,
        })
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn record_path(&self, start: NaiveDateTime) -> PathBuf {
        paths::record_path(&self.records_dir, &self.extension, start)
    }

    pub fn exists(&self, start: NaiveDateTime) -> bool {
        self.record_path(start).is_file()
    }

    /// Write `record` to the file derived from its start. An existing file
    /// is only replaced when `force` is set.
    pub fn save(&self, record: &Record, force: bool) -> AppResult<()> {
        record.check()?;

        let path = self.record_path(record.start);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let date = record.start.date();
        let content = format!("{}\n{}", header_line(date), codec::serialize(record, date));

        if force {
            fs::write(&path, content)?;
        } else {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => {
                        AppError::AlreadyExists(path.display().to_string())
                    }
                    _ => AppError::Io(e),
                })?;
            file.write_all(content.as_bytes())?;
        }

        debug!(path = %path.display(), force, "record saved");
        Ok(())
    }

    /// Rewrite an existing (or new) record in place.
    pub fn update(&self, record: &Record) -> AppResult<()> {
        self.save(record, true)
    }

    pub fn load(&self, start: NaiveDateTime) -> AppResult<Record> {
        let start = truncate_to_minute(start);
        let path = self.record_path(start);

        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                AppError::NotFound(start.format("%Y-%m-%d %H:%M").to_string())
            }
            _ => AppError::Io(e),
        })?;

        let record = codec::deserialize(&text, start.date())
            .map_err(|source| AppError::Format { path: path.clone(), source })?;

        // the file name is the index key, the content must agree with it
        if record.start != start {
            return Err(AppError::InvalidRecordPath(format!(
                "{} holds a record starting at {}",
                path.display(),
                record.start.format("%Y-%m-%d %H:%M")
            )));
        }

        Ok(record)
    }

    /// Remove the record file, then every day/month/year directory it leaves
    /// empty.
    pub fn delete(&self, record: &Record) -> AppResult<()> {
        let path = self.record_path(record.start);

        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                AppError::NotFound(record.start.format("%Y-%m-%d %H:%M").to_string())
            }
            _ => AppError::Io(e),
        })?;
        debug!(path = %path.display(), "record deleted");

        // day, month, year
        let mut dir = path.parent();
        for _ in 0..3 {
            let Some(d) = dir else { break };
            if d == self.records_dir.as_path() || !is_empty_dir(d)? {
                break;
            }
            fs::remove_dir(d)?;
            debug!(dir = %d.display(), "removed empty directory");
            dir = d.parent();
        }

        Ok(())
    }
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
