//! Concurrent filtered scan.
//!
//! ```text
//! lister thread ──candidates──▶ coordinator ──(idx, ts)──▶ loader 0..N
//!                                    ▲                        │
//!                                    └──────(idx, result)─────┘
//!                                    │
//!                                    ▼ ordered matches
//!                               RecordStream (consumer)
//! ```
//!
//! The coordinator takes up to N candidates, hands them to the N loaders,
//! waits for the whole batch, puts the results back in dispatch order and
//! only then emits the ones passing the filter. Output order therefore
//! follows the lister exactly, whatever order the loads finish in.

use super::RecordStore;
use super::cancel::CancelToken;
use crate::errors::{AppError, AppResult};
use crate::filter::Filter;
use crate::models::Record;
use chrono::NaiveDateTime;
use crossbeam_channel::{Receiver, Sender, select};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Dispatching(usize),
    Collecting(usize),
    Drained,
    Cancelled,
    Failed,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Drained | ScanState::Cancelled | ScanState::Failed
        )
    }
}

/// How the candidate feed ended while filling a batch.
enum Feed {
    More,
    Exhausted,
    Failed(AppError),
}

struct Coordinator {
    candidates: Receiver<AppResult<NaiveDateTime>>,
    jobs: Sender<(usize, NaiveDateTime)>,
    results: Receiver<(usize, AppResult<Record>)>,
    output: Sender<AppResult<Record>>,
    filter: Filter,
    batch_size: usize,
    cancel: CancelToken,
    state: ScanState,
    batches: usize,
    emitted: usize,
}

impl Coordinator {
    fn run(mut self) -> ScanState {
        let terminal = self.drive();
        debug!(
            state = ?terminal,
            batches = self.batches,
            emitted = self.emitted,
            "record scan finished"
        );
        terminal
    }

    fn transition(&mut self, next: ScanState) {
        trace!(from = ?self.state, to = ?next, "scan state");
        self.state = next;
    }

    fn drive(&mut self) -> ScanState {
        loop {
            if self.cancel.is_cancelled() {
                return ScanState::Cancelled;
            }

            let (batch, feed) = self.next_batch();

            // a cancelled lister closes its channel like an exhausted one
            if self.cancel.is_cancelled() {
                trace!(discarded = batch.len(), "batch dropped after cancel");
                return ScanState::Cancelled;
            }

            if !batch.is_empty() {
                // -----------------------------
                // Dispatch
                // -----------------------------
                self.transition(ScanState::Dispatching(batch.len()));
                self.batches += 1;
                for (idx, ts) in batch.iter().enumerate() {
                    if self.jobs.send((idx, *ts)).is_err() {
                        self.emit(Err(worker_pool_gone()));
                        return ScanState::Failed;
                    }
                }

                // -----------------------------
                // Collect, restoring dispatch order
                // -----------------------------
                self.transition(ScanState::Collecting(batch.len()));
                let mut slots: Vec<Option<AppResult<Record>>> =
                    (0..batch.len()).map(|_| None).collect();
                for _ in 0..batch.len() {
                    match self.results.recv() {
                        Ok((idx, res)) => slots[idx] = Some(res),
                        Err(_) => {
                            self.emit(Err(worker_pool_gone()));
                            return ScanState::Failed;
                        }
                    }
                }

                if self.cancel.is_cancelled() {
                    trace!(discarded = batch.len(), "batch discarded after cancel");
                    return ScanState::Cancelled;
                }

                // -----------------------------
                // Emit matches in order
                // -----------------------------
                for res in slots.into_iter().flatten() {
                    match res {
                        Ok(record) => {
                            if !self.filter.matches(&record) {
                                continue;
                            }
                            if !self.emit(Ok(record)) {
                                return ScanState::Cancelled;
                            }
                            self.emitted += 1;
                        }
                        Err(e) => {
                            warn!(error = %e, "record load failed, stopping scan");
                            self.emit(Err(e));
                            return ScanState::Failed;
                        }
                    }
                }
            }

            match feed {
                Feed::More => {}
                Feed::Exhausted if self.cancel.is_cancelled() => return ScanState::Cancelled,
                Feed::Exhausted => return ScanState::Drained,
                Feed::Failed(e) => {
                    warn!(error = %e, "record listing failed, stopping scan");
                    self.emit(Err(e));
                    return ScanState::Failed;
                }
            }
        }
    }

    fn next_batch(&self) -> (Vec<NaiveDateTime>, Feed) {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            match self.candidates.recv() {
                Ok(Ok(ts)) => batch.push(ts),
                Ok(Err(e)) => return (batch, Feed::Failed(e)),
                Err(_) => return (batch, Feed::Exhausted),
            }
        }

        (batch, Feed::More)
    }

    /// Push one item to the consumer. False once the consumer is gone or the
    /// run was cancelled while the output was full.
    fn emit(&self, item: AppResult<Record>) -> bool {
        select! {
            send(self.output, item) -> res => res.is_ok(),
            recv(self.cancel.cancelled()) -> _ => false,
        }
    }
}

fn worker_pool_gone() -> AppError {
    AppError::Io(io::Error::other("record loader pool stopped unexpectedly"))
}

fn spawn_loader(
    idx: usize,
    store: Arc<RecordStore>,
    jobs: Receiver<(usize, NaiveDateTime)>,
    results: Sender<(usize, AppResult<Record>)>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("record-loader-{idx}"))
        .spawn(move || {
            for (slot, ts) in jobs.iter() {
                let res = store.load(ts);
                if results.send((slot, res)).is_err() {
                    break;
                }
            }
        })
}

/// Start a scan over `candidates` with a pool of `workers` loaders.
///
/// The returned stream yields matching records in candidate order, then at
/// most one error. Cancelling `cancel` (or dropping the stream) stops the
/// run at its next batch boundary.
pub fn scan(
    store: Arc<RecordStore>,
    candidates: Receiver<AppResult<NaiveDateTime>>,
    filter: Filter,
    workers: usize,
    cancel: CancelToken,
) -> AppResult<RecordStream> {
    let workers = workers.max(1);

    let (jobs_tx, jobs_rx) = crossbeam_channel::bounded(workers);
    let (results_tx, results_rx) = crossbeam_channel::bounded(workers);
    let (output_tx, output_rx) = crossbeam_channel::bounded(workers);

    let mut loaders = Vec::with_capacity(workers);
    for idx in 0..workers {
        loaders.push(spawn_loader(
            idx,
            Arc::clone(&store),
            jobs_rx.clone(),
            results_tx.clone(),
        )?);
    }
    // only the loaders hold these now
    drop(jobs_rx);
    drop(results_tx);

    let coordinator = Coordinator {
        candidates,
        jobs: jobs_tx,
        results: results_rx,
        output: output_tx,
        filter,
        batch_size: workers,
        cancel: cancel.clone(),
        state: ScanState::Idle,
        batches: 0,
        emitted: 0,
    };

    debug!(workers, "record scan started");

    let handle = thread::Builder::new()
        .name("record-scan".to_string())
        .spawn(move || {
            let state = coordinator.run();
            // channels are dropped with the coordinator, loaders drain and exit
            for loader in loaders {
                let _ = loader.join();
            }
            state
        })?;

    Ok(RecordStream {
        rx: Some(output_rx),
        cancel,
        handle: Some(handle),
    })
}

/// Ordered, cancelable stream of scan results.
pub struct RecordStream {
    rx: Option<Receiver<AppResult<Record>>>,
    cancel: CancelToken,
    handle: Option<JoinHandle<ScanState>>,
}

impl RecordStream {
    /// Stop the scan. Items not yet received are discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Collect the remaining results. A run stopped through the cancel token
    /// before it drained is reported as [`AppError::Cancelled`].
    pub fn into_vec(mut self) -> AppResult<Vec<Record>> {
        let mut out = Vec::new();
        for item in self.by_ref() {
            out.push(item?);
        }
        match self.close() {
            ScanState::Cancelled => Err(AppError::Cancelled),
            _ => Ok(out),
        }
    }

    /// Cancel if still running, wait for the scan threads and report how
    /// the run ended.
    pub fn close(mut self) -> ScanState {
        self.cancel.cancel();
        self.rx.take();
        match self.handle.take() {
            Some(h) => h.join().unwrap_or(ScanState::Failed),
            None => ScanState::Idle,
        }
    }
}

impl Iterator for RecordStream {
    type Item = AppResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
