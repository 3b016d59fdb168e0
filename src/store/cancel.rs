use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Shared stop flag for a lister/scanner run. Cancelling never aborts work
/// already in flight; producers observe the flag at their next checkpoint.
///
/// Besides the flag, the token owns a channel whose only sender is dropped
/// on cancel, so a thread blocked in `select!` can wake on
/// [`CancelToken::cancelled`].
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    flag: AtomicBool,
    notify: Mutex<Option<Sender<()>>>,
    closed: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self(Arc::new(Inner {
            flag: AtomicBool::new(false),
            notify: Mutex::new(Some(tx)),
            closed: rx,
        }))
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst)
    }

    /// Never receives a message; disconnects once the token is cancelled.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.0.closed
    }
}
