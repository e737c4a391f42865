//! Event channel between a running bulk operation and its stream

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::ProgressEvent;

/// Events buffered before the orchestrator waits on a slow reader
const CHANNEL_CAPACITY: usize = 64;

/// Sending half of a progress stream.
///
/// Keeps reported progress non-decreasing. A send to a dropped receiver
/// cancels the run's token.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
    high_water: Arc<AtomicU8>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            high_water: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Sink plus the receiver it feeds.
    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self::new(tx, cancel), rx)
    }

    /// Send one event. Returns `false` once the receiver is gone.
    pub async fn emit(&self, mut event: ProgressEvent) -> bool {
        let floor = self.high_water.fetch_max(event.progress(), Ordering::SeqCst);
        if event.progress() < floor {
            event.set_progress(floor);
        }

        if self.tx.send(event).await.is_err() {
            if !self.cancel.is_cancelled() {
                log::info!("[bulk] Progress receiver dropped, cancelling run");
                self.cancel.cancel();
            }
            return false;
        }
        true
    }

    /// Highest progress sent so far.
    pub fn progress(&self) -> u8 {
        self.high_water.load(Ordering::SeqCst)
    }
}
