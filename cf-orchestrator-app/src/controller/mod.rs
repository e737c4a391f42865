//! Client-side bulk operation controller
//!
//! Drives one run at a time through a [`BulkTransport`] and publishes a
//! [`BulkSnapshot`] on a `watch` channel after every event.

mod state;
mod transport;

pub use state::{
    reduce, BulkSnapshot, ControllerInput, DomainProgress, DomainState, DomainTarget,
};
pub use transport::{decode_events, BulkTransport, EventStream, HttpBulkTransport};

use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use cf_orchestrator_core::error::{CoreError, CoreResult};
use cf_orchestrator_core::types::{BulkOperationPayload, ProgressEvent};

/// Stream ended without `complete` or `error`
const CONNECTION_CLOSED: &str = "Connection closed before the operation finished";

pub struct BulkOperationController {
    transport: Arc<dyn BulkTransport>,
    state: watch::Sender<BulkSnapshot>,
    running: Mutex<Option<CancellationToken>>,
}

impl BulkOperationController {
    pub fn new(transport: Arc<dyn BulkTransport>) -> Self {
        let (state, _) = watch::channel(BulkSnapshot::default());
        Self {
            transport,
            state,
            running: Mutex::new(None),
        }
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<BulkSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> BulkSnapshot {
        self.state.borrow().clone()
    }

    /// Reset to the given domains, all pending. Ignored while a run is active.
    pub fn initialize(&self, domains: Vec<DomainTarget>) {
        if self.is_running() {
            log::warn!("[controller] Cannot re-initialize while a run is active");
            return;
        }
        self.state.send_replace(BulkSnapshot::initialize(domains));
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run `payload` to its end and return the final snapshot.
    ///
    /// Rejected requests (validation, auth) come back as `Err` and leave the
    /// error on the snapshot.
    pub async fn start(&self, payload: BulkOperationPayload) -> CoreResult<BulkSnapshot> {
        let cancel = {
            let mut running = self
                .running
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if running.is_some() {
                return Err(CoreError::ValidationError(
                    "A bulk operation is already running".to_string(),
                ));
            }
            let token = CancellationToken::new();
            *running = Some(token.clone());
            token
        };

        let result = self.drive(payload, &cancel).await;
        *self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        result.map(|()| self.snapshot())
    }

    /// Stop the active run. The connection is dropped, which cancels it server-side.
    pub fn cancel(&self) {
        if let Some(token) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            log::info!("[controller] Cancelling bulk operation");
            token.cancel();
        }
    }

    async fn drive(
        &self,
        payload: BulkOperationPayload,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        self.apply(&ControllerInput::Started);

        let mut events = match self.transport.open(&payload).await {
            Ok(events) => events,
            Err(e) => {
                self.apply(&ControllerInput::Failed(e.to_string()));
                return Err(e);
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    let terminal = event.is_terminal();
                    self.apply(&ControllerInput::Event(event));
                    if terminal {
                        return Ok(());
                    }
                }
                Some(Err(e)) => {
                    log::warn!("[controller] Event stream failed: {e}");
                    self.apply(&ControllerInput::Failed(e.to_string()));
                    return Ok(());
                }
                None => {
                    self.apply(&ControllerInput::Failed(CONNECTION_CLOSED.to_string()));
                    return Ok(());
                }
            }
        }

        drop(events);
        let progress = self.state.borrow().progress;
        self.apply(&ControllerInput::Event(ProgressEvent::cancelled(progress)));
        Ok(())
    }

    fn apply(&self, input: &ControllerInput) {
        self.state
            .send_modify(|state| *state = reduce(std::mem::take(state), input));
    }
}
