//! Background thread that runs store mutations off the render loop.
//!
//! The UI submits a [`Mutation`] and keeps drawing; it polls
//! [`StoreWorker::try_recv`] each tick and feeds the outcome to
//! [`crate::DirectoryController::complete`]. One request is processed at a
//! time, in submission order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::controller::{Mutation, MutationOutcome};
use crate::error::{Result, VaultError};
use crate::store::RecordStore;

pub struct StoreWorker {
    requests: Option<Sender<Mutation>>,
    outcomes: Receiver<MutationOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl StoreWorker {
    /// Spawn the worker thread over `store`.
    pub fn spawn(store: Arc<dyn RecordStore>) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<Mutation>();
        let (outcome_tx, outcome_rx) = unbounded::<MutationOutcome>();
        let handle = thread::Builder::new()
            .name("cybervault-store".to_string())
            .spawn(move || run(store.as_ref(), &request_rx, &outcome_tx))
            .map_err(|e| VaultError::unavailable(format!("failed to spawn store worker: {e}")))?;
        Ok(Self {
            requests: Some(request_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
        })
    }

    /// Queue a mutation. Fails only if the worker thread has gone away.
    pub fn submit(&self, mutation: Mutation) -> Result<()> {
        let Some(tx) = &self.requests else {
            return Err(VaultError::unavailable("store worker stopped"));
        };
        tx.send(mutation)
            .map_err(|_| VaultError::unavailable("store worker stopped"))
    }

    /// Next finished outcome, if one is ready.
    pub fn try_recv(&self) -> Option<MutationOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the next outcome arrives.
    pub fn recv(&self) -> Option<MutationOutcome> {
        self.outcomes.recv().ok()
    }
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("store worker panicked");
            }
        }
    }
}

fn run(store: &dyn RecordStore, requests: &Receiver<Mutation>, outcomes: &Sender<MutationOutcome>) {
    for mutation in requests {
        tracing::debug!(?mutation, "store worker executing");
        let outcome = mutation.execute(store);
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    tracing::debug!("store worker exiting");
}
