use std::sync::atomic::{AtomicU64, Ordering};

use shared::domain::BatchState;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::BatchStatusApi;

/// Tracks the backend's batch matching flag and lets an operator flip it.
///
/// Every request takes a sequence number; only the most recently issued
/// request may write back into the state, so a slow response can never
/// overwrite the result of a newer one.
pub struct BatchStatusController<A> {
    api: A,
    state: RwLock<BatchState>,
    latest_request: AtomicU64,
}

impl<A: BatchStatusApi> BatchStatusController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: RwLock::new(BatchState::default()),
            latest_request: AtomicU64::new(0),
        }
    }

    /// Builds a controller and performs the initial load.
    pub async fn mount(api: A) -> Self {
        let controller = Self::new(api);
        controller.fetch_status().await;
        controller
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn state(&self) -> BatchState {
        self.state.read().await.clone()
    }

    pub async fn fetch_status(&self) -> BatchState {
        let seq = {
            let mut state = self.state.write().await;
            self.begin(&mut state)
        };

        let result = self.api.fetch_batch_status().await;

        let mut state = self.state.write().await;
        if !self.is_latest(seq) {
            return state.clone();
        }
        match result {
            Ok(status) => {
                debug!(seq, ?status, "batch status loaded");
                state.status = status;
            }
            Err(error) => {
                let message = format!("failed to load batch status: {error:#}");
                warn!(seq, %message, "batch status fetch failed");
                state.error = Some(message);
            }
        }
        state.loading = false;
        state.clone()
    }

    /// Sends the negation of the known status, then re-reads the backend.
    /// Does nothing while the status is unknown.
    pub async fn toggle_status(&self) -> BatchState {
        let (seq, next) = {
            let mut state = self.state.write().await;
            let Some(current) = state.status else {
                debug!("batch status unknown; toggle ignored");
                return state.clone();
            };
            (self.begin(&mut state), !current)
        };

        if let Err(error) = self.api.set_batch_status(next).await {
            let mut state = self.state.write().await;
            if self.is_latest(seq) {
                let message = format!("failed to update batch status: {error:#}");
                warn!(seq, requested = next, %message, "batch status update failed");
                state.error = Some(message);
                state.loading = false;
            }
            return state.clone();
        }

        info!(requested = next, "batch status update accepted; refreshing");
        self.fetch_status().await
    }

    fn begin(&self, state: &mut BatchState) -> u64 {
        let seq = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        state.loading = true;
        state.error = None;
        seq
    }

    fn is_latest(&self, seq: u64) -> bool {
        let latest = self.latest_request.load(Ordering::SeqCst);
        if seq != latest {
            debug!(seq, latest, "discarding stale batch status response");
            return false;
        }
        true
    }
}

#[cfg(test)]
#[path = "tests/batch_tests.rs"]
mod tests;
