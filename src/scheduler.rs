use crate::saga::{self, SagaOutcome};
use crate::state::Clinic;
use crossbeam_channel::Receiver;
use std::time::Duration;

/// How long a deferred prescription request waits before the whole saga is
/// replayed from the start.
pub const RETRY_DELAY: Duration = Duration::from_secs(15 * 60);

// ── Retry pipeline ───────────────────────────────────────────────────────────
// Requests dispatched from the saga to the background retry worker. The saga
// returns Deferred to its caller immediately after the channel send.
#[derive(Debug, Clone)]
pub struct RetryRequest {
    pub original_message_id: String,
    pub delay: Duration,
}

impl RetryRequest {
    /// Every deferral carries the original message reference, so a retry can
    /// rebuild the prescription message no matter which step failed.
    pub fn after_standard_delay(original_message_id: &str) -> Self {
        RetryRequest {
            original_message_id: original_message_id.to_string(),
            delay: RETRY_DELAY,
        }
    }
}

// ── Retry worker (dedicated OS thread) ───────────────────────────────────────
// Sleeps out each request's delay, then replays the whole saga. Requests run
// in arrival order with no affinity to the original caller; a request that
// defers again simply re-enters the queue through the saga's own scheduling.
// There is no cancellation: once a retry is queued it will eventually fire.
pub struct RetryWorker {
    receiver: Receiver<RetryRequest>,
    clinic: Clinic,
}

impl RetryWorker {
    pub fn new(receiver: Receiver<RetryRequest>, clinic: Clinic) -> Self {
        RetryWorker { receiver, clinic }
    }

    pub fn run(self) {
        tracing::info!("retry worker started");
        while self.step() {}
        tracing::info!("retry worker shutting down (channel closed)");
    }

    /// Handle one request. Returns false once the channel is closed.
    fn step(&self) -> bool {
        let Ok(request) = self.receiver.recv() else {
            return false;
        };
        if !request.delay.is_zero() {
            std::thread::sleep(request.delay);
        }
        match saga::request_prescription(&self.clinic, &request.original_message_id) {
            Ok(SagaOutcome::Completed(result)) => {
                tracing::info!(
                    "prescription retry for {} completed: {}",
                    result.reference,
                    result.notice
                );
            }
            Ok(SagaOutcome::Deferred) => {
                tracing::warn!(
                    "prescription retry for {} deferred again",
                    request.original_message_id
                );
            }
            Err(e) => {
                tracing::error!(
                    "prescription retry for {} rejected: {}",
                    request.original_message_id,
                    e
                );
            }
        }
        true
    }
}
