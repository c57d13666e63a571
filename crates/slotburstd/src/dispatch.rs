//! Local delivery of reversals held by the in-memory task queue.
//!
//! Stands in for the remote task service when `tasks.url = "memory"`:
//! due payloads go straight to the release executor instead of over HTTP.
//! Like the remote service, it redelivers a task whose release failed.

use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use slotburst_controller::{CapacityError, ReleaseExecutor};
use slotburst_core::{ReleasePayload, unix_secs};
use slotburst_remote::InMemoryTaskQueue;

/// Delay before a failed release is delivered again.
pub const RETRY_AFTER: Duration = Duration::from_secs(30);

/// Deliver every task due at `now_secs`. Returns the number released or
/// found already released.
///
/// A task whose release fails at the ledger goes back on the queue,
/// due `retry_after` later. Undecodable or invalid payloads are dropped.
pub async fn deliver_due(
    queue: &InMemoryTaskQueue,
    releaser: &ReleaseExecutor,
    now_secs: u64,
    retry_after: Duration,
) -> usize {
    let mut delivered = 0;
    for (handle, task) in queue.take_due(now_secs).await {
        let payload: ReleasePayload = match serde_json::from_value(task.body.clone()) {
            Ok(p) => p,
            Err(e) => {
                warn!(task = %handle.name, error = %e, "dropping task with unreadable payload");
                continue;
            }
        };
        match releaser.release(&payload.grant_id).await {
            Ok(outcome) => {
                debug!(task = %handle.name, grant_id = %payload.grant_id, ?outcome, "reversal delivered");
                delivered += 1;
            }
            Err(e @ CapacityError::ReleaseError { .. }) => {
                let retry_at = now_secs.saturating_add(retry_after.as_secs().max(1));
                warn!(
                    task = %handle.name,
                    grant_id = %payload.grant_id,
                    error = %e,
                    retry_at,
                    "reversal delivery failed; will retry"
                );
                queue.requeue(handle, task, retry_at).await;
            }
            Err(e) => {
                warn!(task = %handle.name, grant_id = %payload.grant_id, error = %e, "dropping undeliverable reversal");
            }
        }
    }
    delivered
}

/// Poll the queue every `tick` until shutdown.
pub async fn run(
    queue: InMemoryTaskQueue,
    releaser: ReleaseExecutor,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(tick_ms = tick.as_millis() as u64, "local reversal dispatcher started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(tick) => {
                deliver_due(&queue, &releaser, unix_secs(SystemTime::now()), RETRY_AFTER).await;
            }
            _ = shutdown.changed() => {
                info!("local reversal dispatcher shutting down");
                break;
            }
        }
    }
}
