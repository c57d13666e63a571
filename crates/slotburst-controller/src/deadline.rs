//! Per-request deadlines for remote calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use slotburst_remote::{RemoteError, RemoteResult};

/// Bounds each remote call by the shorter of the per-call timeout and
/// whatever remains of the request's own deadline.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
    call_timeout: Duration,
}

impl Deadline {
    pub fn new(request_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + request_timeout,
            call_timeout,
        }
    }

    /// Time the next call may take.
    pub fn call_budget(&self) -> Duration {
        self.call_timeout
            .min(self.expires_at.saturating_duration_since(Instant::now()))
    }

    /// Run `call`, cancelling it when its budget runs out.
    pub async fn run<T, F>(&self, what: &str, call: F) -> RemoteResult<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        let budget = self.call_budget();
        if budget.is_zero() {
            return Err(RemoteError::Timeout(format!(
                "{what}: request deadline already passed"
            )));
        }
        match tokio::time::timeout(budget, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(format!("{what} after {budget:?}"))),
        }
    }
}
