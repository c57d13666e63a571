//! Timer triggers: periodic add-capacity calls from `[[timers]]`.

use tokio::sync::watch;
use tracing::info;

use slotburst_controller::{AddCapacity, CallbackTarget, CapacityController};
use slotburst_core::config::TimerSpec;
use slotburst_core::{CapacityResult, Committed};

/// Fire `spec` once.
pub async fn fire(
    spec: &TimerSpec,
    controller: &CapacityController,
    target: &CallbackTarget,
) -> CapacityResult<Committed> {
    let committed = controller
        .add_capacity(
            AddCapacity {
                scope: spec.scope.clone(),
                requested_increment: spec.requested_increment,
                reversal_delay: Some(spec.reversal_delay),
            },
            target,
        )
        .await?;
    info!(
        scope = %spec.scope,
        grant_id = %committed.grant_id,
        size = committed.committed_size,
        "timer burst committed"
    );
    Ok(committed)
}

/// Fire `spec` every `spec.every` until shutdown.
///
/// A burst already in flight when shutdown arrives runs to completion.
pub async fn run(
    spec: TimerSpec,
    controller: CapacityController,
    target: CallbackTarget,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        scope = %spec.scope,
        every_secs = spec.every.as_secs(),
        increment = spec.requested_increment,
        "timer trigger started"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(spec.every) => {
                // Failures are logged by the controller.
                let _ = fire(&spec, &controller, &target).await;
            }
            _ = shutdown.changed() => {
                info!(scope = %spec.scope, "timer trigger shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use slotburst_controller::ControllerConfig;
    use slotburst_core::Scope;
    use slotburst_remote::{InMemoryLedger, InMemoryTaskQueue};

    use super::*;

    fn spec(every: Duration) -> TimerSpec {
        TimerSpec {
            every,
            scope: Scope::new("analytics-admin", "US").unwrap(),
            requested_increment: 100,
            reversal_delay: Duration::from_secs(300),
        }
    }

    fn controller(ledger: &InMemoryLedger, queue: &InMemoryTaskQueue) -> CapacityController {
        CapacityController::new(
            ControllerConfig::new(250),
            Arc::new(ledger.clone()),
            Arc::new(queue.clone()),
        )
    }

    #[tokio::test]
    async fn fire_uses_timer_delay_and_target() {
        let ledger = InMemoryLedger::new();
        let queue = InMemoryTaskQueue::new();
        let target = CallbackTarget::from_base_url("https://burst.example.com");

        let committed = fire(&spec(Duration::from_secs(60)), &controller(&ledger, &queue), &target)
            .await
            .unwrap();

        assert_eq!(committed.committed_size, 100);
        let pending = queue.pending().await;
        assert_eq!(pending[0].1.target_url, "https://burst.example.com/del_capacity");
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_at_ceiling_and_on_shutdown() {
        let ledger = InMemoryLedger::new();
        let queue = InMemoryTaskQueue::new();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run(
            spec(Duration::from_secs(60)),
            controller(&ledger, &queue),
            CallbackTarget::from_base_url("https://burst.example.com"),
            rx,
        ));

        // Four firings against a ceiling of 250: 100, 100, 50, exhausted.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(61)).await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();

        let scope = Scope::new("analytics-admin", "US").unwrap();
        assert_eq!(ledger.total(&scope).await, 250);
        assert_eq!(queue.calls(), 3);
    }
}
