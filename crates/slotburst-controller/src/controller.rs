//! The add-capacity pipeline.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use slotburst_core::config::{DelayPolicy, Settings};
use slotburst_core::{
    BudgetRequest, CapacityError, CapacityResult, Committed, Scope, allowed_increment, unix_secs,
};
use slotburst_remote::{LedgerClient, TaskQueue};

use crate::deadline::Deadline;
use crate::issuer::{Issued, issue_grant};
use crate::query::outstanding_total;
use crate::reversal::{CallbackTarget, schedule_reversal};

/// Immutable controller configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Ceiling on aggregate outstanding slots per scope.
    pub ceiling: i64,
    pub call_timeout: Duration,
    pub request_timeout: Duration,
    pub delay: DelayPolicy,
}

impl ControllerConfig {
    pub fn new(ceiling: i64) -> Self {
        Self {
            ceiling,
            call_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            delay: DelayPolicy::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ceiling: settings.ceiling,
            call_timeout: settings.call_timeout,
            request_timeout: settings.request_timeout,
            delay: settings.delay,
        }
    }

    pub(crate) fn deadline(&self) -> Deadline {
        Deadline::new(self.request_timeout, self.call_timeout)
    }
}

/// One add-capacity trigger, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCapacity {
    pub scope: Scope,
    pub requested_increment: i64,
    /// `None` applies the configured default.
    pub reversal_delay: Option<Duration>,
}

/// Runs the query → budget → issue → schedule pipeline.
///
/// Holds no per-request state; clones share the remote clients.
#[derive(Clone)]
pub struct CapacityController {
    config: ControllerConfig,
    ledger: Arc<dyn LedgerClient>,
    tasks: Arc<dyn TaskQueue>,
}

impl CapacityController {
    pub fn new(
        config: ControllerConfig,
        ledger: Arc<dyn LedgerClient>,
        tasks: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            config,
            ledger,
            tasks,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Grant up to `requested_increment` slots and schedule their release.
    pub async fn add_capacity(
        &self,
        request: AddCapacity,
        target: &CallbackTarget,
    ) -> CapacityResult<Committed> {
        let result = self.run_pipeline(request, target).await;
        if let Err(e) = &result {
            if e.is_benign() {
                info!(kind = e.kind(), error = %e, "add-capacity rejected");
            } else if let Some(grant_id) = e.orphaned_grant() {
                error!(%grant_id, error = %e, "grant outstanding without a scheduled reversal; release it manually");
            } else {
                warn!(kind = e.kind(), error = %e, "add-capacity failed");
            }
        }
        result
    }

    async fn run_pipeline(
        &self,
        request: AddCapacity,
        target: &CallbackTarget,
    ) -> CapacityResult<Committed> {
        let delay = self.config.delay.resolve(request.reversal_delay)?;
        let request = BudgetRequest::new(
            request.scope,
            request.requested_increment,
            self.config.ceiling,
            delay,
        )?;
        let deadline = self.config.deadline();

        let current_total =
            outstanding_total(self.ledger.as_ref(), &request.scope, &deadline).await?;

        let allowed = allowed_increment(request.requested_increment, request.ceiling, current_total)?;
        if allowed <= 0 {
            return Err(CapacityError::BudgetExhausted {
                current_total,
                ceiling: request.ceiling,
                requested: request.requested_increment,
            });
        }

        let mut watch = CancellationWatch::new(&request.scope, allowed);
        let issued = issue_grant(self.ledger.as_ref(), &request.scope, allowed, &deadline).await;
        let issued = match issued {
            Ok(issued) => issued,
            Err(e) => {
                watch.finish();
                return Err(e);
            }
        };
        let grant = issued.grant();

        // Whatever size the ledger committed, the grant exists and gets its reversal.
        watch.scheduling(&grant.id);
        let scheduled = schedule_reversal(
            self.tasks.as_ref(),
            target,
            &grant.id,
            request.reversal_delay,
            &deadline,
        )
        .await;
        watch.finish();
        let scheduled = scheduled?;

        let grant = match issued {
            Issued::Exact(grant) => grant,
            Issued::Mismatched { grant, requested } => {
                return Err(CapacityError::SizeMismatch {
                    grant_id: grant.id,
                    requested,
                    committed: grant.size,
                });
            }
        };

        Ok(Committed {
            grant_id: grant.id,
            committed_size: grant.size,
            reversal_fire_time: unix_secs(scheduled.fire_at),
            task_name: scheduled.task_name,
        })
    }
}

// ── Cancellation ───────────────────────────────────────────────────

enum Stage {
    Issuing,
    Scheduling(String),
    Finished,
}

/// Logs an anomaly if the pipeline future is dropped mid-write.
///
/// Grants are never rolled back on cancellation.
struct CancellationWatch {
    scope: String,
    size: i64,
    stage: Stage,
}

impl CancellationWatch {
    fn new(scope: &Scope, size: i64) -> Self {
        Self {
            scope: scope.to_string(),
            size,
            stage: Stage::Issuing,
        }
    }

    fn scheduling(&mut self, grant_id: &str) {
        self.stage = Stage::Scheduling(grant_id.to_string());
    }

    fn finish(&mut self) {
        self.stage = Stage::Finished;
    }
}

impl Drop for CancellationWatch {
    fn drop(&mut self) {
        match &self.stage {
            Stage::Issuing => error!(
                scope = %self.scope,
                size = self.size,
                "add-capacity cancelled while the grant was being created; a grant may exist without a reversal"
            ),
            Stage::Scheduling(grant_id) => error!(
                scope = %self.scope,
                %grant_id,
                "add-capacity cancelled after the grant was created; check for its reversal task and release manually if missing"
            ),
            Stage::Finished => {}
        }
    }
}
