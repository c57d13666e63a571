//! Release executor: handles fired reversal tasks.
//!
//! The deferred-task service may deliver the same task more than once, so
//! a grant the ledger no longer knows about counts as released.

use std::sync::Arc;

use tracing::{info, warn};

use slotburst_core::{CapacityError, CapacityResult, ReleaseOutcome};
use slotburst_remote::LedgerClient;

use crate::controller::ControllerConfig;

#[derive(Clone)]
pub struct ReleaseExecutor {
    config: ControllerConfig,
    ledger: Arc<dyn LedgerClient>,
}

impl ReleaseExecutor {
    pub fn new(config: ControllerConfig, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { config, ledger }
    }

    /// Release `grant_id` without forcing; a busy grant stays put.
    pub async fn release(&self, grant_id: &str) -> CapacityResult<ReleaseOutcome> {
        let grant_id = grant_id.trim();
        if grant_id.is_empty() {
            return Err(CapacityError::InvalidInput("grant id is required".into()));
        }

        let deadline = self.config.deadline();
        match deadline
            .run("release grant", self.ledger.release_grant(grant_id, false))
            .await
        {
            Ok(()) => {
                info!(%grant_id, "grant released");
                Ok(ReleaseOutcome::Released)
            }
            Err(e) if e.is_not_found() => {
                info!(%grant_id, "grant already released");
                Ok(ReleaseOutcome::AlreadyReleased)
            }
            Err(e) => {
                warn!(%grant_id, error = %e, "grant release failed");
                Err(CapacityError::ReleaseError {
                    grant_id: grant_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
