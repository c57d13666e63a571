//! Reversal scheduling.
//!
//! The release callback is addressed by absolute URL so that whichever
//! instance of the service is live when the task fires can handle it.

use std::time::{Duration, SystemTime};

use tracing::info;

use slotburst_core::config::CallbackSettings;
use slotburst_core::{CapacityError, CapacityResult, ReversalTask};
use slotburst_remote::{TaskQueue, TaskSubmission};

use crate::deadline::Deadline;

/// Path of the release callback.
pub const RELEASE_PATH: &str = "/del_capacity";

/// Where a reversal task will deliver its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    release_url: String,
}

impl CallbackTarget {
    /// Target under a canonical base URL, e.g. `https://burst.example.com`.
    pub fn from_base_url(base_url: &str) -> Self {
        Self {
            release_url: format!("{}{RELEASE_PATH}", base_url.trim_end_matches('/')),
        }
    }

    /// Pick the release URL for one trigger.
    ///
    /// A configured public base URL wins; otherwise the inbound `Host`
    /// header is used with the configured scheme.
    pub fn resolve(settings: &CallbackSettings, host: Option<&str>) -> CapacityResult<Self> {
        if let Some(base) = &settings.public_base_url {
            return Ok(Self::from_base_url(base));
        }

        let host = host.map(str::trim).filter(|h| !h.is_empty()).ok_or_else(|| {
            CapacityError::InvalidInput(
                "cannot address the release callback: no public base URL configured and no Host header"
                    .into(),
            )
        })?;
        if host
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '@' | '?' | '#'))
        {
            return Err(CapacityError::InvalidInput(format!(
                "Host header {host:?} is not a valid authority"
            )));
        }

        Ok(Self::from_base_url(&format!("{}://{host}", settings.scheme)))
    }

    pub fn release_url(&self) -> &str {
        &self.release_url
    }
}

/// An accepted reversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReversal {
    pub task_name: String,
    pub fire_at: SystemTime,
}

/// Submit one deferred release of `grant_id`, due `delay` from now.
pub async fn schedule_reversal(
    tasks: &dyn TaskQueue,
    target: &CallbackTarget,
    grant_id: &str,
    delay: Duration,
    deadline: &Deadline,
) -> CapacityResult<ScheduledReversal> {
    let failed = |reason: String| CapacityError::SchedulingError {
        grant_id: grant_id.to_string(),
        reason,
    };

    let task = ReversalTask::new(
        grant_id,
        delay,
        target.release_url().to_string(),
        SystemTime::now(),
    );
    let body = serde_json::to_value(&task.payload).map_err(|e| failed(e.to_string()))?;
    let submission = TaskSubmission {
        target_url: task.target_url.clone(),
        body,
        schedule_time: task.fire_at_unix_secs(),
    };

    let handle = deadline
        .run("schedule reversal", tasks.schedule_task(submission))
        .await
        .map_err(|e| failed(e.to_string()))?;

    info!(
        %grant_id,
        task = %handle.name,
        fire_at = task.fire_at_unix_secs(),
        target = %task.target_url,
        "reversal scheduled"
    );

    Ok(ScheduledReversal {
        task_name: handle.name,
        fire_at: task.fire_at,
    })
}
