//! Remote collaborators, built from settings.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use slotburst_core::config::{Backend, Settings};
use slotburst_remote::{
    HttpLedger, HttpTaskQueue, InMemoryLedger, InMemoryTaskQueue, LedgerClient, TaskQueue,
};

pub struct Backends {
    pub ledger: Arc<dyn LedgerClient>,
    pub tasks: Arc<dyn TaskQueue>,
    /// Set when reversals are held in-process and must be delivered locally.
    pub local_queue: Option<InMemoryTaskQueue>,
}

impl Backends {
    pub fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let ledger: Arc<dyn LedgerClient> = match &settings.ledger {
            Backend::Memory => {
                warn!("using in-memory ledger; grants are lost on restart");
                Arc::new(InMemoryLedger::new())
            }
            Backend::Http { base_url, token } => {
                info!(url = %base_url, "ledger client configured");
                Arc::new(
                    HttpLedger::new(base_url, token.clone(), settings.call_timeout)
                        .context("building ledger client")?,
                )
            }
        };

        let (tasks, local_queue): (Arc<dyn TaskQueue>, _) = match &settings.tasks.backend {
            Backend::Memory => {
                warn!("using in-memory task queue; pending reversals are lost on restart");
                let queue = InMemoryTaskQueue::new();
                (Arc::new(queue.clone()), Some(queue))
            }
            Backend::Http { base_url, token } => {
                info!(
                    url = %base_url,
                    queue = %settings.tasks.queue_id,
                    location = %settings.tasks.queue_location,
                    "task queue client configured"
                );
                let queue = HttpTaskQueue::new(
                    base_url,
                    token.clone(),
                    &settings.tasks.queue_location,
                    &settings.tasks.queue_id,
                    settings.call_timeout,
                )
                .context("building task queue client")?;
                (Arc::new(queue), None)
            }
        };

        Ok(Self {
            ledger,
            tasks,
            local_queue,
        })
    }
}
