//! slotburst-remote — clients for the two remote collaborators.
//!
//! The controller only ever talks to the ledger and the deferred-task
//! service through the [`LedgerClient`] and [`TaskQueue`] traits, so both
//! can be swapped for the in-memory implementations in tests and local
//! runs.
//!
//! # Wire protocol
//!
//! ```text
//! Ledger (JSON over HTTP)
//!   GET  {base}/v1/domains/{d}/regions/{r}/grants?page_token=…  → GrantPage
//!   POST {base}/v1/domains/{d}/regions/{r}/grants {size, kind}  → Grant
//!   POST {base}/v1/grants:release {grant_id, force}             → 2xx | 404/410
//!
//! 410, or 404 with a JSON body, means the grant is gone. A 404 with any
//! other body is reported as a plain status failure.
//!
//! Deferred tasks (JSON over HTTP)
//!   POST {base}/v1/locations/{loc}/queues/{queue}/tasks
//!        {target_url, http_method, headers, body, schedule_time} → {name}
//! ```

pub mod error;
pub mod ledger;
pub mod memory;
mod rest;
pub mod tasks;

pub use error::{RemoteError, RemoteResult};
pub use ledger::{HttpLedger, LedgerClient};
pub use memory::{InMemoryLedger, InMemoryTaskQueue};
pub use tasks::{HttpTaskQueue, TaskHandle, TaskQueue, TaskSubmission};
