//! slotburst-controller — capacity budget and reversal controller.
//!
//! Raises a capacity pool by issuing a short-term grant, then hands the
//! ledger-assigned grant id to a deferred-task service that will call the
//! release callback once the window elapses.
//!
//! # Pipeline
//!
//! ```text
//! add_capacity(scope, increment, delay)
//!   1. outstanding_total  ── ledger list (all pages) ──▶ QueryError
//!   2. allowed_increment  ── min(increment, ceiling - total) ≤ 0 ──▶ BudgetExhausted
//!   3. issue_grant        ── ledger create (Flex) ──▶ IssueError
//!   4. schedule_reversal  ── task queue submit ──▶ SchedulingError(grant_id)
//!   ▶ Committed { grant_id, committed_size, reversal_fire_time }
//!   ▶ SizeMismatch(grant_id) when the ledger committed another size in step 3;
//!     step 4 still runs for that grant
//!
//! release(grant_id)       ── ledger release (force = false)
//!   ▶ Released | AlreadyReleased | ReleaseError
//! ```
//!
//! Steps run strictly in order and nothing is retried. Concurrent calls
//! for the same scope are not serialized: two requests that both read the
//! ledger before either issues can together exceed the ceiling.

pub mod controller;
pub mod deadline;
pub mod issuer;
pub mod query;
pub mod release;
pub mod reversal;

pub use controller::{AddCapacity, CapacityController, ControllerConfig};
pub use deadline::Deadline;
pub use release::ReleaseExecutor;
pub use reversal::{CallbackTarget, RELEASE_PATH, ScheduledReversal};

pub use slotburst_core::{CapacityError, CapacityResult, Committed, ReleaseOutcome};
