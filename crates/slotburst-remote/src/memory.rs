//! In-process ledger and task queue.
//!
//! Used by tests and by the `memory` backend for local runs. Both types
//! are cheap to clone and share their state across clones.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use slotburst_core::{CommitmentKind, Grant, GrantPage, Scope};

use crate::error::{RemoteError, RemoteResult};
use crate::ledger::LedgerClient;
use crate::tasks::{TaskHandle, TaskQueue, TaskSubmission};

// ── Ledger ─────────────────────────────────────────────────────────

#[derive(Default)]
struct LedgerState {
    /// Outstanding grants keyed by id; ordered so paging is stable.
    grants: BTreeMap<String, Grant>,
    /// Grants that refuse a non-forced release.
    in_use: HashSet<String>,
}

/// In-memory capacity ledger.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    page_size: usize,
    next_id: Arc<AtomicU64>,
    fail_list: Arc<AtomicBool>,
    fail_create: Arc<AtomicBool>,
    fail_release: Arc<AtomicBool>,
    list_calls: Arc<AtomicUsize>,
    create_calls: Arc<AtomicUsize>,
    release_calls: Arc<AtomicUsize>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            page_size: 100,
            next_id: Arc::new(AtomicU64::new(1)),
            fail_list: Arc::new(AtomicBool::new(false)),
            fail_create: Arc::new(AtomicBool::new(false)),
            fail_release: Arc::new(AtomicBool::new(false)),
            list_calls: Arc::new(AtomicUsize::new(0)),
            create_calls: Arc::new(AtomicUsize::new(0)),
            release_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of grants returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Seed an existing grant.
    pub async fn insert(&self, grant: Grant) {
        self.state.lock().await.grants.insert(grant.id.clone(), grant);
    }

    /// Mark a grant as busy so a non-forced release is refused.
    pub async fn mark_in_use(&self, grant_id: &str) {
        self.state.lock().await.in_use.insert(grant_id.to_string());
    }

    /// Outstanding grants in `scope`.
    pub async fn outstanding(&self, scope: &Scope) -> Vec<Grant> {
        self.state
            .lock()
            .await
            .grants
            .values()
            .filter(|g| &g.scope == scope)
            .cloned()
            .collect()
    }

    /// Sum of outstanding grant sizes in `scope`.
    pub async fn total(&self, scope: &Scope) -> i64 {
        self.outstanding(scope).await.iter().map(|g| g.size).sum()
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn list_grants(
        &self,
        scope: &Scope,
        page_token: Option<&str>,
    ) -> RemoteResult<GrantPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("ledger listing disabled".into()));
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RemoteError::Status {
                    status: 400,
                    body: format!("bad page token {token:?}"),
                })?,
            None => 0,
        };

        let matching = self.outstanding(scope).await;
        let grants: Vec<Grant> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let end = offset + grants.len();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        Ok(GrantPage {
            grants,
            next_page_token,
        })
    }

    async fn create_grant(
        &self,
        scope: &Scope,
        size: i64,
        kind: CommitmentKind,
    ) -> RemoteResult<Grant> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("ledger writes disabled".into()));
        }
        if size <= 0 {
            return Err(RemoteError::Status {
                status: 400,
                body: format!("grant size must be positive, got {size}"),
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let grant = Grant {
            id: format!("{}/grants/{n}", scope.parent_path()),
            size,
            scope: scope.clone(),
            kind,
        };
        self.insert(grant.clone()).await;
        debug!(grant_id = %grant.id, size, "in-memory grant created");
        Ok(grant)
    }

    async fn release_grant(&self, grant_id: &str, force: bool) -> RemoteResult<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("ledger writes disabled".into()));
        }

        let mut state = self.state.lock().await;
        if !state.grants.contains_key(grant_id) {
            return Err(RemoteError::NotFound(grant_id.to_string()));
        }
        if !force && state.in_use.contains(grant_id) {
            return Err(RemoteError::Status {
                status: 409,
                body: format!("grant {grant_id} is still in use"),
            });
        }
        state.grants.remove(grant_id);
        state.in_use.remove(grant_id);
        debug!(%grant_id, "in-memory grant released");
        Ok(())
    }
}

// ── Task queue ─────────────────────────────────────────────────────

/// In-memory deferred-task queue.
///
/// Accepted tasks are held until [`InMemoryTaskQueue::take_due`] drains
/// them; nothing is delivered on its own.
#[derive(Clone, Default)]
pub struct InMemoryTaskQueue {
    tasks: Arc<Mutex<Vec<(TaskHandle, TaskSubmission)>>>,
    next_id: Arc<AtomicU64>,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every submission while set.
    pub fn fail_submissions(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of submission attempts, accepted or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tasks accepted and not yet taken.
    pub async fn pending(&self) -> Vec<(TaskHandle, TaskSubmission)> {
        self.tasks.lock().await.clone()
    }

    /// Remove and return tasks whose schedule time is at or before `now_secs`.
    pub async fn take_due(&self, now_secs: u64) -> Vec<(TaskHandle, TaskSubmission)> {
        let mut tasks = self.tasks.lock().await;
        let (due, waiting): (Vec<_>, Vec<_>) = tasks
            .drain(..)
            .partition(|(_, t)| t.schedule_time <= now_secs);
        *tasks = waiting;
        due
    }

    /// Put a taken task back under its own name, due at `schedule_time`.
    pub async fn requeue(&self, handle: TaskHandle, mut task: TaskSubmission, schedule_time: u64) {
        task.schedule_time = schedule_time;
        self.tasks.lock().await.push((handle, task));
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn schedule_task(&self, task: TaskSubmission) -> RemoteResult<TaskHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("task queue rejecting submissions".into()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = TaskHandle {
            name: format!("tasks/{n}"),
        };
        self.tasks.lock().await.push((handle.clone(), task));
        Ok(handle)
    }
}
