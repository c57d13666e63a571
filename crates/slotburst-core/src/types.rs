//! Domain types for capacity grants and their scheduled reversals.
//!
//! All sizes are exact integers of capacity slots. Grant identifiers are
//! assigned by the remote ledger and treated as opaque strings.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CapacityError, CapacityResult};

/// Opaque ledger-assigned grant identifier.
pub type GrantId = String;

// ── Scope ──────────────────────────────────────────────────────────

/// Administrative domain and region a budget applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub domain: String,
    pub region: String,
}

impl Scope {
    /// Build a scope, rejecting empty parts.
    pub fn new(domain: impl Into<String>, region: impl Into<String>) -> CapacityResult<Self> {
        let domain = domain.into();
        let region = region.into();
        if domain.trim().is_empty() {
            return Err(CapacityError::invalid("scope domain is empty"));
        }
        if region.trim().is_empty() {
            return Err(CapacityError::invalid("scope region is empty"));
        }
        Ok(Self { domain, region })
    }

    /// Ledger parent path, e.g. `domains/analytics/regions/US`.
    pub fn parent_path(&self) -> String {
        format!("domains/{}/regions/{}", self.domain, self.region)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.region)
    }
}

// ── Grants ─────────────────────────────────────────────────────────

/// Commitment plan of a grant.
///
/// This service only ever creates `Flex` grants, but the ledger may hold
/// longer-lived commitments that still count toward the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentKind {
    Flex,
    Monthly,
    Annual,
}

/// A single capacity commitment held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    /// Committed size in slots.
    pub size: i64,
    pub scope: Scope,
    pub kind: CommitmentKind,
}

/// One page of an outstanding-grants listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPage {
    #[serde(default)]
    pub grants: Vec<Grant>,
    /// Token for the next page; `None` (or empty) on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl GrantPage {
    /// The next page token, treating an empty string as the end.
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Result of a release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The ledger released the grant on this call.
    Released,
    /// The ledger no longer knows the grant; nothing to do.
    AlreadyReleased,
}

// ── Budget requests ────────────────────────────────────────────────

/// One increment attempt, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetRequest {
    pub scope: Scope,
    pub requested_increment: i64,
    pub ceiling: i64,
    pub reversal_delay: Duration,
}

impl BudgetRequest {
    pub fn new(
        scope: Scope,
        requested_increment: i64,
        ceiling: i64,
        reversal_delay: Duration,
    ) -> CapacityResult<Self> {
        if requested_increment <= 0 {
            return Err(CapacityError::invalid(format!(
                "requested increment must be positive, got {requested_increment}"
            )));
        }
        if ceiling <= 0 {
            return Err(CapacityError::invalid(format!(
                "ceiling must be positive, got {ceiling}"
            )));
        }
        if reversal_delay.is_zero() {
            return Err(CapacityError::invalid("reversal delay must be positive"));
        }
        Ok(Self {
            scope,
            requested_increment,
            ceiling,
            reversal_delay,
        })
    }
}

// ── Reversal ───────────────────────────────────────────────────────

/// Body delivered to the release callback.
///
/// `commit_id` is accepted for callers that still send the older field name.
/// A body carrying both names is a duplicate field and fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePayload {
    #[serde(alias = "commit_id", default)]
    pub grant_id: GrantId,
}

/// A deferred release of one grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalTask {
    pub grant_id: GrantId,
    pub fire_at: SystemTime,
    /// Absolute URL of the release callback.
    pub target_url: String,
    pub payload: ReleasePayload,
}

impl ReversalTask {
    /// Build the task for `grant_id`, firing `delay` after `now`.
    pub fn new(grant_id: &str, delay: Duration, target_url: String, now: SystemTime) -> Self {
        Self {
            grant_id: grant_id.to_string(),
            fire_at: now + delay,
            target_url,
            payload: ReleasePayload {
                grant_id: grant_id.to_string(),
            },
        }
    }

    /// Fire time as unix seconds.
    pub fn fire_at_unix_secs(&self) -> u64 {
        unix_secs(self.fire_at)
    }
}

/// Successful add-capacity outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committed {
    pub grant_id: GrantId,
    pub committed_size: i64,
    /// Unix seconds at which the reversal fires.
    pub reversal_fire_time: u64,
    /// Name the deferred-task service assigned to the reversal.
    pub task_name: String,
}

/// Seconds since the unix epoch, clamped at zero.
pub fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
