//! Caller-visible error taxonomy.
//!
//! Every failure of the add-capacity pipeline and the release callback
//! maps to exactly one variant. Remote-layer details are flattened into
//! strings at the controller boundary so this crate stays free of any
//! transport dependency.

use thiserror::Error;

/// Result type alias for controller operations.
pub type CapacityResult<T> = Result<T, CapacityError>;

/// Outcome classes surfaced to callers of the controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapacityError {
    /// Malformed or missing request fields. Never reaches a remote service.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reading outstanding grants from the ledger failed.
    #[error("querying outstanding grants: {0}")]
    QueryError(String),

    /// The ceiling leaves no room for the requested increment.
    #[error(
        "budget exhausted: {current_total} of {ceiling} slots outstanding, requested {requested}"
    )]
    BudgetExhausted {
        current_total: i64,
        ceiling: i64,
        requested: i64,
    },

    /// Creating the grant at the ledger failed.
    #[error("issuing grant: {0}")]
    IssueError(String),

    /// The ledger created a grant of a different size than requested.
    ///
    /// The grant exists and its reversal was scheduled; the mismatch is a
    /// ledger protocol error an operator should look at.
    #[error(
        "ledger committed {committed} slots for grant {grant_id}, requested {requested}; reversal scheduled"
    )]
    SizeMismatch {
        grant_id: String,
        requested: i64,
        committed: i64,
    },

    /// The grant exists but its reversal could not be scheduled.
    #[error("grant {grant_id} issued, but automatic reversal was not scheduled: {reason}")]
    SchedulingError { grant_id: String, reason: String },

    /// Releasing a grant failed for a reason other than it already being gone.
    #[error("releasing grant {grant_id}: {reason}")]
    ReleaseError { grant_id: String, reason: String },
}

impl CapacityError {
    /// Stable snake_case label for logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CapacityError::InvalidInput(_) => "invalid_input",
            CapacityError::QueryError(_) => "query_error",
            CapacityError::BudgetExhausted { .. } => "budget_exhausted",
            CapacityError::IssueError(_) => "issue_error",
            CapacityError::SizeMismatch { .. } => "size_mismatch",
            CapacityError::SchedulingError { .. } => "scheduling_error",
            CapacityError::ReleaseError { .. } => "release_error",
        }
    }

    /// Rejections that need no operator attention.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            CapacityError::InvalidInput(_) | CapacityError::BudgetExhausted { .. }
        )
    }

    /// The grant left outstanding without a scheduled reversal, if any.
    pub fn orphaned_grant(&self) -> Option<&str> {
        match self {
            CapacityError::SchedulingError { grant_id, .. } => Some(grant_id),
            _ => None,
        }
    }

    /// The grant an outcome refers to, for operators to follow up on.
    pub fn grant_id(&self) -> Option<&str> {
        match self {
            CapacityError::SizeMismatch { grant_id, .. }
            | CapacityError::SchedulingError { grant_id, .. }
            | CapacityError::ReleaseError { grant_id, .. } => Some(grant_id),
            _ => None,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CapacityError::InvalidInput(msg.into())
    }
}
