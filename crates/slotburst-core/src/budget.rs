//! Budget calculation.
//!
//! ```text
//! allowed = min(requested, ceiling - current_total)
//! ```
//!
//! A result `<= 0` is a terminal rejection: the caller must not issue a
//! grant. The check reads the ledger and then decides, so two concurrent
//! requests for the same scope can both pass it.

use crate::error::{CapacityError, CapacityResult};

/// Slots that may be granted without exceeding `ceiling`.
pub fn allowed_increment(requested: i64, ceiling: i64, current_total: i64) -> CapacityResult<i64> {
    if requested <= 0 {
        return Err(CapacityError::InvalidInput(format!(
            "requested increment must be positive, got {requested}"
        )));
    }
    let headroom = ceiling.saturating_sub(current_total);
    Ok(requested.min(headroom))
}
