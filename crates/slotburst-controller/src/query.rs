//! Outstanding-grant totals.

use std::collections::HashSet;

use tracing::debug;

use slotburst_core::{CapacityError, CapacityResult, Scope};
use slotburst_remote::LedgerClient;

use crate::deadline::Deadline;

/// Sum the sizes of every grant outstanding in `scope`.
///
/// Walks the whole paginated listing. Any failed page aborts the sum so a
/// read error can never look like an idle scope.
pub async fn outstanding_total(
    ledger: &dyn LedgerClient,
    scope: &Scope,
    deadline: &Deadline,
) -> CapacityResult<i64> {
    let mut total: i64 = 0;
    let mut pages = 0usize;
    let mut token: Option<String> = None;
    let mut seen_tokens = HashSet::new();

    loop {
        let page = deadline
            .run("list grants", ledger.list_grants(scope, token.as_deref()))
            .await
            .map_err(|e| CapacityError::QueryError(e.to_string()))?;
        pages += 1;

        for grant in &page.grants {
            if grant.size < 0 {
                return Err(CapacityError::QueryError(format!(
                    "ledger reported negative size {} for grant {}",
                    grant.size, grant.id
                )));
            }
            total = total.checked_add(grant.size).ok_or_else(|| {
                CapacityError::QueryError("outstanding total overflows".into())
            })?;
        }

        match page.next_token() {
            Some(next) => {
                if !seen_tokens.insert(next.to_string()) {
                    return Err(CapacityError::QueryError(format!(
                        "ledger repeated page token {next:?}"
                    )));
                }
                token = Some(next.to_string());
            }
            None => break,
        }
    }

    debug!(%scope, total, pages, "outstanding grants summed");
    Ok(total)
}
