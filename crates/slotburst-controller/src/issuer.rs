//! Grant issuance.

use tracing::{error, info};

use slotburst_core::{CapacityError, CapacityResult, CommitmentKind, Grant, Scope};
use slotburst_remote::LedgerClient;

use crate::deadline::Deadline;

/// A grant the ledger created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issued {
    Exact(Grant),
    /// The ledger committed a size other than `requested`. The grant still
    /// exists and still needs its reversal.
    Mismatched { grant: Grant, requested: i64 },
}

impl Issued {
    pub fn grant(&self) -> &Grant {
        match self {
            Issued::Exact(grant) | Issued::Mismatched { grant, .. } => grant,
        }
    }
}

/// Create one flexible grant of `size` slots.
///
/// Not retried: an error here means no grant exists to reverse.
pub async fn issue_grant(
    ledger: &dyn LedgerClient,
    scope: &Scope,
    size: i64,
    deadline: &Deadline,
) -> CapacityResult<Issued> {
    let grant = deadline
        .run(
            "create grant",
            ledger.create_grant(scope, size, CommitmentKind::Flex),
        )
        .await
        .map_err(|e| CapacityError::IssueError(e.to_string()))?;

    if grant.id.trim().is_empty() {
        return Err(CapacityError::IssueError(
            "ledger returned a grant without an id".into(),
        ));
    }

    if grant.size != size {
        error!(
            grant_id = %grant.id,
            requested = size,
            committed = grant.size,
            %scope,
            "ledger committed a different size than requested"
        );
        return Ok(Issued::Mismatched {
            grant,
            requested: size,
        });
    }

    info!(grant_id = %grant.id, size, %scope, "grant issued");
    Ok(Issued::Exact(grant))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use slotburst_core::GrantPage;
    use slotburst_remote::{InMemoryLedger, RemoteResult};

    use super::*;

    fn scope() -> Scope {
        Scope::new("analytics", "US").unwrap()
    }

    fn deadline() -> Deadline {
        Deadline::new(Duration::from_secs(5), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn issues_flex_grant() {
        let ledger = InMemoryLedger::new();
        let issued = issue_grant(&ledger, &scope(), 50, &deadline()).await.unwrap();
        let Issued::Exact(grant) = issued else {
            panic!("expected an exact grant, got {issued:?}");
        };
        assert_eq!(grant.size, 50);
        assert_eq!(grant.kind, CommitmentKind::Flex);
        assert_eq!(ledger.total(&scope()).await, 50);
    }

    #[tokio::test]
    async fn ledger_rejection_is_issue_error() {
        let ledger = InMemoryLedger::new();
        ledger.fail_create(true);
        let err = issue_grant(&ledger, &scope(), 50, &deadline()).await.unwrap_err();
        assert!(matches!(err, CapacityError::IssueError(_)));
    }

    /// Commits half of whatever is asked for.
    struct ShortchangingLedger;

    #[async_trait]
    impl LedgerClient for ShortchangingLedger {
        async fn list_grants(&self, _: &Scope, _: Option<&str>) -> RemoteResult<GrantPage> {
            Ok(GrantPage::default())
        }

        async fn create_grant(
            &self,
            scope: &Scope,
            size: i64,
            kind: CommitmentKind,
        ) -> RemoteResult<Grant> {
            Ok(Grant {
                id: "grants/short".into(),
                size: size / 2,
                scope: scope.clone(),
                kind,
            })
        }

        async fn release_grant(&self, _: &str, _: bool) -> RemoteResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn size_mismatch_still_returns_the_grant() {
        let issued = issue_grant(&ShortchangingLedger, &scope(), 50, &deadline())
            .await
            .unwrap();
        assert_eq!(issued.grant().id, "grants/short");
        assert!(matches!(issued, Issued::Mismatched { requested: 50, ref grant } if grant.size == 25));
    }
}
