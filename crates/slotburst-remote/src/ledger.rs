//! Capacity ledger client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use slotburst_core::{CommitmentKind, Grant, GrantPage, Scope};

use crate::error::RemoteResult;
use crate::rest::RestClient;

/// Remote store of capacity grants.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch one page of grants outstanding in `scope`.
    async fn list_grants(
        &self,
        scope: &Scope,
        page_token: Option<&str>,
    ) -> RemoteResult<GrantPage>;

    /// Create a grant of `size` slots.
    async fn create_grant(
        &self,
        scope: &Scope,
        size: i64,
        kind: CommitmentKind,
    ) -> RemoteResult<Grant>;

    /// Release a grant. An unknown id yields `RemoteError::NotFound`.
    async fn release_grant(&self, grant_id: &str, force: bool) -> RemoteResult<()>;
}

#[derive(Serialize)]
struct CreateGrantBody {
    size: i64,
    kind: CommitmentKind,
}

#[derive(Serialize)]
struct ReleaseGrantBody<'a> {
    grant_id: &'a str,
    force: bool,
}

/// Ledger reached over JSON/HTTP.
#[derive(Clone)]
pub struct HttpLedger {
    rest: RestClient,
}

impl HttpLedger {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> RemoteResult<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, token, timeout)?,
        })
    }
}

#[async_trait]
impl LedgerClient for HttpLedger {
    async fn list_grants(
        &self,
        scope: &Scope,
        page_token: Option<&str>,
    ) -> RemoteResult<GrantPage> {
        let mut request = self.rest.get(&format!("v1/{}/grants", scope.parent_path()));
        if let Some(token) = page_token {
            request = request.query(&[("page_token", token)]);
        }
        let page: GrantPage = self.rest.send_json(request).await?;
        debug!(%scope, grants = page.grants.len(), more = page.next_token().is_some(), "listed grant page");
        Ok(page)
    }

    async fn create_grant(
        &self,
        scope: &Scope,
        size: i64,
        kind: CommitmentKind,
    ) -> RemoteResult<Grant> {
        let request = self
            .rest
            .post(&format!("v1/{}/grants", scope.parent_path()))
            .json(&CreateGrantBody { size, kind });
        self.rest.send_json(request).await
    }

    async fn release_grant(&self, grant_id: &str, force: bool) -> RemoteResult<()> {
        let request = self
            .rest
            .post("v1/grants:release")
            .json(&ReleaseGrantBody { grant_id, force });
        self.rest.send_empty(request).await
    }
}
