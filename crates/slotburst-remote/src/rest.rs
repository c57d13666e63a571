//! Shared JSON-over-HTTP plumbing for the remote clients.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{RemoteError, RemoteResult};

/// Longest error body kept in a `RemoteError::Status`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub(crate) struct RestClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    pub(crate) fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("slotburst/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.prepare_request(self.client.get(self.url(path)))
    }

    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.prepare_request(self.client.post(self.url(path)))
    }

    fn prepare_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and decode a JSON response body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> RemoteResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// Send and discard the response body.
    pub(crate) async fn send_empty(&self, builder: reqwest::RequestBuilder) -> RemoteResult<()> {
        self.send(builder).await.map(|_| ())
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let json_body = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"));
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        debug!(%url, %status, "remote call failed");

        // A 404 from the service itself carries a JSON error; anything else
        // is a proxy or a wrong base URL and must not read as "already gone".
        match status {
            StatusCode::GONE => Err(RemoteError::NotFound(url)),
            StatusCode::NOT_FOUND if json_body => Err(RemoteError::NotFound(url)),
            StatusCode::NOT_FOUND => {
                warn!(%url, "404 without a JSON error body; treating as a routing failure");
                Err(RemoteError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            _ => Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}
