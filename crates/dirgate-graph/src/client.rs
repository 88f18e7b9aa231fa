//! Microsoft Graph HTTP client
//!
//! Thin wrapper over `reqwest` with bearer injection, 429/transient retry
//! handling, and OData error envelope parsing. Graph faults are wrapped
//! into the gateway's generic operation error with the parsed envelope
//! riding along as the cause.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use dirgate_core::config::ConnectionSettings;
use dirgate_core::error::{DirectoryError, DirectoryResult};

use crate::auth::TokenCache;

/// Parsed OData error body, carried as the cause of an operation error.
#[derive(Debug, Clone)]
pub struct GraphApiError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for GraphApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GraphApiError {}

#[derive(Debug, Deserialize)]
struct ODataErrorEnvelope {
    error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    code: String,
    message: String,
}

/// One page of an OData collection response.
#[derive(Debug, Deserialize)]
pub struct ODataPage<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.count")]
    pub count: Option<u64>,
}

/// Graph API client bound to one tenant credential.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    tokens: Arc<TokenCache>,
    base_url: String,
    max_retries: u32,
}

impl GraphClient {
    /// Create a client. Per-operation and connect timeouts come from the
    /// shared connection settings.
    pub fn new(
        tokens: Arc<TokenCache>,
        base_url: String,
        settings: &ConnectionSettings,
    ) -> DirectoryResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.operation_timeout())
            .build()
            .map_err(|e| {
                DirectoryError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            tokens,
            base_url,
            max_retries: settings.max_retries,
        })
    }

    /// Base URL for Graph requests, including the API version.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> DirectoryResult<T> {
        let response = self
            .send(reqwest::Method::GET, url, None::<&()>, false)
            .await?;
        let response = Self::check(response).await?;
        Self::parse(response).await
    }

    /// GET a JSON resource, mapping 404 to `None`.
    pub async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> DirectoryResult<Option<T>> {
        let response = self
            .send(reqwest::Method::GET, url, None::<&()>, false)
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(Self::parse(response).await?))
    }

    /// GET one page of an OData collection. `eventual_consistency` adds
    /// the header advanced query parameters like `$count` require.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        eventual_consistency: bool,
    ) -> DirectoryResult<ODataPage<T>> {
        let response = self
            .send(reqwest::Method::GET, url, None::<&()>, eventual_consistency)
            .await?;
        let response = Self::check(response).await?;
        Self::parse(response).await
    }

    /// POST a JSON body and parse the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
    ) -> DirectoryResult<T> {
        let response = self
            .send(reqwest::Method::POST, url, Some(body), false)
            .await?;
        let response = Self::check(response).await?;
        Self::parse(response).await
    }

    /// POST a JSON body, expecting no response body (201/204).
    pub async fn post_no_content<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
    ) -> DirectoryResult<()> {
        let response = self
            .send(reqwest::Method::POST, url, Some(body), false)
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// PATCH a JSON body, expecting no response body (204).
    pub async fn patch<B: Serialize + Sync>(&self, url: &str, body: &B) -> DirectoryResult<()> {
        let response = self
            .send(reqwest::Method::PATCH, url, Some(body), false)
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// DELETE a resource, expecting no response body (204).
    pub async fn delete(&self, url: &str) -> DirectoryResult<()> {
        let response = self
            .send(reqwest::Method::DELETE, url, None::<&()>, false)
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Issue the request, retrying 429 and transient 5xx responses.
    ///
    /// Returns the first response that is neither, whatever its status.
    async fn send<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
        eventual_consistency: bool,
    ) -> DirectoryResult<reqwest::Response> {
        let mut retries = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            let token = self.tokens.get_token().await?;

            let mut request = self
                .http_client
                .request(method.clone(), url)
                .bearer_auth(&token);
            if eventual_consistency {
                request = request.header("ConsistencyLevel", "eventual");
            }
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    DirectoryError::operation_failed_with_source("graph request timed out", e)
                } else {
                    DirectoryError::connection_failed_with_source("graph request failed", e)
                }
            })?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS && retries < self.max_retries {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map_or(delay, Duration::from_secs);

                retries += 1;
                warn!(
                    "graph throttled the request, retry {}/{} after {:?}",
                    retries, self.max_retries, retry_after
                );
                tokio::time::sleep(retry_after).await;
                delay *= 2;
                continue;
            }

            if matches!(
                status,
                reqwest::StatusCode::BAD_GATEWAY
                    | reqwest::StatusCode::SERVICE_UNAVAILABLE
                    | reqwest::StatusCode::GATEWAY_TIMEOUT
            ) && retries < self.max_retries
            {
                retries += 1;
                warn!(
                    "transient graph error {}, retry {}/{} after {:?}",
                    status, retries, self.max_retries, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                // Token may have been revoked; next call reacquires.
                self.tokens.invalidate().await;
            }

            return Ok(response);
        }
    }

    /// Map a non-success response to the generic operation error.
    async fn check(response: reqwest::Response) -> DirectoryResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(envelope) = serde_json::from_str::<ODataErrorEnvelope>(&body) {
            debug!(code = %envelope.error.code, "graph returned an error envelope");
            return Err(DirectoryError::operation_failed_with_source(
                format!("graph request failed with status {status}"),
                GraphApiError {
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
            ));
        }

        Err(DirectoryError::operation_failed(format!(
            "graph request failed with status {status}: {body}"
        )))
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> DirectoryResult<T> {
        response.json().await.map_err(|e| {
            DirectoryError::operation_failed_with_source("malformed graph response", e)
        })
    }
}
