//! OAuth2 token acquisition for the Graph API.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use dirgate_core::error::{DirectoryError, DirectoryResult};

use crate::config::{CloudEnvironment, GraphAuth};

/// Azure instance metadata service token endpoint.
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// OAuth2 token response shape shared by the authority and the IMDS.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(deserialize_with = "flexible_i64")]
    expires_in: i64,
}

/// The IMDS returns `expires_in` as a string; the token authority as a
/// number. Accept both.
fn flexible_i64<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Cached access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// True if the token expires within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache for the configured Graph credential.
///
/// Acquires on first use and refreshes ahead of expiry; concurrent callers
/// share one cached token behind a read/write lock.
#[derive(Debug)]
pub struct TokenCache {
    auth: GraphAuth,
    cloud: CloudEnvironment,
    tenant_id: String,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    grace_period: Duration,
}

impl TokenCache {
    /// Create a token cache for the given credential.
    pub fn new(auth: GraphAuth, cloud: CloudEnvironment, tenant_id: impl Into<String>) -> Self {
        Self {
            auth,
            cloud,
            tenant_id: tenant_id.into(),
            http_client: reqwest::Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::minutes(5),
        }
    }

    /// The configured credential.
    pub fn auth(&self) -> &GraphAuth {
        &self.auth
    }

    /// Get a valid access token, refreshing if necessary.
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn get_token(&self) -> DirectoryResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("refreshing access token");
        let new_token = match &self.auth {
            GraphAuth::ClientSecret {
                client_id,
                client_secret,
            } => {
                self.acquire_client_secret(client_id, client_secret.expose_secret())
                    .await?
            }
            GraphAuth::ManagedIdentity { client_id } => {
                self.acquire_managed_identity(client_id.as_deref()).await?
            }
        };

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Client-credentials grant against the tenant's token authority.
    async fn acquire_client_secret(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> DirectoryResult<CachedToken> {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.cloud.login_endpoint(),
            self.tenant_id
        );
        let scope = format!("{}/.default", self.cloud.graph_endpoint());

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", &scope),
        ];

        let response = self
            .http_client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source("token request failed", e)
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::BAD_REQUEST
        {
            // The authority reports bad client credentials as 400/401 with
            // an invalid_client error body.
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_client") || body.contains("unauthorized_client") {
                return Err(DirectoryError::InvalidCredentials);
            }
            return Err(DirectoryError::connection_failed(format!(
                "token request rejected with status {status}: {body}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::connection_failed(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        Self::into_cached(response).await
    }

    /// Managed-identity token from the instance metadata service.
    async fn acquire_managed_identity(
        &self,
        client_id: Option<&str>,
    ) -> DirectoryResult<CachedToken> {
        let resource = self.cloud.graph_endpoint();
        let mut request = self
            .http_client
            .get(IMDS_TOKEN_URL)
            .header("Metadata", "true")
            .query(&[
                ("api-version", "2018-02-01"),
                ("resource", resource.as_str()),
            ]);
        if let Some(id) = client_id {
            request = request.query(&[("client_id", id)]);
        }

        let response = request.send().await.map_err(|e| {
            DirectoryError::connection_failed_with_source(
                "managed identity endpoint unreachable",
                e,
            )
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::connection_failed(format!(
                "managed identity token request failed with status {status}: {body}"
            )));
        }

        Self::into_cached(response).await
    }

    async fn into_cached(response: reqwest::Response) -> DirectoryResult<CachedToken> {
        let token: TokenResponse = response.json().await.map_err(|e| {
            DirectoryError::connection_failed_with_source("malformed token response", e)
        })?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(%expires_at, "acquired new token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }

    /// Drop the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
