//! Graph backend configuration
//!
//! Tenant, cloud environment, and the credential used for token
//! acquisition. The credential is a tagged variant resolved once at
//! construction; the service never infers an auth mode from partial field
//! presence at call time.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use dirgate_core::config::ConnectionSettings;
use dirgate_core::error::{DirectoryError, DirectoryResult};

/// Maximum `$top` value the Graph API accepts for directory objects.
///
/// This is a backend capability constant; the pagination cursor always
/// requests full batches and slices the caller's window in memory.
pub const GRAPH_MAX_PAGE_SIZE: u32 = 999;

/// Azure cloud environment to target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cloud", rename_all = "snake_case")]
pub enum CloudEnvironment {
    /// Global commercial cloud.
    Commercial,
    /// US Government (GCC High / DoD).
    UsGovernment,
    /// 21Vianet-operated China cloud.
    China,
    /// Explicit endpoints, for sovereign clouds and tests.
    Custom {
        graph_endpoint: String,
        login_endpoint: String,
    },
}

impl CloudEnvironment {
    /// Base URL of the Graph API for this cloud.
    pub fn graph_endpoint(&self) -> String {
        match self {
            CloudEnvironment::Commercial => "https://graph.microsoft.com".to_string(),
            CloudEnvironment::UsGovernment => "https://graph.microsoft.us".to_string(),
            CloudEnvironment::China => "https://microsoftgraph.chinacloudapi.cn".to_string(),
            CloudEnvironment::Custom { graph_endpoint, .. } => graph_endpoint.clone(),
        }
    }

    /// Base URL of the token authority for this cloud.
    pub fn login_endpoint(&self) -> String {
        match self {
            CloudEnvironment::Commercial => "https://login.microsoftonline.com".to_string(),
            CloudEnvironment::UsGovernment => "https://login.microsoftonline.us".to_string(),
            CloudEnvironment::China => "https://login.chinacloudapi.cn".to_string(),
            CloudEnvironment::Custom { login_endpoint, .. } => login_endpoint.clone(),
        }
    }
}

impl Default for CloudEnvironment {
    fn default() -> Self {
        CloudEnvironment::Commercial
    }
}

/// Credential for Graph token acquisition.
///
/// One variant, chosen at construction. Interactive modes (device code,
/// browser) are not credentials of the service identity and surface as
/// not-supported authentication outcomes instead.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphAuth {
    /// OAuth2 client-credentials flow with a shared secret.
    ClientSecret {
        client_id: String,
        client_secret: SecretString,
    },
    /// Azure managed identity via the instance metadata service.
    ManagedIdentity {
        /// User-assigned identity; `None` uses the system-assigned one.
        #[serde(default)]
        client_id: Option<String>,
    },
}

impl std::fmt::Debug for GraphAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphAuth::ClientSecret { client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .field("client_secret", &"***REDACTED***")
                .finish(),
            GraphAuth::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

impl GraphAuth {
    /// Create a client-secret credential.
    pub fn client_secret(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        GraphAuth::ClientSecret {
            client_id: client_id.into(),
            client_secret: SecretString::from(secret.into()),
        }
    }

    /// Create a system-assigned managed identity credential.
    pub fn managed_identity() -> Self {
        GraphAuth::ManagedIdentity { client_id: None }
    }
}

/// Configuration for the Graph directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Entra tenant id (GUID or verified domain).
    pub tenant_id: String,

    /// Cloud environment to target.
    #[serde(default)]
    pub cloud: CloudEnvironment,

    /// Graph API version segment.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Connection and timeout settings.
    #[serde(default)]
    pub connection: ConnectionSettings,
}

fn default_api_version() -> String {
    "v1.0".to_string()
}

impl GraphConfig {
    /// Create a config for the commercial cloud.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            cloud: CloudEnvironment::default(),
            api_version: default_api_version(),
            connection: ConnectionSettings::default(),
        }
    }

    /// Target a different cloud environment.
    #[must_use]
    pub fn with_cloud(mut self, cloud: CloudEnvironment) -> Self {
        self.cloud = cloud;
        self
    }

    /// Base URL for Graph requests, including the API version.
    pub fn base_url(&self) -> String {
        format!("{}/{}", self.cloud.graph_endpoint(), self.api_version)
    }

    /// Validate required fields.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.tenant_id.is_empty() {
            return Err(DirectoryError::invalid_configuration("tenant_id is required"));
        }
        if self.api_version.is_empty() {
            return Err(DirectoryError::invalid_configuration(
                "api_version is required",
            ));
        }
        if let CloudEnvironment::Custom {
            graph_endpoint,
            login_endpoint,
        } = &self.cloud
        {
            if graph_endpoint.is_empty() || login_endpoint.is_empty() {
                return Err(DirectoryError::invalid_configuration(
                    "custom cloud requires both graph and login endpoints",
                ));
            }
        }
        Ok(())
    }
}
