//! The unified directory service contract
//!
//! One trait implemented by every backend. Capability differences are part
//! of the contract: management operations return a typed
//! [`OperationStatus::NotSupported`] and authentication modes a backend
//! cannot perform yield [`AuthenticationOutcome::NotSupported`], so callers
//! branch on capability instead of catching errors.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::criteria::{ComputerCriteria, GroupCriteria, UserCriteria};
use crate::entity::{DirectoryComputer, DirectoryGroup, DirectoryUser};
use crate::error::DirectoryResult;
use crate::page::{Page, PageRequest};

/// The directory backends the gateway speaks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryBackend {
    /// Microsoft Entra ID via the Graph API.
    Graph,
    /// OpenLDAP-compatible directories.
    OpenLdap,
    /// Apple Open Directory.
    OpenDirectory,
}

impl std::fmt::Display for DirectoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryBackend::Graph => write!(f, "graph"),
            DirectoryBackend::OpenLdap => write!(f, "open_ldap"),
            DirectoryBackend::OpenDirectory => write!(f, "open_directory"),
        }
    }
}

/// An authentication attempt against a backend.
///
/// Mode support varies per backend; unsupported modes come back as
/// [`AuthenticationOutcome::NotSupported`], not as an error.
#[derive(Debug, Clone)]
pub enum AuthRequest {
    /// Bind with a username (or DN) and password.
    SimpleBind { username: String, password: String },
    /// Anonymous bind.
    Anonymous,
    /// SASL EXTERNAL mechanism.
    SaslExternal,
    /// SASL GSSAPI mechanism.
    SaslGssapi,
    /// Client certificate credential.
    Certificate,
    /// OAuth2 client-credentials flow with the configured secret.
    ClientSecret,
    /// OAuth2 device-code flow.
    DeviceCode,
    /// Interactive browser sign-in.
    InteractiveBrowser,
}

impl AuthRequest {
    /// Stable mode name for logging and outcomes.
    pub fn method_name(&self) -> &'static str {
        match self {
            AuthRequest::SimpleBind { .. } => "simple_bind",
            AuthRequest::Anonymous => "anonymous",
            AuthRequest::SaslExternal => "sasl_external",
            AuthRequest::SaslGssapi => "sasl_gssapi",
            AuthRequest::Certificate => "certificate",
            AuthRequest::ClientSecret => "client_secret",
            AuthRequest::DeviceCode => "device_code",
            AuthRequest::InteractiveBrowser => "interactive_browser",
        }
    }
}

/// Result of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    /// The backend accepted the credentials.
    Success {
        /// The authenticated principal, when the backend reports one.
        principal: Option<String>,
    },
    /// The backend rejected the credentials.
    InvalidCredentials,
    /// The backend cannot perform this authentication mode.
    NotSupported { method: &'static str },
}

impl AuthenticationOutcome {
    /// Whether the attempt authenticated successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, AuthenticationOutcome::Success { .. })
    }
}

/// Result of a management operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The backend performed the operation.
    Completed,
    /// The backend cannot perform this operation.
    NotSupported,
}

impl OperationStatus {
    /// Whether the backend performed the operation.
    pub fn is_completed(&self) -> bool {
        matches!(self, OperationStatus::Completed)
    }
}

/// Unified directory operations over all backends.
///
/// Single-entity lookups return `Ok(None)` when nothing matches. All
/// operations accept a [`CancellationToken`], checked at entry and at each
/// pagination round trip; cancellation surfaces as
/// [`crate::error::DirectoryError::Cancelled`].
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Which backend this service talks to.
    fn backend(&self) -> DirectoryBackend;

    /// Display name for this service instance.
    fn display_name(&self) -> &str;

    /// Verify the backend is reachable with the configured identity.
    async fn test_connection(&self, cancel: &CancellationToken) -> DirectoryResult<()>;

    // Single-entity lookups

    /// Look up one user by its backend-native key.
    async fn find_user(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryUser>>;

    /// Look up one group by its backend-native key.
    async fn find_group(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryGroup>>;

    /// Look up one computer by its backend-native key.
    async fn find_computer(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryComputer>>;

    // Filtered searches

    /// Search users with structured criteria.
    async fn search_users(
        &self,
        criteria: &UserCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>>;

    /// Search users with a raw filter string in the backend's dialect.
    async fn search_users_raw(
        &self,
        filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>>;

    /// Search groups with structured criteria.
    async fn search_groups(
        &self,
        criteria: &GroupCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>>;

    /// Search groups with a raw filter string in the backend's dialect.
    async fn search_groups_raw(
        &self,
        filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>>;

    /// Search computers with structured criteria.
    async fn search_computers(
        &self,
        criteria: &ComputerCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryComputer>>;

    /// Search computers with a raw filter string in the backend's dialect.
    async fn search_computers_raw(
        &self,
        filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryComputer>>;

    // Paginated searches

    /// Fetch one page of users matching structured criteria.
    async fn users_page(
        &self,
        criteria: &UserCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryUser>>;

    /// Fetch one page of users matching a raw dialect filter.
    async fn users_page_raw(
        &self,
        filter: &str,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryUser>>;

    /// Fetch one page of groups matching structured criteria.
    async fn groups_page(
        &self,
        criteria: &GroupCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryGroup>>;

    /// Fetch one page of computers matching structured criteria.
    async fn computers_page(
        &self,
        criteria: &ComputerCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryComputer>>;

    // Group membership

    /// Groups the given user belongs to.
    async fn groups_of(
        &self,
        user_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>>;

    /// Users that are members of the given group.
    async fn members_of(
        &self,
        group_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>>;

    // Authentication

    /// Check a username/password pair. Invalid credentials are `Ok(false)`.
    ///
    /// LDAP-family backends always bind on a fresh dedicated connection so
    /// the shared handle's identity is never disturbed.
    async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<bool>;

    /// Attempt authentication in one of the supported modes.
    async fn authenticate(
        &self,
        request: &AuthRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<AuthenticationOutcome>;

    // Account and membership management

    /// Add a member to a group.
    async fn add_group_member(
        &self,
        group_key: &str,
        member_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus>;

    /// Remove a member from a group.
    async fn remove_group_member(
        &self,
        group_key: &str,
        member_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus>;

    /// Reset a user's password to a new value.
    async fn set_password(
        &self,
        user_key: &str,
        new_password: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus>;

    /// Change a user's password, verifying the old one.
    async fn change_password(
        &self,
        user_key: &str,
        old_password: &str,
        new_password: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus>;

    /// Enable or disable a user account.
    async fn set_account_enabled(
        &self,
        user_key: &str,
        enabled: bool,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus>;

    /// Tear down the shared connection and release resources.
    async fn dispose(&self) -> DirectoryResult<()>;
}
