//! Graph directory service
//!
//! Implements the unified [`DirectoryService`] contract against Microsoft
//! Entra ID. Structured criteria compile to OData `$filter` expressions;
//! pagination rides the shared cursor over `@odata.nextLink` batches at
//! the Graph batch cap, with `$count=true` supplying authoritative totals.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use dirgate_core::criteria::{ComputerCriteria, GroupCriteria, UserCriteria};
use dirgate_core::entity::{DirectoryComputer, DirectoryGroup, DirectoryUser};
use dirgate_core::error::{DirectoryError, DirectoryResult};
use dirgate_core::metrics::{DirectoryMetrics, MetricsSnapshot};
use dirgate_core::page::{cancellable, collect_page, Batch, BatchSource, Page, PageRequest};
use dirgate_core::query::{
    computer_query, group_query, user_query, ComputerAttributeProfile, GroupAttributeProfile,
    UserAttributeProfile,
};
use dirgate_core::service::{
    AuthRequest, AuthenticationOutcome, DirectoryBackend, DirectoryService, OperationStatus,
};

use crate::auth::TokenCache;
use crate::client::{GraphClient, ODataPage};
use crate::config::{GraphAuth, GraphConfig, GRAPH_MAX_PAGE_SIZE};
use crate::mapper;
use crate::odata;

/// Attribute names Graph exposes for user predicates.
fn graph_user_profile() -> UserAttributeProfile {
    UserAttributeProfile {
        username: vec!["mailNickname".to_string(), "userPrincipalName".to_string()],
        display_name: vec!["displayName".to_string()],
        email: vec!["mail".to_string()],
        department: vec!["department".to_string()],
        // Graph cannot filter users on group membership; membership goes
        // through the dedicated endpoints instead.
        member_of: None,
        enabled: Some("accountEnabled".to_string()),
    }
}

fn graph_group_profile() -> GroupAttributeProfile {
    GroupAttributeProfile {
        name: vec!["displayName".to_string()],
        description: vec!["description".to_string()],
    }
}

fn graph_computer_profile() -> ComputerAttributeProfile {
    ComputerAttributeProfile {
        name: vec!["displayName".to_string()],
    }
}

/// Batch adapter over `@odata.nextLink` continuations.
struct GraphBatchSource<'a> {
    client: &'a GraphClient,
    first_url: String,
    with_count: bool,
    cancel: &'a CancellationToken,
}

#[async_trait]
impl BatchSource for GraphBatchSource<'_> {
    type Item = Value;

    async fn fetch_first(&mut self) -> DirectoryResult<Batch<Value>> {
        let page: ODataPage<Value> = cancellable(
            self.cancel,
            self.client.get_page(&self.first_url, self.with_count),
        )
        .await?;
        Ok(Batch {
            items: page.value,
            continuation: page.next_link,
            total: page.count,
        })
    }

    async fn fetch_next(&mut self, continuation: &str) -> DirectoryResult<Batch<Value>> {
        // nextLink is a complete URL carrying all original parameters.
        let page: ODataPage<Value> = cancellable(
            self.cancel,
            self.client.get_page(continuation, self.with_count),
        )
        .await?;
        Ok(Batch {
            items: page.value,
            continuation: page.next_link,
            total: page.count,
        })
    }
}

/// Microsoft Entra ID backend over the Graph API.
pub struct GraphDirectory {
    config: GraphConfig,
    display_name: String,
    client: GraphClient,
    tokens: Arc<TokenCache>,
    metrics: Arc<DirectoryMetrics>,
    user_profile: UserAttributeProfile,
    group_profile: GroupAttributeProfile,
    computer_profile: ComputerAttributeProfile,
}

impl GraphDirectory {
    /// Create a service for the given tenant and credential.
    pub fn new(config: GraphConfig, auth: GraphAuth) -> DirectoryResult<Self> {
        config.validate()?;

        let display_name = format!("Graph: {}", config.tenant_id);
        let tokens = Arc::new(TokenCache::new(
            auth,
            config.cloud.clone(),
            config.tenant_id.clone(),
        ));
        let client = GraphClient::new(Arc::clone(&tokens), config.base_url(), &config.connection)?;

        Ok(Self {
            config,
            display_name,
            client,
            tokens,
            metrics: Arc::new(DirectoryMetrics::new()),
            user_profile: graph_user_profile(),
            group_profile: graph_group_profile(),
            computer_profile: graph_computer_profile(),
        })
    }

    /// Point-in-time operation counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Build a collection URL at the backend batch cap.
    fn collection_url(
        &self,
        resource: &str,
        select: &str,
        filter: Option<&str>,
        with_count: bool,
    ) -> String {
        let mut url = format!(
            "{}/{}?$select={}&$top={}",
            self.client.base_url(),
            resource,
            select,
            GRAPH_MAX_PAGE_SIZE
        );
        if with_count {
            url.push_str("&$count=true");
        }
        if let Some(f) = filter {
            url.push_str("&$filter=");
            url.push_str(&urlencoding::encode(f));
        }
        url
    }

    fn entity_url(&self, resource: &str, key: &str, select: &str) -> String {
        format!(
            "{}/{}/{}?$select={}",
            self.client.base_url(),
            resource,
            urlencoding::encode(key),
            select
        )
    }

    /// Single-entity GET with 404 → `None`.
    async fn lookup(
        &self,
        url: String,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<Value>> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        let started = Instant::now();
        let result = cancellable(cancel, self.client.get_optional::<Value>(&url)).await;
        match &result {
            Ok(found) => self
                .metrics
                .record_query(started.elapsed(), usize::from(found.is_some())),
            Err(DirectoryError::Cancelled) => {}
            Err(_) => self.metrics.record_error(),
        }
        result
    }

    /// Exhaustive scan of a collection across all continuation links.
    async fn fetch_all(
        &self,
        first_url: String,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<Value>> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        let started = Instant::now();
        let mut source = GraphBatchSource {
            client: &self.client,
            first_url,
            with_count: false,
            cancel,
        };

        let result = async {
            let mut batch = source.fetch_first().await?;
            let mut items = std::mem::take(&mut batch.items);
            let mut continuation = batch.continuation;
            while let Some(token) = continuation {
                if cancel.is_cancelled() {
                    return Err(DirectoryError::Cancelled);
                }
                let next = source.fetch_next(&token).await?;
                items.extend(next.items);
                continuation = next.continuation;
            }
            Ok(items)
        }
        .await;

        match &result {
            Ok(items) => self.metrics.record_query(started.elapsed(), items.len()),
            Err(DirectoryError::Cancelled) => {}
            Err(_) => self.metrics.record_error(),
        }
        result
    }

    /// One window of a collection via the shared cursor, with totals.
    async fn fetch_page(
        &self,
        first_url: String,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<Value>> {
        let started = Instant::now();
        let source = GraphBatchSource {
            client: &self.client,
            first_url,
            with_count: true,
            cancel,
        };

        let result = collect_page(source, page, cancel).await;
        match &result {
            Ok(window) => self
                .metrics
                .record_query(started.elapsed(), window.items.len()),
            Err(DirectoryError::Cancelled) => {}
            Err(_) => self.metrics.record_error(),
        }
        result
    }

    fn user_filter(&self, criteria: &UserCriteria) -> DirectoryResult<Option<String>> {
        // Silently dropping a membership constraint would return a
        // superset of what the caller asked for.
        if !criteria.member_of.is_empty() {
            return Err(DirectoryError::not_supported(
                "member_of criteria",
                DirectoryBackend::Graph,
            ));
        }
        Ok(odata::render(&user_query(criteria, &self.user_profile)))
    }

    fn group_filter(&self, criteria: &GroupCriteria) -> Option<String> {
        odata::render(&group_query(criteria, &self.group_profile))
    }

    fn computer_filter(&self, criteria: &ComputerCriteria) -> Option<String> {
        odata::render(&computer_query(criteria, &self.computer_profile))
    }

    async fn manage(
        &self,
        operation: impl std::future::Future<Output = DirectoryResult<()>>,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }
        cancellable(cancel, operation).await?;
        Ok(OperationStatus::Completed)
    }
}

#[async_trait]
impl DirectoryService for GraphDirectory {
    fn backend(&self) -> DirectoryBackend {
        DirectoryBackend::Graph
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self, cancel))]
    async fn test_connection(&self, cancel: &CancellationToken) -> DirectoryResult<()> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        let url = format!("{}/organization?$select=id", self.client.base_url());
        let result = cancellable(cancel, self.client.get::<Value>(&url)).await;
        match result {
            Ok(_) => {
                self.metrics.record_connection();
                info!("graph connection test successful");
                Ok(())
            }
            Err(err) => {
                if !matches!(err, DirectoryError::Cancelled) {
                    self.metrics.record_connection_failure();
                }
                Err(err)
            }
        }
    }

    #[instrument(skip(self, cancel))]
    async fn find_user(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryUser>> {
        let url = self.entity_url("users", key, mapper::USER_SELECT);
        Ok(self.lookup(url, cancel).await?.map(|v| mapper::user_from_json(&v)))
    }

    #[instrument(skip(self, cancel))]
    async fn find_group(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryGroup>> {
        let url = self.entity_url("groups", key, mapper::GROUP_SELECT);
        Ok(self
            .lookup(url, cancel)
            .await?
            .map(|v| mapper::group_from_json(&v)))
    }

    #[instrument(skip(self, cancel))]
    async fn find_computer(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryComputer>> {
        let url = self.entity_url("devices", key, mapper::DEVICE_SELECT);
        Ok(self
            .lookup(url, cancel)
            .await?
            .map(|v| mapper::computer_from_json(&v)))
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn search_users(
        &self,
        criteria: &UserCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>> {
        let filter = self.user_filter(criteria)?;
        debug!(filter = filter.as_deref().unwrap_or(""), "searching users");
        let url = self.collection_url("users", mapper::USER_SELECT, filter.as_deref(), false);
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::user_from_json).collect())
    }

    #[instrument(skip(self, cancel))]
    async fn search_users_raw(
        &self,
        filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>> {
        let url = self.collection_url("users", mapper::USER_SELECT, Some(filter), false);
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::user_from_json).collect())
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn search_groups(
        &self,
        criteria: &GroupCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>> {
        let filter = self.group_filter(criteria);
        let url = self.collection_url("groups", mapper::GROUP_SELECT, filter.as_deref(), false);
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::group_from_json).collect())
    }

    #[instrument(skip(self, cancel))]
    async fn search_groups_raw(
        &self,
        filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>> {
        let url = self.collection_url("groups", mapper::GROUP_SELECT, Some(filter), false);
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::group_from_json).collect())
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn search_computers(
        &self,
        criteria: &ComputerCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryComputer>> {
        let filter = self.computer_filter(criteria);
        let url = self.collection_url("devices", mapper::DEVICE_SELECT, filter.as_deref(), false);
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::computer_from_json).collect())
    }

    #[instrument(skip(self, cancel))]
    async fn search_computers_raw(
        &self,
        filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryComputer>> {
        let url = self.collection_url("devices", mapper::DEVICE_SELECT, Some(filter), false);
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::computer_from_json).collect())
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn users_page(
        &self,
        criteria: &UserCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryUser>> {
        let filter = self.user_filter(criteria)?;
        let url = self.collection_url("users", mapper::USER_SELECT, filter.as_deref(), true);
        let window = self.fetch_page(url, page, cancel).await?;
        Ok(window.map(|v| mapper::user_from_json(&v)))
    }

    #[instrument(skip(self, cancel))]
    async fn users_page_raw(
        &self,
        filter: &str,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryUser>> {
        let url = self.collection_url("users", mapper::USER_SELECT, Some(filter), true);
        let window = self.fetch_page(url, page, cancel).await?;
        Ok(window.map(|v| mapper::user_from_json(&v)))
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn groups_page(
        &self,
        criteria: &GroupCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryGroup>> {
        let filter = self.group_filter(criteria);
        let url = self.collection_url("groups", mapper::GROUP_SELECT, filter.as_deref(), true);
        let window = self.fetch_page(url, page, cancel).await?;
        Ok(window.map(|v| mapper::group_from_json(&v)))
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn computers_page(
        &self,
        criteria: &ComputerCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryComputer>> {
        let filter = self.computer_filter(criteria);
        let url = self.collection_url("devices", mapper::DEVICE_SELECT, filter.as_deref(), true);
        let window = self.fetch_page(url, page, cancel).await?;
        Ok(window.map(|v| mapper::computer_from_json(&v)))
    }

    #[instrument(skip(self, cancel))]
    async fn groups_of(
        &self,
        user_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>> {
        let url = format!(
            "{}/users/{}/memberOf/microsoft.graph.group?$select={}&$top={}",
            self.client.base_url(),
            urlencoding::encode(user_key),
            mapper::GROUP_SELECT,
            GRAPH_MAX_PAGE_SIZE
        );
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::group_from_json).collect())
    }

    #[instrument(skip(self, cancel))]
    async fn members_of(
        &self,
        group_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>> {
        let url = format!(
            "{}/groups/{}/members/microsoft.graph.user?$select={}&$top={}",
            self.client.base_url(),
            urlencoding::encode(group_key),
            mapper::USER_SELECT,
            GRAPH_MAX_PAGE_SIZE
        );
        let values = self.fetch_all(url, cancel).await?;
        Ok(values.iter().map(mapper::user_from_json).collect())
    }

    async fn validate_credentials(
        &self,
        _username: &str,
        _password: &str,
        _cancel: &CancellationToken,
    ) -> DirectoryResult<bool> {
        // App-only Graph credentials cannot check a user password; there is
        // no boolean answer to give.
        Err(DirectoryError::not_supported(
            "validate_credentials",
            DirectoryBackend::Graph,
        ))
    }

    #[instrument(skip(self, request, cancel))]
    async fn authenticate(
        &self,
        request: &AuthRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<AuthenticationOutcome> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        match request {
            AuthRequest::ClientSecret => {
                let principal = match self.tokens.auth() {
                    GraphAuth::ClientSecret { client_id, .. } => Some(client_id.clone()),
                    GraphAuth::ManagedIdentity { client_id } => client_id.clone(),
                };
                match cancellable(cancel, self.tokens.get_token()).await {
                    Ok(_) => Ok(AuthenticationOutcome::Success { principal }),
                    Err(DirectoryError::InvalidCredentials) => {
                        Ok(AuthenticationOutcome::InvalidCredentials)
                    }
                    Err(err) => Err(err),
                }
            }
            other => Ok(AuthenticationOutcome::NotSupported {
                method: other.method_name(),
            }),
        }
    }

    #[instrument(skip(self, cancel))]
    async fn add_group_member(
        &self,
        group_key: &str,
        member_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        let url = format!(
            "{}/groups/{}/members/$ref",
            self.client.base_url(),
            urlencoding::encode(group_key)
        );
        let body = json!({
            "@odata.id": format!(
                "{}/directoryObjects/{}",
                self.client.base_url(),
                member_key
            )
        });
        self.manage(self.client.post_no_content(&url, &body), cancel)
            .await
    }

    #[instrument(skip(self, cancel))]
    async fn remove_group_member(
        &self,
        group_key: &str,
        member_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        let url = format!(
            "{}/groups/{}/members/{}/$ref",
            self.client.base_url(),
            urlencoding::encode(group_key),
            urlencoding::encode(member_key)
        );
        self.manage(self.client.delete(&url), cancel).await
    }

    #[instrument(skip(self, new_password, cancel))]
    async fn set_password(
        &self,
        user_key: &str,
        new_password: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        let url = format!(
            "{}/users/{}",
            self.client.base_url(),
            urlencoding::encode(user_key)
        );
        let body = json!({
            "passwordProfile": {
                "password": new_password,
                "forceChangePasswordNextSignIn": false
            }
        });
        self.manage(self.client.patch(&url, &body), cancel).await
    }

    async fn change_password(
        &self,
        _user_key: &str,
        _old_password: &str,
        _new_password: &str,
        _cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        // Verifying the old password requires acting as the user, which an
        // application credential cannot do.
        Ok(OperationStatus::NotSupported)
    }

    #[instrument(skip(self, cancel))]
    async fn set_account_enabled(
        &self,
        user_key: &str,
        enabled: bool,
        cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        let url = format!(
            "{}/users/{}",
            self.client.base_url(),
            urlencoding::encode(user_key)
        );
        let body = json!({ "accountEnabled": enabled });
        self.manage(self.client.patch(&url, &body), cancel).await
    }

    async fn dispose(&self) -> DirectoryResult<()> {
        self.tokens.invalidate().await;
        info!("graph directory service disposed");
        Ok(())
    }
}

impl std::fmt::Debug for GraphDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDirectory")
            .field("display_name", &self.display_name)
            .field("tenant_id", &self.config.tenant_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> GraphDirectory {
        GraphDirectory::new(
            GraphConfig::new("contoso.onmicrosoft.com"),
            GraphAuth::client_secret("app-id", "secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_collection_url_shape() {
        let svc = service();
        let url = svc.collection_url("users", mapper::USER_SELECT, Some("displayName eq 'X'"), true);
        assert!(url.starts_with("https://graph.microsoft.com/v1.0/users?$select="));
        assert!(url.contains("&$top=999"));
        assert!(url.contains("&$count=true"));
        assert!(url.contains("&$filter=displayName%20eq%20%27X%27"));
    }

    #[test]
    fn test_entity_url_encodes_key() {
        let svc = service();
        let url = svc.entity_url("users", "john.doe@contoso.com", "id");
        assert!(url.contains("/users/john.doe%40contoso.com?$select=id"));
    }

    #[test]
    fn test_member_of_criteria_rejected() {
        let svc = service();
        let criteria = UserCriteria::new().member_of("admins");
        let err = svc.user_filter(&criteria).unwrap_err();
        assert!(matches!(err, DirectoryError::NotSupported { .. }));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(service().display_name(), "Graph: contoso.onmicrosoft.com");
    }
}
