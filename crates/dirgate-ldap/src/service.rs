//! LDAP directory service
//!
//! Implements the unified [`DirectoryService`] contract for LDAP-family
//! directories. Structured criteria compile to RFC 4515 filters;
//! pagination uses the shared cursor over a single full scan, since LDAP
//! searches have no continuation concept in this design. Deep pages
//! therefore cost one scan of the matching set, never extra round trips.
//!
//! Management operations are not part of this backend's capability
//! surface and return typed not-supported results.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use ldap3::{Scope, SearchEntry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use dirgate_core::criteria::{ComputerCriteria, GroupCriteria, UserCriteria};
use dirgate_core::entity::{DirectoryComputer, DirectoryGroup, DirectoryUser};
use dirgate_core::error::{DirectoryError, DirectoryResult};
use dirgate_core::metrics::{DirectoryMetrics, MetricsSnapshot};
use dirgate_core::page::{cancellable, collect_page, Batch, BatchSource, Page, PageRequest};
use dirgate_core::query::{computer_query, group_query, user_query, Leaf, Query, Term};
use dirgate_core::service::{
    AuthRequest, AuthenticationOutcome, DirectoryBackend, DirectoryService, OperationStatus,
};

use crate::config::LdapConfig;
use crate::connection::LdapConnection;
use crate::filter;
use crate::mapper;

/// Entity kinds a search can target.
#[derive(Clone, Copy)]
enum EntityKind {
    User,
    Group,
    Computer,
}

/// Single-scan adapter: everything arrives in the first batch.
struct ScanSource {
    entries: Option<Vec<SearchEntry>>,
}

#[async_trait]
impl BatchSource for ScanSource {
    type Item = SearchEntry;

    async fn fetch_first(&mut self) -> DirectoryResult<Batch<SearchEntry>> {
        Ok(Batch::last(self.entries.take().unwrap_or_default()))
    }

    async fn fetch_next(&mut self, _continuation: &str) -> DirectoryResult<Batch<SearchEntry>> {
        Err(DirectoryError::operation_failed(
            "ldap scan source has no continuation",
        ))
    }
}

/// LDAP-family backend (OpenLDAP, and Open Directory via its profiles).
pub struct LdapDirectory {
    config: LdapConfig,
    backend: DirectoryBackend,
    display_name: String,
    connection: LdapConnection,
    metrics: Arc<DirectoryMetrics>,
}

impl LdapDirectory {
    /// Create an OpenLDAP service.
    pub fn new(config: LdapConfig) -> DirectoryResult<Self> {
        Self::with_backend(config, DirectoryBackend::OpenLdap, "LDAP")
    }

    pub(crate) fn with_backend(
        config: LdapConfig,
        backend: DirectoryBackend,
        label: &str,
    ) -> DirectoryResult<Self> {
        config.validate()?;

        let display_name = format!("{}: {}", label, config.host);
        let metrics = Arc::new(DirectoryMetrics::new());
        let connection = LdapConnection::new(config.clone(), Arc::clone(&metrics));

        Ok(Self {
            config,
            backend,
            display_name,
            connection,
            metrics,
        })
    }

    /// Point-in-time operation counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn object_class_term(&self, kind: EntityKind) -> Term {
        let object_class = match kind {
            EntityKind::User => &self.config.user_object_class,
            EntityKind::Group => &self.config.group_object_class,
            EntityKind::Computer => &self.config.computer_object_class,
        };
        Term::Leaf(Leaf::equals("objectClass", object_class.clone()))
    }

    fn search_base(&self, kind: EntityKind) -> String {
        match kind {
            EntityKind::User => self.config.user_dn(),
            EntityKind::Group => self.config.group_dn(),
            EntityKind::Computer => self.config.computer_dn(),
        }
    }

    /// Wrap a compiled query with the entity's object-class constraint.
    fn scoped_filter(&self, kind: EntityKind, mut query: Query) -> String {
        query.prepend(self.object_class_term(kind));
        filter::render(&query)
    }

    /// Wrap a caller-supplied raw filter with the object-class constraint.
    fn scoped_raw_filter(&self, kind: EntityKind, raw: &str) -> String {
        let mut query = Query::new();
        query.push(Term::Raw(raw.to_string()));
        self.scoped_filter(kind, query)
    }

    pub(crate) fn user_filter(&self, criteria: &UserCriteria) -> DirectoryResult<String> {
        // Silently dropping a membership constraint would return a
        // superset of what the caller asked for.
        if !criteria.member_of.is_empty() && self.config.user_profile.member_of.is_none() {
            return Err(DirectoryError::not_supported(
                "member_of criteria",
                self.backend,
            ));
        }
        Ok(self.scoped_filter(
            EntityKind::User,
            user_query(criteria, &self.config.user_profile),
        ))
    }

    fn group_filter(&self, criteria: &GroupCriteria) -> String {
        self.scoped_filter(
            EntityKind::Group,
            group_query(criteria, &self.config.group_profile),
        )
    }

    fn computer_filter(&self, criteria: &ComputerCriteria) -> String {
        self.scoped_filter(
            EntityKind::Computer,
            computer_query(criteria, &self.config.computer_profile),
        )
    }

    /// Filter matching one entity by external id or login attribute.
    fn key_filter(&self, kind: EntityKind, key: &str) -> String {
        let name_attribute = match kind {
            EntityKind::User => self
                .config
                .user_profile
                .username
                .first()
                .cloned()
                .unwrap_or_else(|| "uid".to_string()),
            EntityKind::Group => self
                .config
                .group_profile
                .name
                .first()
                .cloned()
                .unwrap_or_else(|| "cn".to_string()),
            EntityKind::Computer => self
                .config
                .computer_profile
                .name
                .first()
                .cloned()
                .unwrap_or_else(|| "cn".to_string()),
        };

        let mut query = Query::new();
        query.push(Term::AnyOf(vec![
            Leaf::equals(self.config.uid_attribute.clone(), key),
            Leaf::equals(name_attribute, key),
        ]));
        self.scoped_filter(kind, query)
    }

    /// Run one subtree search. The whole matching set comes back in one
    /// pass; referral data on the result is ignored.
    async fn run_search(
        &self,
        base: &str,
        ldap_filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<SearchEntry>> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        let started = Instant::now();
        let result = self.search_round_trip(base, ldap_filter, cancel).await;
        match &result {
            Ok(entries) => self.metrics.record_query(started.elapsed(), entries.len()),
            Err(DirectoryError::Cancelled) => {}
            Err(_) => self.metrics.record_error(),
        }
        result
    }

    async fn search_round_trip(
        &self,
        base: &str,
        ldap_filter: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<SearchEntry>> {
        let mut ldap = self.connection.handle().await?;
        debug!(filter = ldap_filter, base, "searching ldap");

        // The external id attribute is usually operational and must be
        // requested explicitly alongside the regular attributes.
        let attrs = vec!["*", self.config.uid_attribute.as_str()];
        let timeout = self.config.connection.operation_timeout();

        let result = cancellable(cancel, async {
            ldap.with_timeout(timeout)
                .search(base, Scope::Subtree, ldap_filter, attrs)
                .await
                .map_err(|e| DirectoryError::operation_failed_with_source("ldap search failed", e))
        })
        .await?;

        let (entries, _res) = result.success().map_err(|e| {
            DirectoryError::operation_failed_with_source("ldap search returned an error", e)
        })?;

        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    async fn find_one(
        &self,
        kind: EntityKind,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<SearchEntry>> {
        let ldap_filter = self.key_filter(kind, key);
        let mut entries = self
            .run_search(&self.search_base(kind), &ldap_filter, cancel)
            .await?;
        Ok(if entries.is_empty() {
            None
        } else {
            Some(entries.remove(0))
        })
    }

    /// Resolve a user's DN for a credential bind.
    ///
    /// A value that already looks like a DN is used as-is; otherwise the
    /// user is looked up by key on the shared connection.
    async fn resolve_bind_dn(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<String>> {
        if username.contains('=') {
            return Ok(Some(username.to_string()));
        }
        Ok(self
            .find_one(EntityKind::User, username, cancel)
            .await?
            .map(|entry| entry.dn))
    }

    async fn page_of(
        &self,
        kind: EntityKind,
        ldap_filter: &str,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<SearchEntry>> {
        let entries = self
            .run_search(&self.search_base(kind), ldap_filter, cancel)
            .await?;
        let source = ScanSource {
            entries: Some(entries),
        };
        collect_page(source, page, cancel).await
    }
}

#[async_trait]
impl DirectoryService for LdapDirectory {
    fn backend(&self) -> DirectoryBackend {
        self.backend
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self, cancel))]
    async fn test_connection(&self, cancel: &CancellationToken) -> DirectoryResult<()> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        let mut ldap = self.connection.handle().await?;
        let result = cancellable(cancel, async {
            ldap.with_timeout(self.config.connection.operation_timeout())
                .search(&self.config.base_dn, Scope::Base, "(objectClass=*)", vec!["dn"])
                .await
                .map_err(|e| {
                    DirectoryError::connection_failed_with_source("test search failed", e)
                })
        })
        .await?;

        let (entries, _res) = result.success().map_err(|e| {
            DirectoryError::connection_failed_with_source("test search returned an error", e)
        })?;

        if entries.is_empty() {
            return Err(DirectoryError::connection_failed(format!(
                "base DN '{}' not found or not accessible",
                self.config.base_dn
            )));
        }

        info!("ldap connection test successful");
        Ok(())
    }

    #[instrument(skip(self, cancel))]
    async fn find_user(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryUser>> {
        Ok(self
            .find_one(EntityKind::User, key, cancel)
            .await?
            .map(|entry| mapper::user_from_entry(&entry, &self.config)))
    }

    #[instrument(skip(self, cancel))]
    async fn find_group(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryGroup>> {
        Ok(self
            .find_one(EntityKind::Group, key, cancel)
            .await?
            .map(|entry| mapper::group_from_entry(&entry, &self.config)))
    }

    #[instrument(skip(self, cancel))]
    async fn find_computer(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Option<DirectoryComputer>> {
        Ok(self
            .find_one(EntityKind::Computer, key, cancel)
            .await?
            .map(|entry| mapper::computer_from_entry(&entry, &self.config)))
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn search_users(
        &self,
        criteria: &UserCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>> {
        let ldap_filter = self.user_filter(criteria)?;
        let entries = self
            .run_search(&self.config.user_dn(), &ldap_filter, cancel)
            .await?;
        Ok(entries
            .iter()
            .map(|entry| mapper::user_from_entry(entry, &self.config))
            .collect())
    }

    #[instrument(skip(self, cancel))]
    async fn search_users_raw(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>> {
        let ldap_filter = self.scoped_raw_filter(EntityKind::User, raw);
        let entries = self
            .run_search(&self.config.user_dn(), &ldap_filter, cancel)
            .await?;
        Ok(entries
            .iter()
            .map(|entry| mapper::user_from_entry(entry, &self.config))
            .collect())
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn search_groups(
        &self,
        criteria: &GroupCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>> {
        let ldap_filter = self.group_filter(criteria);
        let entries = self
            .run_search(&self.config.group_dn(), &ldap_filter, cancel)
            .await?;
        Ok(entries
            .iter()
            .map(|entry| mapper::group_from_entry(entry, &self.config))
            .collect())
    }

    #[instrument(skip(self, cancel))]
    async fn search_groups_raw(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>> {
        let ldap_filter = self.scoped_raw_filter(EntityKind::Group, raw);
        let entries = self
            .run_search(&self.config.group_dn(), &ldap_filter, cancel)
            .await?;
        Ok(entries
            .iter()
            .map(|entry| mapper::group_from_entry(entry, &self.config))
            .collect())
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn search_computers(
        &self,
        criteria: &ComputerCriteria,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryComputer>> {
        let ldap_filter = self.computer_filter(criteria);
        let entries = self
            .run_search(&self.config.computer_dn(), &ldap_filter, cancel)
            .await?;
        Ok(entries
            .iter()
            .map(|entry| mapper::computer_from_entry(entry, &self.config))
            .collect())
    }

    #[instrument(skip(self, cancel))]
    async fn search_computers_raw(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryComputer>> {
        let ldap_filter = self.scoped_raw_filter(EntityKind::Computer, raw);
        let entries = self
            .run_search(&self.config.computer_dn(), &ldap_filter, cancel)
            .await?;
        Ok(entries
            .iter()
            .map(|entry| mapper::computer_from_entry(entry, &self.config))
            .collect())
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn users_page(
        &self,
        criteria: &UserCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryUser>> {
        let ldap_filter = self.user_filter(criteria)?;
        let window = self
            .page_of(EntityKind::User, &ldap_filter, page, cancel)
            .await?;
        Ok(window.map(|entry| mapper::user_from_entry(&entry, &self.config)))
    }

    #[instrument(skip(self, cancel))]
    async fn users_page_raw(
        &self,
        raw: &str,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryUser>> {
        let ldap_filter = self.scoped_raw_filter(EntityKind::User, raw);
        let window = self
            .page_of(EntityKind::User, &ldap_filter, page, cancel)
            .await?;
        Ok(window.map(|entry| mapper::user_from_entry(&entry, &self.config)))
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn groups_page(
        &self,
        criteria: &GroupCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryGroup>> {
        let ldap_filter = self.group_filter(criteria);
        let window = self
            .page_of(EntityKind::Group, &ldap_filter, page, cancel)
            .await?;
        Ok(window.map(|entry| mapper::group_from_entry(&entry, &self.config)))
    }

    #[instrument(skip(self, criteria, cancel))]
    async fn computers_page(
        &self,
        criteria: &ComputerCriteria,
        page: &PageRequest,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Page<DirectoryComputer>> {
        let ldap_filter = self.computer_filter(criteria);
        let window = self
            .page_of(EntityKind::Computer, &ldap_filter, page, cancel)
            .await?;
        Ok(window.map(|entry| mapper::computer_from_entry(&entry, &self.config)))
    }

    #[instrument(skip(self, cancel))]
    async fn groups_of(
        &self,
        user_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryGroup>> {
        let Some(user) = self.find_one(EntityKind::User, user_key, cancel).await? else {
            return Ok(Vec::new());
        };

        let member_value = if self.config.group_member_is_dn {
            user.dn
        } else {
            mapper::user_from_entry(&user, &self.config).username
        };

        let mut query = Query::new();
        query.push(Term::Leaf(Leaf::equals(
            self.config.group_member_attribute.clone(),
            member_value,
        )));
        let ldap_filter = self.scoped_filter(EntityKind::Group, query);

        let entries = self
            .run_search(&self.config.group_dn(), &ldap_filter, cancel)
            .await?;
        Ok(entries
            .iter()
            .map(|entry| mapper::group_from_entry(entry, &self.config))
            .collect())
    }

    #[instrument(skip(self, cancel))]
    async fn members_of(
        &self,
        group_key: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<Vec<DirectoryUser>> {
        let Some(group) = self.find_one(EntityKind::Group, group_key, cancel).await? else {
            return Ok(Vec::new());
        };

        let members = mapper::group_from_entry(&group, &self.config).members;
        let mut users = Vec::with_capacity(members.len());
        for member in members {
            if cancel.is_cancelled() {
                return Err(DirectoryError::Cancelled);
            }
            // Member values are DNs with the default schema, short names
            // with Open Directory's; find_one's key filter covers the
            // latter, a base-scope read the former.
            if member.contains('=') {
                match self.run_search(&member, "(objectClass=*)", cancel).await {
                    Ok(entries) => {
                        if let Some(entry) = entries.first() {
                            users.push(mapper::user_from_entry(entry, &self.config));
                        }
                    }
                    Err(DirectoryError::Cancelled) => return Err(DirectoryError::Cancelled),
                    Err(e) => {
                        tracing::warn!(member, error = %e, "skipping unresolvable group member");
                    }
                }
            } else if let Some(entry) = self.find_one(EntityKind::User, &member, cancel).await? {
                users.push(mapper::user_from_entry(&entry, &self.config));
            }
        }

        Ok(users)
    }

    #[instrument(skip(self, password, cancel))]
    async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> DirectoryResult<bool> {
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }

        let Some(bind_dn) = self.resolve_bind_dn(username, cancel).await? else {
            return Ok(false);
        };

        cancellable(cancel, self.connection.bind_fresh(&bind_dn, password)).await
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
            AuthRequest::SimpleBind { username, password } => {
                let Some(bind_dn) = self.resolve_bind_dn(username, cancel).await? else {
                    return Ok(AuthenticationOutcome::InvalidCredentials);
                };
                let accepted =
                    cancellable(cancel, self.connection.bind_fresh(&bind_dn, password)).await?;
                Ok(if accepted {
                    AuthenticationOutcome::Success {
                        principal: Some(bind_dn),
                    }
                } else {
                    AuthenticationOutcome::InvalidCredentials
                })
            }
            AuthRequest::Anonymous => {
                let accepted = cancellable(cancel, self.connection.bind_anonymous()).await?;
                Ok(if accepted {
                    AuthenticationOutcome::Success { principal: None }
                } else {
                    AuthenticationOutcome::InvalidCredentials
                })
            }
            other => Ok(AuthenticationOutcome::NotSupported {
                method: other.method_name(),
            }),
        }
    }

    async fn add_group_member(
        &self,
        _group_key: &str,
        _member_key: &str,
        _cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        Ok(OperationStatus::NotSupported)
    }

    async fn remove_group_member(
        &self,
        _group_key: &str,
        _member_key: &str,
        _cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        Ok(OperationStatus::NotSupported)
    }

    async fn set_password(
        &self,
        _user_key: &str,
        _new_password: &str,
        _cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        Ok(OperationStatus::NotSupported)
    }

    async fn change_password(
        &self,
        _user_key: &str,
        _old_password: &str,
        _new_password: &str,
        _cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        Ok(OperationStatus::NotSupported)
    }

    async fn set_account_enabled(
        &self,
        _user_key: &str,
        _enabled: bool,
        _cancel: &CancellationToken,
    ) -> DirectoryResult<OperationStatus> {
        Ok(OperationStatus::NotSupported)
    }

    async fn dispose(&self) -> DirectoryResult<()> {
        self.connection.dispose().await
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("display_name", &self.display_name)
            .field("backend", &self.backend)
            .finish()
    }
}
