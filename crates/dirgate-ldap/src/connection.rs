//! LDAP connection lifecycle
//!
//! One shared handle per service instance behind an explicit state
//! machine: `Unconnected → Ready → Failed`, with `Disposed` terminal.
//! Establishment runs while holding the single gate, so it happens at
//! most once concurrently and there is no check-then-act race. A `Failed`
//! state does not poison the service; the next call retries.
//!
//! Credential checks never touch the shared handle. They bind on a fresh
//! dedicated connection so the shared bind identity is never disturbed by
//! a concurrent search.

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use dirgate_core::error::{DirectoryError, DirectoryResult};
use dirgate_core::metrics::DirectoryMetrics;

use crate::config::{LdapBind, LdapConfig};

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

enum ConnectionState {
    Unconnected,
    Ready(Ldap),
    Failed,
    Disposed,
}

/// Shared connection to one LDAP server.
pub struct LdapConnection {
    config: LdapConfig,
    metrics: Arc<DirectoryMetrics>,
    state: Mutex<ConnectionState>,
}

impl LdapConnection {
    /// Create an unconnected handle; the first operation connects.
    pub fn new(config: LdapConfig, metrics: Arc<DirectoryMetrics>) -> Self {
        Self {
            config,
            metrics,
            state: Mutex::new(ConnectionState::Unconnected),
        }
    }

    /// Get the shared handle, establishing the connection if needed.
    pub async fn handle(&self) -> DirectoryResult<Ldap> {
        let mut state = self.state.lock().await;
        match &*state {
            ConnectionState::Disposed => Err(DirectoryError::invalid_configuration(
                "service has been disposed",
            )),
            ConnectionState::Ready(ldap) => Ok(ldap.clone()),
            ConnectionState::Unconnected | ConnectionState::Failed => {
                match self.establish().await {
                    Ok(ldap) => {
                        *state = ConnectionState::Ready(ldap.clone());
                        self.metrics.record_connection();
                        Ok(ldap)
                    }
                    Err(err) => {
                        *state = ConnectionState::Failed;
                        self.metrics.record_connection_failure();
                        Err(err)
                    }
                }
            }
        }
    }

    /// Open a connection and perform the configured service bind.
    async fn establish(&self) -> DirectoryResult<Ldap> {
        let mut ldap = self.open().await?;

        let (bind_dn, password) = match &self.config.bind {
            LdapBind::Simple { bind_dn, password } => (bind_dn.as_str(), password.as_str()),
            LdapBind::Anonymous => ("", ""),
        };

        debug!(bind_dn, "performing service bind");
        let result = ldap.simple_bind(bind_dn, password).await.map_err(|e| {
            DirectoryError::connection_failed_with_source(
                format!("bind failed for {bind_dn}"),
                e,
            )
        })?;

        if result.rc == RC_INVALID_CREDENTIALS {
            return Err(DirectoryError::InvalidCredentials);
        }
        if result.rc != 0 {
            return Err(DirectoryError::connection_failed(format!(
                "bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(host = %self.config.host, "ldap connection established");
        Ok(ldap)
    }

    /// Open a fresh connection with the driver task spawned, unbound.
    async fn open(&self) -> DirectoryResult<Ldap> {
        let url = self.config.url();
        debug!(url = %url, "connecting to ldap server");

        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection.connect_timeout())
            .set_starttls(self.config.use_starttls);
        if !self.config.tls.verify_certificate {
            settings = settings.set_no_tls_verify(true);
        }

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("failed to connect to {url}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "ldap connection driver error");
            }
        });

        Ok(ldap)
    }

    /// Bind a dedicated fresh connection with the given credentials.
    ///
    /// Returns `Ok(false)` for rejected credentials. An empty password is
    /// rejected outright: the server would treat it as an unauthenticated
    /// bind and report success for any DN.
    pub async fn bind_fresh(&self, bind_dn: &str, password: &str) -> DirectoryResult<bool> {
        if password.is_empty() {
            return Ok(false);
        }

        let mut ldap = self.open().await?;
        let result = ldap.simple_bind(bind_dn, password).await.map_err(|e| {
            DirectoryError::operation_failed_with_source("credential bind failed", e)
        })?;

        let accepted = match result.rc {
            0 => true,
            RC_INVALID_CREDENTIALS => false,
            rc => {
                let _ = ldap.unbind().await;
                return Err(DirectoryError::operation_failed(format!(
                    "credential bind failed with code {}: {}",
                    rc, result.text
                )));
            }
        };

        let _ = ldap.unbind().await;
        Ok(accepted)
    }

    /// Bind a dedicated fresh connection anonymously.
    pub async fn bind_anonymous(&self) -> DirectoryResult<bool> {
        let mut ldap = self.open().await?;
        let result = ldap.simple_bind("", "").await.map_err(|e| {
            DirectoryError::operation_failed_with_source("anonymous bind failed", e)
        })?;
        let accepted = result.rc == 0;
        let _ = ldap.unbind().await;
        Ok(accepted)
    }

    /// Unbind the shared handle and refuse further use.
    pub async fn dispose(&self) -> DirectoryResult<()> {
        let mut state = self.state.lock().await;
        if let ConnectionState::Ready(ldap) = &mut *state {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "error during unbind");
            }
        }
        *state = ConnectionState::Disposed;
        info!("ldap connection disposed");
        Ok(())
    }
}

impl std::fmt::Debug for LdapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnection")
            .field("url", &self.config.url())
            .finish()
    }
}
