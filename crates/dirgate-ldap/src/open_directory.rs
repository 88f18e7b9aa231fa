//! Apple Open Directory backend
//!
//! Open Directory is an LDAP server with Apple's schema on top, so the
//! whole OpenLDAP plumbing is reused: only the attribute profiles, object
//! classes, and containers differ. Group membership is recorded as short
//! login names in `memberUid`, not DNs.

use dirgate_core::error::DirectoryResult;
use dirgate_core::query::{ComputerAttributeProfile, GroupAttributeProfile, UserAttributeProfile};
use dirgate_core::service::DirectoryBackend;

use crate::config::LdapConfig;
use crate::service::LdapDirectory;

/// Configuration for an Apple Open Directory service.
///
/// Wraps [`LdapConfig`] with Apple schema defaults; any field can still be
/// adjusted through the inner config before building.
#[derive(Debug, Clone)]
pub struct OpenDirectoryConfig {
    /// The underlying LDAP configuration.
    pub ldap: LdapConfig,
}

impl OpenDirectoryConfig {
    /// Create a config with Apple schema defaults.
    pub fn new(host: impl Into<String>, base_dn: impl Into<String>) -> Self {
        let mut ldap = LdapConfig::new(host, base_dn)
            .with_user_container("cn=users")
            .with_group_container("cn=groups")
            .with_computer_container("cn=computers");

        ldap.user_object_class = "apple-user".to_string();
        ldap.group_object_class = "apple-group".to_string();
        ldap.computer_object_class = "apple-computer".to_string();
        ldap.uid_attribute = "apple-generateduid".to_string();
        ldap.group_member_attribute = "memberUid".to_string();
        ldap.group_member_is_dn = false;

        ldap.user_profile = UserAttributeProfile {
            username: vec!["uid".to_string()],
            // Open Directory stores the full name in cn.
            display_name: vec!["cn".to_string()],
            email: vec!["mail".to_string()],
            department: vec!["departmentNumber".to_string()],
            member_of: None,
            enabled: None,
        };
        ldap.group_profile = GroupAttributeProfile {
            name: vec!["cn".to_string()],
            description: vec!["apple-group-realname".to_string()],
        };
        ldap.computer_profile = ComputerAttributeProfile {
            name: vec!["cn".to_string()],
        };

        Self { ldap }
    }

    /// Bind the shared connection with a DN and password.
    pub fn with_simple_bind(
        mut self,
        bind_dn: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.ldap = self.ldap.with_simple_bind(bind_dn, password);
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.ldap = self.ldap.with_ssl();
        self
    }

    /// Build the directory service.
    pub fn build(self) -> DirectoryResult<LdapDirectory> {
        LdapDirectory::with_backend(self.ldap, DirectoryBackend::OpenDirectory, "Open Directory")
    }
}
