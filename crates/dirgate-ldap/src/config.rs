//! LDAP backend configuration
//!
//! Endpoint, containers, bind identity, and the attribute profiles that
//! drive the criteria compiler. Defaults target OpenLDAP with the usual
//! inetOrgPerson / groupOfNames schema; the Open Directory module swaps in
//! Apple profiles.

use serde::{Deserialize, Serialize};

use dirgate_core::config::{ConnectionSettings, TlsConfig};
use dirgate_core::error::{DirectoryError, DirectoryResult};
use dirgate_core::query::{ComputerAttributeProfile, GroupAttributeProfile, UserAttributeProfile};

/// How the shared service connection binds.
///
/// One variant, chosen at construction. User-credential checks never use
/// this identity; they bind on their own fresh connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LdapBind {
    /// Simple bind with a DN and password.
    Simple { bind_dn: String, password: String },
    /// Anonymous bind.
    Anonymous,
}

impl std::fmt::Debug for LdapBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LdapBind::Simple { bind_dn, .. } => f
                .debug_struct("Simple")
                .field("bind_dn", bind_dn)
                .field("password", &"***REDACTED***")
                .finish(),
            LdapBind::Anonymous => write!(f, "Anonymous"),
        }
    }
}

/// Configuration for an LDAP-family directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Upgrade a plain connection with STARTTLS.
    #[serde(default)]
    pub use_starttls: bool,

    /// Base DN for all operations (e.g. "dc=example,dc=com").
    pub base_dn: String,

    /// Bind identity for the shared connection.
    #[serde(default = "default_bind")]
    pub bind: LdapBind,

    /// User container relative to `base_dn` (e.g. "ou=users").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_container: Option<String>,

    /// Group container relative to `base_dn`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_container: Option<String>,

    /// Computer container relative to `base_dn`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computer_container: Option<String>,

    /// Object class constraining user searches.
    #[serde(default = "default_user_object_class")]
    pub user_object_class: String,

    /// Object class constraining group searches.
    #[serde(default = "default_group_object_class")]
    pub group_object_class: String,

    /// Object class constraining computer searches.
    #[serde(default = "default_computer_object_class")]
    pub computer_object_class: String,

    /// Attribute used as the stable external identifier.
    #[serde(default = "default_uid_attribute")]
    pub uid_attribute: String,

    /// Attribute on group entries holding member references.
    #[serde(default = "default_group_member_attribute")]
    pub group_member_attribute: String,

    /// Whether member references are DNs (groupOfNames) or short login
    /// names (Open Directory's memberUid).
    #[serde(default = "default_true")]
    pub group_member_is_dn: bool,

    /// User criteria field → attribute mapping.
    #[serde(default = "default_user_profile")]
    pub user_profile: UserAttributeProfile,

    /// Group criteria field → attribute mapping.
    #[serde(default = "default_group_profile")]
    pub group_profile: GroupAttributeProfile,

    /// Computer criteria field → attribute mapping.
    #[serde(default = "default_computer_profile")]
    pub computer_profile: ComputerAttributeProfile,

    /// Connection and timeout settings.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// TLS configuration.
    #[serde(default)]
    pub tls: TlsConfig,
}

fn default_ldap_port() -> u16 {
    389
}

fn default_bind() -> LdapBind {
    LdapBind::Anonymous
}

fn default_user_object_class() -> String {
    "person".to_string()
}

fn default_group_object_class() -> String {
    "groupOfNames".to_string()
}

fn default_computer_object_class() -> String {
    "device".to_string()
}

fn default_uid_attribute() -> String {
    "entryUUID".to_string()
}

fn default_group_member_attribute() -> String {
    "member".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_profile() -> UserAttributeProfile {
    UserAttributeProfile {
        username: vec!["uid".to_string()],
        display_name: vec!["displayName".to_string()],
        email: vec!["mail".to_string()],
        department: vec!["departmentNumber".to_string()],
        member_of: Some("memberOf".to_string()),
        enabled: None,
    }
}

fn default_group_profile() -> GroupAttributeProfile {
    GroupAttributeProfile {
        name: vec!["cn".to_string()],
        description: vec!["description".to_string()],
    }
}

fn default_computer_profile() -> ComputerAttributeProfile {
    ComputerAttributeProfile {
        name: vec!["cn".to_string()],
    }
}

impl LdapConfig {
    /// Create a config with OpenLDAP defaults and an anonymous bind.
    pub fn new(host: impl Into<String>, base_dn: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            base_dn: base_dn.into(),
            bind: default_bind(),
            user_container: None,
            group_container: None,
            computer_container: None,
            user_object_class: default_user_object_class(),
            group_object_class: default_group_object_class(),
            computer_object_class: default_computer_object_class(),
            uid_attribute: default_uid_attribute(),
            group_member_attribute: default_group_member_attribute(),
            group_member_is_dn: true,
            user_profile: default_user_profile(),
            group_profile: default_group_profile(),
            computer_profile: default_computer_profile(),
            connection: ConnectionSettings::default(),
            tls: TlsConfig::default(),
        }
    }

    /// Bind the shared connection with a DN and password.
    pub fn with_simple_bind(
        mut self,
        bind_dn: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.bind = LdapBind::Simple {
            bind_dn: bind_dn.into(),
            password: password.into(),
        };
        self
    }

    /// Enable SSL (LDAPS) and switch to the LDAPS port.
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self.tls.enabled = true;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Set the user container.
    pub fn with_user_container(mut self, container: impl Into<String>) -> Self {
        self.user_container = Some(container.into());
        self
    }

    /// Set the group container.
    pub fn with_group_container(mut self, container: impl Into<String>) -> Self {
        self.group_container = Some(container.into());
        self
    }

    /// Set the computer container.
    pub fn with_computer_container(mut self, container: impl Into<String>) -> Self {
        self.computer_container = Some(container.into());
        self
    }

    /// Full user search base DN.
    pub fn user_dn(&self) -> String {
        match &self.user_container {
            Some(container) => format!("{},{}", container, self.base_dn),
            None => self.base_dn.clone(),
        }
    }

    /// Full group search base DN.
    pub fn group_dn(&self) -> String {
        match &self.group_container {
            Some(container) => format!("{},{}", container, self.base_dn),
            None => self.base_dn.clone(),
        }
    }

    /// Full computer search base DN.
    pub fn computer_dn(&self) -> String {
        match &self.computer_container {
            Some(container) => format!("{},{}", container, self.base_dn),
            None => self.base_dn.clone(),
        }
    }

    /// The LDAP URL for this endpoint.
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Validate required fields.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.host.is_empty() {
            return Err(DirectoryError::invalid_configuration("host is required"));
        }
        if self.base_dn.is_empty() {
            return Err(DirectoryError::invalid_configuration("base_dn is required"));
        }
        if self.use_ssl && self.use_starttls {
            return Err(DirectoryError::invalid_configuration(
                "cannot use both SSL and STARTTLS",
            ));
        }
        if let LdapBind::Simple { bind_dn, .. } = &self.bind {
            if bind_dn.is_empty() {
                return Err(DirectoryError::invalid_configuration(
                    "bind_dn is required for simple bind",
                ));
            }
        }
        self.tls.validate_security();
        Ok(())
    }
}
