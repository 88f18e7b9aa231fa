//! # dirgate LDAP backends
//!
//! LDAP-family backends for the dirgate directory gateway: OpenLDAP-
//! compatible directories and Apple Open Directory.
//!
//! Structured criteria compile to RFC 4515 filters with strict escaping
//! (separate escapers for exact values, prefix-match literals, and DN
//! composition). Searches run over one shared, lazily-established
//! connection behind an explicit state machine; credential checks always
//! bind on their own fresh connection. LDAP has no continuation tokens in
//! this design, so paginated calls scan the matching set once and slice
//! the window in memory.
//!
//! # Example
//!
//! ```no_run
//! use dirgate_core::prelude::*;
//! use dirgate_ldap::{LdapConfig, LdapDirectory};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> DirectoryResult<()> {
//! let service = LdapDirectory::new(
//!     LdapConfig::new("ldap.example.com", "dc=example,dc=com")
//!         .with_simple_bind("cn=admin,dc=example,dc=com", "secret")
//!         .with_user_container("ou=users"),
//! )?;
//!
//! let cancel = CancellationToken::new();
//! let valid = service
//!     .validate_credentials("jdoe", "password", &cancel)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod connection;
pub mod filter;
pub mod mapper;
mod open_directory;
mod service;

// Re-exports
pub use config::{LdapBind, LdapConfig};
pub use connection::LdapConnection;
pub use open_directory::OpenDirectoryConfig;
pub use service::LdapDirectory;
