//! Common directory entity shapes
//!
//! Every backend projects its raw records into these three structs.
//! Projection is structural only: missing source fields become `None`,
//! except the non-nullable name fields which default to an empty string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account as seen through the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Backend-native unique identifier (object id, entryUUID, apple-generateduid).
    pub external_id: String,
    /// Short login name (mailNickname, uid).
    pub username: String,
    /// Full login principal (userPrincipalName), if the backend has one.
    pub user_principal_name: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Primary email address.
    pub email: Option<String>,
    /// Given (first) name.
    pub given_name: Option<String>,
    /// Surname (last name).
    pub surname: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Job title.
    pub job_title: Option<String>,
    /// Telephone number.
    pub phone: Option<String>,
    /// Whether the account is enabled. `None` when the backend does not track it.
    pub enabled: Option<bool>,
    /// Group memberships by backend-native group key, when returned inline.
    pub member_of: Vec<String>,
    /// Account creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Last sign-in timestamp.
    pub last_sign_in: Option<DateTime<Utc>>,
    /// Distinguished name (LDAP-family backends only).
    pub distinguished_name: Option<String>,
}

/// A group as seen through the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryGroup {
    /// Backend-native unique identifier.
    pub external_id: String,
    /// Group name.
    pub name: String,
    /// Group description.
    pub description: Option<String>,
    /// Group email address, if mail-enabled.
    pub email: Option<String>,
    /// Member keys, when returned inline.
    pub members: Vec<String>,
    /// Distinguished name (LDAP-family backends only).
    pub distinguished_name: Option<String>,
}

/// A computer / device record as seen through the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryComputer {
    /// Backend-native unique identifier.
    pub external_id: String,
    /// Computer name.
    pub name: String,
    /// DNS host name.
    pub dns_name: Option<String>,
    /// Operating system.
    pub operating_system: Option<String>,
    /// Operating system version.
    pub os_version: Option<String>,
    /// Whether the device record is enabled.
    pub enabled: Option<bool>,
    /// Distinguished name (LDAP-family backends only).
    pub distinguished_name: Option<String>,
}
