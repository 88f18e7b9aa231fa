//! Structured search criteria
//!
//! Backend-agnostic description of a directory search. Unset fields add no
//! constraint. Text fields accept a trailing `*` wildcard for prefix
//! matching; the compiler in [`crate::query`] strips the marker and picks
//! the match kind per field.

use serde::{Deserialize, Serialize};

/// Criteria for user searches.
///
/// All text predicates AND together. `member_of` is the designated any-of
/// predicate: several group names compile to one OR group nested inside
/// the outer AND. `raw_filter` is appended verbatim in the target dialect
/// and is the caller's responsibility to escape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCriteria {
    /// Login name (wildcard-capable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Display name (wildcard-capable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Email address (wildcard-capable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Department (wildcard-capable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Match users belonging to any of these groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_of: Vec<String>,

    /// Match on account-enabled state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Raw dialect filter appended as an additional AND term, unescaped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_filter: Option<String>,
}

impl UserCriteria {
    /// Create empty criteria (matches every user of the entity type).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the username predicate.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the display name predicate.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the email predicate.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the department predicate.
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Add a group to the any-of membership predicate.
    pub fn member_of(mut self, group: impl Into<String>) -> Self {
        self.member_of.push(group.into());
        self
    }

    /// Set the account-enabled predicate.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Append a raw dialect filter term.
    pub fn with_raw_filter(mut self, filter: impl Into<String>) -> Self {
        self.raw_filter = Some(filter.into());
        self
    }

    /// True if no field adds a constraint.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.display_name.is_none()
            && self.email.is_none()
            && self.department.is_none()
            && self.member_of.is_empty()
            && self.enabled.is_none()
            && self.raw_filter.is_none()
    }
}

/// Criteria for group searches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupCriteria {
    /// Group name (wildcard-capable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Description (wildcard-capable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Raw dialect filter appended as an additional AND term, unescaped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_filter: Option<String>,
}

impl GroupCriteria {
    /// Create empty criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name predicate.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description predicate.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a raw dialect filter term.
    pub fn with_raw_filter(mut self, filter: impl Into<String>) -> Self {
        self.raw_filter = Some(filter.into());
        self
    }
}

/// Criteria for computer searches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputerCriteria {
    /// Computer name (wildcard-capable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Raw dialect filter appended as an additional AND term, unescaped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_filter: Option<String>,
}

impl ComputerCriteria {
    /// Create empty criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name predicate.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a raw dialect filter term.
    pub fn with_raw_filter(mut self, filter: impl Into<String>) -> Self {
        self.raw_filter = Some(filter.into());
        self
    }
}
