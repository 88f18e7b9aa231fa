//! Graph JSON → common entity projection
//!
//! Structural mapping only: absent fields stay absent, no validation.

use chrono::{DateTime, Utc};
use serde_json::Value;

use dirgate_core::entity::{DirectoryComputer, DirectoryGroup, DirectoryUser};

/// Fields selected on user reads.
pub const USER_SELECT: &str = "id,userPrincipalName,mailNickname,mail,displayName,givenName,\
    surname,department,jobTitle,mobilePhone,accountEnabled,createdDateTime,signInActivity";

/// Fields selected on group reads.
pub const GROUP_SELECT: &str = "id,displayName,description,mail";

/// Fields selected on device reads.
pub const DEVICE_SELECT: &str =
    "id,displayName,operatingSystem,operatingSystemVersion,accountEnabled";

fn text(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(String::from)
}

fn text_or_empty(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn timestamp(value: &Value, field: &str) -> Option<DateTime<Utc>> {
    value
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Project a Graph user object.
pub fn user_from_json(value: &Value) -> DirectoryUser {
    DirectoryUser {
        external_id: text_or_empty(value, "id"),
        username: text_or_empty(value, "mailNickname"),
        user_principal_name: text(value, "userPrincipalName"),
        display_name: text_or_empty(value, "displayName"),
        email: text(value, "mail"),
        given_name: text(value, "givenName"),
        surname: text(value, "surname"),
        department: text(value, "department"),
        job_title: text(value, "jobTitle"),
        phone: text(value, "mobilePhone"),
        enabled: value.get("accountEnabled").and_then(Value::as_bool),
        member_of: Vec::new(),
        created_at: timestamp(value, "createdDateTime"),
        last_sign_in: value
            .get("signInActivity")
            .and_then(|v| v.get("lastSignInDateTime"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        distinguished_name: None,
    }
}

/// Project a Graph group object.
pub fn group_from_json(value: &Value) -> DirectoryGroup {
    DirectoryGroup {
        external_id: text_or_empty(value, "id"),
        name: text_or_empty(value, "displayName"),
        description: text(value, "description"),
        email: text(value, "mail"),
        members: Vec::new(),
        distinguished_name: None,
    }
}

/// Project a Graph device object.
pub fn computer_from_json(value: &Value) -> DirectoryComputer {
    DirectoryComputer {
        external_id: text_or_empty(value, "id"),
        name: text_or_empty(value, "displayName"),
        dns_name: None,
        operating_system: text(value, "operatingSystem"),
        os_version: text(value, "operatingSystemVersion"),
        enabled: value.get("accountEnabled").and_then(Value::as_bool),
        distinguished_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_complete() {
        let value = json!({
            "id": "user-123",
            "userPrincipalName": "john.doe@contoso.com",
            "mailNickname": "john.doe",
            "mail": "john.doe@contoso.com",
            "displayName": "John Doe",
            "givenName": "John",
            "surname": "Doe",
            "department": "Engineering",
            "jobTitle": "Software Engineer",
            "mobilePhone": "+1 555 0100",
            "accountEnabled": true,
            "createdDateTime": "2024-01-15T10:00:00Z",
            "signInActivity": { "lastSignInDateTime": "2024-02-01T08:30:00Z" }
        });

        let user = user_from_json(&value);
        assert_eq!(user.external_id, "user-123");
        assert_eq!(user.username, "john.doe");
        assert_eq!(user.display_name, "John Doe");
        assert_eq!(user.department.as_deref(), Some("Engineering"));
        assert_eq!(user.enabled, Some(true));
        assert!(user.created_at.is_some());
        assert!(user.last_sign_in.is_some());
        assert!(user.distinguished_name.is_none());
    }

    #[test]
    fn test_user_minimal_fields_stay_absent() {
        let value = json!({ "id": "user-123" });

        let user = user_from_json(&value);
        assert_eq!(user.external_id, "user-123");
        assert_eq!(user.display_name, "");
        assert!(user.email.is_none());
        assert!(user.enabled.is_none());
        assert!(user.last_sign_in.is_none());
    }

    #[test]
    fn test_group_projection() {
        let value = json!({
            "id": "group-9",
            "displayName": "Engineering",
            "description": "All engineers",
            "mail": "eng@contoso.com"
        });

        let group = group_from_json(&value);
        assert_eq!(group.external_id, "group-9");
        assert_eq!(group.name, "Engineering");
        assert_eq!(group.email.as_deref(), Some("eng@contoso.com"));
        assert!(group.members.is_empty());
    }

    #[test]
    fn test_computer_projection() {
        let value = json!({
            "id": "device-7",
            "displayName": "BUILD-01",
            "operatingSystem": "Windows",
            "operatingSystemVersion": "10.0.22631",
            "accountEnabled": false
        });

        let computer = computer_from_json(&value);
        assert_eq!(computer.name, "BUILD-01");
        assert_eq!(computer.operating_system.as_deref(), Some("Windows"));
        assert_eq!(computer.enabled, Some(false));
    }
}
