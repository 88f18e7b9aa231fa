//! LDAP entry → common entity projection
//!
//! Structural mapping only. Single-valued fields take the first attribute
//! value; absent attributes stay absent. The attribute names come from the
//! config's profiles, so the same code serves OpenLDAP and Open Directory
//! schemas.

use chrono::{DateTime, NaiveDateTime, Utc};
use ldap3::SearchEntry;

use dirgate_core::entity::{DirectoryComputer, DirectoryGroup, DirectoryUser};

use crate::config::LdapConfig;

fn first(entry: &SearchEntry, attribute: &str) -> Option<String> {
    entry
        .attrs
        .get(attribute)
        .and_then(|values| values.first())
        .cloned()
}

fn first_or_empty(entry: &SearchEntry, attribute: &str) -> String {
    first(entry, attribute).unwrap_or_default()
}

fn all(entry: &SearchEntry, attribute: &str) -> Vec<String> {
    entry.attrs.get(attribute).cloned().unwrap_or_default()
}

/// Parse an LDAP generalized time value ("20240115100000Z").
fn parse_generalized_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Project a user entry.
pub fn user_from_entry(entry: &SearchEntry, config: &LdapConfig) -> DirectoryUser {
    let profile = &config.user_profile;

    DirectoryUser {
        external_id: first_or_empty(entry, &config.uid_attribute),
        username: profile
            .username
            .first()
            .and_then(|attr| first(entry, attr))
            .unwrap_or_default(),
        user_principal_name: None,
        display_name: profile
            .display_name
            .first()
            .and_then(|attr| first(entry, attr))
            .unwrap_or_default(),
        email: profile.email.first().and_then(|attr| first(entry, attr)),
        given_name: first(entry, "givenName"),
        surname: first(entry, "sn"),
        department: profile
            .department
            .first()
            .and_then(|attr| first(entry, attr)),
        job_title: first(entry, "title"),
        phone: first(entry, "telephoneNumber"),
        enabled: None,
        member_of: profile
            .member_of
            .as_deref()
            .map(|attr| all(entry, attr))
            .unwrap_or_default(),
        created_at: first(entry, "createTimestamp")
            .as_deref()
            .and_then(parse_generalized_time),
        last_sign_in: None,
        distinguished_name: Some(entry.dn.clone()),
    }
}

/// Project a group entry.
pub fn group_from_entry(entry: &SearchEntry, config: &LdapConfig) -> DirectoryGroup {
    let profile = &config.group_profile;

    DirectoryGroup {
        external_id: first_or_empty(entry, &config.uid_attribute),
        name: profile
            .name
            .first()
            .and_then(|attr| first(entry, attr))
            .unwrap_or_default(),
        description: profile
            .description
            .first()
            .and_then(|attr| first(entry, attr)),
        email: first(entry, "mail"),
        members: all(entry, &config.group_member_attribute),
        distinguished_name: Some(entry.dn.clone()),
    }
}

/// Project a computer entry.
pub fn computer_from_entry(entry: &SearchEntry, config: &LdapConfig) -> DirectoryComputer {
    let profile = &config.computer_profile;

    DirectoryComputer {
        external_id: first_or_empty(entry, &config.uid_attribute),
        name: profile
            .name
            .first()
            .and_then(|attr| first(entry, attr))
            .unwrap_or_default(),
        dns_name: None,
        operating_system: None,
        os_version: None,
        enabled: None,
        distinguished_name: Some(entry.dn.clone()),
    }
}
