//! Criteria-to-predicate compiler
//!
//! Turns structured [`crate::criteria`] objects into an ordered, syntax-
//! agnostic predicate structure: a top-level list of AND-ed terms, where a
//! term is a single leaf, an OR group of alternatives, or an opaque raw
//! fragment. Dialect emitters in the backend crates render this structure
//! into OData or RFC 4515 text; nothing in this module emits target
//! punctuation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::criteria::{ComputerCriteria, GroupCriteria, UserCriteria};

/// How a leaf predicate matches its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// Exact equality.
    Equals,
    /// Prefix match; the wildcard marker has already been stripped.
    StartsWith,
}

/// The value carried by a leaf predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeafValue {
    /// A text value, escaped by the emitter.
    Text(String),
    /// A boolean value, rendered as the dialect's boolean literal.
    Flag(bool),
}

/// One atomic predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    /// Backend attribute name.
    pub attribute: String,
    /// The value to match.
    pub value: LeafValue,
    /// Equality or prefix match.
    pub match_kind: MatchKind,
}

impl Leaf {
    /// Create an exact-match text leaf.
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: LeafValue::Text(value.into()),
            match_kind: MatchKind::Equals,
        }
    }

    /// Create a prefix-match leaf. `prefix` must no longer contain wildcards.
    pub fn starts_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: LeafValue::Text(prefix.into()),
            match_kind: MatchKind::StartsWith,
        }
    }

    /// Create a boolean leaf.
    pub fn flag(attribute: impl Into<String>, value: bool) -> Self {
        Self {
            attribute: attribute.into(),
            value: LeafValue::Flag(value),
            match_kind: MatchKind::Equals,
        }
    }
}

/// One top-level term of the compiled query. Terms AND together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// A single leaf predicate.
    Leaf(Leaf),
    /// An OR group of alternatives nested inside the outer AND.
    AnyOf(Vec<Leaf>),
    /// An opaque dialect fragment appended verbatim, never escaped.
    Raw(String),
}

/// Compiled, dialect-independent query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Ordered AND terms.
    pub terms: Vec<Term>,
}

impl Query {
    /// Create an empty query (no constraints).
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the query carries no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Insert a term ahead of the existing ones.
    pub fn prepend(&mut self, term: Term) {
        self.terms.insert(0, term);
    }

    /// Append a term.
    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }
}

/// Classified user text value: the literal to match and how.
///
/// A value without `*` is an exact match. A value with `*` becomes a
/// prefix match on the longest literal run preceding the first marker;
/// anything after that marker is dropped with a warning (prefix matching
/// is the only wildcard construct both dialects share). A value whose
/// literal prefix is empty adds no constraint at all.
fn classify(value: &str) -> Option<(String, MatchKind)> {
    match value.find('*') {
        None => {
            if value.is_empty() {
                None
            } else {
                Some((value.to_string(), MatchKind::Equals))
            }
        }
        Some(pos) => {
            let prefix = &value[..pos];
            let dropped = value[pos..].trim_matches('*');
            if !dropped.is_empty() {
                warn!(value, prefix, "dropping filter text after interior wildcard");
            }
            if prefix.is_empty() {
                warn!(value, "wildcard value has no literal prefix, skipping predicate");
                None
            } else {
                Some((prefix.to_string(), MatchKind::StartsWith))
            }
        }
    }
}

/// Fan a classified value out over the profile's attribute names.
///
/// One attribute yields a plain leaf; several yield an OR group.
fn fan_out(attributes: &[String], value: &str) -> Option<Term> {
    let (literal, match_kind) = classify(value)?;
    let leaves: Vec<Leaf> = attributes
        .iter()
        .map(|attr| Leaf {
            attribute: attr.clone(),
            value: LeafValue::Text(literal.clone()),
            match_kind,
        })
        .collect();

    match leaves.len() {
        0 => None,
        1 => Some(Term::Leaf(leaves.into_iter().next().unwrap())),
        _ => Some(Term::AnyOf(leaves)),
    }
}

/// Maps logical user criteria fields to backend attribute names.
///
/// A field mapped to several attributes compiles to an OR group; a field
/// mapped to none produces no predicate. `member_of` and `enabled` are
/// `None` on backends that cannot filter on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAttributeProfile {
    pub username: Vec<String>,
    pub display_name: Vec<String>,
    pub email: Vec<String>,
    pub department: Vec<String>,
    pub member_of: Option<String>,
    pub enabled: Option<String>,
}

/// Maps logical group criteria fields to backend attribute names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAttributeProfile {
    pub name: Vec<String>,
    pub description: Vec<String>,
}

/// Maps logical computer criteria fields to backend attribute names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerAttributeProfile {
    pub name: Vec<String>,
}

/// Compile user criteria against a backend attribute profile.
pub fn user_query(criteria: &UserCriteria, profile: &UserAttributeProfile) -> Query {
    let mut query = Query::new();

    if let Some(ref value) = criteria.username {
        if let Some(term) = fan_out(&profile.username, value) {
            query.push(term);
        }
    }
    if let Some(ref value) = criteria.display_name {
        if let Some(term) = fan_out(&profile.display_name, value) {
            query.push(term);
        }
    }
    if let Some(ref value) = criteria.email {
        if let Some(term) = fan_out(&profile.email, value) {
            query.push(term);
        }
    }
    if let Some(ref value) = criteria.department {
        if let Some(term) = fan_out(&profile.department, value) {
            query.push(term);
        }
    }

    if !criteria.member_of.is_empty() {
        if let Some(ref attribute) = profile.member_of {
            let leaves: Vec<Leaf> = criteria
                .member_of
                .iter()
                .filter_map(|group| {
                    classify(group).map(|(literal, match_kind)| Leaf {
                        attribute: attribute.clone(),
                        value: LeafValue::Text(literal),
                        match_kind,
                    })
                })
                .collect();
            match leaves.len() {
                0 => {}
                1 => query.push(Term::Leaf(leaves.into_iter().next().unwrap())),
                _ => query.push(Term::AnyOf(leaves)),
            }
        }
    }

    if let Some(enabled) = criteria.enabled {
        if let Some(ref attribute) = profile.enabled {
            query.push(Term::Leaf(Leaf::flag(attribute.clone(), enabled)));
        }
    }

    if let Some(ref raw) = criteria.raw_filter {
        query.push(Term::Raw(raw.clone()));
    }

    query
}

/// Compile group criteria against a backend attribute profile.
pub fn group_query(criteria: &GroupCriteria, profile: &GroupAttributeProfile) -> Query {
    let mut query = Query::new();

    if let Some(ref value) = criteria.name {
        if let Some(term) = fan_out(&profile.name, value) {
            query.push(term);
        }
    }
    if let Some(ref value) = criteria.description {
        if let Some(term) = fan_out(&profile.description, value) {
            query.push(term);
        }
    }
    if let Some(ref raw) = criteria.raw_filter {
        query.push(Term::Raw(raw.clone()));
    }

    query
}

/// Compile computer criteria against a backend attribute profile.
pub fn computer_query(criteria: &ComputerCriteria, profile: &ComputerAttributeProfile) -> Query {
    let mut query = Query::new();

    if let Some(ref value) = criteria.name {
        if let Some(term) = fan_out(&profile.name, value) {
            query.push(term);
        }
    }
    if let Some(ref raw) = criteria.raw_filter {
        query.push(Term::Raw(raw.clone()));
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserAttributeProfile {
        UserAttributeProfile {
            username: vec!["uid".to_string()],
            display_name: vec!["displayName".to_string()],
            email: vec!["mail".to_string()],
            department: vec!["departmentNumber".to_string()],
            member_of: Some("memberOf".to_string()),
            enabled: None,
        }
    }

    fn two_attr_profile() -> UserAttributeProfile {
        UserAttributeProfile {
            username: vec!["mailNickname".to_string(), "userPrincipalName".to_string()],
            display_name: vec!["displayName".to_string()],
            email: vec!["mail".to_string()],
            department: vec!["department".to_string()],
            member_of: None,
            enabled: Some("accountEnabled".to_string()),
        }
    }

    #[test]
    fn test_classify_plain_value() {
        assert_eq!(
            classify("jdoe"),
            Some(("jdoe".to_string(), MatchKind::Equals))
        );
    }

    #[test]
    fn test_classify_trailing_wildcard() {
        assert_eq!(
            classify("Jo*"),
            Some(("Jo".to_string(), MatchKind::StartsWith))
        );
    }

    #[test]
    fn test_classify_interior_wildcard_keeps_prefix() {
        // "J*hn" keeps the literal run before the first marker.
        assert_eq!(
            classify("J*hn"),
            Some(("J".to_string(), MatchKind::StartsWith))
        );
    }

    #[test]
    fn test_classify_multiple_wildcards() {
        assert_eq!(
            classify("Jo*h*n*"),
            Some(("Jo".to_string(), MatchKind::StartsWith))
        );
    }

    #[test]
    fn test_classify_no_literal_prefix_is_no_constraint() {
        assert_eq!(classify("*smith"), None);
        assert_eq!(classify("*"), None);
        assert_eq!(classify("***"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_empty_criteria_compiles_to_empty_query() {
        let query = user_query(&UserCriteria::new(), &profile());
        assert!(query.is_empty());
    }

    #[test]
    fn test_single_attribute_yields_leaf() {
        let criteria = UserCriteria::new().with_username("jdoe");
        let query = user_query(&criteria, &profile());

        assert_eq!(
            query.terms,
            vec![Term::Leaf(Leaf::equals("uid", "jdoe"))]
        );
    }

    #[test]
    fn test_multi_attribute_yields_or_group() {
        let criteria = UserCriteria::new().with_username("jdoe");
        let query = user_query(&criteria, &two_attr_profile());

        assert_eq!(
            query.terms,
            vec![Term::AnyOf(vec![
                Leaf::equals("mailNickname", "jdoe"),
                Leaf::equals("userPrincipalName", "jdoe"),
            ])]
        );
    }

    #[test]
    fn test_wildcard_field_compiles_to_starts_with() {
        let criteria = UserCriteria::new().with_display_name("Jo*");
        let query = user_query(&criteria, &profile());

        assert_eq!(
            query.terms,
            vec![Term::Leaf(Leaf::starts_with("displayName", "Jo"))]
        );
    }

    #[test]
    fn test_member_of_is_or_group() {
        let criteria = UserCriteria::new().member_of("admins").member_of("ops");
        let query = user_query(&criteria, &profile());

        assert_eq!(
            query.terms,
            vec![Term::AnyOf(vec![
                Leaf::equals("memberOf", "admins"),
                Leaf::equals("memberOf", "ops"),
            ])]
        );
    }

    #[test]
    fn test_member_of_unmapped_produces_no_term() {
        let criteria = UserCriteria::new().member_of("admins");
        let query = user_query(&criteria, &two_attr_profile());
        assert!(query.is_empty());
    }

    #[test]
    fn test_enabled_flag_uses_profile_attribute() {
        let criteria = UserCriteria::new().with_enabled(true);

        // Unmapped on this backend: no term.
        assert!(user_query(&criteria, &profile()).is_empty());

        let query = user_query(&criteria, &two_attr_profile());
        assert_eq!(
            query.terms,
            vec![Term::Leaf(Leaf::flag("accountEnabled", true))]
        );
    }

    #[test]
    fn test_raw_filter_appended_last() {
        let criteria = UserCriteria::new()
            .with_username("jdoe")
            .with_raw_filter("(objectCategory=person)");
        let query = user_query(&criteria, &profile());

        assert_eq!(query.terms.len(), 2);
        assert_eq!(
            query.terms[1],
            Term::Raw("(objectCategory=person)".to_string())
        );
    }

    #[test]
    fn test_fields_preserve_declaration_order() {
        let criteria = UserCriteria::new()
            .with_username("a")
            .with_display_name("b")
            .with_email("c")
            .with_department("d");
        let query = user_query(&criteria, &profile());

        let attrs: Vec<&str> = query
            .terms
            .iter()
            .map(|t| match t {
                Term::Leaf(leaf) => leaf.attribute.as_str(),
                _ => panic!("expected leaves"),
            })
            .collect();
        assert_eq!(attrs, vec!["uid", "displayName", "mail", "departmentNumber"]);
    }

    #[test]
    fn test_group_and_computer_queries() {
        let group_profile = GroupAttributeProfile {
            name: vec!["cn".to_string()],
            description: vec!["description".to_string()],
        };
        let query = group_query(&GroupCriteria::new().with_name("eng*"), &group_profile);
        assert_eq!(
            query.terms,
            vec![Term::Leaf(Leaf::starts_with("cn", "eng"))]
        );

        let computer_profile = ComputerAttributeProfile {
            name: vec!["cn".to_string()],
        };
        let query = computer_query(&ComputerCriteria::new().with_name("build-01"), &computer_profile);
        assert_eq!(
            query.terms,
            vec![Term::Leaf(Leaf::equals("cn", "build-01"))]
        );
    }
}
