//! RFC 4515 filter emitter
//!
//! Renders the dialect-independent predicate structure into LDAP filter
//! text. Three escapers live here and must stay distinct:
//!
//! - [`escape_filter_value`] for exact-match filter values (escapes `*`),
//! - [`escape_filter_prefix`] for prefix-match values, where the trailing
//!   `*` appended by the emitter is the deliberate match-any token,
//! - [`escape_dn_value`] (RFC 4514) for composing bind DNs, never filters.

use dirgate_core::query::{Leaf, LeafValue, MatchKind, Query, Term};

/// Escape a value for an exact-match filter assertion (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Escape a prefix-match literal, leaving `*` alone.
///
/// The compiler strips wildcard markers before emission, so the literal
/// normally contains none; any that remain are intentional match-any
/// tokens and must not become `\2a`.
pub fn escape_filter_prefix(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Escape an attribute value for DN composition (RFC 4514).
///
/// Used only when building bind DNs. DN escaping and filter escaping have
/// different character sets; using one where the other belongs is an
/// injection bug.
pub fn escape_dn_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let char_count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i == char_count - 1;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

/// Compose one RDN ahead of a parent DN, escaping the value.
pub fn compose_dn(attribute: &str, value: &str, parent: &str) -> String {
    format!("{}={},{}", attribute, escape_dn_value(value), parent)
}

fn render_leaf(leaf: &Leaf) -> String {
    match (&leaf.value, leaf.match_kind) {
        (LeafValue::Text(text), MatchKind::Equals) => {
            format!("({}={})", leaf.attribute, escape_filter_value(text))
        }
        // The trailing wildcard goes on after escaping and is never
        // escaped itself.
        (LeafValue::Text(text), MatchKind::StartsWith) => {
            format!("({}={}*)", leaf.attribute, escape_filter_prefix(text))
        }
        (LeafValue::Flag(flag), _) => {
            format!("({}={})", leaf.attribute, if *flag { "TRUE" } else { "FALSE" })
        }
    }
}

fn render_term(term: &Term) -> String {
    match term {
        Term::Leaf(leaf) => render_leaf(leaf),
        Term::AnyOf(alternatives) => {
            let rendered: String = alternatives.iter().map(render_leaf).collect();
            format!("(|{})", rendered)
        }
        // Caller-supplied fragment; not escaped, not validated.
        Term::Raw(raw) => raw.clone(),
    }
}

/// Render a compiled query wrapped in an outer AND.
///
/// RFC 4515 filters nest via parentheses, so AND terms concatenate with no
/// separator. An empty query renders the match-everything presence filter.
pub fn render(query: &Query) -> String {
    if query.is_empty() {
        return "(objectClass=*)".to_string();
    }

    let rendered: String = query.terms.iter().map(render_term).collect();
    format!("(&{})", rendered)
}
