//! OData `$filter` emitter
//!
//! Renders the dialect-independent predicate structure into Graph's OData
//! filter syntax. Escaping in this dialect is quote doubling only; boolean
//! predicates render as unquoted lowercase literals.

use dirgate_core::query::{Leaf, LeafValue, MatchKind, Query, Term};

/// Escape a text value for an OData string literal.
pub fn escape_value(value: &str) -> String {
    value.replace('\'', "''")
}

fn render_leaf(leaf: &Leaf) -> String {
    match (&leaf.value, leaf.match_kind) {
        (LeafValue::Text(text), MatchKind::Equals) => {
            format!("{} eq '{}'", leaf.attribute, escape_value(text))
        }
        (LeafValue::Text(text), MatchKind::StartsWith) => {
            format!("startsWith({}, '{}')", leaf.attribute, escape_value(text))
        }
        (LeafValue::Flag(flag), _) => format!("{} eq {}", leaf.attribute, flag),
    }
}

fn render_term(term: &Term) -> String {
    match term {
        Term::Leaf(leaf) => render_leaf(leaf),
        Term::AnyOf(alternatives) => {
            let rendered: Vec<String> = alternatives.iter().map(render_leaf).collect();
            format!("({})", rendered.join(" or "))
        }
        // Caller-supplied fragment; not escaped, not validated.
        Term::Raw(raw) => raw.clone(),
    }
}

/// Render a compiled query as a `$filter` expression.
///
/// An empty query renders to `None`: Graph scopes the entity type by
/// resource path, so no base predicate is needed.
pub fn render(query: &Query) -> Option<String> {
    if query.is_empty() {
        return None;
    }

    let rendered: Vec<String> = query.terms.iter().map(render_term).collect();
    Some(rendered.join(" and "))
}
