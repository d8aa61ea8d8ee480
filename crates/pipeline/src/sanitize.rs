//! Query sanitization
//!
//! The only stage allowed to reject a request. Trims, truncates to the
//! configured ceiling, and strips control and markup characters; a query
//! that is empty afterwards fails fast with `InvalidQuery`.

use localfind_core::{Error, Result};

/// Sanitize a raw query string.
pub fn sanitize_query(raw: &str, max_chars: usize) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidQuery("query is empty".to_string()));
    }

    let mut cleaned = String::with_capacity(trimmed.len().min(max_chars));
    let mut in_markup = false;
    for c in trimmed.chars() {
        match c {
            '<' => in_markup = true,
            '>' => in_markup = false,
            _ if in_markup => {}
            _ if c.is_control() => {}
            _ => cleaned.push(c),
        }
        if cleaned.chars().count() >= max_chars {
            break;
        }
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(Error::InvalidQuery(
            "query is empty after sanitization".to_string(),
        ));
    }
    Ok(collapsed)
}

/// Normalize a sanitized query for matching and cache keys.
pub fn normalize_query(sanitized: &str) -> String {
    sanitized.to_lowercase()
}

/// Phrases that mark a user-centric radius search.
const NEAR_ME_PHRASES: &[&str] = &[
    "near me",
    "nearby",
    "around me",
    "close by",
    "close to me",
    "walking distance",
];

/// Whether the phrasing indicates a user-centric search rather than a
/// city-scoped one.
pub fn is_near_me_query(normalized_query: &str) -> bool {
    NEAR_ME_PHRASES
        .iter()
        .any(|phrase| normalized_query.contains(phrase))
}
