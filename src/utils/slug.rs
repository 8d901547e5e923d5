//! URL helpers for tag and search links.

/// Normalize a tag into its URI segment.
///
/// Runs of characters other than letters, digits and `-` collapse into one
/// `_`, leading and trailing `_` are dropped and the result is lowercased.
///
/// ```ignore
/// normalize_tag_uri("Multi Word Tag") // → "multi_word_tag"
/// normalize_tag_uri("🚴 Multi Tag")   // → "multi_tag"
/// ```
pub fn normalize_tag_uri(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut pending_sep = false;

    for c in tag.chars() {
        if c.is_alphanumeric() || c == '-' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    out
}

/// Site-relative URI of a tag listing.
pub fn tag_uri(tag: &str) -> String {
    format!("/tags/{}/", normalize_tag_uri(tag))
}

/// Site-relative URI of the search page pre-filled with `terms`.
///
/// Terms are lowercased and query-escaped with spaces as `%20`.
pub fn search_uri(terms: &str) -> String {
    let terms = terms.trim().to_lowercase();
    format!("/search.html?q={}", urlencoding::encode(&terms))
}
