//! Identity-key normalization
//!
//! Two strings name the same thing when they are equal after lowercasing
//! and collapsing every whitespace run to a single space.

/// Normalize a free-text value for identity comparison.
///
/// ```
/// use dossier_common::normalize::normalize_key;
/// assert_eq!(normalize_key("  Senior\tRust   Engineer "), "senior rust engineer");
/// ```
pub fn normalize_key(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for word in value.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Normalize an optional value; absent values normalize to the empty string.
pub fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize_key).unwrap_or_default()
}

/// Case- and whitespace-insensitive equality.
pub fn same_key(a: &str, b: &str) -> bool {
    normalize_key(a) == normalize_key(b)
}

/// Trim a value and collapse internal whitespace runs, keeping case.
///
/// Used to tidy display strings without altering their spelling.
pub fn tidy(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
