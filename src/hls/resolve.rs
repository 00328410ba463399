//! Textual URL resolution for playlist references.
//!
//! Resolution never parses scheme, host or path. The base is the prefix up to
//! the last `/` and references are appended to it verbatim, without collapsing
//! `.` or `..` segments. A query string containing `/` therefore shifts the
//! base into the query; that is accepted behaviour.

/// Directory-like prefix of `url`, used to resolve sibling references.
///
/// Everything up to and including the last `/`. When `url` has no `/` at all,
/// a trailing `/` is appended instead.
pub fn resolve_base(url: &str) -> String {
    match url.rfind('/') {
        Some(idx) => url[..=idx].to_string(),
        None => format!("{url}/"),
    }
}

/// Whether `reference` already carries an `http://` or `https://` scheme.
pub fn is_absolute(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Absolute URL for a reference found in a document whose base is `base`.
pub fn resolve_reference(reference: &str, base: &str) -> String {
    if is_absolute(reference) {
        reference.to_string()
    } else {
        format!("{base}{reference}")
    }
}
