//! # Utilities

/// Normalize a protocol or schema URL: trim a trailing slash so that
/// `https://example.com/proto/` and `https://example.com/proto` compare
/// equal everywhere a protocol/schema URI is matched.
pub(crate) fn clean_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
