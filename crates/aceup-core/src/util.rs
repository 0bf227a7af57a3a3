//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Next modification timestamp: wall clock, but always past `previous`.
pub fn next_timestamp(previous: i64) -> i64 {
    now_millis().max(previous.saturating_add(1))
}

/// Percent-encode a user id for use inside a file name.
///
/// Distinct ids always map to distinct segments, and no segment contains a
/// path separator.
pub fn encode_key_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn next_timestamp_is_strictly_increasing() {
        let far_future = now_millis() + 60_000;
        assert_eq!(next_timestamp(far_future), far_future + 1);
        assert!(next_timestamp(0) > 0);
    }

    #[test]
    fn encode_key_segment_hides_path_characters() {
        assert_eq!(encode_key_segment("user/../x"), "user%2F..%2Fx");
        assert_eq!(encode_key_segment("abc-123_Z"), "abc-123_Z");
        assert_eq!(encode_key_segment("a\\b"), "a%5Cb");
    }
}
