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

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Lowercase one character at a time.
///
/// Unlike `str::to_lowercase` the mapping ignores context, so substrings stay
/// substrings after folding.
pub fn fold_case(value: &str) -> String {
    value.chars().flat_map(char::to_lowercase).collect()
}

/// Lowercase a name into `[a-z0-9-]` runs, collapsing everything else to `-`.
pub fn sanitize_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}

/// File extension of a user-supplied file name, sanitized, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.trim().rsplit_once('.')?;
    let ext = sanitize_token(ext);
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
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
            normalize_text_option(Some(" Upper Cabinet ".to_string())),
            Some("Upper Cabinet".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.supabase.co"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn file_extension_is_sanitized() {
        assert_eq!(file_extension("Photo.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("no-extension"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn fold_case_keeps_prefixes_as_prefixes() {
        assert_eq!(fold_case("ΑΣ"), "ασ");
        assert!(fold_case("ΑΣΑ").starts_with(&fold_case("ΑΣ")));
        assert_eq!(fold_case("Upper Cabinet"), "upper cabinet");
    }

    #[test]
    fn sanitize_token_collapses_separators() {
        assert_eq!(sanitize_token(" My Photo (1) "), "my-photo-1");
    }
}
