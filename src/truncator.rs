/// Appended whenever text is cut. Counts toward the limit.
pub const TRUNCATION_MARKER: &str = "...";

/// Bounds `text` to at most `max_chars` characters.
///
/// Text already within the limit is returned unchanged. Otherwise the text is
/// cut on a char boundary, trailing whitespace is dropped and
/// [`TRUNCATION_MARKER`] is appended, so the result is never longer than
/// `max_chars`. Applying it twice gives the same result as applying it once.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return TRUNCATION_MARKER.chars().take(max_chars).collect();
    }

    let keep = max_chars - marker_len;
    let cut = text
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let mut truncated = text[..cut].trim_end().to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_long_text_ends_with_marker() {
        let text = "a".repeat(5000);
        let out = truncate(&text, 2500);
        assert_eq!(out.chars().count(), 2500);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_trailing_whitespace_dropped_before_marker() {
        assert_eq!(truncate("hello     world", 9), "hello...");
    }

    #[test]
    fn test_cuts_on_char_boundary() {
        let text = "héllo wörld ünïcödé";
        let out = truncate(text, 8);
        assert_eq!(out, "héllo...");
        assert!(out.chars().count() <= 8);
    }

    #[test]
    fn test_tiny_limits() {
        assert_eq!(truncate("abcdef", 3), "...");
        assert_eq!(truncate("abcdef", 2), "..");
        assert_eq!(truncate("abcdef", 0), "");
    }

    #[test]
    fn test_idempotent() {
        let text = "word ".repeat(1000);
        let once = truncate(&text, 100);
        assert_eq!(truncate(&once, 100), once);
    }
}
