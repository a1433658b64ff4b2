//! Shared helpers for collaborator payloads and artifact bookkeeping.

use sha2::{Digest, Sha256};

/// Marker appended to input that was cut to fit a character budget.
pub const TRUNCATION_MARKER: &str = "… [truncated]";

/// Extract the outermost JSON object from text that may wrap it in prose or
/// a fenced code block.
///
/// Braces inside JSON strings are ignored, so `{"a": "}"}` is returned whole.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Strip a surrounding markdown code fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "markdown") on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim_matches('\n')
}

/// Truncate `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// First 12 hex characters of the SHA-256 of `content`.
pub fn short_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_with_prose() {
        let text = r#"Sure! Here it is: {"intent": "directive"} hope that helps"#;
        assert_eq!(extract_json_object(text), Some(r#"{"intent": "directive"}"#));
    }

    #[test]
    fn test_extract_json_object_nested() {
        let text = r#"{"action": {"action": "stop"}}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_json_object_ignores_braces_in_strings() {
        let text = r#"{"content": "use } and { freely", "x": 1} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"content": "use } and { freely", "x": 1}"#)
        );
    }

    #[test]
    fn test_extract_json_object_unclosed() {
        assert_eq!(extract_json_object(r#"{"key": "value""#), None);
        assert_eq!(extract_json_object("no json"), None);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```markdown\n# Title\nBody\n```"), "# Title\nBody");
        assert_eq!(strip_code_fence("plain text"), "plain text");
    }

    #[test]
    fn test_truncate_chars_appends_marker() {
        assert_eq!(truncate_chars("abcdef", 3), format!("abc{}", TRUNCATION_MARKER));
        assert_eq!(truncate_chars("abc", 3), "abc");
        // multi-byte characters are never split
        assert_eq!(truncate_chars("ééé", 2), format!("éé{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_short_digest_is_stable() {
        assert_eq!(short_digest("phase"), short_digest("phase"));
        assert_eq!(short_digest("phase").len(), 12);
        assert_ne!(short_digest("a"), short_digest("b"));
    }
}
