//! Helpers for cleaning up model replies.

/// Strips a surrounding markdown code fence from a model reply.
///
/// Handles both ```` ```json ```` and bare ```` ``` ```` fences. Text without a
/// fence is returned trimmed. An unterminated fence yields everything after
/// the opening marker.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let (marker, offset) = match trimmed.find("```json") {
        Some(pos) => (pos, 7),
        None => match trimmed.find("```") {
            Some(pos) => (pos, 3),
            None => return trimmed,
        },
    };
    let start = marker + offset;
    let end = match trimmed.rfind("```") {
        Some(end) if end >= start => end,
        _ => trimmed.len(),
    };
    trimmed[start..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let reply = "Here you go:\n```json\n[{\"a\": 1}]\n```\nDone.";
        assert_eq!(strip_code_fences(reply), "[{\"a\": 1}]");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
    }

    #[test]
    fn test_unfenced_and_unterminated() {
        assert_eq!(strip_code_fences("  [1, 2] \n"), "[1, 2]");
        assert_eq!(strip_code_fences("```json\n[1, 2]"), "[1, 2]");
    }
}
