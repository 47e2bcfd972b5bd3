/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Short form of an HTTP body for log lines. Error bodies can echo the
/// request, which carries the whole base64 image.
pub fn body_preview(body: &str, max_bytes: usize) -> String {
    let head = truncate_to_char_boundary(body, max_bytes);
    if head.len() == body.len() {
        head.to_string()
    } else {
        format!("{head}...({} bytes)", body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn short_body_is_returned_whole() {
        assert_eq!(body_preview("not found", 64), "not found");
    }

    #[test]
    fn long_body_is_cut_and_sized() {
        let body = "x".repeat(100);
        assert_eq!(body_preview(&body, 4), "xxxx...(100 bytes)");
    }
}
