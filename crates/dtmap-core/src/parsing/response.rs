use crate::error::DtmapError;
use serde::de::DeserializeOwned;

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````).
///
/// Only a fence opening the reply is recognised; the first line is dropped
/// and so is a closing fence on the last line.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed.trim_matches('`').trim(),
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Extract the first balanced `{...}` span from free text.
///
/// Braces inside JSON strings are ignored. If the braces never balance, the
/// span from the first `{` to the last `}` is returned; text with no object at
/// all comes back unchanged so the JSON parser reports the error.
pub fn extract_json_object(text: &str) -> &str {
    let Some(start) = text.find('{') else {
        return text;
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &text[start..start + offset + 1];
                }
            }
            _ => {}
        }
    }

    match text.rfind('}') {
        Some(end) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Parse an oracle reply into `T` after fence stripping and object extraction.
pub fn parse_oracle_json<T: DeserializeOwned>(reply: &str) -> Result<T, DtmapError> {
    let cleaned = extract_json_object(strip_code_fences(reply));
    serde_json::from_str(cleaned).map_err(|e| DtmapError::OracleShape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct CategoryReply {
        category: String,
    }

    #[test]
    fn test_strip_json_fence() {
        let reply = "```json\n{\"category\": \"respiratory\"}\n```";
        assert_eq!(strip_code_fences(reply), "{\"category\": \"respiratory\"}");
    }

    #[test]
    fn test_strip_bare_fence() {
        let reply = "  ```\n{\"a\": 1}\n```  ";
        assert_eq!(strip_code_fences(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_unfenced_text_is_trimmed_only() {
        assert_eq!(strip_code_fences("  {\"a\": 1} \n"), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_first_balanced_object() {
        let text = "Sure! {\"a\": {\"b\": 1}} and also {\"c\": 2}";
        assert_eq!(extract_json_object(text), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let text = "prefix {\"rep\": \"a } b\", \"x\": \"q\\\"}\"} suffix";
        assert_eq!(extract_json_object(text), "{\"rep\": \"a } b\", \"x\": \"q\\\"}\"}");
    }

    #[test]
    fn test_extract_unbalanced_falls_back_to_last_brace() {
        let text = "{\"a\": {\"b\": 1}";
        assert_eq!(extract_json_object(text), "{\"a\": {\"b\": 1}");
    }

    #[test]
    fn test_extract_without_object_returns_input() {
        assert_eq!(extract_json_object("no json here"), "no json here");
    }

    #[test]
    fn test_parse_wrapped_reply() {
        let reply = "```json\nHere you go: {\"category\": \"ENT\"} hope it helps\n```";
        let parsed: CategoryReply = parse_oracle_json(reply).unwrap();
        assert_eq!(parsed.category, "ENT");
    }

    #[test]
    fn test_parse_garbage_is_shape_error() {
        let err = parse_oracle_json::<CategoryReply>("not json at all").unwrap_err();
        assert!(matches!(err, DtmapError::OracleShape(_)));
    }
}
