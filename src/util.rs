//! Shared helpers for parsing model replies.

/// Extract a JSON object from a model reply that may contain other content.
///
/// Looks for a ```` ```json ```` fence first, then any fenced block holding a
/// brace, then falls back to brace-counting over the raw text.
pub fn extract_json(reply: &str) -> Option<String> {
    if let Some(start) = reply.find("```json") {
        let after_marker = &reply[start + 7..];
        if let Some(end) = after_marker.find("```") {
            return Some(after_marker[..end].trim().to_string());
        }
    }

    if let Some(start) = reply.find("```") {
        let after_marker = &reply[start + 3..];
        if let Some(end) = after_marker.find("```")
            && let Some(json_start) = after_marker[..end].find('{')
        {
            return Some(after_marker[json_start..end].trim().to_string());
        }
    }

    extract_json_object(reply)
}

/// Extract the outermost JSON object from text by brace counting.
///
/// Braces inside string literals are skipped so quoted contract text such as
/// `"see clause {3}"` does not end the object early.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }

    None
}
