//! Repairs truncated or malformed JSON emitted by the remote text advisor.
//!
//! Grounded in `original_source/services/llm_client.py`'s `_repair_json`:
//! find the first object, balance unmatched brackets, and strip trailing
//! partial tokens rather than rejecting outright.

/// Attempts to extract a well-formed JSON object from raw advisor text.
/// Returns `None` if no plausible object boundary can be found.
pub fn repair_json(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;
    let mut end = None;

    for (i, c) in raw[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + i + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    if let Some(e) = end {
        return Some(raw[start..e].to_string());
    }

    // Truncated mid-object: close a dangling string, strip a trailing
    // partial key/value, then balance unmatched braces.
    let mut buf = raw[start..].trim_end().to_string();
    if in_string {
        buf.push('"');
    }
    while buf.ends_with(',') || buf.ends_with(':') {
        buf.pop();
    }
    let opens = buf.matches('{').count();
    let closes = buf.matches('}').count();
    if opens > closes {
        buf.push_str(&"}".repeat(opens - closes));
        Some(buf)
    } else {
        None
    }
}
