// JSON extraction from raw model output
//
// Models are asked to emit strictly one JSON object but routinely wrap it
// in prose. The scanner below finds the first `{` and walks forward with a
// depth counter (string literals and escapes respected) until the object
// closes, then parses exactly that slice.
//
// Failure modes: no `{` anywhere, the braces never balance (truncated
// output), or the balanced slice is not valid JSON.

use serde_json::Value;

use super::error::InferenceError;

/// Extract the first balanced JSON object from `text`.
pub fn extract_json(text: &str) -> Result<Value, InferenceError> {
    let start = text
        .find('{')
        .ok_or_else(|| InferenceError::Parse("no '{' found".to_string()))?;

    let slice = balanced_object(&text[start..])
        .ok_or_else(|| InferenceError::Parse("braces never balance".to_string()))?;

    let value: Value =
        serde_json::from_str(slice).map_err(|e| InferenceError::Parse(e.to_string()))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(InferenceError::Parse(
            "extracted value is not an object".to_string(),
        ))
    }
}

/// Return the shortest prefix of `s` that is a brace-balanced object.
/// `s` must start at a `{`.
fn balanced_object(s: &str) -> Option<&str> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
