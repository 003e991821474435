//! Best-effort JSON recovery from model output.
//!
//! Models wrap JSON in prose often enough that "no JSON here" is an expected
//! outcome, not an exceptional one — hence `Option` everywhere, never `Err`.

use serde_json::Value;

/// Return the first balanced `{...}` substring, tolerating surrounding
/// commentary. Brace-depth scan: the first `{` opens the candidate, and the
/// substring closes once depth returns to zero.
pub fn extract_json_object(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    for (i, ch) in trimmed.char_indices() {
        match ch {
            '{' => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if start.is_some() {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(&trimmed[start?..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and parse in one step; any failure is `None`.
pub fn parse_json_lenient(value: &str) -> Option<Value> {
    let json = extract_json_object(value)?;
    serde_json::from_str(json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_passes_through() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn surrounding_prose_is_stripped() {
        let input = "Sure! Here is the JSON you asked for:\n{\"tasks\": []}\nHope that helps.";
        assert_eq!(extract_json_object(input), Some("{\"tasks\": []}"));
    }

    #[test]
    fn nested_braces_balance() {
        let input = "x {\"a\": {\"b\": {}}} y";
        assert_eq!(extract_json_object(input), Some("{\"a\": {\"b\": {}}}"));
    }

    #[test]
    fn unbalanced_input_is_none() {
        assert!(extract_json_object("{\"a\": 1").is_none());
        assert!(extract_json_object("no braces at all").is_none());
        assert!(extract_json_object("").is_none());
        assert!(extract_json_object("   ").is_none());
    }

    #[test]
    fn lenient_parse_swallows_bad_json() {
        assert!(parse_json_lenient("{not valid json}").is_none());
        let v = parse_json_lenient("prefix {\"tasks\": [1]} suffix").unwrap();
        assert_eq!(v["tasks"][0], 1);
    }
}
