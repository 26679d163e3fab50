//! Envelope handling: artifact stripping, layered parsing, payload lookup.

use placescout_core::WireLayout;
use serde_json::Value;

/// Remove one trailing inert marker and one leading guard prefix.
pub(crate) fn strip_artifacts<'a>(text: &'a str, layout: &WireLayout) -> &'a str {
    let mut cleaned = text.trim();
    if !layout.trailing_marker.is_empty() {
        if let Some(rest) = cleaned.strip_suffix(layout.trailing_marker.as_str()) {
            cleaned = rest.trim_end();
        }
    }
    if !layout.guard_prefix.is_empty() {
        if let Some(rest) = cleaned.strip_prefix(layout.guard_prefix.as_str()) {
            cleaned = rest.trim_start();
        }
    }
    cleaned
}

/// Parse the cleaned body into a generic tree.
///
/// Tries, in order: the cleaned text, the text stripped a second time, and
/// the text read as the escaped content of a JSON string. The error carries
/// the first parser message.
pub(crate) fn parse_tree(cleaned: &str, layout: &WireLayout) -> Result<Value, String> {
    let first = match serde_json::from_str::<Value>(cleaned) {
        Ok(tree) => return Ok(tree),
        Err(e) => e.to_string(),
    };

    let restripped = strip_artifacts(cleaned, layout);
    if let Ok(tree) = serde_json::from_str::<Value>(restripped) {
        tracing::trace!("parsed body after second strip");
        return Ok(tree);
    }

    if let Ok(inner) = serde_json::from_str::<String>(&format!("\"{restripped}\"")) {
        if let Ok(tree) = serde_json::from_str::<Value>(strip_artifacts(&inner, layout)) {
            tracing::trace!("parsed body as string-encoded document");
            return Ok(tree);
        }
    }

    Err(first)
}

/// Find the payload inside the parsed tree.
///
/// A wrapper object holding a string-encoded document under
/// `layout.wrapper_field` is unwrapped; a bare string is decoded the same
/// way; anything else is the payload itself.
pub(crate) fn locate_payload(tree: Value, layout: &WireLayout) -> Result<Value, String> {
    match tree {
        Value::Object(mut map) => match map.remove(&layout.wrapper_field) {
            Some(Value::String(inner)) => parse_inner(&inner, layout),
            Some(other) => {
                map.insert(layout.wrapper_field.clone(), other);
                Ok(Value::Object(map))
            }
            None => Ok(Value::Object(map)),
        },
        Value::String(inner) => parse_inner(&inner, layout),
        other => Ok(other),
    }
}

fn parse_inner(inner: &str, layout: &WireLayout) -> Result<Value, String> {
    let cleaned = strip_artifacts(inner, layout);
    let first = match serde_json::from_str::<Value>(cleaned) {
        Ok(payload) => return Ok(payload),
        Err(e) => e.to_string(),
    };

    // Guard variants we don't know about: skip to the first structural byte.
    let Some(start) = cleaned.find(['[', '{']) else {
        return Err(first);
    };
    serde_json::from_str::<Value>(strip_artifacts(&cleaned[start..], layout))
        .map_err(|_| first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout() -> WireLayout {
        WireLayout::default()
    }

    #[test]
    fn test_strip_guard_and_marker() {
        let text = ")]}'\n[1,2,3]/*\"\"*/";
        assert_eq!(strip_artifacts(text, &layout()), "[1,2,3]");
    }

    #[test]
    fn test_strip_leaves_plain_json() {
        assert_eq!(strip_artifacts("  {\"a\":1}  ", &layout()), "{\"a\":1}");
    }

    #[test]
    fn test_parse_retries_after_second_strip() {
        // doubled guard: the first pass only removes the outer one
        let text = ")]}'\n)]}'\n[1]";
        let cleaned = strip_artifacts(text, &layout());
        let tree = parse_tree(cleaned, &layout()).expect("second strip parses");
        assert_eq!(tree, json!([1]));
    }

    #[test]
    fn test_parse_string_encoded_document() {
        let text = "\")]}'\\n[1,[2]]\"";
        let tree = parse_tree(text, &layout()).expect("string-encoded document parses");
        // a JSON string is itself valid JSON, so the first attempt yields the string
        let payload = locate_payload(tree, &layout()).expect("payload located");
        assert_eq!(payload, json!([1, [2]]));
    }

    #[test]
    fn test_parse_escaped_document() {
        let text = r#"[\"a\",1]"#;
        let tree = parse_tree(text, &layout()).expect("escaped document parses");
        assert_eq!(tree, json!(["a", 1]));
    }

    #[test]
    fn test_parse_reports_first_error() {
        let err = parse_tree("{not json", &layout()).expect_err("garbage rejected");
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_locate_wrapped_payload() {
        let tree = json!({"c": 0, "d": ")]}'\n[[\"q\"],null]"});
        let payload = locate_payload(tree, &layout()).expect("payload located");
        assert_eq!(payload, json!([["q"], null]));
    }

    #[test]
    fn test_locate_without_wrapper() {
        let tree = json!([[null, 1]]);
        let payload = locate_payload(tree.clone(), &layout()).expect("payload located");
        assert_eq!(payload, tree);
    }

    #[test]
    fn test_locate_unknown_guard_inside_wrapper() {
        let tree = json!({"d": "while(1);\n[7]"});
        let payload = locate_payload(tree, &layout()).expect("manual strip recovers");
        assert_eq!(payload, json!([7]));
    }

    #[test]
    fn test_locate_broken_inner_document() {
        let tree = json!({"d": ")]}'\n[1,"});
        assert!(locate_payload(tree, &layout()).is_err());
    }
}
