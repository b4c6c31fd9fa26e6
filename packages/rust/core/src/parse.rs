//! Parsing of untrusted model output.
//!
//! Model responses are free text that usually, but not always, contains a
//! JSON payload. Each candidate test case is validated field by field; a
//! candidate that fails any check is dropped whole and logged.

use serde_json::{Map, Value};
use tracing::warn;

use qagent_shared::{QaAgentError, Result, TestType};

use crate::backend::{DraftBatch, TestCaseDraft};

/// Locate the JSON payload in a model response.
///
/// Tried in order: a ```` ```json ```` fence, a bare ```` ``` ```` fence, the
/// outermost `{...}`, the outermost `[...]`.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    if let Some(inner) = fenced_block(text, "```json") {
        return Some(inner);
    }
    if let Some(inner) = fenced_block(text, "```") {
        let trimmed = inner.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Some(inner);
        }
    }
    outermost(text, '{', '}').or_else(|| outermost(text, '[', ']'))
}

/// Content between `opener` and the next closing fence, trimmed.
fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    // Skip an info string such as "python" on the opening line.
    let body_start = if opener == "```" {
        rest.find('\n').map(|i| i + 1).unwrap_or(0)
    } else {
        0
    };
    let body = &rest[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Remove Markdown code fences around generated source code.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    for opener in ["```python", "```py", "```"] {
        if let Some(start) = trimmed.find(opener) {
            let rest = &trimmed[start + opener.len()..];
            let rest = rest.strip_prefix('\n').unwrap_or(rest);
            let end = rest.find("```").unwrap_or(rest.len());
            return rest[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Parse a model response into validated test-case drafts.
///
/// Fails with a parse error when no JSON payload can be found or decoded.
/// Individual invalid cases only increase [`DraftBatch::discarded`].
pub fn parse_test_cases(text: &str) -> Result<DraftBatch> {
    let payload = extract_json_payload(text)
        .ok_or_else(|| QaAgentError::parse("no JSON payload in model response"))?;

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| QaAgentError::parse(format!("invalid JSON in model response: {e}")))?;

    let candidates = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("test_cases") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(QaAgentError::parse("`test_cases` is not an array")),
            None => vec![Value::Object(obj)],
        },
        _ => return Err(QaAgentError::parse("model response JSON is not an object or array")),
    };

    let mut batch = DraftBatch::default();
    for (i, candidate) in candidates.into_iter().enumerate() {
        match validate_candidate(&candidate) {
            Ok(draft) => batch.drafts.push(draft),
            Err(reason) => {
                let label = candidate_label(&candidate, i);
                warn!(
                    error = %QaAgentError::ungrounded(&label, &reason),
                    "discarding malformed generated test case"
                );
                batch.discarded += 1;
            }
        }
    }
    Ok(batch)
}

fn candidate_label(candidate: &Value, index: usize) -> String {
    candidate
        .get("test_id")
        .or_else(|| candidate.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index + 1))
}

/// Check every required field. Returns the rejection reason on failure.
fn validate_candidate(candidate: &Value) -> std::result::Result<TestCaseDraft, String> {
    let obj = candidate
        .as_object()
        .ok_or_else(|| "test case is not a JSON object".to_string())?;

    let title = required_str(obj, &["feature", "title"])?;
    let scenario = required_str(obj, &["test_scenario", "scenario", "description"])?;
    let expected_result = required_str(obj, &["expected_result", "expected"])?;

    let steps = match first_field(obj, &["steps"]) {
        Some(Value::Array(items)) if !items.is_empty() => {
            let mut steps = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str().map(str::trim) {
                    Some(step) if !step.is_empty() => steps.push(step.to_string()),
                    Some(_) => return Err("steps contain an empty entry".into()),
                    None => return Err("steps contain a non-string entry".into()),
                }
            }
            steps
        }
        Some(Value::Array(_)) => return Err("steps are empty".into()),
        Some(_) => return Err("steps are not an array".into()),
        None => return Err("missing field `steps`".into()),
    };

    let test_type = first_field(obj, &["test_type", "type"])
        .and_then(Value::as_str)
        .map(TestType::parse_lenient)
        .unwrap_or_default();

    let id = first_field(obj, &["test_id", "id"])
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let cited_sources = match first_field(obj, &["grounded_in", "grounding_references", "sources", "source"]) {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Ok(TestCaseDraft {
        id,
        title,
        scenario,
        test_type,
        steps,
        expected_result,
        cited_sources,
    })
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn required_str(obj: &Map<String, Value>, keys: &[&str]) -> std::result::Result<String, String> {
    match first_field(obj, keys) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(format!("field `{}` is empty", keys[0])),
        Some(_) => Err(format!("field `{}` is not a string", keys[0])),
        None => Err(format!("missing field `{}`", keys[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CASE: &str = r#"{
      "test_id": "TC-001",
      "feature": "Discount Code",
      "test_scenario": "Apply valid discount code SAVE15",
      "test_type": "positive",
      "steps": ["Enter 'SAVE15' in the discount field", "Click Apply"],
      "expected_result": "Total price is reduced by 15%",
      "grounded_in": "product_specs.md"
    }"#;

    #[test]
    fn json_fence_is_preferred() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks {not json}";
        assert_eq!(extract_json_payload(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn bare_fence_is_accepted() {
        let text = "```\n[1, 2]\n```";
        assert_eq!(extract_json_payload(text), Some("[1, 2]"));
    }

    #[test]
    fn unfenced_object_is_found() {
        let text = "Sure! {\"test_cases\": []} Hope this helps.";
        assert_eq!(extract_json_payload(text), Some("{\"test_cases\": []}"));
    }

    #[test]
    fn no_payload() {
        assert_eq!(extract_json_payload("I cannot help with that."), None);
        assert!(parse_test_cases("I cannot help with that.").is_err());
    }

    #[test]
    fn parses_fenced_test_cases() {
        let text = format!("```json\n{{\"test_cases\": [{VALID_CASE}]}}\n```");
        let batch = parse_test_cases(&text).unwrap();
        assert_eq!(batch.discarded, 0);
        assert_eq!(batch.drafts.len(), 1);

        let draft = &batch.drafts[0];
        assert_eq!(draft.id.as_deref(), Some("TC-001"));
        assert_eq!(draft.title, "Discount Code");
        assert_eq!(draft.test_type, TestType::Positive);
        assert_eq!(draft.steps.len(), 2);
        assert_eq!(draft.cited_sources, vec!["product_specs.md"]);
    }

    #[test]
    fn invalid_cases_are_discarded_whole() {
        let text = format!(
            r#"{{"test_cases": [
                {VALID_CASE},
                {{"feature": "Shipping", "test_scenario": "Express", "steps": [], "expected_result": "$10"}},
                {{"feature": "Shipping", "test_scenario": "Express", "steps": ["ok", 3], "expected_result": "$10"}},
                {{"feature": "Shipping", "steps": ["Pick express"], "expected_result": "$10"}},
                "just a string"
            ]}}"#
        );
        let batch = parse_test_cases(&text).unwrap();
        assert_eq!(batch.drafts.len(), 1);
        assert_eq!(batch.discarded, 4);
    }

    #[test]
    fn bare_array_and_single_object() {
        let batch = parse_test_cases(&format!("[{VALID_CASE}]")).unwrap();
        assert_eq!(batch.drafts.len(), 1);

        let batch = parse_test_cases(VALID_CASE).unwrap();
        assert_eq!(batch.drafts.len(), 1);
    }

    #[test]
    fn sources_as_array_and_negative_type() {
        let text = r#"[{"title": "Email", "scenario": "Invalid email", "test_type": "Negative",
            "steps": ["Type bad email"], "expected_result": "Error shown",
            "grounded_in": ["ui_ux_guide.txt", "api_endpoints.json"]}]"#;
        let draft = &parse_test_cases(text).unwrap().drafts[0];
        assert_eq!(draft.test_type, TestType::Negative);
        assert_eq!(draft.cited_sources.len(), 2);
        assert!(draft.id.is_none());
    }

    #[test]
    fn strip_fences_from_script() {
        let text = "Here is the script:\n```python\nfrom selenium import webdriver\nprint('x')\n```\nGood luck";
        assert_eq!(strip_code_fences(text), "from selenium import webdriver\nprint('x')");
        assert_eq!(strip_code_fences("  import os  "), "import os");
    }
}
