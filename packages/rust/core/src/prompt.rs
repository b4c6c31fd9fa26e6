//! Prompt construction for the LLM backend.

use qagent_shared::{RetrievedChunk, TestCase};

pub const TEST_CASE_SYSTEM_PROMPT: &str =
    "You are a QA expert who generates test cases based strictly on provided documentation.";

pub const SCRIPT_SYSTEM_PROMPT: &str = "You are an expert Selenium automation engineer. \
     Generate clean, executable Python code with proper selectors and waits.";

/// Retrieved chunks rendered as `Source: <name>` blocks separated by blank lines.
pub fn render_context(retrieved: &[RetrievedChunk]) -> String {
    retrieved
        .iter()
        .map(|r| format!("Source: {}\n{}", r.chunk.source_document, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Grounding prompt for test-case generation.
pub fn test_case_prompt(query: &str, retrieved: &[RetrievedChunk]) -> String {
    let context = render_context(retrieved);
    format!(
        r#"You are a QA expert. Based on the following documentation, generate comprehensive test cases.

Documentation Context:
{context}

User Query: {query}

Generate test cases in the following JSON format:
{{
  "test_cases": [
    {{
      "test_id": "TC-001",
      "feature": "Feature Name",
      "test_scenario": "Description of test scenario",
      "test_type": "positive|negative",
      "steps": ["step1", "step2", "step3"],
      "expected_result": "Expected outcome",
      "grounded_in": "source_document_name"
    }}
  ]
}}

Only generate test cases that are supported by the documentation above. Do not invent features.
Set "grounded_in" to the Source name of the documentation each test case is based on.
Respond with the JSON only."#
    )
}

/// Prompt for script synthesis.
///
/// `html_snippet` is already truncated by the caller. `context` may be empty.
pub fn script_prompt(case_json: &str, html_snippet: &str, context: &[RetrievedChunk]) -> String {
    let docs = if context.is_empty() {
        String::new()
    } else {
        format!("\nRelevant Documentation:\n{}\n", render_context(context))
    };

    format!(
        r#"Generate a complete, executable Selenium Python script for the following test case.

Test Case:
{case_json}

HTML Structure:
{html_snippet}
{docs}
Requirements:
1. Use appropriate selectors (ID, name, CSS selectors) that exist in the HTML above
2. Use explicit waits (WebDriverWait) for dynamic elements
3. Include proper setup and teardown
4. Add error handling
5. Make the script runnable as-is
6. Use clear variable names and comments
7. Include all necessary imports

Generate ONLY the Python code, no explanations."#
    )
}

/// Test case serialized for inclusion in a prompt.
pub fn case_json(case: &TestCase) -> String {
    serde_json::to_string_pretty(case).unwrap_or_else(|_| format!("{case:?}"))
}

/// First `max_chars` characters of `html`.
pub fn html_snippet(html: &str, max_chars: usize) -> String {
    html.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qagent_shared::{Chunk, DocumentKind};
    use std::collections::BTreeSet;

    fn retrieved(source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: "id".into(),
                text: text.into(),
                source_document: source.into(),
                offset: 0,
                chunk_index: 0,
                document_kind: DocumentKind::SupportDoc,
                embedding: vec![1.0],
            },
            score: 0.9,
        }
    }

    #[test]
    fn context_blocks_carry_source_names() {
        let ctx = render_context(&[
            retrieved("product_specs.md", "SAVE15 gives 15% off."),
            retrieved("ui_ux_guide.txt", "Errors are shown in red."),
        ]);
        assert_eq!(
            ctx,
            "Source: product_specs.md\nSAVE15 gives 15% off.\n\nSource: ui_ux_guide.txt\nErrors are shown in red."
        );
    }

    #[test]
    fn test_case_prompt_contains_query_context_and_shape() {
        let prompt = test_case_prompt(
            "discount code feature",
            &[retrieved("product_specs.md", "SAVE15 gives 15% off.")],
        );
        assert!(prompt.contains("User Query: discount code feature"));
        assert!(prompt.contains("Source: product_specs.md\nSAVE15 gives 15% off."));
        assert!(prompt.contains("\"grounded_in\""));
        assert!(prompt.contains("supported by the documentation"));
    }

    #[test]
    fn script_prompt_optional_docs() {
        let case = TestCase {
            id: "TC-001".into(),
            title: "Discount Code".into(),
            scenario: "Apply SAVE15".into(),
            test_type: Default::default(),
            steps: vec!["Enter SAVE15".into()],
            expected_result: "15% off".into(),
            grounding_references: BTreeSet::from(["product_specs.md".to_string()]),
        };
        let without = script_prompt(&case_json(&case), "<html></html>", &[]);
        assert!(!without.contains("Relevant Documentation"));
        assert!(without.contains("\"id\": \"TC-001\""));
        assert!(without.contains("WebDriverWait"));

        let with = script_prompt(&case_json(&case), "<html></html>", &[retrieved("a.md", "doc")]);
        assert!(with.contains("Relevant Documentation:\nSource: a.md\ndoc"));
    }

    #[test]
    fn snippet_truncates_by_chars() {
        assert_eq!(html_snippet("<p>héllo</p>", 5), "<p>hé");
    }
}
