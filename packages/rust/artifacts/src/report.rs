use std::fmt::Write as _;

use crate::TestCaseSet;

/// Human-readable Markdown rendering of a test-case set.
pub fn render_markdown_report(set: &TestCaseSet) -> String {
    let mut out = String::from("# Test Cases\n\n");

    if !set.query.is_empty() {
        let _ = writeln!(out, "**Query:** {}  ", set.query);
    }
    let _ = writeln!(out, "**Mode:** {}  ", set.mode);
    let _ = writeln!(
        out,
        "**Generated:** {}\n",
        set.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(out, "| ID | Feature | Type | Grounded In |");
    let _ = writeln!(out, "|----|---------|------|-------------|");
    for case in &set.test_cases {
        let refs: Vec<&str> = case.grounding_references.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            cell(&case.id),
            cell(&case.title),
            case.test_type.as_str(),
            cell(&refs.join(", "))
        );
    }

    for case in &set.test_cases {
        let _ = writeln!(out, "\n## {}: {}\n", case.id, case.title);
        let _ = writeln!(out, "**Scenario:** {}\n", case.scenario);
        out.push_str("**Steps:**\n\n");
        for (i, step) in case.steps.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, step);
        }
        let _ = writeln!(out, "\n**Expected result:** {}", case.expected_result);
    }
    out
}

/// Table cells cannot contain pipes or line breaks.
fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use qagent_shared::{GenerationMode, TestCase, TestType};
    use std::collections::BTreeSet;

    #[test]
    fn report_lists_every_case() {
        let set = TestCaseSet::new(
            "discount code",
            GenerationMode::Template,
            vec![TestCase {
                id: "TC-001".into(),
                title: "Discount | Code".into(),
                scenario: "Apply SAVE15".into(),
                test_type: TestType::Negative,
                steps: vec!["Enter SAVE15".into(), "Click Apply".into()],
                expected_result: "Total is reduced by 15%".into(),
                grounding_references: BTreeSet::from([
                    "product_specs.md".to_string(),
                    "ui_ux_guide.txt".to_string(),
                ]),
            }],
        );

        let report = render_markdown_report(&set);
        assert!(report.starts_with("# Test Cases"));
        assert!(report.contains("**Mode:** template"));
        assert!(report.contains("| TC-001 | Discount \\| Code | negative | product_specs.md, ui_ux_guide.txt |"));
        assert!(report.contains("## TC-001: Discount | Code"));
        assert!(report.contains("1. Enter SAVE15\n2. Click Apply"));
        assert!(report.contains("**Expected result:** Total is reduced by 15%"));
    }
}
