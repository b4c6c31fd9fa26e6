//! Best-effort Selenium (Python) script skeleton for a test case.
//!
//! Each step is matched against the page's interactive elements by shared
//! words; matched inputs are filled, buttons and links clicked, selects
//! chosen. Unmatched steps become comments. Every string literal is escaped.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use qagent_extract::{ElementKind, HtmlElement, HtmlStructure, LocatorStrategy};
use qagent_shared::TestCase;

use crate::terms;

/// Seconds an explicit wait may block.
const WAIT_SECS: u32 = 10;

const TYPE_VERBS: &[&str] = &["enter", "type", "fill", "input", "provide", "write"];
const CLICK_VERBS: &[&str] = &["click", "press", "submit", "apply", "tap", "confirm", "place"];
const SELECT_VERBS: &[&str] = &["select", "choose", "pick"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Type,
    Click,
    Select,
    Unknown,
}

/// Download file name for a test case: `<sanitized id>.py`.
pub fn script_file_name(test_case_id: &str) -> String {
    let sanitized: String = test_case_id
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "test_case.py".into()
    } else {
        format!("{sanitized}.py")
    }
}

/// Python function name: `test_<id>` lowercased with non-identifier
/// characters replaced by `_`.
pub fn function_name(test_case_id: &str) -> String {
    let body: String = test_case_id
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if body.is_empty() {
        "test_case".into()
    } else {
        format!("test_{body}")
    }
}

/// Python string literal for `value`.
fn py_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".into())
}

/// Single-line text for a comment.
fn comment_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Single-line text safe inside a non-raw `"""` docstring.
fn docstring_text(value: &str) -> String {
    comment_text(value)
        .replace('\\', "\\\\")
        .replace("\"\"\"", "'''")
}

fn locator(element: &HtmlElement) -> String {
    let selector = element.selector();
    let by = match selector.strategy {
        LocatorStrategy::Id => "By.ID",
        LocatorStrategy::Name => "By.NAME",
        LocatorStrategy::Css => "By.CSS_SELECTOR",
    };
    format!("({by}, {})", py_str(&selector.value))
}

fn intent(step: &str) -> Intent {
    let words: Vec<String> = terms::words(step).collect();
    let has = |verbs: &[&str]| words.iter().any(|w| verbs.contains(&w.as_str()));
    if has(SELECT_VERBS) {
        Intent::Select
    } else if has(TYPE_VERBS) {
        Intent::Type
    } else if has(CLICK_VERBS) {
        Intent::Click
    } else {
        Intent::Unknown
    }
}

fn intent_fits(intent: Intent, kind: ElementKind) -> bool {
    match intent {
        Intent::Type => kind.accepts_text(),
        Intent::Click => kind.is_clickable(),
        Intent::Select => matches!(kind, ElementKind::Select | ElementKind::Radio | ElementKind::Checkbox),
        Intent::Unknown => false,
    }
}

/// Element sharing the most words with the step. Elements fitting the step's
/// verb get a bonus; ties go to the first element in document order.
fn match_element<'a>(step: &str, structure: &'a HtmlStructure) -> Option<&'a HtmlElement> {
    let step_terms: BTreeSet<String> = terms::content_terms(step);
    let intent = intent(step);

    let mut best: Option<(usize, &HtmlElement)> = None;
    for element in &structure.elements {
        if matches!(element.kind, ElementKind::Form | ElementKind::Other) {
            continue;
        }
        let overlap = element.descriptor_terms().intersection(&step_terms).count();
        if overlap == 0 {
            continue;
        }
        let score = overlap * 2 + usize::from(intent_fits(intent, element.kind));
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, element));
        }
    }
    best.map(|(_, element)| element)
}

fn render_step(out: &mut String, index: usize, step: &str, structure: &HtmlStructure) {
    let _ = writeln!(out, "        # Step {}: {}", index + 1, comment_text(step));

    let Some(element) = match_element(step, structure) else {
        let _ = writeln!(out, "        # No matching element on the page; perform manually if needed.");
        out.push('\n');
        return;
    };
    let loc = locator(element);
    let value = terms::literal_values(step).into_iter().next();
    let fill = intent(step) == Intent::Type || value.is_some();

    match element.kind {
        ElementKind::TextInput | ElementKind::TextArea if !fill => {
            let _ = writeln!(out, "        wait.until(EC.visibility_of_element_located({loc}))");
        }
        ElementKind::TextInput | ElementKind::TextArea => {
            let text = value.unwrap_or_else(|| "test input".into());
            let _ = writeln!(out, "        field = wait.until(EC.presence_of_element_located({loc}))");
            let _ = writeln!(out, "        field.clear()");
            let _ = writeln!(out, "        field.send_keys({})", py_str(&text));
        }
        ElementKind::Select => {
            let _ = writeln!(
                out,
                "        dropdown = Select(wait.until(EC.presence_of_element_located({loc})))"
            );
            match value {
                Some(v) => {
                    let _ = writeln!(out, "        dropdown.select_by_visible_text({})", py_str(&v));
                }
                None => {
                    let _ = writeln!(out, "        dropdown.select_by_index(0)");
                }
            }
        }
        ElementKind::Button | ElementKind::Link | ElementKind::Checkbox | ElementKind::Radio => {
            let _ = writeln!(out, "        wait.until(EC.element_to_be_clickable({loc})).click()");
        }
        ElementKind::Form | ElementKind::Other => {
            let _ = writeln!(out, "        wait.until(EC.presence_of_element_located({loc}))");
        }
    }
    out.push('\n');
}

/// Values from the expected result worth asserting on: quoted strings,
/// percentages and amounts.
fn expected_values(expected: &str) -> Vec<String> {
    static AMOUNT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[$€£]?\d+(?:[.,]\d+)?%?").expect("valid regex"));

    let mut values = terms::literal_values(expected);
    for m in AMOUNT_RE.find_iter(expected) {
        let v = m.as_str();
        let significant = v.ends_with('%') || v.starts_with(['$', '€', '£']);
        if significant && !values.iter().any(|x| x == v) {
            values.push(v.to_string());
        }
    }
    values
}

fn render_assertions(out: &mut String, case: &TestCase) {
    let _ = writeln!(out, "        # Expected: {}", comment_text(&case.expected_result));
    let _ = writeln!(
        out,
        "        body = wait.until(EC.presence_of_element_located((By.TAG_NAME, \"body\")))"
    );

    let values = expected_values(&case.expected_result);
    if values.is_empty() {
        let _ = writeln!(out, "        assert body.is_displayed(), {}", py_str("page did not render"));
        return;
    }
    let _ = writeln!(out, "        page_text = body.text");
    for value in values {
        let message = format!("expected {value:?} on the page");
        let _ = writeln!(out, "        assert {} in page_text, {}", py_str(&value), py_str(&message));
    }
}

/// Render the complete script.
pub fn render(case: &TestCase, structure: &HtmlStructure, page_url: &str) -> String {
    let func = function_name(&case.id);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\"\"\"Automated test for {}: {}.",
        docstring_text(&case.id),
        docstring_text(&case.title)
    );
    out.push('\n');
    let _ = writeln!(out, "Scenario: {}", docstring_text(&case.scenario));
    if !case.grounding_references.is_empty() {
        let refs: Vec<&str> = case.grounding_references.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Grounded in: {}", docstring_text(&refs.join(", ")));
    }
    out.push_str("\"\"\"\n\n");

    out.push_str("from selenium import webdriver\n");
    out.push_str("from selenium.webdriver.common.by import By\n");
    out.push_str("from selenium.webdriver.support import expected_conditions as EC\n");
    out.push_str("from selenium.webdriver.support.ui import Select, WebDriverWait\n\n");
    let _ = writeln!(out, "PAGE_URL = {}", py_str(page_url));
    out.push_str("\n\n");

    let _ = writeln!(out, "def {func}():");
    out.push_str("    driver = webdriver.Chrome()\n");
    let _ = writeln!(out, "    wait = WebDriverWait(driver, {WAIT_SECS})");
    out.push_str("    try:\n");
    out.push_str("        driver.get(PAGE_URL)\n\n");

    for (i, step) in case.steps.iter().enumerate() {
        render_step(&mut out, i, step, structure);
    }
    render_assertions(&mut out, case);

    let _ = writeln!(out, "        print({})", py_str(&format!("{} passed", case.id)));
    out.push_str("    finally:\n");
    out.push_str("        driver.quit()\n\n\n");
    out.push_str("if __name__ == \"__main__\":\n");
    let _ = writeln!(out, "    {func}()");
    out
}
