//! Word-level text helpers shared by grounding, templates and scripts.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Words that carry no feature meaning in queries or test steps.
const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "both", "but", "by", "can", "case", "cases", "check", "create", "does", "each",
    "for", "from", "generate", "has", "have", "how", "if", "in", "into", "is", "it", "its",
    "make", "more", "negative", "of", "on", "or", "other", "page", "positive", "should", "so",
    "some", "test", "testing", "tests", "than", "that", "the", "their", "then", "there", "these",
    "this", "to", "under", "user", "using", "verify", "was", "when", "where", "which", "will",
    "with", "write", "feature", "features", "functionality", "scenario", "scenarios",
];

pub(crate) fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercased alphanumeric words of `text`, in order.
pub(crate) fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '%')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Distinct meaningful words of `text`: stop words and one-letter words removed.
pub(crate) fn content_terms(text: &str) -> BTreeSet<String> {
    words(text)
        .filter(|w| w.chars().count() > 1 && !is_stop_word(w))
        .collect()
}

/// Content words of `text` in order of first appearance.
pub(crate) fn ordered_content_terms(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    words(text)
        .filter(|w| w.chars().count() > 1 && !is_stop_word(w))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Split prose into sentences, dropping Markdown markers and blank pieces.
pub(crate) fn sentences(text: &str) -> Vec<String> {
    static BOUNDARY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?:[.!?](?:\s+|$))|\n").expect("valid regex"));
    static MARKER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:#{1,6}\s+|[-*+]\s+|\d+[.)]\s+|>\s*)+").expect("valid regex"));

    BOUNDARY_RE
        .split(text)
        .map(|s| MARKER_RE.replace(s.trim(), "").replace("**", "").trim().to_string())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Literal values mentioned in `text`: quoted strings first, then code-like
/// tokens such as `SAVE15` (upper-case letters mixed with digits).
pub(crate) fn literal_values(text: &str) -> Vec<String> {
    static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"'([^'\n]{1,80})'|"([^"\n]{1,80})"|“([^”\n]{1,80})”"#).expect("valid regex")
    });
    static CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9_-]*[0-9][A-Z0-9_-]*\b").expect("valid regex"));

    let mut values: Vec<String> = QUOTED_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    for m in CODE_RE.find_iter(text) {
        if !values.iter().any(|v| v == m.as_str()) {
            values.push(m.as_str().to_string());
        }
    }
    values
}

/// Upper-case the first letter of every word.
pub(crate) fn title_case(words: &[String]) -> String {
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
