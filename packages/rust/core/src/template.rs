//! Deterministic test cases built from retrieved text.
//!
//! One case per distinct retrieved source, best-scoring source first. Each
//! case is built around the source sentence that shares the most terms with
//! the query, and cites exactly that source.

use std::collections::BTreeSet;

use qagent_shared::{DocumentKind, RetrievedChunk, TestType};

use crate::backend::TestCaseDraft;
use crate::terms;

/// Query words kept in a feature title.
const MAX_TITLE_WORDS: usize = 4;

/// Longest behavior sentence quoted in a case, in characters.
const MAX_SENTENCE_CHARS: usize = 240;

const NEGATIVE_CUES: &[&str] = &[
    "invalid", "error", "errors", "not", "cannot", "reject", "rejected", "fail", "fails",
    "failed", "expired", "incorrect", "unable", "denied", "empty",
];

/// Build template drafts for `query`. Only empty `retrieved` yields no drafts;
/// a source without a usable sentence gets a case describing its feature.
pub fn draft_test_cases(query: &str, retrieved: &[RetrievedChunk], max_cases: usize) -> Vec<TestCaseDraft> {
    let query_terms = terms::ordered_content_terms(query);
    let feature = feature_title(&query_terms);
    let query_set: BTreeSet<String> = query_terms.into_iter().collect();

    sources_in_rank_order(retrieved)
        .into_iter()
        .map(|source| {
            let sentence = best_sentence(retrieved, &source, &query_set)
                .unwrap_or_else(|| fallback_sentence(&feature, &source));
            build_case(&feature, &source, &sentence)
        })
        .take(max_cases.max(1))
        .collect()
}

fn feature_title(query_terms: &[String]) -> String {
    let words: Vec<String> = query_terms.iter().take(MAX_TITLE_WORDS).cloned().collect();
    if words.is_empty() {
        "Documented Behavior".into()
    } else {
        terms::title_case(&words)
    }
}

/// Distinct sources, support documents before the page under test, each
/// group in retrieval order.
fn sources_in_rank_order(retrieved: &[RetrievedChunk]) -> Vec<String> {
    let mut support = Vec::new();
    let mut pages = Vec::new();
    for r in retrieved {
        let bucket = match r.chunk.document_kind {
            DocumentKind::SupportDoc => &mut support,
            DocumentKind::Html => &mut pages,
        };
        if !bucket.contains(&r.chunk.source_document) {
            bucket.push(r.chunk.source_document.clone());
        }
    }
    support.extend(pages);
    support
}

/// Sentence of `source` sharing the most terms with the query; earliest wins ties.
fn best_sentence(retrieved: &[RetrievedChunk], source: &str, query: &BTreeSet<String>) -> Option<String> {
    let mut best: Option<(usize, String)> = None;

    for r in retrieved.iter().filter(|r| r.chunk.source_document == source) {
        for sentence in terms::sentences(&r.chunk.text) {
            let overlap = terms::content_terms(&sentence).intersection(query).count();
            if best.as_ref().is_none_or(|(score, _)| overlap > *score) {
                best = Some((overlap, sentence));
            }
        }
    }

    best.map(|(_, sentence)| shorten(&sentence))
}

fn fallback_sentence(feature: &str, source: &str) -> String {
    format!(
        "The {} behaves as described in {source}",
        feature.to_lowercase()
    )
}

fn shorten(sentence: &str) -> String {
    if sentence.chars().count() <= MAX_SENTENCE_CHARS {
        return sentence.to_string();
    }
    let mut out = String::new();
    for word in sentence.split_whitespace() {
        if out.chars().count() + word.chars().count() + 1 > MAX_SENTENCE_CHARS {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn build_case(feature: &str, source: &str, sentence: &str) -> TestCaseDraft {
    let lower_feature = feature.to_lowercase();
    let negative = terms::words(sentence).any(|w| NEGATIVE_CUES.contains(&w.as_str()));

    let mut steps = vec![
        "Open the page under test".to_string(),
        format!("Locate the {lower_feature} section"),
    ];
    match terms::literal_values(sentence).first() {
        Some(value) => {
            steps.push(format!("Enter '{value}' in the {lower_feature} field"));
            steps.push(format!("Apply the {lower_feature}"));
        }
        None => steps.push(format!("Exercise the documented behavior: {sentence}")),
    }
    steps.push("Observe the result shown on the page".to_string());

    TestCaseDraft {
        id: None,
        title: feature.to_string(),
        scenario: format!("{feature}: {sentence}"),
        test_type: if negative { TestType::Negative } else { TestType::Positive },
        steps,
        expected_result: sentence.to_string(),
        cited_sources: vec![source.to_string()],
    }
}
