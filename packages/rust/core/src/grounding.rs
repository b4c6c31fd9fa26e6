//! Grounding policies: deciding whether a generated test case is traceable
//! to the chunks retrieved for its query.
//!
//! The grounding predicate is pluggable. Whatever the policy, the references
//! it returns are always names of retrieved sources, never model-supplied
//! strings.

use std::collections::BTreeSet;
use std::path::Path;

use qagent_shared::{GroundingPolicyKind, RetrievedChunk};

use crate::backend::TestCaseDraft;
use crate::terms;

/// Outcome of applying a policy to one draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundingVerdict {
    /// Retrieved sources the case is traceable to. Never empty.
    Grounded(BTreeSet<String>),
    Ungrounded(String),
}

pub trait GroundingPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn ground(&self, draft: &TestCaseDraft, retrieved: &[RetrievedChunk]) -> GroundingVerdict;
}

/// Build the configured policy.
pub fn policy_for(kind: GroundingPolicyKind, min_term_overlap: usize) -> Box<dyn GroundingPolicy> {
    match kind {
        GroundingPolicyKind::Cited => Box::new(CitedSourcePolicy),
        GroundingPolicyKind::Lexical => Box::new(LexicalOverlapPolicy::new(min_term_overlap)),
        GroundingPolicyKind::CitedOrLexical => Box::new(CitedOrLexicalPolicy {
            lexical: LexicalOverlapPolicy::new(min_term_overlap),
        }),
    }
}

// ---------------------------------------------------------------------------
// Cited source
// ---------------------------------------------------------------------------

/// Grounded when the case names at least one retrieved source.
///
/// Names compare case-insensitively on the file name, with or without its
/// extension, so `product_specs` matches `docs/product_specs.md`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitedSourcePolicy;

impl GroundingPolicy for CitedSourcePolicy {
    fn name(&self) -> &'static str {
        "cited"
    }

    fn ground(&self, draft: &TestCaseDraft, retrieved: &[RetrievedChunk]) -> GroundingVerdict {
        if draft.cited_sources.is_empty() {
            return GroundingVerdict::Ungrounded("no source cited".into());
        }

        let matched: BTreeSet<String> = retrieved
            .iter()
            .map(|r| &r.chunk.source_document)
            .filter(|source| draft.cited_sources.iter().any(|c| same_source(c, source)))
            .cloned()
            .collect();

        if matched.is_empty() {
            GroundingVerdict::Ungrounded(format!(
                "cited sources {:?} were not retrieved",
                draft.cited_sources
            ))
        } else {
            GroundingVerdict::Grounded(matched)
        }
    }
}

fn same_source(cited: &str, source: &str) -> bool {
    let cited = normalize_name(cited);
    let source = normalize_name(source);
    cited.0 == source.0 || cited.1 == source.1
}

/// Lowercased file name and file stem.
fn normalize_name(name: &str) -> (String, String) {
    let path = Path::new(name.trim());
    let file = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(name)
        .to_lowercase();
    let stem = path
        .file_stem()
        .and_then(|f| f.to_str())
        .unwrap_or(name)
        .to_lowercase();
    (file, stem)
}

// ---------------------------------------------------------------------------
// Lexical overlap
// ---------------------------------------------------------------------------

/// Grounded in every retrieved source whose text shares at least
/// `min_overlap` content terms with the case's scenario, steps and expected
/// result.
#[derive(Debug, Clone, Copy)]
pub struct LexicalOverlapPolicy {
    min_overlap: usize,
}

impl LexicalOverlapPolicy {
    pub fn new(min_overlap: usize) -> Self {
        Self {
            min_overlap: min_overlap.max(1),
        }
    }
}

impl GroundingPolicy for LexicalOverlapPolicy {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn ground(&self, draft: &TestCaseDraft, retrieved: &[RetrievedChunk]) -> GroundingVerdict {
        let mut case_text = format!("{} {}", draft.scenario, draft.expected_result);
        for step in &draft.steps {
            case_text.push(' ');
            case_text.push_str(step);
        }
        let case_terms = terms::content_terms(&case_text);

        let mut best = 0;
        let mut matched = BTreeSet::new();
        for r in retrieved {
            let shared = terms::content_terms(&r.chunk.text)
                .intersection(&case_terms)
                .count();
            best = best.max(shared);
            if shared >= self.min_overlap {
                matched.insert(r.chunk.source_document.clone());
            }
        }

        if matched.is_empty() {
            GroundingVerdict::Ungrounded(format!(
                "shares at most {best} terms with retrieved text, {} required",
                self.min_overlap
            ))
        } else {
            GroundingVerdict::Grounded(matched)
        }
    }
}

// ---------------------------------------------------------------------------
// Combined
// ---------------------------------------------------------------------------

/// Cited sources when they resolve, lexical overlap otherwise.
#[derive(Debug, Clone, Copy)]
pub struct CitedOrLexicalPolicy {
    lexical: LexicalOverlapPolicy,
}

impl GroundingPolicy for CitedOrLexicalPolicy {
    fn name(&self) -> &'static str {
        "cited-or-lexical"
    }

    fn ground(&self, draft: &TestCaseDraft, retrieved: &[RetrievedChunk]) -> GroundingVerdict {
        match CitedSourcePolicy.ground(draft, retrieved) {
            grounded @ GroundingVerdict::Grounded(_) => grounded,
            GroundingVerdict::Ungrounded(cited_reason) => match self.lexical.ground(draft, retrieved) {
                grounded @ GroundingVerdict::Grounded(_) => grounded,
                GroundingVerdict::Ungrounded(lexical_reason) => {
                    GroundingVerdict::Ungrounded(format!("{cited_reason}; {lexical_reason}"))
                }
            },
        }
    }
}
