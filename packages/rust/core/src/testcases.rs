//! Test-case generation: retrieve, generate, validate, ground.
//!
//! The LLM path is tried first when the runtime answers its probe. Any
//! backend failure, and any LLM batch in which no case survives grounding,
//! falls back to the template path, so generation only fails for
//! environmental reasons or an empty knowledge base.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{info, instrument, warn};

use qagent_embedding::Embedder;
use qagent_llm::LlmClient;
use qagent_shared::{AppConfig, GenerationMode, QaAgentError, Result, RetrievedChunk, TestCase};
use qagent_storage::KnowledgeStore;

use crate::backend::{
    DraftBatch, GenerationBackend, TemplateBackend, TestCaseDraft, TestCaseRequest, select_backend,
};
use crate::grounding::{self, GroundingPolicy, GroundingVerdict};
use crate::retriever::Retriever;

/// Result of one generation call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub test_cases: Vec<TestCase>,
    pub mode: GenerationMode,
    /// Chunks the cases were generated from.
    pub retrieved: Vec<RetrievedChunk>,
    /// LLM candidates dropped by validation or grounding.
    pub discarded: usize,
}

pub struct TestCaseGenerator<'a> {
    store: &'a KnowledgeStore,
    embedder: &'a dyn Embedder,
    llm: Option<&'a dyn LlmClient>,
    config: &'a AppConfig,
}

impl<'a> TestCaseGenerator<'a> {
    pub fn new(
        store: &'a KnowledgeStore,
        embedder: &'a dyn Embedder,
        llm: Option<&'a dyn LlmClient>,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            config,
        }
    }

    /// Generate test cases for `query`.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn generate(&self, query: &str) -> Result<GenerationOutcome> {
        let retrieved = Retriever::new(self.store, self.embedder)
            .retrieve(query, self.config.retrieval.top_k)
            .await?;
        let request = TestCaseRequest {
            query,
            retrieved: &retrieved,
        };

        let backend = select_backend(self.llm, self.config).await;
        let mut discarded = 0;

        if backend.mode() == GenerationMode::Llm {
            match backend.generate_test_cases(&request).await {
                Ok(batch) => {
                    let policy = grounding::policy_for(
                        self.config.generation.grounding_policy,
                        self.config.generation.min_term_overlap,
                    );
                    let (cases, dropped) = ground_batch(batch, &retrieved, policy.as_ref());
                    discarded = dropped;
                    if !cases.is_empty() {
                        info!(cases = cases.len(), discarded, "generated grounded test cases");
                        return Ok(GenerationOutcome {
                            test_cases: cases,
                            mode: GenerationMode::Llm,
                            retrieved,
                            discarded,
                        });
                    }
                    warn!(discarded, "no generated case survived validation, using template mode");
                }
                Err(e) => warn!(error = %e, "LLM generation failed, using template mode"),
            }
        }

        let batch = TemplateBackend::new(self.config)
            .generate_test_cases(&request)
            .await?;
        let cases = template_cases(batch.drafts);
        info!(cases = cases.len(), "generated template test cases");

        Ok(GenerationOutcome {
            test_cases: cases,
            mode: GenerationMode::Template,
            retrieved,
            discarded,
        })
    }
}

/// Apply `policy` to every draft; ungrounded drafts are logged and dropped.
/// Returns the surviving cases and the total number of discarded candidates.
fn ground_batch(
    batch: DraftBatch,
    retrieved: &[RetrievedChunk],
    policy: &dyn GroundingPolicy,
) -> (Vec<TestCase>, usize) {
    let ids = assign_ids(&batch.drafts);
    let mut discarded = batch.discarded;
    let mut cases = Vec::new();

    for (draft, id) in batch.drafts.into_iter().zip(ids) {
        match policy.ground(&draft, retrieved) {
            GroundingVerdict::Grounded(references) => cases.push(into_case(draft, id, references)),
            GroundingVerdict::Ungrounded(reason) => {
                warn!(
                    policy = policy.name(),
                    error = %QaAgentError::ungrounded(&id, reason),
                    "discarding generated test case"
                );
                discarded += 1;
            }
        }
    }
    (cases, discarded)
}

fn template_cases(drafts: Vec<TestCaseDraft>) -> Vec<TestCase> {
    let ids = assign_ids(&drafts);
    drafts
        .into_iter()
        .zip(ids)
        .map(|(draft, id)| {
            let references = draft.cited_sources.iter().cloned().collect();
            into_case(draft, id, references)
        })
        .collect()
}

fn into_case(draft: TestCaseDraft, id: String, grounding_references: BTreeSet<String>) -> TestCase {
    TestCase {
        id,
        title: draft.title,
        scenario: draft.scenario,
        test_type: draft.test_type,
        steps: draft.steps,
        expected_result: draft.expected_result,
        grounding_references,
    }
}

/// Keep proposed ids that are present and unique; number the rest
/// `TC-001`, `TC-002`, ... by position, skipping numbers already taken.
fn assign_ids(drafts: &[TestCaseDraft]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut kept: Vec<Option<String>> = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let id = draft
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !used.contains(*id))
            .map(str::to_string);
        if let Some(id) = &id {
            used.insert(id.clone());
        }
        kept.push(id);
    }

    let mut next = 1;
    kept.into_iter()
        .map(|id| {
            id.unwrap_or_else(|| loop {
                let candidate = format!("TC-{next:03}");
                next += 1;
                if used.insert(candidate.clone()) {
                    break candidate;
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qagent_shared::{Chunk, DocumentKind, TestType};

    fn draft(id: Option<&str>, cited: &[&str], expected: &str) -> TestCaseDraft {
        TestCaseDraft {
            id: id.map(str::to_string),
            title: "Discount Code".into(),
            scenario: "Apply discount code SAVE15".into(),
            test_type: TestType::Positive,
            steps: vec!["Enter SAVE15".into(), "Click Apply".into()],
            expected_result: expected.into(),
            cited_sources: cited.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn retrieved() -> Vec<RetrievedChunk> {
        vec![RetrievedChunk {
            chunk: Chunk {
                id: "c0".into(),
                text: "The discount code SAVE15 applies a 15% discount.".into(),
                source_document: "product_specs.md".into(),
                offset: 0,
                chunk_index: 0,
                document_kind: DocumentKind::SupportDoc,
                embedding: vec![1.0],
            },
            score: 0.9,
        }]
    }

    #[test]
    fn ids_are_numbered_when_missing_or_duplicated() {
        let drafts = vec![
            draft(Some("TC-002"), &[], ""),
            draft(None, &[], ""),
            draft(Some("TC-002"), &[], ""),
            draft(Some("  "), &[], ""),
        ];
        assert_eq!(assign_ids(&drafts), vec!["TC-002", "TC-001", "TC-003", "TC-004"]);
    }

    #[test]
    fn grounding_drops_unsupported_cases() {
        let batch = DraftBatch {
            drafts: vec![
                draft(Some("TC-001"), &["product_specs.md"], "15% discount applied"),
                TestCaseDraft {
                    scenario: "Pay with cryptocurrency".into(),
                    steps: vec!["Choose bitcoin".into()],
                    expected_result: "Wallet opens".into(),
                    ..draft(Some("TC-002"), &["wallet.md"], "")
                },
            ],
            discarded: 1,
        };
        let policy = grounding::policy_for(qagent_shared::GroundingPolicyKind::CitedOrLexical, 2);
        let (cases, discarded) = ground_batch(batch, &retrieved(), policy.as_ref());

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "TC-001");
        assert_eq!(
            cases[0].grounding_references,
            BTreeSet::from(["product_specs.md".to_string()])
        );
        assert_eq!(discarded, 2);
    }

    #[test]
    fn template_cases_cite_their_source() {
        let cases = template_cases(vec![draft(None, &["product_specs.md"], "x")]);
        assert_eq!(cases[0].id, "TC-001");
        assert!(cases[0].grounding_references.contains("product_specs.md"));
    }
}
