//! Selenium script synthesis for a single test case.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use qagent_embedding::Embedder;
use qagent_extract::HtmlStructure;
use qagent_llm::LlmClient;
use qagent_shared::{
    AppConfig, GenerationMode, QaAgentError, Result, RetrievedChunk, Script, TestCase,
};
use qagent_storage::KnowledgeStore;

use crate::backend::{GenerationBackend, ScriptRequest, TemplateBackend, select_backend};
use crate::retriever::Retriever;
use crate::script_template;

/// Language tag of every synthesized script.
pub const SCRIPT_LANGUAGE: &str = "python";

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutcome {
    pub script: Script,
    pub mode: GenerationMode,
}

pub struct ScriptSynthesizer<'a> {
    store: &'a KnowledgeStore,
    embedder: &'a dyn Embedder,
    llm: Option<&'a dyn LlmClient>,
    config: &'a AppConfig,
}

impl<'a> ScriptSynthesizer<'a> {
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

    /// Produce a script exercising `test_case` against the page `html`.
    #[instrument(skip_all, fields(test_case = %test_case.id))]
    pub async fn synthesize(&self, test_case: &TestCase, html: &str) -> Result<SynthesisOutcome> {
        let structure = HtmlStructure::parse(html);
        debug!(elements = structure.elements.len(), "analysed page structure");

        let backend = select_backend(self.llm, self.config).await;

        if backend.mode() == GenerationMode::Llm {
            let context = self.documentation_context(test_case).await;
            let request = ScriptRequest {
                test_case,
                html,
                structure: &structure,
                context: &context,
            };
            match backend.synthesize_script(&request).await {
                Ok(source) => {
                    info!(chars = source.len(), "synthesized script with LLM");
                    return Ok(outcome(test_case, source, GenerationMode::Llm));
                }
                Err(e) => warn!(error = %e, "LLM script synthesis failed, using template mode"),
            }
        }

        let request = ScriptRequest {
            test_case,
            html,
            structure: &structure,
            context: &[],
        };
        let source = TemplateBackend::new(self.config)
            .synthesize_script(&request)
            .await?;
        info!(chars = source.len(), "rendered template script");
        Ok(outcome(test_case, source, GenerationMode::Template))
    }

    /// Chunks relevant to the case. Retrieval failures leave the script
    /// without documentation context rather than failing synthesis.
    async fn documentation_context(&self, test_case: &TestCase) -> Vec<RetrievedChunk> {
        let query = format!("{} {}", test_case.title, test_case.scenario);
        match Retriever::new(self.store, self.embedder)
            .retrieve(&query, self.config.retrieval.script_context_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(QaAgentError::EmptyKnowledgeBase) => {
                debug!("knowledge base empty, synthesizing without documentation context");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "documentation retrieval failed, synthesizing without context");
                Vec::new()
            }
        }
    }
}

fn outcome(test_case: &TestCase, source: String, mode: GenerationMode) -> SynthesisOutcome {
    SynthesisOutcome {
        script: Script {
            test_case_id: test_case.id.clone(),
            file_name: script_template::script_file_name(&test_case.id),
            language: SCRIPT_LANGUAGE.into(),
            source,
        },
        mode,
    }
}
