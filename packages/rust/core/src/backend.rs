//! Generation backends.
//!
//! Test cases and scripts come from one of two interchangeable backends:
//! [`LlmBackend`] prompts the local model runtime, [`TemplateBackend`] is a
//! deterministic, dependency-free rendition used whenever the runtime is
//! unavailable or its output is unusable. [`select_backend`] probes the
//! runtime once per orchestrator call.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use qagent_extract::HtmlStructure;
use qagent_llm::{ChatRequest, LlmClient};
use qagent_shared::{
    AppConfig, GenerationMode, QaAgentError, Result, RetrievedChunk, TestCase, TestType,
};

use crate::{parse, prompt, script_template, template};

/// A validated but not yet grounded test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseDraft {
    /// Identifier proposed by the backend, if any.
    pub id: Option<String>,
    pub title: String,
    pub scenario: String,
    pub test_type: TestType,
    pub steps: Vec<String>,
    pub expected_result: String,
    /// Source names the backend claims the case is based on.
    pub cited_sources: Vec<String>,
}

/// Drafts produced by one backend call.
#[derive(Debug, Clone, Default)]
pub struct DraftBatch {
    pub drafts: Vec<TestCaseDraft>,
    /// Candidates dropped during validation.
    pub discarded: usize,
}

/// Input of test-case generation.
#[derive(Debug, Clone, Copy)]
pub struct TestCaseRequest<'a> {
    pub query: &'a str,
    pub retrieved: &'a [RetrievedChunk],
}

/// Input of script synthesis.
#[derive(Debug, Clone, Copy)]
pub struct ScriptRequest<'a> {
    pub test_case: &'a TestCase,
    pub html: &'a str,
    pub structure: &'a HtmlStructure,
    /// Documentation context; may be empty.
    pub context: &'a [RetrievedChunk],
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn mode(&self) -> GenerationMode;

    async fn generate_test_cases(&self, request: &TestCaseRequest<'_>) -> Result<DraftBatch>;

    /// Returns Python source code.
    async fn synthesize_script(&self, request: &ScriptRequest<'_>) -> Result<String>;
}

/// Probe the runtime and pick the backend for one call.
#[instrument(skip_all)]
pub async fn select_backend<'a>(
    client: Option<&'a dyn LlmClient>,
    config: &AppConfig,
) -> Box<dyn GenerationBackend + 'a> {
    if let Some(client) = client {
        if client.probe().await {
            debug!(runtime = client.name(), "using LLM backend");
            return Box::new(LlmBackend::new(client, config));
        }
        info!(runtime = client.name(), "LLM runtime unavailable, using template mode");
    }
    Box::new(TemplateBackend::new(config))
}

// ---------------------------------------------------------------------------
// LLM backend
// ---------------------------------------------------------------------------

pub struct LlmBackend<'a> {
    client: &'a dyn LlmClient,
    test_case_model: String,
    script_model: String,
    html_snippet_chars: usize,
}

impl<'a> LlmBackend<'a> {
    pub fn new(client: &'a dyn LlmClient, config: &AppConfig) -> Self {
        Self {
            client,
            test_case_model: config.ollama.test_case_model.clone(),
            script_model: config.ollama.script_model.clone(),
            html_snippet_chars: config.generation.html_snippet_chars,
        }
    }
}

#[async_trait]
impl GenerationBackend for LlmBackend<'_> {
    fn mode(&self) -> GenerationMode {
        GenerationMode::Llm
    }

    async fn generate_test_cases(&self, request: &TestCaseRequest<'_>) -> Result<DraftBatch> {
        let chat = ChatRequest::new(
            &self.test_case_model,
            prompt::test_case_prompt(request.query, request.retrieved),
        )
        .with_system(prompt::TEST_CASE_SYSTEM_PROMPT);

        let response = self.client.chat(&chat).await?;
        debug!(latency_ms = response.latency_ms, model = %response.model, "test cases generated");

        parse::parse_test_cases(&response.text)
            .map_err(|e| QaAgentError::BackendUnavailable(format!("unusable model output: {e}")))
    }

    async fn synthesize_script(&self, request: &ScriptRequest<'_>) -> Result<String> {
        let snippet = prompt::html_snippet(request.html, self.html_snippet_chars);
        let chat = ChatRequest::new(
            &self.script_model,
            prompt::script_prompt(&prompt::case_json(request.test_case), &snippet, request.context),
        )
        .with_system(prompt::SCRIPT_SYSTEM_PROMPT);

        let response = self.client.chat(&chat).await?;
        let source = parse::strip_code_fences(&response.text);

        if source.is_empty() {
            return Err(QaAgentError::BackendUnavailable("model returned an empty script".into()));
        }
        if !has_selenium_import(&source) {
            return Err(QaAgentError::BackendUnavailable(
                "model output does not import selenium".into(),
            ));
        }
        Ok(source)
    }
}

fn has_selenium_import(source: &str) -> bool {
    source.lines().map(str::trim_start).any(|line| {
        line.starts_with("from selenium") || line.starts_with("import selenium")
    })
}

// ---------------------------------------------------------------------------
// Template backend
// ---------------------------------------------------------------------------

pub struct TemplateBackend {
    max_cases: usize,
    page_url: String,
}

impl TemplateBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            max_cases: config.generation.template_max_cases,
            page_url: config.generation.page_url.clone(),
        }
    }
}

#[async_trait]
impl GenerationBackend for TemplateBackend {
    fn mode(&self) -> GenerationMode {
        GenerationMode::Template
    }

    async fn generate_test_cases(&self, request: &TestCaseRequest<'_>) -> Result<DraftBatch> {
        Ok(DraftBatch {
            drafts: template::draft_test_cases(request.query, request.retrieved, self.max_cases),
            discarded: 0,
        })
    }

    async fn synthesize_script(&self, request: &ScriptRequest<'_>) -> Result<String> {
        Ok(script_template::render(
            request.test_case,
            request.structure,
            &self.page_url,
        ))
    }
}
