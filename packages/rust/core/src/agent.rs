//! [`QaAgent`]: one knowledge base plus the providers that operate on it.

use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use qagent_embedding::{Embedder, EmbedderInfo, HashEmbedder};
use qagent_llm::{LlmClient, OllamaClient, OllamaEmbedder};
use qagent_shared::{AppConfig, EmbedderKind, Result, SourceDocument, TestCase};
use qagent_storage::{DATABASE_FILE, DocumentSummary, KnowledgeStore};

use crate::ingest::{self, IngestReport};
use crate::progress::ProgressReporter;
use crate::scripts::{ScriptSynthesizer, SynthesisOutcome};
use crate::testcases::{GenerationOutcome, TestCaseGenerator};

/// Snapshot of the knowledge base.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeBaseStatus {
    pub chunk_count: usize,
    pub documents: Vec<DocumentSummary>,
    pub embedder: EmbedderInfo,
}

pub struct QaAgent {
    config: AppConfig,
    store: KnowledgeStore,
    embedder: Box<dyn Embedder>,
    llm: Option<Box<dyn LlmClient>>,
}

impl QaAgent {
    /// Open the knowledge base under `data_dir` and connect the configured
    /// providers. With `offline`, no LLM client is created and every
    /// generation call uses template mode.
    #[instrument(skip_all, fields(data_dir = %data_dir.display(), offline))]
    pub async fn open(config: AppConfig, data_dir: &Path, offline: bool) -> Result<Self> {
        let store = KnowledgeStore::open(&data_dir.join(DATABASE_FILE)).await?;

        let embedder: Box<dyn Embedder> = match config.retrieval.embedder {
            EmbedderKind::Hash => Box::new(HashEmbedder::new(config.retrieval.embedding_dimension)?),
            EmbedderKind::Ollama => Box::new(OllamaEmbedder::connect(&config.ollama).await?),
        };

        let llm: Option<Box<dyn LlmClient>> = if offline || !config.ollama.enabled {
            None
        } else {
            Some(Box::new(OllamaClient::new(&config.ollama)?))
        };

        info!(
            embedder = %embedder.info().name,
            llm = ?llm.as_ref().map(|c| c.name()),
            "agent ready"
        );
        Ok(Self::new(config, store, embedder, llm))
    }

    /// Assemble an agent from already constructed parts.
    pub fn new(
        config: AppConfig,
        store: KnowledgeStore,
        embedder: Box<dyn Embedder>,
        llm: Option<Box<dyn LlmClient>>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            llm,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Add documents to the knowledge base.
    pub async fn ingest(
        &self,
        documents: &[SourceDocument],
        progress: &dyn ProgressReporter,
    ) -> Result<IngestReport> {
        ingest::ingest_documents(
            &self.store,
            self.embedder.as_ref(),
            &self.config.chunking,
            documents,
            progress,
        )
        .await
    }

    /// Replace the knowledge base with `documents` plus the page under test.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn build_knowledge_base(
        &self,
        documents: &[SourceDocument],
        html_page: Option<SourceDocument>,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestReport> {
        progress.phase("Resetting knowledge base");
        self.store.reset().await?;

        let mut all = documents.to_vec();
        all.extend(html_page);
        progress.phase("Ingesting documents");
        self.ingest(&all, progress).await
    }

    /// Generate documentation-grounded test cases for `query`.
    pub async fn generate_test_cases(&self, query: &str) -> Result<GenerationOutcome> {
        TestCaseGenerator::new(
            &self.store,
            self.embedder.as_ref(),
            self.llm.as_deref(),
            &self.config,
        )
        .generate(query)
        .await
    }

    /// Synthesize a Selenium script for `test_case` against `html`.
    pub async fn synthesize_script(&self, test_case: &TestCase, html: &str) -> Result<SynthesisOutcome> {
        ScriptSynthesizer::new(
            &self.store,
            self.embedder.as_ref(),
            self.llm.as_deref(),
            &self.config,
        )
        .synthesize(test_case, html)
        .await
    }

    pub async fn status(&self) -> Result<KnowledgeBaseStatus> {
        Ok(KnowledgeBaseStatus {
            chunk_count: self.store.count().await?,
            documents: self.store.list_documents().await?,
            embedder: self.embedder.info(),
        })
    }

    /// Delete every chunk. Returns the number removed.
    pub async fn reset(&self) -> Result<usize> {
        self.store.reset().await
    }

    pub async fn close(self) -> Result<()> {
        self.store.close().await
    }
}
