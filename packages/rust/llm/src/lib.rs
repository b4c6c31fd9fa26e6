//! Client interface for the local LLM runtime.
//!
//! [`LlmClient`] is what the generation pipeline talks to. [`OllamaClient`]
//! implements it over the Ollama HTTP API, and [`OllamaEmbedder`] exposes the
//! same runtime's embedding endpoint as an [`Embedder`](qagent_embedding::Embedder).
//!
//! Every failure (unreachable host, timeout, HTTP error, malformed body) is
//! reported as [`QaAgentError::BackendUnavailable`](qagent_shared::QaAgentError),
//! which callers treat as a signal to fall back to template mode.

mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use qagent_shared::Result;

pub use ollama::{OllamaClient, OllamaEmbedder};

/// One single-turn chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    /// System prompt, sent as the first message when present.
    pub system: Option<String>,
    pub prompt: String,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Completed chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Assistant message content.
    pub text: String,
    pub model: String,
    pub latency_ms: u64,
}

/// A text-generation runtime.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Name of the runtime, for logs.
    fn name(&self) -> &str;

    /// One cheap availability check. Never errors; unreachable is `false`.
    async fn probe(&self) -> bool;

    /// Run a chat completion. The response text is never empty.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
