//! Ollama HTTP API client.
//!
//! Endpoints used: `GET /api/tags` (probe), `POST /api/chat` with
//! `stream: false`, and `POST /api/embeddings`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use qagent_embedding::{Embedder, EmbedderInfo, EmbedderTier, check_dimension};
use qagent_shared::{OllamaConfig, QaAgentError, Result};

use crate::{ChatRequest, ChatResponse, LlmClient};

/// User-Agent string for runtime requests.
const USER_AGENT: &str = concat!("qagent/", env!("CARGO_PKG_VERSION"));

/// Text embedded once to discover the embedding dimension.
const DIMENSION_PROBE_TEXT: &str = "dimension probe";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    model: String,
    message: Option<WireResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct WireEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

// ---------------------------------------------------------------------------
// Chat client
// ---------------------------------------------------------------------------

/// [`LlmClient`] backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    client: Client,
    probe_client: Client,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client: build_client(config.timeout_secs)?,
            probe_client: build_client(config.probe_timeout_secs)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.probe_client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("ollama reachable");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "ollama probe failed");
                false
            }
            Err(e) => {
                debug!(error = %e, "ollama unreachable");
                false
            }
        }
    }

    #[instrument(skip_all, fields(model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.endpoint);
        let start = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = WireChatRequest {
            model: &request.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| QaAgentError::BackendUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QaAgentError::BackendUnavailable(format!(
                "{url}: HTTP {status}"
            )));
        }

        let parsed: WireChatResponse = response.json().await.map_err(|e| {
            QaAgentError::BackendUnavailable(format!("{url}: invalid response body: {e}"))
        })?;

        let text = parsed.message.map(|m| m.content).unwrap_or_default();
        if text.trim().is_empty() {
            return Err(QaAgentError::BackendUnavailable(format!(
                "{url}: empty response from model {}",
                request.model
            )));
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(latency_ms, chars = text.len(), "chat completion received");

        Ok(ChatResponse {
            text,
            model: if parsed.model.is_empty() {
                request.model.clone()
            } else {
                parsed.model
            },
            latency_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

/// [`Embedder`] backed by Ollama's `/api/embeddings`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    endpoint: String,
    model: String,
    client: Client,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Connect and discover the model's embedding dimension.
    #[instrument(skip_all, fields(model = %config.embedding_model))]
    pub async fn connect(config: &OllamaConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let model = config.embedding_model.clone();

        let probe = request_embedding(&client, &endpoint, &model, DIMENSION_PROBE_TEXT).await?;
        debug!(dimension = probe.len(), "embedding dimension discovered");

        Ok(Self {
            endpoint,
            model,
            client,
            dimension: probe.len(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: format!("ollama-{}", self.model),
            dimension: self.dimension,
            tier: EmbedderTier::Remote,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = request_embedding(&self.client, &self.endpoint, &self.model, text).await?;
        check_dimension(&self.info(), &vector)?;
        Ok(vector)
    }
}

async fn request_embedding(
    client: &Client,
    endpoint: &str,
    model: &str,
    text: &str,
) -> Result<Vec<f32>> {
    let url = format!("{endpoint}/api/embeddings");
    let response = client
        .post(&url)
        .json(&WireEmbeddingRequest {
            model,
            prompt: text,
        })
        .send()
        .await
        .map_err(|e| QaAgentError::Embedding(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(QaAgentError::Embedding(format!("{url}: HTTP {status}")));
    }

    let parsed: WireEmbeddingResponse = response
        .json()
        .await
        .map_err(|e| QaAgentError::Embedding(format!("{url}: invalid response body: {e}")))?;

    if parsed.embedding.is_empty() {
        return Err(QaAgentError::Embedding(format!(
            "{url}: model {model} returned an empty embedding"
        )));
    }
    Ok(parsed.embedding)
}

/// Build a reqwest client with the given request timeout.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| QaAgentError::config(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OllamaConfig {
        OllamaConfig {
            endpoint: format!("{}/", server.uri()),
            timeout_secs: 5,
            probe_timeout_secs: 1,
            ..OllamaConfig::default()
        }
    }

    #[tokio::test]
    async fn probe_succeeds_when_tags_respond() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server)).unwrap();
        assert!(client.probe().await);
    }

    #[tokio::test]
    async fn probe_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server)).unwrap();
        assert!(!client.probe().await);
    }

    #[tokio::test]
    async fn probe_fails_when_unreachable() {
        let config = OllamaConfig {
            endpoint: "http://127.0.0.1:9".into(),
            probe_timeout_secs: 1,
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        assert!(!client.probe().await);
    }

    #[tokio::test]
    async fn chat_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama2",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "be precise"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama2",
                "message": {"role": "assistant", "content": "hi there"},
                "done": true
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server)).unwrap();
        let response = client
            .chat(&ChatRequest::new("llama2", "hello").with_system("be precise"))
            .await
            .unwrap();
        assert_eq!(response.text, "hi there");
        assert_eq!(response.model, "llama2");
    }

    #[tokio::test]
    async fn chat_http_error_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server)).unwrap();
        let err = client.chat(&ChatRequest::new("missing", "hello")).await.unwrap_err();
        assert!(matches!(err, QaAgentError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn chat_empty_content_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama2",
                "message": {"role": "assistant", "content": "   "}
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server)).unwrap();
        let err = client.chat(&ChatRequest::new("llama2", "hello")).await.unwrap_err();
        assert!(matches!(err, QaAgentError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn chat_garbage_body_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server)).unwrap();
        let err = client.chat(&ChatRequest::new("llama2", "hello")).await.unwrap_err();
        assert!(matches!(err, QaAgentError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn embedder_discovers_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.1, 0.2, 0.3, 0.4]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::connect(&config_for(&server)).await.unwrap();
        assert_eq!(embedder.dimension(), 4);
        assert_eq!(embedder.info().tier, EmbedderTier::Remote);
        let v = embedder.embed("discount code").await.unwrap();
        assert_eq!(v.len(), 4);
    }

    #[tokio::test]
    async fn embedder_empty_vector_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": []
            })))
            .mount(&server)
            .await;

        let err = OllamaEmbedder::connect(&config_for(&server)).await.unwrap_err();
        assert!(matches!(err, QaAgentError::Embedding(_)));
    }
}
