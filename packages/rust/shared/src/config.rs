//! Application configuration for the QA agent.
//!
//! User config lives at `~/.qagent/qagent.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QaAgentError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "qagent.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".qagent";

// ---------------------------------------------------------------------------
// Config structs (matching qagent.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Document chunking.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval and embedding.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Ollama runtime settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Test-case and script generation.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the knowledge base database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.qagent/kb".into()
}

/// `[chunking]` section. Lengths are in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks. Must be smaller than `chunk_size`.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    /// Check `0 < chunk_overlap < chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(QaAgentError::validation("chunk_size must be positive"));
        }
        if self.chunk_overlap == 0 {
            return Err(QaAgentError::validation("chunk_overlap must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(QaAgentError::validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

/// Which embedding provider to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Deterministic local feature hashing.
    Hash,
    /// Ollama `/api/embeddings`.
    Ollama,
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks retrieved to ground test-case generation.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunks retrieved as documentation context for script synthesis.
    #[serde(default = "default_script_context_k")]
    pub script_context_k: usize,

    /// Embedding provider.
    #[serde(default = "default_embedder")]
    pub embedder: EmbedderKind,

    /// Vector dimension of the hash embedder.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            script_context_k: default_script_context_k(),
            embedder: default_embedder(),
            embedding_dimension: default_embedding_dimension(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_script_context_k() -> usize {
    3
}
fn default_embedder() -> EmbedderKind {
    EmbedderKind::Hash
}
fn default_embedding_dimension() -> usize {
    384
}

/// `[ollama]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Set to false to always use template mode.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the Ollama server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model used for test-case generation.
    #[serde(default = "default_test_case_model")]
    pub test_case_model: String,

    /// Model used for script synthesis.
    #[serde(default = "default_script_model")]
    pub script_model: String,

    /// Model used when `retrieval.embedder = "ollama"`.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Per-request timeout for generation calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout of the availability probe.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            test_case_model: default_test_case_model(),
            script_model: default_script_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_test_case_model() -> String {
    "llama2".into()
}
fn default_script_model() -> String {
    "codellama".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_probe_timeout_secs() -> u64 {
    3
}

/// How generated test cases are checked against retrieved chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroundingPolicyKind {
    /// The case must cite at least one retrieved source by name.
    Cited,
    /// Steps and expected result must share enough terms with retrieved text.
    Lexical,
    /// Citation first, lexical overlap when the citation does not resolve.
    CitedOrLexical,
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Grounding predicate applied to LLM output.
    #[serde(default = "default_grounding_policy")]
    pub grounding_policy: GroundingPolicyKind,

    /// Minimum shared content terms for the lexical policy.
    #[serde(default = "default_min_term_overlap")]
    pub min_term_overlap: usize,

    /// Upper bound on test cases produced by template mode.
    #[serde(default = "default_template_max_cases")]
    pub template_max_cases: usize,

    /// HTML characters included in script prompts.
    #[serde(default = "default_html_snippet_chars")]
    pub html_snippet_chars: usize,

    /// URL opened by generated scripts.
    #[serde(default = "default_page_url")]
    pub page_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            grounding_policy: default_grounding_policy(),
            min_term_overlap: default_min_term_overlap(),
            template_max_cases: default_template_max_cases(),
            html_snippet_chars: default_html_snippet_chars(),
            page_url: default_page_url(),
        }
    }
}

fn default_grounding_policy() -> GroundingPolicyKind {
    GroundingPolicyKind::CitedOrLexical
}
fn default_min_term_overlap() -> usize {
    2
}
fn default_template_max_cases() -> usize {
    3
}
fn default_html_snippet_chars() -> usize {
    2000
}
fn default_page_url() -> String {
    "file:///path/to/checkout.html".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.qagent/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| QaAgentError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.qagent/qagent.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QaAgentError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        QaAgentError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.chunking.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QaAgentError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| QaAgentError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| QaAgentError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| QaAgentError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
