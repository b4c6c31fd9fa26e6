//! Shared types, error model, and configuration for the QA agent.
//!
//! This crate is the foundation depended on by all other qagent crates.
//! It provides:
//! - [`QaAgentError`]: the unified error type
//! - Domain types ([`Chunk`], [`TestCase`], [`Script`], [`SourceDocument`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChunkingConfig, DefaultsConfig, EmbedderKind, GenerationConfig,
    GroundingPolicyKind, OllamaConfig, RetrievalConfig, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from,
};
pub use error::{QaAgentError, Result};
pub use types::{
    Chunk, DocumentFormat, DocumentKind, GenerationMode, RetrievedChunk, Script, SourceDocument,
    TestCase, TestType, chunk_id, content_hash,
};
