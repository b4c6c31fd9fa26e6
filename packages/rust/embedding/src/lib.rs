//! Embedding providers: text to fixed-length vectors.
//!
//! [`Embedder`] is the seam between the knowledge base and whatever computes
//! vectors. [`HashEmbedder`] is the deterministic offline implementation;
//! the `qagent-llm` crate adds one backed by the Ollama runtime.

mod hash;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use qagent_shared::{QaAgentError, Result};

pub use hash::HashEmbedder;

/// Kind of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderTier {
    /// Local feature hashing.
    Hash,
    /// A model served by an external runtime.
    Remote,
}

impl fmt::Display for EmbedderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash => write!(f, "hash"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedderInfo {
    pub name: String,
    pub dimension: usize,
    pub tier: EmbedderTier,
}

/// Maps text to a vector of [`Embedder::dimension`] components.
///
/// The same text must always map to the same vector for the lifetime of a
/// knowledge base, since stored chunk vectors are compared against freshly
/// embedded queries.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn info(&self) -> EmbedderInfo;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.info().dimension
    }
}

/// Check that `vector` has the dimension the provider advertises.
pub fn check_dimension(info: &EmbedderInfo, vector: &[f32]) -> Result<()> {
    if vector.len() != info.dimension {
        return Err(QaAgentError::Embedding(format!(
            "{} returned {} components, expected {}",
            info.name,
            vector.len(),
            info.dimension
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_display() {
        assert_eq!(EmbedderTier::Hash.to_string(), "hash");
        assert_eq!(EmbedderTier::Remote.to_string(), "remote");
    }

    #[test]
    fn dimension_check() {
        let info = EmbedderInfo {
            name: "test".into(),
            dimension: 3,
            tier: EmbedderTier::Hash,
        };
        assert!(check_dimension(&info, &[0.0, 1.0, 0.0]).is_ok());
        let err = check_dimension(&info, &[0.0; 4]).unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }
}
