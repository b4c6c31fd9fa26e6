//! FNV-1a feature-hashing embedder.
//!
//! Each whole word and each character n-gram of the lowercased text is hashed
//! into one of `dimension` buckets with a hash-derived sign, then the vector
//! is L2-normalized. Texts sharing vocabulary land close in cosine space.

use async_trait::async_trait;

use qagent_shared::{QaAgentError, Result};

use crate::{Embedder, EmbedderInfo, EmbedderTier};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Weight of a whole-word feature relative to one n-gram.
const WORD_WEIGHT: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    ngram_range: (usize, usize),
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(QaAgentError::validation("embedding dimension must be positive"));
        }
        Ok(Self {
            dimension,
            ngram_range: (3, 4),
        })
    }

    pub fn with_ngram_range(mut self, min: usize, max: usize) -> Result<Self> {
        if min == 0 || min > max {
            return Err(QaAgentError::validation(format!(
                "invalid n-gram range {min}..={max}"
            )));
        }
        self.ngram_range = (min, max);
        Ok(self)
    }

    /// Synchronous embedding; the trait methods delegate here.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();

        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut vector, format!("w:{word}").as_bytes(), WORD_WEIGHT);
        }

        let chars: Vec<char> = lower.chars().collect();
        for n in self.ngram_range.0..=self.ngram_range.1 {
            if n > chars.len() {
                continue;
            }
            for window in chars.windows(n) {
                let ngram: String = window.iter().collect();
                self.add_feature(&mut vector, ngram.as_bytes(), 1.0);
            }
        }

        l2_normalize(&mut vector);
        vector
    }

    fn add_feature(&self, vector: &mut [f32], bytes: &[u8], weight: f32) {
        let h = fnv1a(bytes);
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if (h >> 32) & 1 == 0 { 1.0f32 } else { -1.0f32 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimension: 384,
            ngram_range: (3, 4),
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(v: &mut [f32]) -> f32 {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: format!("fnv1a-hash-{}", self.dimension),
            dimension: self.dimension,
            tier: EmbedderTier::Hash,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn basic_embedding_is_unit_length() {
        let emb = HashEmbedder::new(64).unwrap();
        let v = emb.embed("discount code SAVE15").await.unwrap();
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[test]
    fn deterministic() {
        let emb = HashEmbedder::default();
        assert_eq!(emb.embed_sync("express shipping"), emb.embed_sync("express shipping"));
    }

    #[test]
    fn case_insensitive() {
        let emb = HashEmbedder::default();
        assert_eq!(emb.embed_sync("SAVE15"), emb.embed_sync("save15"));
    }

    #[test]
    fn empty_input_is_zero_vector() {
        let emb = HashEmbedder::new(32).unwrap();
        assert!(emb.embed_sync("").iter().all(|&x| x == 0.0));
    }

    #[test]
    fn similar_inputs_correlate() {
        let emb = HashEmbedder::default();
        let query = emb.embed_sync("discount code SAVE15");
        let related = emb.embed_sync("The discount code SAVE15 applies a 15% discount to the total.");
        let unrelated = emb.embed_sync("Express shipping costs $10 and arrives in two days.");
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn batch_matches_single() {
        let emb = HashEmbedder::new(128).unwrap();
        let batch = emb.embed_batch(&["hello", "world"]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], emb.embed("world").await.unwrap());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashEmbedder::new(0).is_err());
    }

    #[test]
    fn ngram_range_validation() {
        assert!(HashEmbedder::default().with_ngram_range(2, 5).is_ok());
        assert!(HashEmbedder::default().with_ngram_range(0, 2).is_err());
        assert!(HashEmbedder::default().with_ngram_range(4, 3).is_err());
    }

    #[test]
    fn info_reports_dimension() {
        let emb = HashEmbedder::new(256).unwrap();
        assert_eq!(emb.dimension(), 256);
        assert_eq!(emb.info().tier, EmbedderTier::Hash);
        assert_eq!(emb.info().name, "fnv1a-hash-256");
    }

    #[test]
    fn fnv1a_known_values() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_ne!(fnv1a(b"a"), fnv1a(b"b"));
    }

    #[test]
    fn l2_normalize_unit() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 0.001);
        assert!((v[1] - 0.8).abs() < 0.001);
    }
}
