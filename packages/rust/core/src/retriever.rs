//! Top-K retrieval over the knowledge store.

use tracing::{debug, instrument};

use qagent_embedding::Embedder;
use qagent_shared::{QaAgentError, Result, RetrievedChunk};
use qagent_storage::KnowledgeStore;

pub struct Retriever<'a> {
    store: &'a KnowledgeStore,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a KnowledgeStore, embedder: &'a dyn Embedder) -> Self {
        Self { store, embedder }
    }

    /// Embed `query` and return the `k` most similar stored chunks.
    ///
    /// Fails with [`QaAgentError::EmptyKnowledgeBase`] when nothing has been
    /// ingested. A store holding only vectors of another dimension (the
    /// embedder changed since ingestion) is a validation error.
    #[instrument(skip_all, fields(k = k))]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let stored = self.store.count().await?;
        if stored == 0 {
            return Err(QaAgentError::EmptyKnowledgeBase);
        }

        let vector = self.embedder.embed(query).await?;
        let results = self.store.query(&vector, k).await?;

        if results.is_empty() && k > 0 {
            return Err(QaAgentError::validation(format!(
                "no stored chunk has dimension {}; reset and rebuild the knowledge base with embedder {}",
                vector.len(),
                self.embedder.info().name
            )));
        }

        debug!(
            stored,
            returned = results.len(),
            top_score = results.first().map(|r| r.score),
            "retrieved chunks"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qagent_embedding::HashEmbedder;
    use qagent_shared::{Chunk, DocumentKind, chunk_id};

    async fn temp_store() -> (KnowledgeStore, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("qagent_retriever_{}.db", uuid::Uuid::now_v7()));
        (KnowledgeStore::open(&path).await.unwrap(), path)
    }

    fn chunk(embedder: &HashEmbedder, source: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            id: chunk_id(source, index),
            text: text.into(),
            source_document: source.into(),
            offset: 0,
            chunk_index: index,
            document_kind: DocumentKind::SupportDoc,
            embedding: embedder.embed_sync(text),
        }
    }

    #[tokio::test]
    async fn empty_store_is_an_error() {
        let (store, path) = temp_store().await;
        let embedder = HashEmbedder::new(64).unwrap();
        let err = Retriever::new(&store, &embedder).retrieve("discount", 5).await.unwrap_err();
        assert!(matches!(err, QaAgentError::EmptyKnowledgeBase));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn most_relevant_chunk_first() {
        let (store, path) = temp_store().await;
        let embedder = HashEmbedder::new(256).unwrap();
        store
            .insert(&[
                chunk(&embedder, "shipping.md", 0, "Express shipping costs $10 and arrives in two days."),
                chunk(&embedder, "discounts.md", 0, "The discount code SAVE15 applies a 15% discount."),
            ])
            .await
            .unwrap();

        let retriever = Retriever::new(&store, &embedder);
        let results = retriever.retrieve("discount code SAVE15", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.source_document, "discounts.md");

        let again = retriever.retrieve("discount code SAVE15", 2).await.unwrap();
        assert_eq!(results, again);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_reported() {
        let (store, path) = temp_store().await;
        let small = HashEmbedder::new(32).unwrap();
        store.insert(&[chunk(&small, "a.md", 0, "discount")]).await.unwrap();

        let large = HashEmbedder::new(64).unwrap();
        let err = Retriever::new(&store, &large).retrieve("discount", 3).await.unwrap_err();
        assert!(matches!(err, QaAgentError::Validation { .. }));
        let _ = std::fs::remove_file(path);
    }
}
