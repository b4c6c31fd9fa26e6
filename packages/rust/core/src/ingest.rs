//! Document ingestion: extract, chunk, embed, store.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use qagent_embedding::Embedder;
use qagent_shared::{
    Chunk, ChunkingConfig, QaAgentError, Result, SourceDocument, chunk_id, content_hash,
};
use qagent_storage::{DocumentRecord, KnowledgeStore};

use crate::chunker;
use crate::progress::ProgressReporter;

/// A document left out of the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: String,
}

/// Result of one ingestion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents_ingested: usize,
    pub chunks_inserted: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// Ingest `documents` in order.
///
/// Malformed or empty documents are skipped and reported; every other
/// failure aborts the call. A document whose content changed since it was
/// last ingested has its old chunks removed first, so shrinking documents
/// leave no stale tail behind.
#[instrument(skip_all, fields(documents = documents.len()))]
pub async fn ingest_documents(
    store: &KnowledgeStore,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    documents: &[SourceDocument],
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    chunking.validate()?;
    let mut report = IngestReport::default();
    let total = documents.len();

    for (i, doc) in documents.iter().enumerate() {
        let text = match qagent_extract::extract_text(doc) {
            Ok(text) => text,
            Err(QaAgentError::MalformedInputDocument { name, reason }) => {
                warn!(document = %name, %reason, "skipping malformed document");
                progress.document_skipped(&name, &reason);
                report.skipped.push(SkippedDocument { name, reason });
                continue;
            }
            Err(e) => return Err(e),
        };

        if text.trim().is_empty() {
            let reason = "no text content".to_string();
            warn!(document = %doc.name, "skipping empty document");
            progress.document_skipped(&doc.name, &reason);
            report.skipped.push(SkippedDocument {
                name: doc.name.clone(),
                reason,
            });
            continue;
        }

        let hash = content_hash(&doc.bytes);
        if let Some(previous) = store.document_hash(&doc.name).await? {
            if previous != hash {
                let removed = store.remove_document(&doc.name).await?;
                debug!(document = %doc.name, removed, "document changed, replacing chunks");
            }
        }

        let inserted = ingest_text(store, embedder, chunking, doc, &text).await?;
        store
            .record_document(&DocumentRecord {
                name: doc.name.clone(),
                kind: doc.kind,
                format: doc.format,
                content_hash: hash,
                char_count: text.chars().count(),
                ingested_at: Utc::now(),
            })
            .await?;

        report.documents_ingested += 1;
        report.chunks_inserted += inserted;
        progress.document_ingested(&doc.name, inserted, i + 1, total);
    }

    info!(
        ingested = report.documents_ingested,
        chunks = report.chunks_inserted,
        skipped = report.skipped.len(),
        "ingestion complete"
    );
    progress.done(&report);
    Ok(report)
}

async fn ingest_text(
    store: &KnowledgeStore,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    doc: &SourceDocument,
    text: &str,
) -> Result<usize> {
    let pieces = chunker::chunk_text(text, chunking)?;
    let texts: Vec<&str> = pieces.iter().map(|p| p.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    if vectors.len() != pieces.len() {
        return Err(QaAgentError::Embedding(format!(
            "embedded {} of {} chunks of {}",
            vectors.len(),
            pieces.len(),
            doc.name
        )));
    }

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .zip(vectors)
        .map(|(piece, embedding)| Chunk {
            id: chunk_id(&doc.name, piece.index),
            text: piece.text,
            source_document: doc.name.clone(),
            offset: piece.offset,
            chunk_index: piece.index,
            document_kind: doc.kind,
            embedding,
        })
        .collect();

    store.insert(&chunks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use qagent_embedding::HashEmbedder;

    async fn temp_store() -> (KnowledgeStore, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("qagent_ingest_{}.db", uuid::Uuid::now_v7()));
        (KnowledgeStore::open(&path).await.unwrap(), path)
    }

    fn small_chunks() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 10,
        }
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let (store, path) = temp_store().await;
        let embedder = HashEmbedder::new(64).unwrap();
        let docs = vec![
            SourceDocument::support("broken.json", "{\"codes\": "),
            SourceDocument::support("product_specs.md", "The discount code SAVE15 applies a 15% discount."),
            SourceDocument::support("blank.txt", "   \n"),
        ];

        let report = ingest_documents(&store, &embedder, &small_chunks(), &docs, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.documents_ingested, 1);
        assert!(report.chunks_inserted >= 1);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["broken.json", "blank.txt"]);
        assert_eq!(store.count().await.unwrap(), report.chunks_inserted);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn reingesting_is_idempotent() {
        let (store, path) = temp_store().await;
        let embedder = HashEmbedder::new(64).unwrap();
        let docs = vec![SourceDocument::support(
            "ui_ux_guide.txt",
            "Error messages appear in red. Buttons are green. Inputs show a placeholder.",
        )];

        ingest_documents(&store, &embedder, &small_chunks(), &docs, &SilentProgress)
            .await
            .unwrap();
        let first = store.count().await.unwrap();
        ingest_documents(&store, &embedder, &small_chunks(), &docs, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), first);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn changed_document_replaces_old_chunks() {
        let (store, path) = temp_store().await;
        let embedder = HashEmbedder::new(64).unwrap();

        let long = SourceDocument::support("specs.md", "a".repeat(200));
        ingest_documents(&store, &embedder, &small_chunks(), &[long], &SilentProgress)
            .await
            .unwrap();
        let before = store.count().await.unwrap();

        let short = SourceDocument::support("specs.md", "SAVE15 gives 15% off.");
        ingest_documents(&store, &embedder, &small_chunks(), &[short], &SilentProgress)
            .await
            .unwrap();

        assert!(before > 1);
        assert_eq!(store.count().await.unwrap(), 1);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn invalid_chunking_fails_before_work() {
        let (store, path) = temp_store().await;
        let embedder = HashEmbedder::new(64).unwrap();
        let bad = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        let docs = vec![SourceDocument::support("a.md", "text")];
        let err = ingest_documents(&store, &embedder, &bad, &docs, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, QaAgentError::Validation { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
        let _ = std::fs::remove_file(path);
    }
}
