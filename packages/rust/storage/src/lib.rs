//! libSQL-backed knowledge store (offline mode).
//!
//! [`KnowledgeStore`] persists chunks together with their embedding vectors
//! and answers exact nearest-neighbor queries by cosine similarity.
//!
//! **Lifecycle:** [`KnowledgeStore::open`] → any number of
//! [`insert`](KnowledgeStore::insert) / [`query`](KnowledgeStore::query) →
//! [`reset`](KnowledgeStore::reset) or [`close`](KnowledgeStore::close).
//! The store is passed by reference; there is no process-wide handle.

mod migrations;
mod vector;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use qagent_shared::{Chunk, DocumentFormat, DocumentKind, QaAgentError, Result, RetrievedChunk};

pub use vector::cosine_similarity;

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "knowledge.db";

/// Metadata of one ingested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub name: String,
    pub kind: DocumentKind,
    pub format: DocumentFormat,
    pub content_hash: String,
    /// Length of the extracted text in characters.
    pub char_count: usize,
    pub ingested_at: DateTime<Utc>,
}

/// Per-source view of the store contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub kind: DocumentKind,
    pub chunk_count: usize,
    pub content_hash: Option<String>,
    pub ingested_at: Option<String>,
}

/// Persistent chunk and vector store wrapping a libSQL database.
pub struct KnowledgeStore {
    #[allow(dead_code)]
    db: Database,
    /// Every operation holds the lock for its whole critical section.
    conn: Mutex<Connection>,
}

impl KnowledgeStore {
    /// Open or create a database at `path` and apply pending migrations.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QaAgentError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        run_migrations(&conn).await?;
        debug!("knowledge store opened");

        Ok(Self {
            db,
            conn: Mutex::new(conn),
        })
    }

    /// Insert chunks, replacing any chunk with the same id.
    ///
    /// The batch is written in one transaction and is visible to queries as
    /// soon as this returns. Returns the number of chunks written.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn insert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock().await;
        let tx = conn.transaction().await.map_err(db_err)?;

        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(QaAgentError::Storage(format!(
                    "chunk {} has no embedding",
                    chunk.id
                )));
            }
            tx.execute(
                "INSERT INTO chunks (id, source_document, chunk_index, char_offset, kind, text, dimension, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    source_document = excluded.source_document,
                    chunk_index = excluded.chunk_index,
                    char_offset = excluded.char_offset,
                    kind = excluded.kind,
                    text = excluded.text,
                    dimension = excluded.dimension,
                    embedding = excluded.embedding",
                params![
                    chunk.id.as_str(),
                    chunk.source_document.as_str(),
                    chunk.chunk_index as i64,
                    chunk.offset as i64,
                    chunk.document_kind.as_str(),
                    chunk.text.as_str(),
                    chunk.embedding.len() as i64,
                    vector::encode_embedding(&chunk.embedding)
                ],
            )
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(written = chunks.len(), "chunks committed");
        Ok(chunks.len())
    }

    /// Return the `k` stored chunks most similar to `vector`.
    ///
    /// Only chunks whose embedding has the same dimension are scored. Results
    /// are ordered by descending score, ties by ascending chunk id, so a fixed
    /// store state always yields the same answer.
    #[instrument(skip_all, fields(k = k, dimension = vector.len()))]
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT id, source_document, chunk_index, char_offset, kind, text, dimension, embedding
                 FROM chunks WHERE dimension = ?1",
                params![vector.len() as i64],
            )
            .await
            .map_err(db_err)?;

        let mut scored = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let chunk = row_to_chunk(&row)?;
            let score = cosine_similarity(vector, &chunk.embedding).unwrap_or(0.0);
            scored.push(RetrievedChunk { chunk, score });
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(k);

        debug!(returned = scored.len(), "similarity query complete");
        Ok(scored)
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM chunks", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)? as usize),
            None => Ok(0),
        }
    }

    /// Record (or replace) the metadata of an ingested document.
    pub async fn record_document(&self, record: &DocumentRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO documents (name, kind, format, content_hash, char_count, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                kind = excluded.kind,
                format = excluded.format,
                content_hash = excluded.content_hash,
                char_count = excluded.char_count,
                ingested_at = excluded.ingested_at",
            params![
                record.name.as_str(),
                record.kind.as_str(),
                record.format.as_str(),
                record.content_hash.as_str(),
                record.char_count as i64,
                record.ingested_at.to_rfc3339()
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Content hash recorded for `name`, if it was ingested before.
    pub async fn document_hash(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT content_hash FROM documents WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(db_err)?)),
            None => Ok(None),
        }
    }

    /// Delete every chunk of `name` and its document record.
    /// Returns the number of chunks removed.
    pub async fn remove_document(&self, name: &str) -> Result<usize> {
        let conn = self.conn.lock().await;
        let tx = conn.transaction().await.map_err(db_err)?;

        let removed = tx
            .execute(
                "DELETE FROM chunks WHERE source_document = ?1",
                params![name],
            )
            .await
            .map_err(db_err)?;
        tx.execute("DELETE FROM documents WHERE name = ?1", params![name])
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(removed as usize)
    }

    /// Per-source chunk counts, ordered by source name.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT c.source_document, c.kind, COUNT(*), d.content_hash, d.ingested_at
                 FROM chunks c
                 LEFT JOIN documents d ON d.name = c.source_document
                 GROUP BY c.source_document, c.kind
                 ORDER BY c.source_document",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let kind: String = row.get(1).map_err(db_err)?;
            results.push(DocumentSummary {
                name: row.get::<String>(0).map_err(db_err)?,
                kind: parse_kind(&kind)?,
                chunk_count: row.get::<i64>(2).map_err(db_err)? as usize,
                content_hash: row.get::<String>(3).ok(),
                ingested_at: row.get::<String>(4).ok(),
            });
        }
        Ok(results)
    }

    /// Delete all chunks and documents. Returns the number of chunks removed.
    #[instrument(skip_all)]
    pub async fn reset(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let tx = conn.transaction().await.map_err(db_err)?;

        let removed = tx
            .execute("DELETE FROM chunks", params![])
            .await
            .map_err(db_err)?;
        tx.execute("DELETE FROM documents", params![])
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        info!(removed, "knowledge store reset");
        Ok(removed as usize)
    }

    /// Release the database. Committed data stays on disk.
    pub async fn close(self) -> Result<()> {
        let conn = self.conn.into_inner();
        drop(conn);
        debug!("knowledge store closed");
        Ok(())
    }
}

/// Apply pending schema migrations.
async fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = schema_version(conn).await;

    for migration in migrations::all_migrations() {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                QaAgentError::Storage(format!("migration v{} failed: {e}", migration.version))
            })?;
        }
    }
    Ok(())
}

/// Current schema version, or 0 if no migrations have been applied.
async fn schema_version(conn: &Connection) -> u32 {
    let result = conn
        .query("SELECT MAX(version) FROM schema_migrations", params![])
        .await;

    match result {
        Ok(mut rows) => match rows.next().await {
            Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
            _ => 0,
        },
        // Table doesn't exist yet
        Err(_) => 0,
    }
}

fn row_to_chunk(row: &libsql::Row) -> Result<Chunk> {
    let kind: String = row.get(4).map_err(db_err)?;
    let dimension = row.get::<i64>(6).map_err(db_err)? as usize;
    let blob: Vec<u8> = row.get(7).map_err(db_err)?;

    Ok(Chunk {
        id: row.get::<String>(0).map_err(db_err)?,
        source_document: row.get::<String>(1).map_err(db_err)?,
        chunk_index: row.get::<i64>(2).map_err(db_err)? as usize,
        offset: row.get::<i64>(3).map_err(db_err)? as usize,
        document_kind: parse_kind(&kind)?,
        text: row.get::<String>(5).map_err(db_err)?,
        embedding: vector::decode_embedding(&blob, dimension)?,
    })
}

fn parse_kind(value: &str) -> Result<DocumentKind> {
    DocumentKind::parse(value)
        .ok_or_else(|| QaAgentError::Storage(format!("unknown document kind: {value}")))
}

fn db_err(e: libsql::Error) -> QaAgentError {
    QaAgentError::Storage(e.to_string())
}
