//! SQL migration definitions for the knowledge base database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: documents, chunks",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested source documents
CREATE TABLE IF NOT EXISTS documents (
    name         TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,
    format       TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    char_count   INTEGER NOT NULL,
    ingested_at  TEXT NOT NULL
);

-- Chunks with their embedding vectors (little-endian f32 blobs)
CREATE TABLE IF NOT EXISTS chunks (
    id              TEXT PRIMARY KEY,
    source_document TEXT NOT NULL,
    chunk_index     INTEGER NOT NULL,
    char_offset     INTEGER NOT NULL,
    kind            TEXT NOT NULL,
    text            TEXT NOT NULL,
    dimension       INTEGER NOT NULL,
    embedding       BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_document);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
