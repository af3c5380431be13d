//! SQLite-backed chunk storage.
//!
//! Metadata and embedding vectors live in one table; search is brute-force
//! cosine over all candidate rows. Fine for corpus sizes where a dedicated
//! vector database would be overkill.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{Chunk, ChunkStorage, ScoredChunk};
use crate::core::errors::AssistantError;
use crate::vector_math::cosine_similarity;

pub struct SqliteChunkStore {
    pool: SqlitePool,
}

impl SqliteChunkStore {
    pub async fn with_path(db_path: impl AsRef<Path>) -> Result<Self, AssistantError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(AssistantError::storage)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), AssistantError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(AssistantError::storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id)")
            .execute(&self.pool)
            .await
            .map_err(AssistantError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Chunk {
        Chunk {
            chunk_id: row.get("chunk_id"),
            text: row.get("content"),
            source_id: row.get("source_id"),
            position: row.get::<i64, _>("position") as usize,
        }
    }
}

#[async_trait]
impl ChunkStorage for SqliteChunkStore {
    async fn insert_batch(&self, items: Vec<(Chunk, Vec<f32>)>) -> Result<(), AssistantError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(AssistantError::storage)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            sqlx::query(
                "INSERT OR REPLACE INTO chunks (chunk_id, source_id, position, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.source_id)
            .bind(chunk.position as i64)
            .bind(&chunk.text)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(AssistantError::storage)?;
        }

        tx.commit().await.map_err(AssistantError::storage)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        source_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, AssistantError> {
        // rowid order = ingestion order; the stable sort below keeps it as
        // the tie-break between equal scores.
        let rows = if let Some(source_id) = source_id {
            sqlx::query(
                "SELECT chunk_id, source_id, position, content, embedding
                 FROM chunks
                 WHERE source_id = ?1
                 ORDER BY rowid ASC",
            )
            .bind(source_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AssistantError::storage)?
        } else {
            sqlx::query(
                "SELECT chunk_id, source_id, position, content, embedding
                 FROM chunks
                 ORDER BY rowid ASC",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(AssistantError::storage)?
        };

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let embedding_bytes: Vec<u8> = row.get("embedding");
            if embedding_bytes.is_empty() {
                continue;
            }
            let stored = Self::deserialize_embedding(&embedding_bytes);
            let score = cosine_similarity(query_embedding, &stored)?;
            scored.push(ScoredChunk {
                chunk: Self::row_to_chunk(row),
                score,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn count(&self, source_id: Option<&str>) -> Result<usize, AssistantError> {
        let count: i64 = if let Some(source_id) = source_id {
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE source_id = ?1")
                .bind(source_id)
                .fetch_one(&self.pool)
                .await
                .map_err(AssistantError::storage)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
                .fetch_one(&self.pool)
                .await
                .map_err(AssistantError::storage)?
        };

        Ok(count as usize)
    }

    async fn source_ids(&self) -> Result<Vec<String>, AssistantError> {
        let rows = sqlx::query(
            "SELECT source_id FROM chunks GROUP BY source_id ORDER BY MIN(rowid) ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AssistantError::storage)?;

        Ok(rows.iter().map(|row| row.get("source_id")).collect())
    }

    async fn clear(&self) -> Result<(), AssistantError> {
        sqlx::query("DELETE FROM chunks")
            .execute(&self.pool)
            .await
            .map_err(AssistantError::storage)?;
        Ok(())
    }
}
