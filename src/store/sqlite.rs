use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{check_embedding_count, check_parallel, rank, VectorStore};
use crate::chunk::content_hash;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::{RagError, Result};
use crate::models::{Metadata, RetrievedChunk};

/// Vectors persisted in the `vectors` table and ranked by brute-force cosine.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add_texts(
        &self,
        texts: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<Vec<String>> {
        check_parallel(texts, metadatas, ids)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(texts).await?;
        check_embedding_count(texts.len(), embeddings.len())?;

        let now = chrono::Utc::now().timestamp();
        let model = self.embedder.model_name().to_string();
        let mut tx = self.pool.begin().await?;

        for (((text, metadata), id), embedding) in
            texts.iter().zip(metadatas).zip(ids).zip(embeddings.iter())
        {
            let metadata_json = serde_json::to_string(metadata)
                .map_err(|e| RagError::invalid_argument(format!("metadata: {}", e)))?;
            sqlx::query(
                r#"
                INSERT INTO vectors (id, content, metadata_json, hash, embedding, model, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    metadata_json = excluded.metadata_json,
                    hash = excluded.hash,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    created_at = excluded.created_at
                "#,
            )
            .bind(id)
            .bind(text)
            .bind(&metadata_json)
            .bind(content_hash(text))
            .bind(vec_to_blob(embedding))
            .bind(&model)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(ids.to_vec())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let rows = sqlx::query("SELECT content, metadata_json, embedding FROM vectors ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let content: String = row.get("content");
            let metadata_json: String = row.get("metadata_json");
            let blob: Vec<u8> = row.get("embedding");
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| {
                RagError::upstream(format!("corrupt metadata in vector store: {}", e))
            })?;
            scored.push(RetrievedChunk {
                content,
                metadata,
                score: cosine_similarity(&query_vec, &blob_to_vec(&blob)),
            });
        }

        Ok(rank(scored, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![1.0, t.len() as f32])
                .collect())
        }
    }

    async fn open(tmp: &TempDir) -> SqliteVectorStore {
        let pool = db::connect_path(&tmp.path().join("vectors.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteVectorStore::new(pool, Arc::new(LengthEmbedder))
    }

    #[tokio::test]
    async fn persists_and_searches() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;

        let mut meta = Metadata::new();
        meta.insert("source".into(), "a.txt".into());
        let texts = vec!["short".to_string(), "a much longer passage".to_string()];
        let ids = vec!["one".to_string(), "two".to_string()];
        let written = store
            .add_texts(&texts, &[meta.clone(), meta], &ids)
            .await
            .unwrap();
        assert_eq!(written, ids);
        assert_eq!(store.count().await.unwrap(), 2);

        let hits = store.similarity_search("tiny", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "short");
        assert_eq!(hits[0].metadata["source"], "a.txt");
    }

    #[tokio::test]
    async fn rewriting_an_id_replaces_the_row() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let ids = vec!["same".to_string()];
        store
            .add_texts(&["v1".to_string()], &[Metadata::new()], &ids)
            .await
            .unwrap();
        store
            .add_texts(&["v2".to_string()], &[Metadata::new()], &ids)
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.similarity_search("v", 4).await.unwrap();
        assert_eq!(hits[0].content, "v2");
    }
}
