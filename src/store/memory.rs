use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_embedding_count, check_parallel, rank, VectorStore};
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::Result;
use crate::models::{Metadata, RetrievedChunk};

struct Entry {
    id: String,
    content: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
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

        let mut entries = self.entries.write().await;
        for (((text, metadata), id), embedding) in
            texts.iter().zip(metadatas).zip(ids).zip(embeddings)
        {
            let entry = Entry {
                id: id.clone(),
                content: text.clone(),
                metadata: metadata.clone(),
                embedding,
            };
            match entries.iter_mut().find(|e| e.id == *id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        Ok(ids.to_vec())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let entries = self.entries.read().await;
        let scored = entries
            .iter()
            .map(|e| RetrievedChunk {
                content: e.content.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(&query_vec, &e.embedding),
            })
            .collect();

        Ok(rank(scored, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    /// Maps text onto a 2-d vector from its 'a' and 'b' counts.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        t.matches('a').count() as f32,
                        t.matches('b').count() as f32,
                    ]
                })
                .collect())
        }
    }

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(LetterEmbedder))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn ranks_by_similarity() {
        let store = store();
        let texts = strings(&["aaaa", "bbbb", "aabb"]);
        let ids = strings(&["1", "2", "3"]);
        store
            .add_texts(&texts, &vec![Metadata::new(); 3], &ids)
            .await
            .unwrap();

        let hits = store.similarity_search("bbb", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "bbbb");
        assert_eq!(hits[1].content, "aabb");
    }

    #[tokio::test]
    async fn same_id_overwrites() {
        let store = store();
        store
            .add_texts(&strings(&["a"]), &[Metadata::new()], &strings(&["x"]))
            .await
            .unwrap();
        store
            .add_texts(&strings(&["b"]), &[Metadata::new()], &strings(&["x"]))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        let hits = store.similarity_search("b", 4).await.unwrap();
        assert_eq!(hits[0].content, "b");
    }

    #[tokio::test]
    async fn mismatched_inputs_are_rejected() {
        let err = store()
            .add_texts(&strings(&["a", "b"]), &[Metadata::new()], &strings(&["1", "2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        assert!(store().similarity_search("a", 4).await.unwrap().is_empty());
    }
}
