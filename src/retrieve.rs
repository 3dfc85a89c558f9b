//! Context Retriever: query text → context block.

use std::sync::Arc;

use tracing::debug;

use crate::error::{RagError, Result};
use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// Separator placed between retrieved chunks in a context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    default_k: i64,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, default_k: i64) -> Self {
        Self { store, default_k }
    }

    pub fn default_k(&self) -> i64 {
        self.default_k
    }

    /// Top-`k` chunks for `query`, in the order the store returns them.
    ///
    /// An empty query yields no results without touching the store.
    pub async fn retrieve_chunks(&self, query: &str, k: i64) -> Result<Vec<RetrievedChunk>> {
        if k <= 0 {
            return Err(RagError::invalid_argument(format!(
                "k must be a positive integer, got {}",
                k
            )));
        }
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let chunks = self.store.similarity_search(query, k as usize).await?;
        debug!(k, found = chunks.len(), "retrieved context");
        Ok(chunks)
    }

    /// Retrieved chunk contents joined by a blank line; empty when nothing matched.
    pub async fn retrieve(&self, query: &str, k: i64) -> Result<String> {
        let chunks = self.retrieve_chunks(query, k).await?;
        Ok(join_context(&chunks))
    }
}

pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed hits and counts how often it was searched.
    struct FixedStore {
        hits: Vec<&'static str>,
        searches: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn add_texts(
            &self,
            _texts: &[String],
            _metadatas: &[Metadata],
            ids: &[String],
        ) -> Result<Vec<String>> {
            Ok(ids.to_vec())
        }

        async fn similarity_search(&self, _query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .hits
                .iter()
                .take(k)
                .map(|h| RetrievedChunk {
                    content: h.to_string(),
                    metadata: Metadata::new(),
                    score: 1.0,
                })
                .collect())
        }
    }

    fn retriever(hits: Vec<&'static str>) -> (Retriever, Arc<FixedStore>) {
        let store = Arc::new(FixedStore {
            hits,
            searches: AtomicUsize::new(0),
        });
        (Retriever::new(store.clone(), 4), store)
    }

    #[tokio::test]
    async fn joins_hits_in_store_order() {
        let (r, _) = retriever(vec!["first", "second", "third"]);
        assert_eq!(r.retrieve("q", 2).await.unwrap(), "first\n\nsecond");
    }

    #[tokio::test]
    async fn no_hits_is_empty_context() {
        let (r, _) = retriever(vec![]);
        assert_eq!(r.retrieve("q", 4).await.unwrap(), "");
    }

    #[tokio::test]
    async fn empty_query_skips_the_store() {
        let (r, store) = retriever(vec!["x"]);
        assert!(r.retrieve_chunks("", 1).await.unwrap().is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_positive_k_is_rejected() {
        let (r, _) = retriever(vec!["x"]);
        for k in [0, -1] {
            let err = r.retrieve("q", k).await.unwrap_err();
            assert!(matches!(err, RagError::InvalidArgument(_)));
        }
    }
}
