//! Vector store abstraction.
//!
//! The Index Builder writes through [`VectorStore::add_texts`] and the
//! Retriever reads through [`VectorStore::similarity_search`]. Both
//! implementations embed text with an [`Embedder`](crate::embedding::Embedder)
//! and rank by cosine similarity:
//!
//! - [`InMemoryVectorStore`]: process-local, for tests and one-shot use.
//! - [`SqliteVectorStore`]: persisted in the `vectors` table.

mod memory;
mod sqlite;

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{Metadata, RetrievedChunk};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist one batch. `texts`, `metadatas` and `ids` are parallel slices;
    /// an id already present is overwritten. Returns the ids written.
    async fn add_texts(
        &self,
        texts: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<Vec<String>>;

    /// Return at most `k` chunks ranked by descending similarity to `query`.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

fn check_parallel(texts: &[String], metadatas: &[Metadata], ids: &[String]) -> Result<()> {
    if texts.len() != metadatas.len() || texts.len() != ids.len() {
        return Err(RagError::invalid_argument(format!(
            "add_texts needs parallel inputs, got {} texts, {} metadatas, {} ids",
            texts.len(),
            metadatas.len(),
            ids.len()
        )));
    }
    Ok(())
}

fn check_embedding_count(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(RagError::upstream(format!(
            "embedder returned {} vectors for {} texts",
            got, expected
        )));
    }
    Ok(())
}

/// Sort by descending score; ties keep insertion order.
fn rank(mut scored: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
