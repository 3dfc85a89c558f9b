//! Deterministic stand-ins for the embedding provider, language model and
//! vector store, shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ragchat::embedding::Embedder;
use ragchat::llm::{LanguageModel, ModelReply};
use ragchat::models::{ConversationMessage, Metadata, RetrievedChunk};
use ragchat::store::{InMemoryVectorStore, VectorStore};
use ragchat::{RagError, Result};

const DIMS: usize = 64;

/// Bag-of-words embedder: each lower-cased word bumps one of 64 buckets.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-64"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bucket(t)).collect())
    }
}

fn bucket(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.is_empty() {
            continue;
        }
        let h = word
            .bytes()
            .fold(5381u64, |h, b| h.wrapping_mul(33).wrapping_add(b as u64));
        v[(h % DIMS as u64) as usize] += 1.0;
    }
    v
}

/// Replies from a script (falling back to a fixed answer) and records
/// every message list it was invoked with.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ConversationMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, messages: &[ConversationMessage]) -> Result<ModelReply> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "scripted answer".to_string());
        Ok(ModelReply { content })
    }
}

/// Wraps an [`InMemoryVectorStore`] and records the texts and ids of every
/// write and the number of searches.
pub struct CountingStore {
    inner: InMemoryVectorStore,
    writes: Mutex<Vec<Vec<String>>>,
    ids: Mutex<Vec<Vec<String>>>,
    searches: Mutex<usize>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryVectorStore::new(Arc::new(HashEmbedder)),
            writes: Mutex::new(Vec::new()),
            ids: Mutex::new(Vec::new()),
            searches: Mutex::new(0),
        })
    }

    /// Texts of each `add_texts` call, in call order.
    pub fn writes(&self) -> Vec<Vec<String>> {
        self.writes.lock().unwrap().clone()
    }

    /// Ids passed to each `add_texts` call, in call order.
    pub fn written_ids(&self) -> Vec<Vec<String>> {
        self.ids.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.writes().iter().map(Vec::len).collect()
    }

    pub fn searches(&self) -> usize {
        *self.searches.lock().unwrap()
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    async fn add_texts(
        &self,
        texts: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<Vec<String>> {
        self.writes.lock().unwrap().push(texts.to_vec());
        self.ids.lock().unwrap().push(ids.to_vec());
        self.inner.add_texts(texts, metadatas, ids).await
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        *self.searches.lock().unwrap() += 1;
        self.inner.similarity_search(query, k).await
    }
}

/// Commits writes to an [`InMemoryVectorStore`] until the `fail_on`-th
/// `add_texts` call (1-based), which fails with `UpstreamFailure`.
pub struct FailingStore {
    inner: InMemoryVectorStore,
    fail_on: usize,
    calls: Mutex<Vec<usize>>,
    committed: Mutex<Vec<String>>,
}

impl FailingStore {
    pub fn new(fail_on: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryVectorStore::new(Arc::new(HashEmbedder)),
            fail_on,
            calls: Mutex::new(Vec::new()),
            committed: Mutex::new(Vec::new()),
        })
    }

    /// Batch size of every `add_texts` call, including the failing one.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    /// Ids of the batches that were written before the failure.
    pub fn committed_ids(&self) -> Vec<String> {
        self.committed.lock().unwrap().clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl VectorStore for FailingStore {
    async fn add_texts(
        &self,
        texts: &[String],
        metadatas: &[Metadata],
        ids: &[String],
    ) -> Result<Vec<String>> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(texts.len());
            calls.len()
        };
        if call == self.fail_on {
            return Err(RagError::upstream("vector store unavailable"));
        }
        let written = self.inner.add_texts(texts, metadatas, ids).await?;
        self.committed.lock().unwrap().extend(written.iter().cloned());
        Ok(written)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.inner.similarity_search(query, k).await
    }
}
