//! Index Builder: files, free text and structured records → vector-store entries.
//!
//! Every input goes through the same tail:
//!
//! ```text
//! chunks → sanitize metadata → character-window split (2000/200)
//!        → batches of ≤ batch_size → VectorStore::add_texts (sequential)
//! ```
//!
//! `.json` / `.jsonl` files are read as table-style records and flattened
//! into one chunk per record; anything else goes through the [`Loader`].
//! Each chunk gets a fresh UUID v4 at write time. Batches are written in
//! order with no cross-batch rollback: when batch *n* fails, batches
//! `1..n` stay committed and the error propagates.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::chunk::SplitterKind;
use crate::config::IndexConfig;
use crate::error::{RagError, Result};
use crate::loader::{file_extension, Loader};
use crate::metadata::sanitize;
use crate::models::{Chunk, IndexedDocument, Metadata};
use crate::progress::{IndexProgressEvent, IndexProgressReporter, NoProgress};
use crate::store::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

impl From<&IndexConfig> for IndexOptions {
    fn from(config: &IndexConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

pub struct IndexBuilder {
    store: Arc<dyn VectorStore>,
    loader: Loader,
    options: IndexOptions,
    progress: Box<dyn IndexProgressReporter>,
}

impl IndexBuilder {
    pub fn new(store: Arc<dyn VectorStore>, loader: Loader, options: IndexOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(RagError::invalid_argument("batch_size must be > 0"));
        }
        SplitterKind::Characters.build(options.chunk_size, options.chunk_overlap)?;
        Ok(Self {
            store,
            loader,
            options,
            progress: Box::new(NoProgress),
        })
    }

    pub fn with_progress(mut self, progress: Box<dyn IndexProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    /// Index a file and return the assigned ids in chunk order.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] when the file does not exist.
    /// - [`RagError::IngestionFailure`] for unreadable content or malformed JSON.
    /// - [`RagError::UpstreamFailure`] when a batch write fails.
    pub async fn index_from_file(&self, path: &Path) -> Result<Vec<String>> {
        if !path.is_file() {
            return Err(RagError::not_found(format!(
                "file does not exist: {}",
                path.display()
            )));
        }

        let chunks = if is_record_file(path) {
            read_records(path)?
                .iter()
                .map(flatten_record)
                .collect::<Result<Vec<_>>>()?
        } else {
            self.loader.load(path)?
        };

        self.index_chunks(chunks, &path.display().to_string()).await
    }

    /// Index free text. Blank text yields no ids and no writes.
    pub async fn index_from_text(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let chunk = Chunk::new(text, Metadata::new());
        self.index_chunks(vec![chunk], "text").await
    }

    /// Index already-parsed records (see [`flatten_record`]).
    pub async fn index_from_records(&self, records: &[Value], source: &str) -> Result<Vec<String>> {
        let chunks = records
            .iter()
            .map(flatten_record)
            .collect::<Result<Vec<_>>>()?;
        self.index_chunks(chunks, source).await
    }

    async fn index_chunks(&self, chunks: Vec<Chunk>, source: &str) -> Result<Vec<String>> {
        let splitter =
            SplitterKind::Characters.build(self.options.chunk_size, self.options.chunk_overlap)?;
        let chunks = splitter.split_chunks(sanitize(chunks));

        if chunks.is_empty() {
            info!(source, "nothing to index");
            return Ok(Vec::new());
        }

        let batch_size = self.options.batch_size;
        let total = chunks.len().div_ceil(batch_size) as u64;
        self.progress.report(IndexProgressEvent::Prepared {
            source: source.to_string(),
            chunks: chunks.len() as u64,
            batches: total,
        });

        let mut ids_added = Vec::with_capacity(chunks.len());
        for (n, batch) in chunks.chunks(batch_size).enumerate() {
            let documents: Vec<IndexedDocument> =
                batch.iter().cloned().map(IndexedDocument::assign).collect();
            let texts: Vec<String> = documents.iter().map(|d| d.chunk.content.clone()).collect();
            let metadatas: Vec<Metadata> =
                documents.iter().map(|d| d.chunk.metadata.clone()).collect();
            let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();

            let written = self.store.add_texts(&texts, &metadatas, &ids).await?;
            ids_added.extend(written);

            info!(
                source,
                batch = n + 1,
                total,
                chunks = batch.len(),
                "indexed batch"
            );
            self.progress.report(IndexProgressEvent::Batch {
                source: source.to_string(),
                n: n as u64 + 1,
                total,
            });
        }

        Ok(ids_added)
    }
}

/// `.json` and `.jsonl` files hold structured records.
pub fn is_record_file(path: &Path) -> bool {
    matches!(file_extension(path).as_str(), "json" | "jsonl")
}

/// Read records from a `.json` file (one object or an array of objects) or
/// a `.jsonl` file (one object per non-empty line).
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            RagError::not_found(format!("file does not exist: {}", path.display()))
        }
        _ => RagError::ingestion(format!("{}: {}", path.display(), e)),
    })?;

    let malformed = |e: serde_json::Error| {
        RagError::ingestion(format!("malformed JSON in {}: {}", path.display(), e))
    };

    if file_extension(path) == "jsonl" {
        return content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(malformed))
            .collect();
    }

    match serde_json::from_str(&content).map_err(malformed)? {
        Value::Array(records) => Ok(records),
        record => Ok(vec![record]),
    }
}

/// Flatten one table-style record into a single chunk.
///
/// The body joins, skipping empty parts, with a blank line:
/// `pre_text` lines, `post_text` lines, a `TABLE:` marker, table rows with
/// cells joined by `" | "`, and a `Q:`/`A:` block when both question and
/// answer are present. Metadata is `{id, source_file}` from the record's
/// `id` and `filename`.
pub fn flatten_record(record: &Value) -> Result<Chunk> {
    let obj = record
        .as_object()
        .ok_or_else(|| RagError::ingestion("record must be a JSON object"))?;

    let pre = text_lines(obj.get("pre_text"));
    let post = text_lines(obj.get("post_text"));

    let table = obj
        .get("table")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| match row {
                    Value::Array(cells) => cells
                        .iter()
                        .map(render_cell)
                        .collect::<Vec<_>>()
                        .join(" | "),
                    other => render_cell(other),
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let qa = obj.get("qa");
    let question = qa.and_then(|q| q.get("question")).filter(|v| is_truthy(v));
    let answer = qa.and_then(|q| q.get("answer")).filter(|v| is_truthy(v));
    let qa_block = match (question, answer) {
        (Some(q), Some(a)) => format!("\nQ: {}\nA: {}", render_cell(q), render_cell(a)),
        _ => String::new(),
    };

    let content = [pre.as_str(), post.as_str(), "TABLE:", table.as_str(), qa_block.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut metadata = Metadata::new();
    metadata.insert("id".into(), obj.get("id").cloned().unwrap_or(Value::Null));
    metadata.insert(
        "source_file".into(),
        obj.get("filename").cloned().unwrap_or(Value::Null),
    );

    Ok(Chunk::new(content, metadata))
}

fn text_lines(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(lines)) => lines
            .iter()
            .map(render_cell)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
