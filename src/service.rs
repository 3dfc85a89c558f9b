//! Chat service: the layer that loads and saves records around the core.
//!
//! Wires the record stores, the [`ResponseGenerator`] and the
//! [`IndexBuilder`] together. Each call is one logical request; the only
//! shared mutable state is the SQLite database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::chat;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::error::{RagError, Result};
use crate::generate::ResponseGenerator;
use crate::index::{IndexBuilder, IndexOptions};
use crate::llm::create_model;
use crate::loader::Loader;
use crate::migrate;
use crate::models::{default_chat_name, ChatDebrief, ChatDetails, ChatQuery};
use crate::progress::IndexProgressReporter;
use crate::records::{ChatRecordStore, DocumentInfo, DocumentRecord, DocumentRecordStore};
use crate::retrieve::Retriever;
use crate::store::{SqliteVectorStore, VectorStore};
use crate::summary::ConversationSummary;

pub struct ChatService {
    chats: ChatRecordStore,
    documents: DocumentRecordStore,
    generator: ResponseGenerator,
    index: IndexBuilder,
    upload_dir: PathBuf,
    summarize: bool,
    debug: bool,
}

impl ChatService {
    pub fn new(
        pool: SqlitePool,
        generator: ResponseGenerator,
        index: IndexBuilder,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            chats: ChatRecordStore::new(pool.clone()),
            documents: DocumentRecordStore::new(pool),
            generator,
            index,
            upload_dir,
            summarize: false,
            debug: false,
        }
    }

    /// Build the full service from config: SQLite records and vectors, the
    /// configured embedder and language model.
    pub async fn open(config: &Config, progress: Box<dyn IndexProgressReporter>) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;

        let embedder = create_embedder(&config.embedding)?;
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(pool.clone(), embedder));
        let retriever = Retriever::new(store.clone(), config.retrieval.k);
        let generator = ResponseGenerator::new(retriever, create_model(&config.llm)?);

        let loader = Loader::from_config(&config.loader)?;
        let index = IndexBuilder::new(store, loader, IndexOptions::from(&config.index))?
            .with_progress(progress);

        Ok(Self::new(pool, generator, index, config.chat.upload_dir.clone())
            .with_modes(config.chat.summarize, config.chat.debug))
    }

    pub fn with_modes(mut self, summarize: bool, debug: bool) -> Self {
        self.summarize = summarize;
        self.debug = debug;
        self
    }

    /// Answer `query` within chat `id_chat`, creating the chat if needed.
    pub async fn ask(&self, id_chat: i64, query: ChatQuery) -> Result<ChatDetails> {
        let chat = self
            .chats
            .get(id_chat)
            .await?
            .unwrap_or_else(|| ChatDetails::empty(id_chat));
        let history = chat::conversation(&chat.history);

        let (response, summary) = if self.summarize {
            let mut memory = ConversationSummary::from_buffer(chat.summary.clone());
            let response = self
                .generator
                .generate_with_summary(&query, &history, Some(&mut memory), self.debug)
                .await?;
            (response, memory.buffer().to_string())
        } else {
            let response = self.generator.generate(&query, &history, self.debug).await?;
            (response, chat.summary.clone())
        };

        let exchange = chat::new_exchange(&chat, query, response);
        let mut chat = chat::append(chat, exchange)?;
        chat.turns += 1;
        chat.name = default_chat_name(id_chat);
        chat.summary = summary;

        self.chats.upsert(&chat).await?;
        info!(chat = id_chat, turns = chat.turns, "answered query");
        Ok(chat)
    }

    /// Open a new chat with `text` as its first query.
    ///
    /// The chat id is one past the largest existing id, or `0` for the first chat.
    pub async fn start_chat(&self, text: &str) -> Result<ChatDetails> {
        let id_chat = self.chats.max_id().await?.map_or(0, |max| max + 1);
        self.ask(id_chat, ChatQuery::new(0, text)).await
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatDebrief>> {
        self.chats.list().await
    }

    pub async fn history(&self, id_chat: i64) -> Result<ChatDetails> {
        self.chats
            .get(id_chat)
            .await?
            .ok_or_else(|| RagError::not_found(format!("chat {}", id_chat)))
    }

    /// Copy `path` into the upload directory, index it, and record the upload
    /// under every id the index assigned. Ids already recorded are skipped.
    pub async fn upload(&self, path: &Path) -> Result<Vec<String>> {
        if !path.is_file() {
            return Err(RagError::not_found(format!(
                "file does not exist: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RagError::invalid_argument("upload path has no file name"))?
            .to_string();

        std::fs::create_dir_all(&self.upload_dir)?;
        let dest = self.upload_dir.join(&name);
        let contents = std::fs::read(path)?;
        std::fs::write(&dest, &contents)?;

        let ids = self.index.index_from_file(&dest).await?;
        if ids.is_empty() {
            return Err(RagError::ingestion(format!(
                "upload of {} succeeded but no documents were ingested",
                name
            )));
        }

        let mut recorded = 0usize;
        for id in &ids {
            if self.documents.insert_if_absent(id, &name, &contents).await? {
                recorded += 1;
            } else {
                warn!(id = %id, "document record already exists, skipped");
            }
        }
        info!(file = %name, chunks = ids.len(), recorded, "uploaded document");
        Ok(ids)
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        self.documents.list().await
    }

    pub async fn document(&self, id: &str) -> Result<DocumentRecord> {
        self.documents
            .get(id)
            .await?
            .ok_or_else(|| RagError::not_found(format!("document {}", id)))
    }
}
