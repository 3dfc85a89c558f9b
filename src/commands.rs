//! CLI command handlers.
//!
//! Each `run_*` function backs one `ragchat` subcommand: it opens what the
//! command needs from the config, calls into the library and prints the
//! result to stdout. Progress and logs go to stderr.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::index::{IndexBuilder, IndexOptions};
use crate::loader::Loader;
use crate::migrate;
use crate::models::{ChatDetails, ChatQuery};
use crate::progress::ProgressMode;
use crate::records::{ChatRecordStore, DocumentRecordStore};
use crate::retrieve::Retriever;
use crate::service::ChatService;
use crate::store::{SqliteVectorStore, VectorStore};

async fn open_pool(config: &Config) -> Result<SqlitePool> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    Ok(pool)
}

fn open_store(config: &Config, pool: SqlitePool) -> Result<Arc<dyn VectorStore>> {
    let embedder = create_embedder(&config.embedding)?;
    Ok(Arc::new(SqliteVectorStore::new(pool, embedder)))
}

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    pool.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

/// Print the chunks the loader produces for `path` without writing anything.
pub fn run_load(config: &Config, path: &Path) -> Result<()> {
    let chunks = Loader::from_config(&config.loader)?.load(path)?;
    for (i, chunk) in chunks.iter().enumerate() {
        println!(
            "[chunk {}] {}",
            i,
            serde_json::Value::Object(chunk.metadata.clone())
        );
        println!("{}", chunk.content);
        println!();
    }
    println!("{} chunks", chunks.len());
    Ok(())
}

pub async fn run_ingest(
    config: &Config,
    path: &Path,
    options: IndexOptions,
    progress: ProgressMode,
) -> Result<()> {
    let pool = open_pool(config).await?;
    let store = open_store(config, pool.clone())?;
    let builder = IndexBuilder::new(store, Loader::from_config(&config.loader)?, options)?
        .with_progress(progress.reporter());

    let ids = builder.index_from_file(path).await?;
    pool.close().await;

    for id in &ids {
        println!("{}", id);
    }
    eprintln!("Indexed {} chunks from {}", ids.len(), path.display());
    Ok(())
}

pub async fn run_ingest_text(config: &Config, text: &str) -> Result<()> {
    let pool = open_pool(config).await?;
    let store = open_store(config, pool.clone())?;
    let builder = IndexBuilder::new(
        store,
        Loader::from_config(&config.loader)?,
        IndexOptions::from(&config.index),
    )?;

    let ids = builder.index_from_text(text).await?;
    pool.close().await;

    for id in &ids {
        println!("{}", id);
    }
    Ok(())
}

pub async fn run_retrieve(config: &Config, query: &str, k: Option<i64>) -> Result<()> {
    let pool = open_pool(config).await?;
    let retriever = Retriever::new(open_store(config, pool.clone())?, config.retrieval.k);
    let chunks = retriever
        .retrieve_chunks(query, k.unwrap_or(config.retrieval.k))
        .await?;
    pool.close().await;

    if chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, chunk) in chunks.iter().enumerate() {
        let source = chunk
            .metadata
            .get("source")
            .or_else(|| chunk.metadata.get("source_file"))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!("{}. [{:.3}] {}", i + 1, chunk.score, source);
        println!("{}", chunk.content);
        println!();
    }
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    id_chat: i64,
    query: &str,
    summarize: bool,
    debug: bool,
) -> Result<()> {
    let service = ChatService::open(config, ProgressMode::Off.reporter())
        .await?
        .with_modes(summarize || config.chat.summarize, debug || config.chat.debug);
    let chat = service.ask(id_chat, ChatQuery::new(0, query)).await?;
    print_last_answer(&chat);
    Ok(())
}

pub async fn run_new(config: &Config, query: &str) -> Result<()> {
    let service = ChatService::open(config, ProgressMode::Off.reporter()).await?;
    let chat = service.start_chat(query).await?;
    println!("Started chat {}", chat.id_chat);
    print_last_answer(&chat);
    Ok(())
}

pub async fn run_upload(config: &Config, path: &Path) -> Result<()> {
    let service = ChatService::open(config, ProgressMode::default_for_tty().reporter()).await?;
    let ids = service.upload(path).await?;
    println!("Uploaded {} ({} chunks)", path.display(), ids.len());
    Ok(())
}

pub async fn run_chats(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    let chats = ChatRecordStore::new(pool.clone()).list().await?;
    pool.close().await;

    if chats.is_empty() {
        println!("No chats.");
        return Ok(());
    }
    for chat in chats {
        println!("{:>6}  {}  {}", chat.id_chat, chat.name, chat.summary);
    }
    Ok(())
}

pub async fn run_history(config: &Config, id_chat: i64) -> Result<()> {
    let pool = open_pool(config).await?;
    let chat = ChatRecordStore::new(pool.clone()).get(id_chat).await?;
    pool.close().await;

    let Some(chat) = chat else {
        anyhow::bail!("chat not found: {}", id_chat);
    };

    println!("--- {} ({} turns) ---", chat.name, chat.turns);
    if !chat.summary.is_empty() {
        println!("summary: {}", chat.summary);
    }
    for exchange in &chat.history {
        println!("[{}] User: {}", exchange.id_exchange, exchange.query.content);
        println!("[{}] Assistant: {}", exchange.id_exchange, exchange.response.content);
    }
    Ok(())
}

pub async fn run_documents(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    let docs = DocumentRecordStore::new(pool.clone()).list().await?;
    pool.close().await;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in docs {
        println!("{}  {}  {} bytes", doc.id, doc.name, doc.size);
    }
    Ok(())
}

pub async fn run_document(config: &Config, id: &str) -> Result<()> {
    let pool = open_pool(config).await?;
    let doc = DocumentRecordStore::new(pool.clone()).get(id).await?;
    pool.close().await;

    let Some(doc) = doc else {
        anyhow::bail!("document not found: {}", id);
    };

    println!("id:    {}", doc.id);
    println!("name:  {}", doc.name);
    println!("bytes: {}", doc.contents.len());
    Ok(())
}

fn print_last_answer(chat: &ChatDetails) {
    if let Some(exchange) = chat.history.last() {
        println!("{}", exchange.response.content);
    }
}
