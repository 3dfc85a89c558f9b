use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Character window applied by the Tokenizer/Loader to each extracted element.
#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_loader_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_loader_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_loader_chunk_size(),
            chunk_overlap: default_loader_chunk_overlap(),
        }
    }
}

fn default_loader_chunk_size() -> usize {
    500
}
fn default_loader_chunk_overlap() -> usize {
    200
}

/// Batching and secondary split applied by the Index Builder.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_index_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_index_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            chunk_size: default_index_chunk_size(),
            chunk_overlap: default_index_chunk_overlap(),
        }
    }
}

fn default_batch_size() -> usize {
    1000
}
fn default_index_chunk_size() -> usize {
    2000
}
fn default_index_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> i64 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            url: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Fold history and context into one system prompt before each call.
    #[serde(default = "default_true")]
    pub message_aware: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: 0.0,
            url: None,
            timeout_secs: default_llm_timeout_secs(),
            message_aware: true,
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default)]
    pub summarize: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            summarize: false,
            debug: false,
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    validate_window("loader", config.loader.chunk_size, config.loader.chunk_overlap)?;
    validate_window("index", config.index.chunk_size, config.index.chunk_overlap)?;

    if config.index.batch_size == 0 {
        anyhow::bail!("index.batch_size must be > 0");
    }

    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

fn validate_window(section: &str, size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        anyhow::bail!("{}.chunk_size must be > 0", section);
    }
    if overlap >= size {
        anyhow::bail!(
            "{}.chunk_overlap ({}) must be smaller than {}.chunk_size ({})",
            section,
            overlap,
            section,
            size
        );
    }
    Ok(())
}
