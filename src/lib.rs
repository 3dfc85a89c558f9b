//! # ragchat
//!
//! Retrieval-augmented chat over uploaded documents.
//!
//! Documents are split into chunks, embedded and indexed into a vector
//! store. Chat queries retrieve the best-matching chunks and hand them,
//! with the conversation so far, to a language model. Each answer is
//! appended to the chat's history as a numbered exchange.
//!
//! ## Architecture
//!
//! ```text
//! upload ─▶ Loader ─▶ sanitize ─▶ IndexBuilder ─▶ VectorStore
//!                                                    │
//! query ──▶ Retriever ◀──────────────────────────────┘
//!               │
//!               ▼
//!        ResponseGenerator ─▶ LanguageModel
//!               │
//!               ▼
//!        chat::append ─▶ ChatRecordStore
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | Format-specific element extraction |
//! | [`chunk`] | Character-window and sentence splitters |
//! | [`loader`] | Extension-keyed loader and splitter selection |
//! | [`metadata`] | Metadata sanitizer |
//! | [`index`] | Index Builder |
//! | [`progress`] | Indexing progress on stderr |
//! | [`embedding`] | Embedding providers and vector helpers |
//! | [`store`] | Vector stores (in-memory, SQLite) |
//! | [`retrieve`] | Context Retriever |
//! | [`llm`] | Language model providers |
//! | [`generate`] | Response Generator |
//! | [`summary`] | Running conversation summary |
//! | [`chat`] | Chat Exchange Accumulator |
//! | [`records`] | Chat and document record stores |
//! | [`service`] | Chat service wiring |
//! | [`commands`] | CLI command handlers |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod index;
pub mod llm;
pub mod loader;
pub mod metadata;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod records;
pub mod retrieve;
pub mod service;
pub mod store;
pub mod summary;

pub use error::{RagError, Result};
