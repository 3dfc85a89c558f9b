//! SQLite-backed chat and document records.
//!
//! Chats are keyed by integer id and carry their history as a JSON-encoded
//! exchange list. Documents are keyed by the vector-store id of each chunk
//! indexed from an upload and carry the uploaded file's name and bytes.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::error::{RagError, Result};
use crate::models::{ChatDebrief, ChatDetails, ChatExchange};

#[derive(Clone)]
pub struct ChatRecordStore {
    pool: SqlitePool,
}

impl ChatRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id_chat: i64) -> Result<Option<ChatDetails>> {
        let row = sqlx::query("SELECT id, name, summary, turns, history FROM chats WHERE id = ?")
            .bind(id_chat)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history_json: String = row.get("history");
        let history: Vec<ChatExchange> = serde_json::from_str(&history_json).map_err(|e| {
            RagError::upstream(format!("corrupt history for chat {}: {}", id_chat, e))
        })?;
        let turns: i64 = row.get("turns");

        Ok(Some(ChatDetails {
            id_chat: row.get("id"),
            name: row.get("name"),
            summary: row.get("summary"),
            turns: turns.max(0) as u64,
            history,
        }))
    }

    pub async fn upsert(&self, chat: &ChatDetails) -> Result<()> {
        let history = serde_json::to_string(&chat.history)
            .map_err(|e| RagError::invalid_argument(format!("history: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO chats (id, name, summary, turns, history, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                summary = excluded.summary,
                turns = excluded.turns,
                history = excluded.history,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(chat.id_chat)
        .bind(&chat.name)
        .bind(&chat.summary)
        .bind(chat.turns as i64)
        .bind(&history)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ChatDebrief>> {
        let rows = sqlx::query("SELECT id, name, summary FROM chats ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| ChatDebrief {
                id_chat: row.get("id"),
                name: row.get("name"),
                summary: row.get("summary"),
            })
            .collect())
    }

    pub async fn max_id(&self) -> Result<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM chats")
            .fetch_one(&self.pool)
            .await?;
        Ok(max)
    }
}

/// A stored upload, addressed by one of its chunk ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub contents: Vec<u8>,
}

/// Listing view of a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub id: String,
    pub name: String,
    pub size: i64,
}

#[derive(Clone)]
pub struct DocumentRecordStore {
    pool: SqlitePool,
}

impl DocumentRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record `{id → name, contents}` unless `id` is already present.
    /// Returns whether a row was written.
    pub async fn insert_if_absent(&self, id: &str, name: &str, contents: &[u8]) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO documents (id, name, contents, uploaded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(contents)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT id, name, contents FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| DocumentRecord {
            id: row.get("id"),
            name: row.get("name"),
            contents: row.get("contents"),
        }))
    }

    pub async fn list(&self) -> Result<Vec<DocumentInfo>> {
        let rows =
            sqlx::query("SELECT id, name, LENGTH(contents) AS size FROM documents ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentInfo {
                id: row.get("id"),
                name: row.get("name"),
                size: row.get("size"),
            })
            .collect())
    }
}
