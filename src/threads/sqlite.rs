//! SQLite-backed thread store.
//!
//! `threads` holds the latest snapshot per thread; `checkpoints` is an
//! append-only log of every snapshot written.

use super::{thread_title, ThreadStore, ThreadSummary};
use crate::agent::ConversationState;
use crate::error::{DoctorBotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS threads (
        thread_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        state_json TEXT NOT NULL,
        message_count INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS checkpoints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        thread_id TEXT NOT NULL,
        state_json TEXT NOT NULL,
        message_count INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_checkpoints_thread_id ON checkpoints(thread_id);
"#;

/// One entry in a thread's checkpoint history.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

/// SQLite-based thread store.
pub struct SqliteThreadStore {
    conn: Mutex<Connection>,
}

impl SqliteThreadStore {
    /// Open (or create) the thread database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened thread store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory thread store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DoctorBotError::ThreadStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Every snapshot written for a thread, oldest first.
    pub fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT message_count, created_at FROM checkpoints WHERE thread_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![thread_id], |row| {
            let count: i64 = row.get(0)?;
            let created_at: String = row.get(1)?;
            Ok(Checkpoint {
                message_count: count as usize,
                created_at: parse_timestamp(&created_at),
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    #[instrument(skip(self))]
    async fn get(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM threads WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let state: ConversationState = serde_json::from_str(&json).map_err(|e| {
                    DoctorBotError::ThreadStore(format!("Corrupt snapshot for {}: {}", thread_id, e))
                })?;
                debug!("Loaded thread {} ({} messages)", thread_id, state.len());
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, state), fields(messages = state.len()))]
    async fn put(&self, thread_id: &str, state: &ConversationState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();
        let count = state.len() as i64;

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO checkpoints (thread_id, state_json, message_count, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![thread_id, json, count, now],
        )?;

        tx.execute(
            r#"
            INSERT INTO threads (thread_id, title, state_json, message_count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(thread_id) DO UPDATE SET
                title = excluded.title,
                state_json = excluded.state_json,
                message_count = excluded.message_count,
                updated_at = excluded.updated_at
            "#,
            params![thread_id, thread_title(state), json, count, now],
        )?;

        tx.commit()?;
        debug!("Stored thread {}", thread_id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<BTreeSet<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT thread_id FROM threads")?;
        let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(ids.collect::<rusqlite::Result<_>>()?)
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT thread_id, title, message_count, updated_at FROM threads ORDER BY updated_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(2)?;
            let updated_at: String = row.get(3)?;
            Ok(ThreadSummary {
                thread_id: row.get(0)?,
                title: row.get(1)?,
                message_count: count as usize,
                updated_at: Some(parse_timestamp(&updated_at)),
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}
