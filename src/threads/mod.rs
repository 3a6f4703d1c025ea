//! Durable conversation threads.
//!
//! A thread store keeps the latest [`ConversationState`] snapshot per thread
//! id. Records are created on first `put`, replaced on every later `put`, and
//! never deleted implicitly.
//!
//! Concurrent access to different thread ids is safe. Callers must serialize
//! turns on the same thread id themselves.

mod memory;
mod sqlite;

pub use memory::MemoryThreadStore;
pub use sqlite::{Checkpoint, SqliteThreadStore};

use crate::agent::{ConversationState, Role};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

const TITLE_MAX_CHARS: usize = 60;

/// Fresh opaque thread id.
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Listing entry for a stored thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    /// First user message, shortened.
    pub title: String,
    pub message_count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ThreadSummary {
    pub fn from_state(thread_id: &str, state: &ConversationState) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            title: thread_title(state),
            message_count: state.len(),
            updated_at: None,
        }
    }
}

/// Short label for a conversation: its opening user message.
pub fn thread_title(state: &ConversationState) -> String {
    let first = state
        .messages()
        .iter()
        .find(|m| m.role() == Role::User)
        .map(|m| m.content().trim())
        .unwrap_or("");

    let first_line = first.lines().next().unwrap_or("");
    if first_line.chars().count() > TITLE_MAX_CHARS {
        let cut: String = first_line.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}

/// Keyed snapshot storage for conversation state.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Latest snapshot for a thread, or `None` if the thread was never stored.
    async fn get(&self, thread_id: &str) -> Result<Option<ConversationState>>;

    /// Replace the snapshot for a thread atomically.
    async fn put(&self, thread_id: &str, state: &ConversationState) -> Result<()>;

    /// All known thread ids.
    async fn list_ids(&self) -> Result<BTreeSet<String>>;

    /// Summaries of all threads, most recently updated first when timestamps
    /// are available.
    async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
        let mut summaries = Vec::new();
        for id in self.list_ids().await? {
            if let Some(state) = self.get(&id).await? {
                summaries.push(ThreadSummary::from_state(&id, &state));
            }
        }
        Ok(summaries)
    }
}
