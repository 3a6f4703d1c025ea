//! In-memory thread store for tests and throwaway sessions.

use super::ThreadStore;
use crate::agent::ConversationState;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// In-memory thread store.
#[derive(Default)]
pub struct MemoryThreadStore {
    threads: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn get(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &str, state: &ConversationState) -> Result<()> {
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    async fn list_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self.threads.read().await.keys().cloned().collect())
    }
}
