//! Threads command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::threads::{SqliteThreadStore, ThreadStore};
use anyhow::Result;

/// List stored consultations, most recent first.
pub async fn run_threads(settings: Settings) -> Result<()> {
    let store = SqliteThreadStore::new(&settings.threads_path())?;

    match store.list_threads().await {
        Ok(threads) => {
            if threads.is_empty() {
                Output::info("No conversations yet. Start one with 'doctorbot chat'.");
            } else {
                Output::header(&format!("Conversations ({})", threads.len()));
                println!();

                for thread in &threads {
                    Output::thread_info(thread);
                }

                let total: usize = threads.iter().map(|t| t.message_count).sum();
                println!();
                Output::kv("Total threads", &threads.len().to_string());
                Output::kv("Total messages", &total.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list threads: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
