//! Show command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::threads::{thread_title, SqliteThreadStore, ThreadStore};
use anyhow::Result;

/// Print every message of a stored thread, tool output included.
pub async fn run_show(thread_id: &str, settings: Settings) -> Result<()> {
    let store = SqliteThreadStore::new(&settings.threads_path())?;

    let Some(state) = store.get(thread_id).await? else {
        Output::error(&format!("Thread not found: {}", thread_id));
        Output::info("Run 'doctorbot threads' to see stored conversations.");
        anyhow::bail!("Unknown thread {}", thread_id);
    };

    Output::header(&thread_title(&state));
    Output::kv("Thread", thread_id);
    Output::kv("Messages", &state.len().to_string());

    let history = store.history(thread_id)?;
    if let (Some(first), Some(last)) = (history.first(), history.last()) {
        Output::kv("Started", &first.created_at.format("%Y-%m-%d %H:%M UTC").to_string());
        Output::kv("Updated", &last.created_at.format("%Y-%m-%d %H:%M UTC").to_string());
        Output::kv("Turns saved", &history.len().to_string());
    }

    for message in state.messages() {
        Output::message(message);
    }
    println!();

    Ok(())
}
