//! Ask command implementation.

use super::GENERATION_FAILED_NOTICE;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::threads::new_thread_id;
use anyhow::Result;
use tracing::error;

/// Run a single turn, on a new thread unless one is given.
pub async fn run_ask(
    question: &str,
    thread: Option<String>,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'doctorbot doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings, model.as_deref())?;
    let thread_id = thread.unwrap_or_else(new_thread_id);

    let spinner = Output::spinner("Looking into it...");

    match orchestrator.runner().run_turn(&thread_id, question).await {
        Ok(result) => {
            spinner.finish_and_clear();

            Output::reply(&result.answer);
            if result.max_turns_exceeded {
                Output::warning("The answer was cut short after too many tool calls.");
            }
            Output::kv("Thread", &thread_id);
            Output::info(&format!(
                "Continue with: doctorbot chat --thread {}",
                thread_id
            ));
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Turn failed on thread {}: {}", thread_id, e);
            Output::error(GENERATION_FAILED_NOTICE);
            anyhow::bail!("No answer was generated");
        }
    }

    Ok(())
}
