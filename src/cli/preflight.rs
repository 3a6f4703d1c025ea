//! Pre-flight checks before talking to the model.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway through a turn.

use crate::config::Settings;
use crate::error::{DoctorBotError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions requires the LLM API key.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_api_key(&settings.llm.api_key_env)?;
        }
    }
    Ok(())
}

/// Check that an API key environment variable is set and non-empty.
pub fn check_api_key(var: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(()),
        Ok(_) => Err(DoctorBotError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        Err(_) => Err(DoctorBotError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}
