//! Text generation capability used by the agent step.

mod openai;

pub use openai::OpenAIGenerator;

use crate::error::Result;
use async_trait::async_trait;

/// Turns a fully rendered prompt into a completion.
///
/// Any failure is reported as [`crate::DoctorBotError::Generation`].
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
