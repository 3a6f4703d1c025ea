//! Configuration module for DoctorBot.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts};
pub use settings::{
    AgentSettings, EmbeddingSettings, GeneralSettings, LlmSettings, PromptSettings,
    RetrieverSettings, Settings, ThreadSettings, WebSearchSettings,
};
