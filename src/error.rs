//! Error types for DoctorBot.

use thiserror::Error;

/// Library-level error type for DoctorBot operations.
#[derive(Error, Debug)]
pub enum DoctorBotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not parse tool action from agent response: {0}")]
    MalformedAction(String),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Tool '{tool}' failed with: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Agent exceeded maximum iterations ({0})")]
    MaxTurnsExceeded(usize),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Thread store error: {0}")]
    ThreadStore(String),

    #[error("Web search error: {0}")]
    WebSearch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

impl DoctorBotError {
    /// Tool-level failures are reported back to the agent inline; everything
    /// else ends the turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DoctorBotError::MalformedAction(_)
                | DoctorBotError::UnknownTool(_)
                | DoctorBotError::ToolExecution { .. }
        )
    }

    /// Shorthand for wrapping any displayable failure from a named tool.
    pub fn tool(tool: &str, err: impl std::fmt::Display) -> Self {
        DoctorBotError::ToolExecution {
            tool: tool.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for DoctorBot operations.
pub type Result<T> = std::result::Result<T, DoctorBotError>;
