//! OpenAI-compatible client configuration with sensible defaults.

use crate::error::{DoctorBotError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connection details for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Base URL such as `https://api.groq.com/openai/v1`. `None` keeps the OpenAI default.
    pub api_base: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Create a client for the given endpoint.
///
/// When the key variable is unset the client falls back to `OPENAI_API_KEY`,
/// which is what async-openai reads by default.
pub fn create_client(options: &ClientOptions) -> Result<Client<OpenAIConfig>> {
    let timeout = if options.timeout_secs == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        options.timeout_secs
    };

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .map_err(|e| DoctorBotError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = options.api_base.as_deref().filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }
    if let Some(key) = options
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|k| !k.is_empty())
    {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
