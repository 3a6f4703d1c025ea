//! Web search through the Tavily search API.

use super::Tool;
use crate::error::{DoctorBotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const WEB_SEARCH_TOOL_NAME: &str = "tavily_search";

const DESCRIPTION: &str = "A search engine optimized for comprehensive, accurate, and trusted \
results. Useful for when you need to answer questions about current events or information \
not found in the medical knowledge base. Input should be a search query.";

/// Default timeout for web search requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Returns a bounded number of result snippets for a query.
pub struct WebSearchTool {
    client: Client,
    search_url: Url,
    api_key: String,
    max_results: usize,
}

impl WebSearchTool {
    /// `endpoint` is the API base URL; requests go to `<endpoint>/search`.
    pub fn new(endpoint: &str, api_key: String, max_results: usize) -> Result<Self> {
        let mut base = endpoint.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let search_url = Url::parse(&base)
            .and_then(|u| u.join("search"))
            .map_err(|e| DoctorBotError::Config(format!("Invalid web search endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DoctorBotError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            search_url,
            api_key,
            max_results: max_results.max(1),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(self.search_url.clone())
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results: self.max_results,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DoctorBotError::WebSearch(format!(
                "search failed with status {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        let mut hits = body.results;
        hits.truncate(self.max_results);
        Ok(hits)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    #[instrument(skip(self))]
    async fn invoke(&self, input: &str) -> Result<String> {
        let hits = self
            .search(input)
            .await
            .map_err(|e| DoctorBotError::tool(WEB_SEARCH_TOOL_NAME, e))?;

        debug!("Web search returned {} results", hits.len());

        if hits.is_empty() {
            return Ok("No web results found.".to_string());
        }

        Ok(hits
            .iter()
            .map(|h| format!("{} ({})\n{}", h.title, h.url, h.content))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
