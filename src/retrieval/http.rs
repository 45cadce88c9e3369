//! Remote ranked-retrieval backend
//!
//! Talks to a vector search service over JSON:
//! `POST {base}/search {"query", "k"}` → `{"results": [{"id", "text", "metadata"}]}`.

use super::{SearchBackend, SearchHit};
use crate::error::PipelineError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

pub struct HttpSearchBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl HttpSearchBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    fn name(&self) -> &'static str {
        "http_search"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(self.search_url())
            .json(&SearchRequest { query, k })
            .send()
            .await
            .map_err(|e| {
                error!("Retrieval request failed: {}", e);
                PipelineError::RetrievalFailure(format!("search request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::RetrievalFailure(format!(
                "search service returned {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            PipelineError::RetrievalFailure(format!("invalid search response: {}", e))
        })?;

        Ok(parsed.results)
    }
}
