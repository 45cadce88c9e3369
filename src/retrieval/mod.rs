//! Context retrieval and assembly
//!
//! The retriever asks a ranked-retrieval backend for the passages closest to the
//! scenario and renumbers them in return order. The assembler renders those
//! passages into the grounding block that goes into the prompt.

use crate::error::PipelineError;
use crate::models::RetrievedSnippet;
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod corpus;
pub mod http;
pub mod memory;

pub use http::HttpSearchBackend;
pub use memory::InMemoryIndex;

/// Separator placed between snippets in the grounding block
pub const SNIPPET_DELIMITER: &str = "\n\n---\n\n";

/// One hit as returned by a backend, before renumbering.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Ranked retrieval collaborator.
///
/// Implementations must be safe to share between concurrent pipeline runs.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return up to `k` hits, best first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

pub struct ContextRetriever {
    backend: Arc<dyn SearchBackend>,
    top_k: usize,
    timeout: Duration,
}

impl ContextRetriever {
    pub fn new(backend: Arc<dyn SearchBackend>, top_k: usize, timeout: Duration) -> Result<Self> {
        if top_k == 0 {
            return Err(PipelineError::ConfigError(
                "retrieval top_k must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            backend,
            top_k,
            timeout,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedSnippet>> {
        self.retrieve_k(query, self.top_k).await
    }

    pub async fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<RetrievedSnippet>> {
        if k == 0 {
            return Err(PipelineError::InvalidRequest(
                "top_k must be a positive integer".to_string(),
            ));
        }

        debug!(backend = self.backend.name(), k, "Retrieving grounding context");

        let hits = tokio::time::timeout(self.timeout, self.backend.search(query, k))
            .await
            .map_err(|_| {
                warn!(backend = self.backend.name(), "Retrieval timed out");
                PipelineError::RetrievalFailure(format!(
                    "{} did not answer within {}s",
                    self.backend.name(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| match e {
                PipelineError::RetrievalFailure(_) => e,
                other => PipelineError::RetrievalFailure(other.to_string()),
            })?;

        Ok(hits
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(idx, hit)| to_snippet(idx, hit))
            .collect())
    }
}

fn to_snippet(idx: usize, hit: SearchHit) -> RetrievedSnippet {
    let source = metadata_string(&hit.metadata, "source").unwrap_or_else(|| "unknown".to_string());
    let citation = metadata_string(&hit.metadata, "citation")
        .unwrap_or_else(|| format!("synthetic-{}", idx));

    RetrievedSnippet {
        id: idx.to_string(),
        source,
        citation,
        text: hit.text,
    }
}

fn metadata_string(metadata: &HashMap<String, Value>, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Render snippets into a single grounding block, in retrieval order.
///
/// An empty slice yields an empty string; deciding whether that matters is the
/// caller's job.
pub fn assemble(snippets: &[RetrievedSnippet]) -> String {
    snippets
        .iter()
        .map(|s| format!("[{}] ({})\n{}", s.citation, s.source, s.text))
        .collect::<Vec<_>>()
        .join(SNIPPET_DELIMITER)
}
