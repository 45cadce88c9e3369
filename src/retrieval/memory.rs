//! In-process lexical index
//!
//! Ranks documents by shared-term count, normalized by the square root of the
//! document's vocabulary size. Every document is ranked, so `k` results come
//! back whenever the index holds at least `k` documents.

use super::corpus::SEED_DOCUMENTS;
use super::{SearchBackend, SearchHit};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

struct IndexedDocument {
    id: String,
    text: String,
    metadata: HashMap<String, Value>,
    terms: HashSet<String>,
}

pub struct InMemoryIndex {
    documents: Vec<IndexedDocument>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    /// Index preloaded with the regulatory seed corpus
    pub fn with_seed_corpus() -> Self {
        let mut index = Self::new();
        for doc in SEED_DOCUMENTS {
            let metadata = HashMap::from([
                ("source".to_string(), Value::from(doc.source)),
                ("citation".to_string(), Value::from(doc.citation)),
            ]);
            index.add_document(doc.text, metadata);
        }
        index
    }

    pub fn add_document(&mut self, text: &str, metadata: HashMap<String, Value>) {
        let id = format!("doc-{}", self.documents.len());
        self.documents.push(IndexedDocument {
            id,
            text: text.to_string(),
            metadata,
            terms: tokenize(text),
        });
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn score(query_terms: &HashSet<String>, doc: &IndexedDocument) -> f64 {
        if doc.terms.is_empty() {
            return 0.0;
        }
        let shared = doc.terms.intersection(query_terms).count() as f64;
        shared / (doc.terms.len() as f64).sqrt()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[async_trait]
impl SearchBackend for InMemoryIndex {
    fn name(&self) -> &'static str {
        "in_memory_index"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_terms = tokenize(query);

        let mut ranked: Vec<(f64, &IndexedDocument)> = self
            .documents
            .iter()
            .map(|doc| (Self::score(&query_terms, doc), doc))
            .collect();

        // stable: ties keep insertion order
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(_, doc)| SearchHit {
                id: Some(doc.id.clone()),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect())
    }
}
