//! Audit trail
//!
//! Folds retrieved citations into the result and keeps every assessment for
//! later lookup, hashed so a stored record can be checked for tampering.

use crate::models::{push_unique, Assessment, AuditRecord, CorepResult, RetrievedSnippet};
use crate::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Append the citations actually retrieved to `rules_used`.
///
/// Existing entries keep their order; new citations follow in lexicographic
/// order. Merging the same snippets again changes nothing.
pub fn merge_citations(mut result: CorepResult, snippets: &[RetrievedSnippet]) -> CorepResult {
    let retrieved: BTreeSet<&str> = snippets.iter().map(|s| s.citation.as_str()).collect();

    for citation in retrieved {
        push_unique(&mut result.rules_used, citation.to_string());
    }

    result
}

/// Records kept when no capacity is given
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

struct AuditStore {
    records: HashMap<Uuid, AuditRecord>,
    /// Insertion order, oldest first
    order: VecDeque<Uuid>,
}

/// Audit trail storage.
///
/// Bounded: once `capacity` records are held, recording a new one evicts the oldest.
pub struct AuditLog {
    store: Arc<RwLock<AuditStore>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(AuditStore {
                records: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store an assessment, returning its audit ID
    pub async fn record(&self, assessment: Assessment, execution_time_ms: u64) -> Result<Uuid> {
        let audit_id = assessment.audit_id;
        let record = AuditRecord {
            audit_id,
            content_hash: compute_content_hash(&assessment),
            assessment: Arc::new(assessment),
            created_at: Utc::now(),
            execution_time_ms,
        };

        let mut store = self.store.write().await;
        if store.records.insert(audit_id, record).is_none() {
            store.order.push_back(audit_id);
        }

        while store.order.len() > self.capacity {
            if let Some(oldest) = store.order.pop_front() {
                store.records.remove(&oldest);
                debug!(audit_id = %oldest, "Evicted oldest audit record");
            }
        }

        Ok(audit_id)
    }

    pub async fn get(&self, audit_id: Uuid) -> Result<Option<AuditRecord>> {
        let store = self.store.read().await;
        Ok(store.records.get(&audit_id).cloned())
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.records.is_empty()
    }

    /// Verify a record's integrity via hash
    pub async fn verify_integrity(&self, audit_id: Uuid) -> Result<bool> {
        let store = self.store.read().await;

        if let Some(record) = store.records.get(&audit_id) {
            Ok(compute_content_hash(&record.assessment) == record.content_hash)
        } else {
            Ok(false)
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA256 over the validated result and the raw model output.
/// Streams JSON straight into the hasher.
pub fn compute_content_hash(assessment: &Assessment) -> String {
    let mut hasher = Sha256::new();

    let hashed = (&assessment.corep_result, &assessment.raw_model_output);
    if serde_json::to_writer(&mut HashWriter(&mut hasher), &hashed).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn snippet(id: &str, citation: &str) -> RetrievedSnippet {
        RetrievedSnippet {
            id: id.to_string(),
            source: "PRA Rulebook".to_string(),
            citation: citation.to_string(),
            text: "text".to_string(),
        }
    }

    fn result_with_rules(rules: &[&str]) -> CorepResult {
        CorepResult {
            template_name: "C 01.00".to_string(),
            cet1: Some(300.0),
            at1: None,
            tier2: None,
            rwa: Some(5000.0),
            cet1_ratio: Some(0.06),
            missing_fields: vec!["AT1".to_string(), "Tier2".to_string()],
            validation_warnings: vec![],
            rules_used: rules.iter().map(|r| r.to_string()).collect(),
            explanation: "ok".to_string(),
        }
    }

    #[test]
    fn test_new_citations_appended_sorted() {
        let snippets = vec![
            snippet("0", "ITS COREP"),
            snippet("1", "CRR Art. 92"),
            snippet("2", "ITS COREP"),
        ];
        let merged = merge_citations(result_with_rules(&["Model rule"]), &snippets);
        assert_eq!(merged.rules_used, vec!["Model rule", "CRR Art. 92", "ITS COREP"]);
    }

    #[test]
    fn test_existing_citation_not_duplicated() {
        let snippets = vec![snippet("0", "CRR Art. 92"), snippet("1", "A first")];
        let merged = merge_citations(result_with_rules(&["CRR Art. 92"]), &snippets);
        assert_eq!(merged.rules_used, vec!["CRR Art. 92", "A first"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let snippets = vec![snippet("0", "B"), snippet("1", "A")];
        let once = merge_citations(result_with_rules(&[]), &snippets);
        let twice = merge_citations(once.clone(), &snippets);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_snippets_is_noop() {
        let original = result_with_rules(&["X"]);
        assert_eq!(merge_citations(original.clone(), &[]), original);
    }

    fn assessment() -> Assessment {
        Assessment {
            audit_id: Uuid::new_v4(),
            scenario: "CET1 300 million".to_string(),
            retrieved_context: vec![],
            corep_result: result_with_rules(&[]),
            raw_model_output: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_oldest_record_evicted_at_capacity() {
        let log = AuditLog::with_capacity(2);
        let first = log.record(assessment(), 1).await.unwrap();
        let second = log.record(assessment(), 1).await.unwrap();
        let third = log.record(assessment(), 1).await.unwrap();

        assert_eq!(log.len().await, 2);
        assert!(log.get(first).await.unwrap().is_none());
        assert!(log.get(second).await.unwrap().is_some());
        assert!(log.get(third).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rerecording_same_id_does_not_double_count() {
        let log = AuditLog::with_capacity(2);
        let kept = assessment();
        log.record(kept.clone(), 1).await.unwrap();
        log.record(kept.clone(), 2).await.unwrap();
        let other = log.record(assessment(), 1).await.unwrap();

        assert_eq!(log.len().await, 2);
        assert_eq!(log.get(kept.audit_id).await.unwrap().unwrap().execution_time_ms, 2);
        assert!(log.get(other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_record_and_verify() {
        let log = AuditLog::new();
        let assessment = assessment();

        let audit_id = log.record(assessment, 12).await.unwrap();
        assert_eq!(log.len().await, 1);
        assert!(log.verify_integrity(audit_id).await.unwrap());

        let record = log.get(audit_id).await.unwrap().unwrap();
        assert_eq!(record.execution_time_ms, 12);
        assert_eq!(record.content_hash.len(), 64);

        assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());
        assert!(log.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
