//! Core data models for the COREP assessment pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Untyped key/value structure exactly as decoded from the model's response.
pub type RawModelOutput = Map<String, Value>;

//
// ================= Retrieval =================
//

/// One grounding snippet handed to the model.
///
/// `id` is the ordinal of the snippet within a single retrieval call, not the
/// backend's internal identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub id: String,
    pub source: String,
    pub citation: String,
    pub text: String,
}

//
// ================= Result =================
//

/// Validated COREP Own Funds position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorepResult {
    pub template_name: String,
    #[serde(rename = "CET1")]
    pub cet1: Option<f64>,
    #[serde(rename = "AT1")]
    pub at1: Option<f64>,
    #[serde(rename = "Tier2")]
    pub tier2: Option<f64>,
    #[serde(rename = "RWA")]
    pub rwa: Option<f64>,
    /// Decimal fraction, e.g. 0.12 for 12%
    #[serde(rename = "CET1_ratio")]
    pub cet1_ratio: Option<f64>,
    pub missing_fields: Vec<String>,
    pub validation_warnings: Vec<String>,
    pub rules_used: Vec<String>,
    pub explanation: String,
}

/// Append `item` unless an identical entry is already present.
///
/// Returns `true` if the list grew.
pub fn push_unique(list: &mut Vec<String>, item: String) -> bool {
    if list.iter().any(|existing| *existing == item) {
        return false;
    }
    list.push(item);
    true
}

//
// ================= Assessment =================
//

/// Everything one pipeline invocation hands back to its caller.
///
/// The raw model output is kept next to the validated result, never merged into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub audit_id: Uuid,
    pub scenario: String,
    pub retrieved_context: Vec<RetrievedSnippet>,
    pub corep_result: CorepResult,
    pub raw_model_output: RawModelOutput,
}

//
// ================= Audit Record =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub assessment: Arc<Assessment>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}
