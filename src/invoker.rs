//! Model invocation
//!
//! Builds the structured instruction, calls the completion backend with
//! deterministic sampling under a hard timeout, and decodes the reply into an
//! untyped object. Reply decoding tries the whole text first, then the widest
//! `{ ... }` span. Nothing else.

use crate::error::PipelineError;
use crate::llm::CompletionBackend;
use crate::models::RawModelOutput;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Sampling temperature for every completion call
pub const TEMPERATURE: f32 = 0.0;

const SYSTEM_INSTRUCTION: &str = r#"You are an expert UK PRA / COREP regulatory reporting analyst focusing on
capital requirements and Own Funds templates.

You will be given:
- A natural-language banking scenario.
- Extracts from PRA Rulebook / COREP Own Funds instructions (synthetic).

Your task is to propose a STRICT structured JSON object capturing the
firm's COREP Own Funds position. You must:

1. Use the regulatory context to interpret the scenario conservatively.
2. Only infer amounts when they are clearly implied; otherwise treat them
   as missing.
3. Never hallucinate regulatory references. Only cite rules explicitly
   supported by the provided context.

OUTPUT FORMAT (JSON ONLY, NO PROSE OUTSIDE JSON):
{
  "template_name": "C 01.00 - Own Funds (illustrative)",
  "CET1": <number or null>,
  "AT1": <number or null>,
  "Tier2": <number or null>,
  "RWA": <number or null>,
  "CET1_ratio": <number or null>,
  "missing_fields": [<list of missing numeric fields>],
  "validation_warnings": [<list of checks the model thinks might fail>],
  "rules_used": [<list of strings with rule / paragraph references>],
  "explanation": "<short human-readable explanation>"
}

- CET1_ratio is a decimal, e.g. 0.125 for 12.5%.
- Use numbers, not strings with units.
- If you cannot determine a numeric field, set it to null and include
  the field name in missing_fields.
- For CET1_ratio you may propose a value, but it will be recomputed by
  deterministic validation.
- Respond with valid JSON only, with double quotes, and no comments."#;

pub struct ModelInvoker {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl ModelInvoker {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend(&self) -> &dyn CompletionBackend {
        self.backend.as_ref()
    }

    pub async fn invoke(&self, scenario: &str, context: &str) -> Result<RawModelOutput> {
        let user_message = build_user_message(scenario, context);

        let completion = tokio::time::timeout(
            self.timeout,
            self.backend
                .complete(SYSTEM_INSTRUCTION, &user_message, TEMPERATURE),
        )
        .await
        .map_err(|_| {
            warn!(provider = self.backend.provider(), "Completion timed out");
            PipelineError::ModelTimeout {
                after_secs: self.timeout.as_secs(),
            }
        })?
        .map_err(|e| match e {
            PipelineError::ModelInvocationFailure(_) | PipelineError::ModelTimeout { .. } => e,
            other => PipelineError::ModelInvocationFailure(other.to_string()),
        })?;

        debug!(chars = completion.len(), "Decoding model output");

        parse_model_output(&completion)
    }
}

fn build_user_message(scenario: &str, context: &str) -> String {
    format!(
        r#"Banking scenario:
-----------------
{}

Relevant regulatory context:
----------------------------
{}

Now produce the JSON object as specified, with no additional commentary."#,
        scenario, context
    )
}

/// Decode a completion into an object, keeping every key the model sent.
pub fn parse_model_output(text: &str) -> Result<RawModelOutput> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    let widest = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => {
            return Err(PipelineError::ModelOutputParseError {
                message: "no JSON object found in model output".to_string(),
                raw: text.to_string(),
            })
        }
    };

    match serde_json::from_str::<Value>(widest) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PipelineError::ModelOutputParseError {
            message: format!("expected a JSON object, got {}", json_kind(&other)),
            raw: text.to_string(),
        }),
        Err(e) => Err(PipelineError::ModelOutputParseError {
            message: format!("invalid JSON in model output: {}", e),
            raw: text.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
