//! Error types for the COREP assessment pipeline
//!
//! Only structural and transport failures live here. Data-quality problems in the
//! model output are never errors; they end up as warnings on the result.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Retrieval failure: {0}")]
    RetrievalFailure(String),

    #[error("Model invocation failure: {0}")]
    ModelInvocationFailure(String),

    #[error("Model call timed out after {after_secs}s")]
    ModelTimeout { after_secs: u64 },

    #[error("Model output parse error: {message}")]
    ModelOutputParseError { message: String, raw: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Stage of the pipeline an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Retrieval,
    ModelInvocation,
    ModelOutputParse,
    Config,
    Request,
    Internal,
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::RetrievalFailure(_) => Stage::Retrieval,
            PipelineError::ModelInvocationFailure(_) | PipelineError::ModelTimeout { .. } => {
                Stage::ModelInvocation
            }
            PipelineError::ModelOutputParseError { .. } => Stage::ModelOutputParse,
            PipelineError::ConfigError(_) => Stage::Config,
            PipelineError::InvalidRequest(_) => Stage::Request,
            PipelineError::SerializationError(_)
            | PipelineError::HttpError(_)
            | PipelineError::IoError(_) => Stage::Internal,
        }
    }

    /// Raw completion text, when the failure happened after the model answered
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            PipelineError::ModelOutputParseError { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
