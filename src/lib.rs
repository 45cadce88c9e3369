//! PRA COREP Own Funds Assessment Assistant
//!
//! Turns a free-text description of a bank's capital position into an
//! auditable COREP Own Funds assessment:
//! - Retrieves supporting regulatory text
//! - Asks a language model for a structured first guess
//! - Reconciles that guess against deterministic arithmetic and rules
//! - Records every result for audit
//!
//! PIPELINE:
//! SCENARIO → RETRIEVE → ASSEMBLE → INVOKE → RECONCILE → MERGE CITATIONS → RESULT

pub mod api;
pub mod audit;
pub mod coerce;
pub mod config;
pub mod error;
pub mod invoker;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod retrieval;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use pipeline::AssessmentPipeline;
