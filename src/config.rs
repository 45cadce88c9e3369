//! Process configuration
//!
//! Resolved once at startup and handed to constructors explicitly.

use crate::audit::DEFAULT_AUDIT_CAPACITY;
use crate::error::PipelineError;
use crate::llm::Provider;
use crate::Result;
use std::time::Duration;

pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's default API base
    pub llm_base_url: Option<String>,
    pub llm_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub top_k: usize,
    /// Remote search service; the seeded in-process index is used when unset
    pub retrieval_url: Option<String>,
    pub port: u16,
    /// Assessments kept in the in-process audit log before the oldest is evicted
    pub audit_capacity: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let (provider, api_key, model) = if let Some(key) = get("GROQ_API_KEY") {
            let model = get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string());
            (Provider::Groq, key, model)
        } else if let Some(key) = get("OPENAI_API_KEY") {
            let model = get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            (Provider::OpenAi, key, model)
        } else {
            return Err(PipelineError::ConfigError(
                "Neither OPENAI_API_KEY nor GROQ_API_KEY is set. \
                 Set one of them in your .env file or environment variables."
                    .to_string(),
            ));
        };

        let llm_timeout = Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 60)?);
        let retrieval_timeout = Duration::from_secs(parse_or(&get, "RETRIEVAL_TIMEOUT_SECS", 10)?);

        let top_k: usize = parse_or(&get, "RETRIEVAL_TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            return Err(PipelineError::ConfigError(
                "RETRIEVAL_TOP_K must be at least 1".to_string(),
            ));
        }

        let audit_capacity: usize = parse_or(&get, "AUDIT_LOG_CAPACITY", DEFAULT_AUDIT_CAPACITY)?;
        if audit_capacity == 0 {
            return Err(PipelineError::ConfigError(
                "AUDIT_LOG_CAPACITY must be at least 1".to_string(),
            ));
        }

        let port = match get("PORT") {
            Some(_) => parse_or(&get, "PORT", DEFAULT_PORT)?,
            None => parse_or(&get, "API_PORT", DEFAULT_PORT)?,
        };

        Ok(Self {
            provider,
            api_key,
            model,
            llm_base_url: get("LLM_BASE_URL"),
            llm_timeout,
            retrieval_timeout,
            top_k,
            retrieval_url: get("RETRIEVAL_URL"),
            port,
            audit_capacity,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| PipelineError::ConfigError(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}
