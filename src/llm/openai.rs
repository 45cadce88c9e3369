//! OpenAI-compatible chat completion client
//!
//! Serves both OpenAI and Groq, which speak the same `/chat/completions` format.
//! Uses a long-lived reqwest::Client for connection pooling.

use super::CompletionBackend;
use crate::error::PipelineError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    OpenAi,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::Groq => "groq",
            Provider::OpenAi => "openai",
        };
        write!(f, "{}", s)
    }
}

/// Reusable chat client (connection-pooled)
pub struct ChatCompletionClient {
    client: Client,
    provider: Provider,
    provider_label: String,
    api_key: String,
    model: String,
    base_url: String,
}

impl ChatCompletionClient {
    pub fn new(
        provider: Provider,
        api_key: String,
        model: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        let base_url = base_url
            .unwrap_or_else(|| provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            provider,
            provider_label: provider.to_string(),
            api_key,
            model,
            base_url,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    fn provider(&self) -> &str {
        &self.provider_label
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
        temperature: f32,
    ) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "API key for {} not configured",
                self.provider
            )));
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature,
        };

        info!(provider = %self.provider, model = %self.model, "Calling completion API");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                PipelineError::ModelInvocationFailure(format!("{} request failed: {}", self.provider, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Completion API error response: {}", error_text);
            return Err(PipelineError::ModelInvocationFailure(format!(
                "{} returned {}: {}",
                self.provider, status, error_text
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to decode completion response: {}", e);
            PipelineError::ModelInvocationFailure(format!("undecodable response: {}", e))
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PipelineError::ModelInvocationFailure("Empty response from model".to_string())
            })?;

        info!(chars = content.len(), "Completion received");

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a COREP analyst",
                },
                ChatMessage {
                    role: "user",
                    content: "CET1 300 million",
                },
            ],
            temperature: 0.0,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "CET1 300 million");
    }

    #[test]
    fn test_response_decoding() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"CET1\":1}"},"finish_reason":"stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{\"CET1\":1}"));
    }

    #[test]
    fn test_endpoint_per_provider() {
        let groq = ChatCompletionClient::new(
            Provider::Groq,
            "k".to_string(),
            "llama-3.3-70b-versatile".to_string(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(groq.endpoint(), "https://api.groq.com/openai/v1/chat/completions");

        let custom = ChatCompletionClient::new(
            Provider::OpenAi,
            "k".to_string(),
            "gpt-4o-mini".to_string(),
            Some("http://localhost:8080/v1/".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(custom.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(custom.provider(), "openai");
    }
}
