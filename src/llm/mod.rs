//! Text-completion collaborator
//!
//! The pipeline only needs "complete this text"; provider details stay behind
//! the trait.

use crate::Result;
use async_trait::async_trait;

pub mod openai;
pub use openai::{ChatCompletionClient, Provider};

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider label, used in logs and the health endpoint
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
        temperature: f32,
    ) -> Result<String>;
}
