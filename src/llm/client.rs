use super::error::LlmError;
use super::types::{Completion, Prompt};
use async_trait::async_trait;

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError>;

    /// Provider name, used in logs and errors.
    fn provider(&self) -> &str;

    fn model(&self) -> &str;
}
