//! Build file generators
//!
//! A [`Generator`] turns [`Facts`] into Dockerfile text and repairs a Dockerfile given
//! the log of a failed build. The verify loop drives it without knowing whether the text
//! comes from a template or an LLM.

mod fixes;
mod llm;
mod template;

pub use llm::{extract_build_file, LlmGenerator};
pub use template::TemplateGenerator;

use crate::facts::Facts;
use crate::llm::LlmError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM backend failed: {0}")]
    Backend(#[from] LlmError),

    #[error("generator returned no Dockerfile: {0}")]
    InvalidOutput(String),

    #[error("no known fix for this build failure")]
    NoFix,

    #[error("no template for stack {0}")]
    UnsupportedStack(String),
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a build file for the given facts.
    async fn generate(&self, facts: &Facts) -> Result<String, GenerationError>;

    /// Produce a corrected build file from the previous text and the failure log.
    async fn fix(&self, build_file: &str, build_error: &str) -> Result<String, GenerationError>;
}
