//! LLM client abstraction
//!
//! The LLM-backed generator talks to a model through [`LLMClient`], implemented over
//! `genai` for real providers and by [`MockLLMClient`] for scripted tests.

mod client;
mod error;
mod genai;
mod mock;
mod types;

pub use client::LLMClient;
pub use error::LlmError;
pub use genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use types::{Completion, Prompt};
