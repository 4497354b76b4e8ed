use super::client::LLMClient;
use super::error::LlmError;
use super::types::{Completion, Prompt};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Text(String),
    Fail(LlmError),
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        MockResponse::Text(content.into())
    }

    pub fn error(error: LlmError) -> Self {
        MockResponse::Fail(error)
    }
}

/// Replays scripted replies in order and records every prompt it was sent.
#[derive(Debug, Default)]
pub struct MockLLMClient {
    script: Mutex<VecDeque<MockResponse>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&self, response: MockResponse) {
        self.add_responses([response]);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        if let Ok(mut script) = self.script.lock() {
            script.extend(responses);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Prompts received so far, oldest first.
    pub fn requests(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());

        match next {
            Some(MockResponse::Text(text)) => Ok(Completion::new(text, Duration::from_millis(1))),
            Some(MockResponse::Fail(err)) => Err(err),
            None => Err(LlmError::Exhausted),
        }
    }

    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
