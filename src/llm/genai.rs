//! LLM client backed by the `genai` crate
//!
//! Covers every provider `genai` does (Ollama, OpenAI, Anthropic, Gemini, Groq, ...).
//! Credentials come from the provider's usual environment variable. A base URL, when
//! configured, sends all traffic to that endpoint instead of the provider default.

use super::client::LLMClient;
use super::error::LlmError;
use super::types::{Completion, Prompt};
use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct GenAIClient {
    client: Client,
    provider: AdapterKind,
    model: String,
    timeout: Duration,
}

impl GenAIClient {
    pub fn new(
        provider: AdapterKind,
        model: impl Into<String>,
        timeout: Duration,
        base_url: Option<String>,
    ) -> Self {
        let model = model.into();
        let client = match base_url {
            Some(url) => {
                debug!(provider = provider.as_str(), url = %url, "Using custom LLM endpoint");
                Client::builder()
                    .with_service_target_resolver(fixed_endpoint(provider, model.clone(), url))
                    .build()
            }
            None => Client::default(),
        };

        Self {
            client,
            provider,
            model,
            timeout,
        }
    }

    fn options(prompt: &Prompt) -> ChatOptions {
        let mut options = ChatOptions::default();
        if let Some(temperature) = prompt.temperature {
            options = options.with_temperature(temperature as f64);
        }
        if let Some(max_tokens) = prompt.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        options
    }
}

/// Routes every request to `url` with the provider's own credentials.
fn fixed_endpoint(provider: AdapterKind, model: String, url: String) -> ServiceTargetResolver {
    ServiceTargetResolver::from_resolver_fn(
        move |_: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let auth = match provider.default_key_env_name() {
                Some(key_var) => AuthData::from_env(key_var),
                None => AuthData::from_single(""),
            };
            Ok(ServiceTarget {
                endpoint: Endpoint::from_owned(url.clone()),
                auth,
                model: ModelIden::new(provider, &model),
            })
        },
    )
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, LlmError> {
        let start = Instant::now();
        let request = ChatRequest::new(vec![
            ChatMessage::system(&prompt.instructions),
            ChatMessage::user(&prompt.input),
        ]);
        let options = Self::options(prompt);

        let reply = tokio::time::timeout(
            self.timeout,
            self.client.exec_chat(&self.model, request, Some(&options)),
        )
        .await
        .map_err(|_| {
            warn!(provider = self.provider(), "LLM request timed out");
            LlmError::Timeout {
                provider: self.provider().to_string(),
                after: self.timeout,
            }
        })?
        .map_err(|e| LlmError::Request {
            provider: self.provider().to_string(),
            message: e.to_string(),
        })?;

        match reply.first_text() {
            Some(text) if !text.trim().is_empty() => Ok(Completion::new(text, start.elapsed())),
            _ => Err(LlmError::EmptyReply {
                provider: self.provider().to_string(),
            }),
        }
    }

    fn provider(&self) -> &str {
        self.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
