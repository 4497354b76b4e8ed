use super::{GenerationError, Generator};
use crate::facts::Facts;
use crate::llm::{LLMClient, Prompt};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Tail of a build log sent back to the model; earlier output rarely explains the failure.
const MAX_ERROR_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "You are an expert in containerizing applications. \
You write production-ready multi-stage Dockerfiles. \
Reply with exactly one Dockerfile inside a ```dockerfile fenced code block and nothing else.";

/// Generates and repairs Dockerfiles through any [`LLMClient`].
pub struct LlmGenerator {
    client: Arc<dyn LLMClient>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            client,
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn generate_prompt(facts: &Facts) -> String {
        let facts_json = serde_json::to_string_pretty(facts).unwrap_or_default();
        format!(
            "Write a Dockerfile for this repository. The build context is the repository root.\n\
             Use a build stage that runs the build command and a slim runtime stage that only \
             contains the artifact.\n\nFacts:\n{}",
            facts_json
        )
    }

    fn fix_prompt(build_file: &str, build_error: &str) -> String {
        format!(
            "This Dockerfile failed to build.\n\nDockerfile:\n```dockerfile\n{}\n```\n\n\
             Build output (tail):\n```\n{}\n```\n\nReturn the corrected Dockerfile.",
            build_file.trim_end(),
            tail(build_error, MAX_ERROR_CHARS)
        )
    }

    async fn complete(&self, prompt: String) -> Result<String, GenerationError> {
        let prompt = Prompt::new(SYSTEM_PROMPT, prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let reply = self.client.complete(&prompt).await?;
        debug!(
            provider = self.client.provider(),
            elapsed_ms = reply.elapsed.as_millis() as u64,
            "LLM responded"
        );

        extract_build_file(&reply.text)
            .ok_or_else(|| GenerationError::InvalidOutput(tail(&reply.text, 200).to_string()))
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &str {
        "llm"
    }

    async fn generate(&self, facts: &Facts) -> Result<String, GenerationError> {
        info!(
            provider = self.client.provider(),
            model = self.client.model(),
            "Generating Dockerfile with LLM"
        );
        self.complete(Self::generate_prompt(facts)).await
    }

    async fn fix(&self, build_file: &str, build_error: &str) -> Result<String, GenerationError> {
        self.complete(Self::fix_prompt(build_file, build_error)).await
    }
}

/// Pulls the Dockerfile out of a model reply.
///
/// Prefers a fenced block (tagged `dockerfile` first, then any); falls back to the whole
/// reply when it already reads like a Dockerfile. The result must contain a `FROM`.
pub fn extract_build_file(content: &str) -> Option<String> {
    let blocks = fenced_blocks(content);
    let chosen = blocks
        .iter()
        .find(|(lang, _)| lang.eq_ignore_ascii_case("dockerfile"))
        .or_else(|| blocks.first())
        .map(|(_, body)| body.clone())
        .unwrap_or_else(|| content.to_string());

    let text = chosen.trim();
    let has_from = text
        .lines()
        .any(|l| l.trim_start().to_ascii_uppercase().starts_with("FROM "));
    has_from.then(|| format!("{}\n", text))
}

fn fenced_blocks(content: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in content.lines() {
        match line.trim_start().strip_prefix("```") {
            Some(lang) => match current.take() {
                Some((open_lang, body)) => blocks.push((open_lang, body.join("\n"))),
                None => current = Some((lang.trim().to_string(), Vec::new())),
            },
            None => {
                if let Some((_, body)) = current.as_mut() {
                    body.push(line);
                }
            }
        }
    }

    blocks
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let offset = text
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[offset..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLLMClient, MockResponse};
    use crate::stack::{BuildToolId, StackId};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn facts() -> Facts {
        Facts {
            stack_type: StackId::Node,
            build_tool: BuildToolId::Npm,
            build_command: "npm ci".to_string(),
            artifact: ".".to_string(),
            ports: vec![3000],
            health_endpoint: None,
            language_version: "20".to_string(),
            framework_version: None,
            module_path: PathBuf::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_extract_tagged_block() {
        let reply = "Here you go:\n```bash\necho hi\n```\n```dockerfile\nFROM node:20\nCMD [\"node\"]\n```\n";
        assert_eq!(
            extract_build_file(reply),
            Some("FROM node:20\nCMD [\"node\"]\n".to_string())
        );
    }

    #[test]
    fn test_extract_bare_reply() {
        assert_eq!(
            extract_build_file("FROM alpine\nRUN true"),
            Some("FROM alpine\nRUN true\n".to_string())
        );
        assert_eq!(extract_build_file("I cannot help with that."), None);
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_generate_and_fix_through_client() {
        let client = Arc::new(MockLLMClient::new());
        client.add_responses(vec![
            MockResponse::text("```dockerfile\nFROM node:20-slim\n```"),
            MockResponse::text("```dockerfile\nFROM node:20\n```"),
        ]);
        let generator = LlmGenerator::new(client.clone());

        let first = generator.generate(&facts()).await.unwrap();
        assert_eq!(first, "FROM node:20-slim\n");

        let fixed = generator.fix(&first, "npm ERR! gyp failed").await.unwrap();
        assert_eq!(fixed, "FROM node:20\n");

        let requests = client.requests();
        assert!(requests[0].input.contains("\"build_command\": \"npm ci\""));
        assert!(requests[1].input.contains("npm ERR! gyp failed"));
        assert_eq!(requests[1].instructions, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_reply_without_dockerfile() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text("Sorry."));
        let generator = LlmGenerator::new(client);

        assert!(matches!(
            generator.generate(&facts()).await,
            Err(GenerationError::InvalidOutput(_))
        ));
    }
}
