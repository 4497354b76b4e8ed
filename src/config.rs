//! Configuration management for stackpack
//!
//! Settings are read from `STACKPACK_*` environment variables with defaults; command-line
//! flags override them afterwards.
//!
//! # Environment Variables
//!
//! - `STACKPACK_MAX_ATTEMPTS`: builds per run - default: 3
//! - `STACKPACK_BUILD_TIMEOUT_MINS`: overall run budget in minutes - default: 15
//! - `STACKPACK_MAX_DEPTH`: directory depth scanned for manifests - default: 4
//! - `STACKPACK_GENERATOR`: `template` or `llm` - default: template
//! - `STACKPACK_PROVIDER`: LLM provider (ollama|openai|claude|gemini|grok|groq) - default: ollama
//! - `STACKPACK_MODEL`: model name - default: provider specific
//! - `STACKPACK_LLM_TIMEOUT`: LLM request timeout in seconds - default: 60
//! - `STACKPACK_API_BASE_URL`: send LLM requests to this endpoint instead - default: unset
//! - `STACKPACK_HEALTH_TIMEOUT`: runtime health check timeout in seconds - default: 60
//! - `STACKPACK_LOG_LEVEL`: logging level - default: info
//!
//! Provider credentials (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OLLAMA_HOST`, ...) are read
//! by the `genai` crate directly.
//!
//! # Example
//!
//! ```no_run
//! use stackpack::StackpackConfig;
//!
//! let config = StackpackConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use crate::llm::{GenAIClient, LLMClient};
use crate::pipeline::PipelineConfig;
use genai::adapter::AdapterKind;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BUILD_TIMEOUT_MINS: u64 = 15;
const DEFAULT_MAX_DEPTH: usize = 4;
const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder:7b";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, claude, gemini, grok, groq")]
    InvalidProvider(String),

    #[error("Invalid generator: {0}. Valid options: template, llm")]
    InvalidGenerator(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Which generator produces and repairs build files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Template,
    Llm,
}

impl FromStr for GeneratorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "template" => Ok(GeneratorKind::Template),
            "llm" => Ok(GeneratorKind::Llm),
            _ => Err(ConfigError::InvalidGenerator(s.to_string())),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorKind::Template => write!(f, "template"),
            GeneratorKind::Llm => write!(f, "llm"),
        }
    }
}

/// Accepts genai's adapter names plus the `claude` and `grok` aliases.
pub fn parse_provider(s: &str) -> Result<AdapterKind, ConfigError> {
    let lower = s.to_lowercase();
    match lower.as_str() {
        "claude" => Ok(AdapterKind::Anthropic),
        "grok" => Ok(AdapterKind::Xai),
        other => {
            AdapterKind::from_lower_str(other).ok_or_else(|| ConfigError::InvalidProvider(s.to_string()))
        }
    }
}

/// Model used when only a provider is chosen.
pub fn default_model(provider: AdapterKind) -> String {
    match provider {
        AdapterKind::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
        AdapterKind::OpenAI => "gpt-4o-mini".to_string(),
        AdapterKind::Anthropic => "claude-3-5-haiku-latest".to_string(),
        AdapterKind::Gemini => "gemini-2.0-flash".to_string(),
        AdapterKind::Groq => "llama-3.3-70b-versatile".to_string(),
        _ => "default-model".to_string(),
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[derive(Debug, Clone)]
pub struct StackpackConfig {
    pub max_attempts: u32,
    pub build_timeout_mins: u64,
    pub max_depth: usize,
    pub generator: GeneratorKind,
    pub provider: AdapterKind,
    pub model: String,
    pub llm_timeout_secs: u64,
    pub api_base_url: Option<String>,
    pub health_timeout_secs: u64,
    pub log_level: String,
}

impl Default for StackpackConfig {
    /// Loads `STACKPACK_*` environment variables, falling back to defaults for missing or
    /// unparseable values.
    fn default() -> Self {
        let provider = env::var("STACKPACK_PROVIDER")
            .ok()
            .and_then(|s| parse_provider(&s).ok())
            .unwrap_or(AdapterKind::Ollama);

        let model = env::var("STACKPACK_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model(provider));

        let generator = env::var("STACKPACK_GENERATOR")
            .ok()
            .and_then(|s| s.parse::<GeneratorKind>().ok())
            .unwrap_or(GeneratorKind::Template);

        let log_level = env::var("STACKPACK_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            max_attempts: env_parse("STACKPACK_MAX_ATTEMPTS").unwrap_or(DEFAULT_MAX_ATTEMPTS),
            build_timeout_mins: env_parse("STACKPACK_BUILD_TIMEOUT_MINS")
                .unwrap_or(DEFAULT_BUILD_TIMEOUT_MINS),
            max_depth: env_parse("STACKPACK_MAX_DEPTH").unwrap_or(DEFAULT_MAX_DEPTH),
            generator,
            provider,
            model,
            llm_timeout_secs: env_parse("STACKPACK_LLM_TIMEOUT")
                .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            api_base_url: env::var("STACKPACK_API_BASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            health_timeout_secs: env_parse("STACKPACK_HEALTH_TIMEOUT")
                .unwrap_or(DEFAULT_HEALTH_TIMEOUT_SECS),
            log_level,
        }
    }
}

impl StackpackConfig {
    /// Checks that numeric values are in range and the log level is known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > 20 {
            return Err(ConfigError::ValidationFailed(
                "Max attempts must be between 1 and 20".to_string(),
            ));
        }

        if self.build_timeout_mins == 0 || self.build_timeout_mins > 24 * 60 {
            return Err(ConfigError::ValidationFailed(
                "Build timeout must be between 1 minute and 24 hours".to_string(),
            ));
        }

        if self.max_depth == 0 || self.max_depth > 32 {
            return Err(ConfigError::ValidationFailed(
                "Max depth must be between 1 and 32".to_string(),
            ));
        }

        if self.llm_timeout_secs == 0 || self.llm_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "LLM timeout must be between 1 second and 10 minutes".to_string(),
            ));
        }

        if self.health_timeout_secs == 0 || self.health_timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Health timeout must be between 1 second and 1 hour".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Model name cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_mins * 60)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// Loop settings derived from this configuration. Runtime verification and the
    /// output path are left to the caller.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_max_attempts(self.max_attempts)
            .with_timeout(self.build_timeout())
            .with_max_depth(self.max_depth)
    }

    /// Client for the configured provider and model.
    pub fn create_llm_client(&self) -> Arc<dyn LLMClient> {
        Arc::new(GenAIClient::new(
            self.provider,
            self.model.clone(),
            Duration::from_secs(self.llm_timeout_secs),
            self.api_base_url.clone(),
        ))
    }
}

impl fmt::Display for StackpackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stackpack Configuration:")?;
        writeln!(f, "  Max Attempts: {}", self.max_attempts)?;
        writeln!(f, "  Build Timeout: {}m", self.build_timeout_mins)?;
        writeln!(f, "  Max Depth: {}", self.max_depth)?;
        writeln!(f, "  Generator: {}", self.generator)?;
        writeln!(f, "  Provider: {}", self.provider.as_str())?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  LLM Timeout: {}s", self.llm_timeout_secs)?;
        writeln!(f, "  Health Timeout: {}s", self.health_timeout_secs)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "STACKPACK_MAX_ATTEMPTS",
        "STACKPACK_BUILD_TIMEOUT_MINS",
        "STACKPACK_MAX_DEPTH",
        "STACKPACK_GENERATOR",
        "STACKPACK_PROVIDER",
        "STACKPACK_MODEL",
        "STACKPACK_LLM_TIMEOUT",
        "STACKPACK_API_BASE_URL",
        "STACKPACK_HEALTH_TIMEOUT",
        "STACKPACK_LOG_LEVEL",
    ];

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clean_env() -> Vec<EnvGuard> {
        KEYS.iter().map(|k| EnvGuard::unset(k)).collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = StackpackConfig::default();

        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.build_timeout_mins, DEFAULT_BUILD_TIMEOUT_MINS);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.generator, GeneratorKind::Template);
        assert_eq!(config.provider, AdapterKind::Ollama);
        assert_eq!(config.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.llm_timeout_secs, DEFAULT_LLM_TIMEOUT_SECS);
        assert_eq!(config.health_timeout_secs, DEFAULT_HEALTH_TIMEOUT_SECS);
        assert_eq!(config.api_base_url, None);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("STACKPACK_MAX_ATTEMPTS", "5"),
            EnvGuard::set("STACKPACK_BUILD_TIMEOUT_MINS", "30"),
            EnvGuard::set("STACKPACK_MAX_DEPTH", "6"),
            EnvGuard::set("STACKPACK_GENERATOR", "LLM"),
            EnvGuard::set("STACKPACK_PROVIDER", "claude"),
            EnvGuard::set("STACKPACK_MODEL", "custom-model"),
            EnvGuard::set("STACKPACK_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("STACKPACK_API_BASE_URL", "http://localhost:1234/v1/"),
        ];

        let config = StackpackConfig::default();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.build_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(config.max_depth, 6);
        assert_eq!(config.generator, GeneratorKind::Llm);
        assert_eq!(config.provider, AdapterKind::Anthropic);
        assert_eq!(config.model, "custom-model");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:1234/v1/"));
    }

    #[test]
    #[serial]
    fn test_unparseable_values_fall_back_to_defaults() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("STACKPACK_MAX_ATTEMPTS", "many"),
            EnvGuard::set("STACKPACK_PROVIDER", "nonsense"),
            EnvGuard::set("STACKPACK_GENERATOR", "magic"),
        ];

        let config = StackpackConfig::default();

        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.provider, AdapterKind::Ollama);
        assert_eq!(config.generator, GeneratorKind::Template);
    }

    #[test]
    #[serial]
    fn test_configuration_validation() {
        let _clean = clean_env();

        let mut config = StackpackConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = StackpackConfig::default();
        config.build_timeout_mins = 0;
        assert!(config.validate().is_err());

        let mut config = StackpackConfig::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = StackpackConfig::default();
        config.model = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_pipeline_config_from_settings() {
        let _clean = clean_env();
        let _guard = EnvGuard::set("STACKPACK_MAX_ATTEMPTS", "4");

        let pipeline = StackpackConfig::default().pipeline_config();

        assert_eq!(pipeline.max_attempts, 4);
        assert_eq!(pipeline.timeout, Duration::from_secs(15 * 60));
        assert!(!pipeline.verify_runtime);
    }

    #[test]
    fn test_parse_provider_aliases() {
        assert_eq!(parse_provider("claude").unwrap(), AdapterKind::Anthropic);
        assert_eq!(parse_provider("Grok").unwrap(), AdapterKind::Xai);
        assert_eq!(parse_provider("openai").unwrap(), AdapterKind::OpenAI);
        assert!(parse_provider("bogus").is_err());
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _clean = clean_env();
        let display = format!("{}", StackpackConfig::default());
        assert!(display.contains("Stackpack Configuration:"));
        assert!(display.contains("Generator: template"));
    }
}
