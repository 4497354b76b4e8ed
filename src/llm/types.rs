//! Prompt and completion types shared by every client

use std::time::Duration;

/// One generation or repair request.
///
/// The generator never holds a conversation: each request carries the standing
/// instructions and a single user turn with the facts or the failing build file.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub instructions: String,
    pub input: String,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Prompt {
    pub fn new(instructions: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            input: input.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Raw model reply. Extracting the build file from it is the generator's job.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub elapsed: Duration,
}

impl Completion {
    pub fn new(text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            text: text.into(),
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new("You write Dockerfiles", "facts")
            .with_temperature(0.2)
            .with_max_tokens(2048);

        assert_eq!(prompt.instructions, "You write Dockerfiles");
        assert_eq!(prompt.input, "facts");
        assert_eq!(prompt.temperature, Some(0.2));
        assert_eq!(prompt.max_tokens, Some(2048));
    }
}
