use crate::stack::DEFAULT_MAX_DEPTH;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Builds allowed per run. One more than the number of fixes.
    pub max_attempts: u32,
    /// Overall budget for the run, applied as a deadline on the caller's context.
    pub timeout: Duration,
    pub max_depth: usize,
    /// Run the built image and wait for it to answer on its health endpoint.
    pub verify_runtime: bool,
    pub health_timeout: Duration,
    /// Where the verified build file is written. `None` keeps it in memory only.
    pub output: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_BUILD_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            verify_runtime: false,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            output: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values below one are raised to one: a run always builds at least once.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_runtime_verification(mut self, health_timeout: Duration) -> Self {
        self.verify_runtime = true;
        self.health_timeout = health_timeout;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}
