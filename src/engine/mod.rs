//! Container engine boundary
//!
//! The verify loop only needs four things from a container engine: build an image from a
//! build file, run it, probe it over HTTP and throw it away again. [`DockerEngine`] does
//! this against a local Docker daemon; [`MockEngine`] replays scripted outcomes in tests.

mod docker;
mod mock;

pub use docker::DockerEngine;
pub use mock::{MockEngine, MockOutcome};

use crate::pipeline::{ContextError, RunContext};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Interval between two health probes of a running container.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Name of the build file inside the build context. Chosen so a repository's own
/// `Dockerfile` is never overwritten.
pub const BUILD_FILE_NAME: &str = ".stackpack.Dockerfile";

#[derive(Debug, Error)]
pub enum EngineError {
    /// The build ran and failed. The log is what a fix step works from.
    #[error("image build failed")]
    BuildFailed { log: String },

    /// The image built but the container could not be started.
    #[error("container failed to start: {message}")]
    Run { message: String, log: String },

    /// The container started but never reported healthy.
    #[error("health check failed: {message}")]
    Health { message: String, log: String },

    #[error("cannot reach container engine: {0}")]
    Connection(String),

    #[error("cannot prepare build context {}: {message}", .path.display())]
    Context { path: PathBuf, message: String },

    #[error("canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl EngineError {
    /// The log to hand to a fix step, or `None` when editing the build file cannot help.
    pub fn fixable_log(&self) -> Option<&str> {
        match self {
            EngineError::BuildFailed { log } => Some(log),
            EngineError::Run { log, .. } | EngineError::Health { log, .. } => Some(log),
            _ => None,
        }
    }
}

impl From<ContextError> for EngineError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => EngineError::Canceled,
            ContextError::DeadlineExceeded => EngineError::DeadlineExceeded,
        }
    }
}

/// A built image. The tag is unique per build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    pub tag: String,
}

/// A started container and where its ports are published on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    /// `(container port, host port)` pairs, primary port first.
    pub ports: Vec<(u16, u16)>,
}

impl ContainerHandle {
    /// Host port for `container_port`, or for the primary port when `None`.
    pub fn host_port(&self, container_port: Option<u16>) -> Option<u16> {
        match container_port {
            Some(port) => self
                .ports
                .iter()
                .find(|(inner, _)| *inner == port)
                .map(|(_, host)| *host),
            None => self.ports.first().map(|(_, host)| *host),
        }
    }
}

/// What counts as a healthy container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthProbe {
    pub path: String,
    /// Container port to probe. `None` probes the primary port.
    pub port: Option<u16>,
    /// Require a 2xx answer. When false any HTTP answer proves the server is listening.
    pub require_success: bool,
    pub timeout: Duration,
}

impl HealthProbe {
    pub fn new(endpoint: Option<&str>, timeout: Duration) -> Self {
        match endpoint {
            Some(path) => Self {
                path: path.to_string(),
                port: None,
                require_success: true,
                timeout,
            },
            None => Self {
                path: "/".to_string(),
                port: None,
                require_success: false,
                timeout,
            },
        }
    }

    /// Probe a port other than the primary one, e.g. a separate management port.
    pub fn on_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn accepts(&self, status: u16) -> bool {
        if self.require_success {
            (200..300).contains(&status)
        } else {
            status < 500
        }
    }
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Build `build_file` with `context_dir` as the build context.
    async fn build(
        &self,
        ctx: &RunContext,
        context_dir: &Path,
        build_file: &str,
    ) -> Result<ImageHandle, EngineError>;

    /// Start a container from `image`, publishing each of `ports` on an ephemeral host
    /// port. The first port is the primary one.
    async fn run(
        &self,
        ctx: &RunContext,
        image: &ImageHandle,
        ports: &[u16],
    ) -> Result<ContainerHandle, EngineError>;

    /// Poll the container every [`HEALTH_POLL_INTERVAL`] until the probe passes, the
    /// probe times out or `ctx` is done.
    async fn health_check(
        &self,
        ctx: &RunContext,
        container: &ContainerHandle,
        probe: &HealthProbe,
    ) -> Result<(), EngineError>;

    /// Remove the container (if any) and the image. Best effort.
    async fn cleanup(
        &self,
        image: &ImageHandle,
        container: Option<&ContainerHandle>,
    ) -> Result<(), EngineError>;
}
