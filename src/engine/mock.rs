use super::{ContainerEngine, ContainerHandle, EngineError, HealthProbe, ImageHandle};
use crate::pipeline::RunContext;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted outcome of one engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Success,
    /// Fail with a fixable error carrying this log.
    Failure(String),
    /// Fail as if the daemon were unreachable.
    ConnectionLost(String),
}

/// Container engine for tests. Build and health outcomes are served in order (success
/// once a queue runs dry). Build files, published ports and health probes are recorded.
pub struct MockEngine {
    builds: Mutex<VecDeque<MockOutcome>>,
    health: Mutex<VecDeque<MockOutcome>>,
    build_files: Mutex<Vec<String>>,
    cleanups: Mutex<usize>,
    runs: Mutex<Vec<Vec<u16>>>,
    probes: Mutex<Vec<HealthProbe>>,
    build_delay: Option<Duration>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            builds: Mutex::new(VecDeque::new()),
            health: Mutex::new(VecDeque::new()),
            build_files: Mutex::new(Vec::new()),
            cleanups: Mutex::new(0),
            runs: Mutex::new(Vec::new()),
            probes: Mutex::new(Vec::new()),
            build_delay: None,
        }
    }

    /// Every build takes `delay` before its outcome is reported. The delay respects the
    /// run context.
    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = Some(delay);
        self
    }

    pub fn add_build(&self, outcome: MockOutcome) {
        self.builds.lock().unwrap().push_back(outcome);
    }

    pub fn add_builds(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.builds.lock().unwrap().extend(outcomes);
    }

    pub fn add_health(&self, outcome: MockOutcome) {
        self.health.lock().unwrap().push_back(outcome);
    }

    /// Build files in the order they were built.
    pub fn build_files(&self) -> Vec<String> {
        self.build_files.lock().unwrap().clone()
    }

    pub fn build_count(&self) -> usize {
        self.build_files.lock().unwrap().len()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    /// Container ports published by each run, in run order.
    pub fn published_ports(&self) -> Vec<Vec<u16>> {
        self.runs.lock().unwrap().clone()
    }

    /// Health probes in the order they were made.
    pub fn probes(&self) -> Vec<HealthProbe> {
        self.probes.lock().unwrap().clone()
    }

    pub fn cleanup_count(&self) -> usize {
        *self.cleanups.lock().unwrap()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn build(
        &self,
        ctx: &RunContext,
        _context_dir: &Path,
        build_file: &str,
    ) -> Result<ImageHandle, EngineError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        self.build_files.lock().unwrap().push(build_file.to_string());

        if let Some(delay) = self.build_delay {
            tokio::select! {
                err = ctx.done() => return Err(err.into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = self
            .builds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockOutcome::Success);

        match outcome {
            MockOutcome::Success => Ok(ImageHandle {
                tag: format!("stackpack-mock:{}", self.build_count()),
            }),
            MockOutcome::Failure(log) => Err(EngineError::BuildFailed { log }),
            MockOutcome::ConnectionLost(message) => Err(EngineError::Connection(message)),
        }
    }

    async fn run(
        &self,
        ctx: &RunContext,
        image: &ImageHandle,
        ports: &[u16],
    ) -> Result<ContainerHandle, EngineError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        self.runs.lock().unwrap().push(ports.to_vec());
        Ok(ContainerHandle {
            id: format!("{}-container", image.tag),
            ports: ports.iter().map(|&p| (p, p)).collect(),
        })
    }

    async fn health_check(
        &self,
        ctx: &RunContext,
        container: &ContainerHandle,
        probe: &HealthProbe,
    ) -> Result<(), EngineError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        self.probes.lock().unwrap().push(probe.clone());

        if container.host_port(probe.port).is_none() {
            return Err(EngineError::Health {
                message: format!("port {} is not published", probe.port.unwrap_or_default()),
                log: String::new(),
            });
        }

        let outcome = self
            .health
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockOutcome::Success);

        match outcome {
            MockOutcome::Success => Ok(()),
            MockOutcome::Failure(log) => Err(EngineError::Health {
                message: format!("{} never became healthy", probe.path),
                log,
            }),
            MockOutcome::ConnectionLost(message) => Err(EngineError::Connection(message)),
        }
    }

    async fn cleanup(
        &self,
        _image: &ImageHandle,
        _container: Option<&ContainerHandle>,
    ) -> Result<(), EngineError> {
        *self.cleanups.lock().unwrap() += 1;
        Ok(())
    }
}
