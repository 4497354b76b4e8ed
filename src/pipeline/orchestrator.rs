use super::analysis;
use super::config::PipelineConfig;
use super::context::RunContext;
use super::error::PipelineError;
use crate::engine::{ContainerEngine, ContainerHandle, EngineError, HealthProbe, ImageHandle};
use crate::facts::Facts;
use crate::fs::FileSystem;
use crate::generator::{GenerationError, Generator};
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use crate::stack::{DetectorRegistry, StackInfo};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// States of the build/verify loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detecting,
    FactGathering,
    Generating,
    Building,
    Verifying,
    Fixing,
    Success,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Detecting => "detecting",
            Stage::FactGathering => "fact_gathering",
            Stage::Generating => "generating",
            Stage::Building => "building",
            Stage::Verifying => "verifying",
            Stage::Fixing => "fixing",
            Stage::Success => "success",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A verified build file and how it was reached.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub stack: StackInfo,
    pub facts: Facts,
    pub build_file: String,
    /// Builds run, including the successful one.
    pub attempts: u32,
    pub output_path: Option<PathBuf>,
}

enum AttemptFailure {
    Fixable(String),
    Fatal(PipelineError),
}

/// Drives detection, fact extraction, generation and the build/fix loop.
pub struct Orchestrator {
    registry: Arc<DetectorRegistry>,
    generator: Arc<dyn Generator>,
    engine: Arc<dyn ContainerEngine>,
    fs: Arc<dyn FileSystem>,
    config: PipelineConfig,
    progress: Arc<dyn ProgressHandler>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<DetectorRegistry>,
        generator: Arc<dyn Generator>,
        engine: Arc<dyn ContainerEngine>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            registry,
            generator,
            engine,
            fs,
            config: PipelineConfig::default(),
            progress: Arc::new(LoggingHandler),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn detect(&self, ctx: &RunContext, root: &Path) -> Result<StackInfo, PipelineError> {
        analysis::detect_stack(
            ctx,
            &self.registry,
            Arc::clone(&self.fs),
            root,
            self.config.max_depth,
        )
        .await
    }

    /// Detect (unless `spec` is given, which is trusted as is) and extract facts.
    pub async fn analyze(
        &self,
        ctx: &RunContext,
        root: &Path,
        spec: Option<StackInfo>,
    ) -> Result<(StackInfo, Facts), PipelineError> {
        let stack = match spec {
            Some(stack) => {
                analysis::log_supplied(&stack);
                stack
            }
            None => {
                self.enter(Stage::Detecting);
                self.detect(ctx, root).await?
            }
        };

        self.enter(Stage::FactGathering);
        let facts = analysis::gather_facts(ctx, self.fs.as_ref(), root, &stack)?;
        Ok((stack, facts))
    }

    /// Produce a build file for the repository at `root` that builds (and, when runtime
    /// verification is on, runs healthily).
    ///
    /// The configured timeout becomes a deadline on a context derived from `ctx`.
    pub async fn run(
        &self,
        ctx: &RunContext,
        root: &Path,
        spec: Option<StackInfo>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let start = Instant::now();
        self.progress.on_progress(&ProgressEvent::Started {
            repo_path: root.display().to_string(),
        });

        let ctx = ctx.with_timeout(self.config.timeout);
        let result = self.drive(&ctx, root, spec).await;

        match &result {
            Ok(outcome) => {
                self.enter(Stage::Success);
                self.progress.on_progress(&ProgressEvent::Completed {
                    attempts: outcome.attempts,
                    total_time: start.elapsed(),
                });
            }
            Err(e) => {
                self.enter(Stage::Failed);
                self.progress.on_progress(&ProgressEvent::Failed {
                    error: e.to_string(),
                });
            }
        }

        result
    }

    async fn drive(
        &self,
        ctx: &RunContext,
        root: &Path,
        spec: Option<StackInfo>,
    ) -> Result<PipelineOutcome, PipelineError> {
        ctx.check("start", 0)?;
        let (stack, facts) = self.analyze(ctx, root, spec).await?;

        self.enter(Stage::Generating);
        ctx.check("generate", 0)?;
        let mut build_file = ctx
            .guard("generate", 0, self.generator.generate(&facts))
            .await?
            .map_err(|source| PipelineError::Generation {
                stage: "generate",
                attempts: 0,
                source,
            })?;
        debug!(generator = self.generator.name(), "Build file generated");

        let ports = published_ports(&facts, stack.port);
        let mut attempts = 0;

        loop {
            self.enter(Stage::Building);
            ctx.check("build", attempts)?;
            attempts += 1;
            self.progress
                .on_progress(&ProgressEvent::BuildStarted { attempt: attempts });

            let log = match self.attempt(ctx, root, &build_file, &facts, &ports, attempts).await {
                Ok(()) => break,
                Err(AttemptFailure::Fixable(log)) => log,
                Err(AttemptFailure::Fatal(e)) => {
                    self.progress.on_progress(&ProgressEvent::BuildFailed {
                        attempt: attempts,
                        fixable: false,
                    });
                    return Err(e);
                }
            };

            let retry = attempts < self.config.max_attempts;
            self.progress.on_progress(&ProgressEvent::BuildFailed {
                attempt: attempts,
                fixable: retry,
            });
            if !retry {
                return Err(PipelineError::BuildFailure { attempts, log });
            }

            self.enter(Stage::Fixing);
            ctx.check("fix", attempts)?;
            build_file = match ctx
                .guard("fix", attempts, self.generator.fix(&build_file, &log))
                .await?
            {
                Ok(fixed) => fixed,
                Err(GenerationError::NoFix) => {
                    info!(attempts, "No fix available for build failure");
                    return Err(PipelineError::BuildFailure { attempts, log });
                }
                Err(source) => {
                    return Err(PipelineError::Generation {
                        stage: "fix",
                        attempts,
                        source,
                    })
                }
            };
            self.progress
                .on_progress(&ProgressEvent::FixApplied { attempt: attempts });
        }

        let output_path = self.persist(&build_file)?;
        Ok(PipelineOutcome {
            stack,
            facts,
            build_file,
            attempts,
            output_path,
        })
    }

    /// One build, followed by runtime verification when enabled. The image is always
    /// removed afterwards.
    async fn attempt(
        &self,
        ctx: &RunContext,
        root: &Path,
        build_file: &str,
        facts: &Facts,
        ports: &[u16],
        attempt: u32,
    ) -> Result<(), AttemptFailure> {
        let image = match ctx
            .guard("build", attempt, self.engine.build(ctx, root, build_file))
            .await
        {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => return Err(failure("build", attempt, e)),
            Err(e) => return Err(AttemptFailure::Fatal(e)),
        };

        if self.config.verify_runtime {
            self.enter(Stage::Verifying);
            self.verify(ctx, &image, facts, ports, attempt).await
        } else {
            self.cleanup(&image, None).await;
            Ok(())
        }
    }

    async fn verify(
        &self,
        ctx: &RunContext,
        image: &ImageHandle,
        facts: &Facts,
        ports: &[u16],
        attempt: u32,
    ) -> Result<(), AttemptFailure> {
        let container = match ctx
            .guard("verify", attempt, self.engine.run(ctx, image, ports))
            .await
        {
            Ok(Ok(container)) => container,
            Ok(Err(e)) => {
                self.cleanup(image, None).await;
                return Err(failure("verify", attempt, e));
            }
            Err(e) => {
                self.cleanup(image, None).await;
                return Err(AttemptFailure::Fatal(e));
            }
        };

        let probe = HealthProbe::new(facts.health_endpoint.as_deref(), self.config.health_timeout)
            .on_port(facts.health_port());
        let health = ctx
            .guard(
                "verify",
                attempt,
                self.engine.health_check(ctx, &container, &probe),
            )
            .await;
        self.cleanup(image, Some(&container)).await;

        match health {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(failure("verify", attempt, e)),
            Err(e) => Err(AttemptFailure::Fatal(e)),
        }
    }

    async fn cleanup(&self, image: &ImageHandle, container: Option<&ContainerHandle>) {
        if let Err(e) = self.engine.cleanup(image, container).await {
            warn!(image = %image.tag, error = %e, "Cleanup failed");
        }
    }

    fn persist(&self, build_file: &str) -> Result<Option<PathBuf>, PipelineError> {
        let Some(path) = &self.config.output else {
            return Ok(None);
        };

        std::fs::write(path, build_file).map_err(|e| PipelineError::Output {
            path: path.clone(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "Build file written");
        Ok(Some(path.clone()))
    }

    fn enter(&self, stage: Stage) {
        debug!(stage = %stage, "Stage");
        self.progress
            .on_progress(&ProgressEvent::StageEntered { stage });
    }
}

fn failure(stage: &'static str, attempt: u32, err: EngineError) -> AttemptFailure {
    match err.fixable_log() {
        Some(log) => AttemptFailure::Fixable(log.to_string()),
        None => AttemptFailure::Fatal(PipelineError::from_engine(stage, attempt, err)),
    }
}

/// Container ports to publish: the listening ports (or the stack default), plus the
/// health port when it is separate.
fn published_ports(facts: &Facts, default_port: u16) -> Vec<u16> {
    let mut ports = facts.ports.clone();
    if ports.is_empty() {
        ports.push(default_port);
    }
    if let Some(health) = facts.health_port() {
        if !ports.contains(&health) {
            ports.push(health);
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, MockOutcome};
    use crate::fs::MockFileSystem;
    use crate::generator::TemplateGenerator;
    use crate::pipeline::ErrorKind;
    use crate::stack::{BuildToolId, StackId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const SPRING_POM: &str = r#"<project>
  <parent>
    <groupId>org.springframework.boot</groupId>
    <artifactId>spring-boot-starter-parent</artifactId>
    <version>3.2.1</version>
  </parent>
  <dependencies>
    <dependency>
      <groupId>org.springframework.boot</groupId>
      <artifactId>spring-boot-starter-web</artifactId>
    </dependency>
  </dependencies>
</project>"#;

    /// Generator whose fix step always produces a new revision.
    struct RevisingGenerator {
        fixes: AtomicUsize,
    }

    impl RevisingGenerator {
        fn new() -> Self {
            Self {
                fixes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for RevisingGenerator {
        fn name(&self) -> &str {
            "revising"
        }

        async fn generate(&self, _facts: &Facts) -> Result<String, GenerationError> {
            Ok("FROM base:0\n".to_string())
        }

        async fn fix(&self, _build_file: &str, _error: &str) -> Result<String, GenerationError> {
            let n = self.fixes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("FROM base:{}\n", n))
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingHandler {
        fn stages(&self) -> Vec<Stage> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ProgressEvent::StageEntered { stage } => Some(*stage),
                    _ => None,
                })
                .collect()
        }
    }

    impl ProgressHandler for RecordingHandler {
        fn on_progress(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn spring_repo() -> Arc<MockFileSystem> {
        let fs = MockFileSystem::new();
        fs.add_file("pom.xml", SPRING_POM);
        Arc::new(fs)
    }

    fn orchestrator(
        fs: Arc<MockFileSystem>,
        generator: Arc<dyn Generator>,
        engine: Arc<MockEngine>,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(DetectorRegistry::with_defaults()),
            generator,
            engine,
            fs,
        )
    }

    #[tokio::test]
    async fn test_first_build_succeeds() {
        let engine = Arc::new(MockEngine::new());
        let progress = Arc::new(RecordingHandler::default());
        let pipeline = orchestrator(spring_repo(), Arc::new(TemplateGenerator::new()), engine.clone())
            .with_progress(progress.clone());

        let outcome = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.stack.name, StackId::SpringBoot);
        assert!(outcome.build_file.contains("maven:3.9-eclipse-temurin-21"));
        assert_eq!(engine.build_count(), 1);
        assert_eq!(engine.cleanup_count(), 1);
        assert_eq!(
            progress.stages(),
            vec![
                Stage::Detecting,
                Stage::FactGathering,
                Stage::Generating,
                Stage::Building,
                Stage::Success
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_bound() {
        let engine = Arc::new(MockEngine::new());
        engine.add_builds((0..5).map(|i| MockOutcome::Failure(format!("failure {}", i))));
        let generator = Arc::new(RevisingGenerator::new());
        let pipeline = orchestrator(spring_repo(), generator.clone(), engine.clone())
            .with_config(PipelineConfig::new().with_max_attempts(3));

        let err = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BuildFailure);
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.build_log(), Some("failure 2"));
        assert_eq!(engine.build_count(), 3);
        assert_eq!(generator.fixes.load(Ordering::SeqCst), 2);
        assert_eq!(
            engine.build_files(),
            vec!["FROM base:0\n", "FROM base:1\n", "FROM base:2\n"]
        );
    }

    #[tokio::test]
    async fn test_fix_feeds_next_build() {
        let engine = Arc::new(MockEngine::new());
        engine.add_build(MockOutcome::Failure("broken".to_string()));
        let pipeline = orchestrator(spring_repo(), Arc::new(RevisingGenerator::new()), engine.clone());

        let outcome = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.build_file, "FROM base:1\n");
    }

    #[tokio::test]
    async fn test_no_fix_ends_with_build_failure() {
        let engine = Arc::new(MockEngine::new());
        engine.add_build(MockOutcome::Failure("something unrecognised".to_string()));
        let pipeline = orchestrator(spring_repo(), Arc::new(TemplateGenerator::new()), engine.clone());

        let err = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BuildFailure);
        assert_eq!(err.attempts(), 1);
        assert_eq!(engine.build_count(), 1);
    }

    #[tokio::test]
    async fn test_canceled_context_runs_no_builds() {
        let engine = Arc::new(MockEngine::new());
        let generator = Arc::new(RevisingGenerator::new());
        let pipeline = orchestrator(spring_repo(), generator.clone(), engine.clone());
        let (ctx, cancel) = RunContext::background().with_cancel();
        cancel.cancel();

        let err = pipeline.run(&ctx, Path::new("/mock"), None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert_eq!(err.attempts(), 0);
        assert_eq!(engine.build_count(), 0);
        assert_eq!(generator.fixes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_interrupts_slow_build() {
        let engine = Arc::new(MockEngine::new().with_build_delay(Duration::from_secs(30)));
        let pipeline = orchestrator(spring_repo(), Arc::new(RevisingGenerator::new()), engine.clone())
            .with_config(PipelineConfig::new().with_timeout(Duration::from_millis(50)));

        let err = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test]
    async fn test_connection_errors_are_terminal() {
        let engine = Arc::new(MockEngine::new());
        engine.add_build(MockOutcome::ConnectionLost("daemon gone".to_string()));
        let generator = Arc::new(RevisingGenerator::new());
        let pipeline = orchestrator(spring_repo(), generator.clone(), engine.clone());

        let err = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(err.attempts(), 1);
        assert_eq!(generator.fixes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_supplied_stack_skips_detection() {
        let fs = Arc::new(MockFileSystem::new());
        let progress = Arc::new(RecordingHandler::default());
        let spec = StackInfo::new(
            StackId::SpringBoot,
            BuildToolId::Gradle,
            PathBuf::from("build.gradle"),
            1.0,
        );
        let pipeline = orchestrator(fs, Arc::new(TemplateGenerator::new()), Arc::new(MockEngine::new()))
            .with_progress(progress.clone());

        let outcome = pipeline
            .run(&RunContext::background(), Path::new("/mock"), Some(spec))
            .await
            .unwrap();

        assert_eq!(outcome.stack.build_tool, BuildToolId::Gradle);
        assert!(!progress.stages().contains(&Stage::Detecting));
    }

    #[tokio::test]
    async fn test_empty_repository_is_not_found() {
        let pipeline = orchestrator(
            Arc::new(MockFileSystem::new()),
            Arc::new(TemplateGenerator::new()),
            Arc::new(MockEngine::new()),
        );

        let err = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().starts_with("detect: "));
    }

    #[tokio::test]
    async fn test_runtime_failure_feeds_back_like_build_failure() {
        let engine = Arc::new(MockEngine::new());
        engine.add_health(MockOutcome::Failure("APPLICATION FAILED TO START".to_string()));
        let progress = Arc::new(RecordingHandler::default());
        let pipeline = orchestrator(spring_repo(), Arc::new(RevisingGenerator::new()), engine.clone())
            .with_config(PipelineConfig::new().with_runtime_verification(Duration::from_secs(5)))
            .with_progress(progress.clone());

        let outcome = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(engine.run_count(), 2);
        assert_eq!(engine.cleanup_count(), 2);
        assert!(progress.stages().contains(&Stage::Verifying));
        assert!(progress.stages().contains(&Stage::Fixing));
    }

    #[tokio::test]
    async fn test_output_written_on_success() {
        let temp = tempfile::TempDir::new().unwrap();
        let output = temp.path().join("Dockerfile");
        let pipeline = orchestrator(spring_repo(), Arc::new(RevisingGenerator::new()), Arc::new(MockEngine::new()))
            .with_config(PipelineConfig::new().with_output(&output));

        let outcome = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap();

        assert_eq!(outcome.output_path, Some(output.clone()));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "FROM base:0\n");
    }

    #[tokio::test]
    async fn test_unwritable_output() {
        let temp = tempfile::TempDir::new().unwrap();
        let output = temp.path().join("missing-dir").join("Dockerfile");
        let pipeline = orchestrator(spring_repo(), Arc::new(RevisingGenerator::new()), Arc::new(MockEngine::new()))
            .with_config(PipelineConfig::new().with_output(&output));

        let err = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Output);
    }

    #[tokio::test]
    async fn test_separate_management_port_is_published_and_probed() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "pom.xml",
            &SPRING_POM.replace(
                "</dependencies>",
                "  <dependency><artifactId>spring-boot-starter-actuator</artifactId></dependency>\n  </dependencies>",
            ),
        );
        fs.add_file(
            "src/main/resources/application.properties",
            "management.server.port=9001\n",
        );
        let engine = Arc::new(MockEngine::new());
        let pipeline = orchestrator(Arc::new(fs), Arc::new(RevisingGenerator::new()), engine.clone())
            .with_config(PipelineConfig::new().with_runtime_verification(Duration::from_secs(5)));

        let outcome = pipeline
            .run(&RunContext::background(), Path::new("/mock"), None)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.facts.ports, vec![8080, 9001]);
        assert_eq!(engine.published_ports(), vec![vec![8080, 9001]]);

        let probes = engine.probes();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].path, "/actuator/health");
        assert_eq!(probes[0].port, Some(9001));
    }

    #[test]
    fn test_published_ports_fall_back_to_stack_default() {
        let fs = MockFileSystem::new();
        fs.add_file("pom.xml", SPRING_POM);
        let info = StackInfo::new(StackId::SpringBoot, BuildToolId::Maven, PathBuf::from("pom.xml"), 1.0);
        let mut facts = crate::facts::extract_facts(&fs, Path::new("/mock"), &info).unwrap();

        facts.ports.clear();
        assert_eq!(published_ports(&facts, 8080), vec![8080]);

        facts.metadata.insert("health_port".to_string(), "9001".to_string());
        assert_eq!(published_ports(&facts, 8080), vec![8080, 9001]);
    }
}
