//! Build/verify loop integration tests
//!
//! Fixture repositories run through the full pipeline against a scripted container
//! engine.

mod support;

use stackpack::engine::{MockEngine, MockOutcome};
use stackpack::fs::RealFileSystem;
use stackpack::generator::{LlmGenerator, TemplateGenerator};
use stackpack::llm::{MockLLMClient, MockResponse};
use stackpack::stack::load_spec;
use stackpack::{
    DetectorRegistry, ErrorKind, Generator, Orchestrator, PipelineConfig, RunContext, StackId,
};
use std::sync::Arc;
use std::time::Duration;
use support::fixture_path;
use tempfile::TempDir;

fn orchestrator(generator: Arc<dyn Generator>, engine: Arc<MockEngine>) -> Orchestrator {
    Orchestrator::new(
        Arc::new(DetectorRegistry::with_defaults()),
        generator,
        engine,
        Arc::new(RealFileSystem::new()),
    )
}

#[tokio::test]
async fn test_template_fix_repairs_npm_ci_failure() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("Dockerfile");
    let engine = Arc::new(MockEngine::new());
    engine.add_build(MockOutcome::Failure(
        "npm ERR! `npm ci` can only install packages when your package.json and \
         package-lock.json or npm-shrinkwrap.json are in sync."
            .to_string(),
    ));

    let outcome = orchestrator(Arc::new(TemplateGenerator::new()), engine.clone())
        .with_config(PipelineConfig::new().with_output(&output))
        .run(&RunContext::background(), &fixture_path("react-npm"), None)
        .await
        .expect("Pipeline failed");

    assert_eq!(outcome.stack.name, StackId::React);
    assert_eq!(outcome.attempts, 2);

    let builds = engine.build_files();
    assert_eq!(builds.len(), 2);
    assert!(builds[0].contains("npm ci"));
    assert!(!builds[1].contains("npm ci"));
    assert!(builds[1].contains("npm install"));

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, outcome.build_file);
    assert_eq!(written, builds[1]);
}

#[tokio::test]
async fn test_unrecognised_failure_stops_after_one_build() {
    let engine = Arc::new(MockEngine::new());
    engine.add_build(MockOutcome::Failure("exit code: 137".to_string()));

    let err = orchestrator(Arc::new(TemplateGenerator::new()), engine.clone())
        .run(&RunContext::background(), &fixture_path("spring-maven"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BuildFailure);
    assert_eq!(err.attempts(), 1);
    assert_eq!(err.build_log(), Some("exit code: 137"));
    assert_eq!(engine.build_count(), 1);
}

#[tokio::test]
async fn test_llm_generator_loop() {
    let client = Arc::new(MockLLMClient::new());
    client.add_responses([
        MockResponse::text("```dockerfile\nFROM node:20-slim\nRUN npm install\n```"),
        MockResponse::text("```dockerfile\nFROM node:20-slim\nRUN npm install --legacy-peer-deps\n```"),
    ]);
    let engine = Arc::new(MockEngine::new());
    engine.add_build(MockOutcome::Failure("npm ERR! ERESOLVE unable to resolve".to_string()));

    let outcome = orchestrator(Arc::new(LlmGenerator::new(client.clone())), engine.clone())
        .run(&RunContext::background(), &fixture_path("node-express"), None)
        .await
        .expect("Pipeline failed");

    assert_eq!(outcome.attempts, 2);
    assert!(outcome.build_file.contains("--legacy-peer-deps"));
    assert_eq!(client.requests().len(), 2);
    assert_eq!(client.remaining_responses(), 0);
}

#[tokio::test]
async fn test_retry_budget_is_exact() {
    let client = Arc::new(MockLLMClient::new());
    client.add_responses((0..4).map(|i| {
        MockResponse::text(format!("```dockerfile\nFROM node:20-slim\nRUN echo {}\n```", i))
    }));
    let engine = Arc::new(MockEngine::new());
    engine.add_builds((0..4).map(|i| MockOutcome::Failure(format!("failure {}", i))));

    let err = orchestrator(Arc::new(LlmGenerator::new(client.clone())), engine.clone())
        .with_config(PipelineConfig::new().with_max_attempts(3))
        .run(&RunContext::background(), &fixture_path("react-npm"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BuildFailure);
    assert_eq!(err.attempts(), 3);
    assert_eq!(engine.build_count(), 3);
    // One generation plus two fixes.
    assert_eq!(client.requests().len(), 3);
}

#[tokio::test]
async fn test_spec_file_skips_detection() {
    let stack = load_spec(&fixture_path("specs/spring-gradle.json")).unwrap();
    let engine = Arc::new(MockEngine::new());

    // The fixture holds a Maven project; the supplied stack says Gradle.
    let outcome = orchestrator(Arc::new(TemplateGenerator::new()), engine.clone())
        .run(&RunContext::background(), &fixture_path("spring-maven"), Some(stack))
        .await
        .expect("Pipeline failed");

    assert_eq!(outcome.stack.confidence, 1.0);
    assert!(outcome.build_file.contains("gradle"));
    assert_eq!(outcome.facts.framework_version.as_deref(), Some("3.3.0"));
}

#[tokio::test]
async fn test_cancellation_before_start_runs_nothing() {
    let engine = Arc::new(MockEngine::new());
    let (ctx, cancel) = RunContext::background().with_cancel();
    cancel.cancel();

    let err = orchestrator(Arc::new(TemplateGenerator::new()), engine.clone())
        .run(&ctx, &fixture_path("spring-maven"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Canceled);
    assert_eq!(engine.build_count(), 0);
}

#[tokio::test]
async fn test_cancel_during_build() {
    let engine = Arc::new(MockEngine::new().with_build_delay(Duration::from_secs(30)));
    let (ctx, cancel) = RunContext::background().with_cancel();
    let pipeline = orchestrator(Arc::new(TemplateGenerator::new()), engine.clone());

    let run = tokio::spawn(async move {
        pipeline
            .run(&ctx, &fixture_path("react-npm"), None)
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("Pipeline did not stop after cancel")
        .unwrap()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Canceled);
    assert_eq!(err.attempts(), 1);
}

#[tokio::test]
async fn test_runtime_verification_retries_unhealthy_container() {
    let engine = Arc::new(MockEngine::new());
    engine.add_health(MockOutcome::Failure(
        "Web server failed to start. Port 9090 was already in use.".to_string(),
    ));
    let client = Arc::new(MockLLMClient::new());
    client.add_responses([
        MockResponse::text("```dockerfile\nFROM eclipse-temurin:17-jre\n```"),
        MockResponse::text("```dockerfile\nFROM eclipse-temurin:17-jre\nENV SERVER_PORT=9090\n```"),
    ]);

    let outcome = orchestrator(Arc::new(LlmGenerator::new(client)), engine.clone())
        .with_config(PipelineConfig::new().with_runtime_verification(Duration::from_secs(5)))
        .run(&RunContext::background(), &fixture_path("spring-maven"), None)
        .await
        .expect("Pipeline failed");

    assert_eq!(outcome.attempts, 2);
    assert_eq!(engine.run_count(), 2);
    assert!(outcome.build_file.contains("SERVER_PORT"));
}
