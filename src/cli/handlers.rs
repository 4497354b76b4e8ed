//! Command handlers
//!
//! Each handler returns the process exit code. Results go to stdout; errors go to stderr.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::commands::CliArgs;
use super::output::{DetectionReport, OutputFormatter};
use crate::config::{default_model, GeneratorKind, StackpackConfig};
use crate::engine::{ContainerEngine, DockerEngine};
use crate::fs::{FileSystem, RealFileSystem};
use crate::generator::{Generator, LlmGenerator, TemplateGenerator};
use crate::pipeline::{self, ErrorKind, Orchestrator, PipelineError, RunContext};
use crate::stack::{load_spec, DetectorRegistry, StackInfo};

/// Lines of the last build log echoed on failure.
const LOG_TAIL_LINES: usize = 40;

/// Exit code for invalid arguments or configuration.
pub const EXIT_USAGE: i32 = 2;

pub async fn handle(args: &CliArgs) -> i32 {
    let repo_path = match resolve_repo_path(args.repository_path.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return EXIT_USAGE;
        }
    };
    debug!("Repository path: {}", repo_path.display());

    let config = apply_overrides(StackpackConfig::default(), args);
    if let Err(e) = config.validate() {
        eprintln!("error: {}", e);
        eprintln!("\nPlease check your environment variables and command-line arguments.");
        return EXIT_USAGE;
    }
    debug!("{}", config);

    let spec = match args.spec.as_deref().map(load_spec).transpose() {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("error: {}", e);
            return EXIT_USAGE;
        }
    };

    let ctx = cancel_on_interrupt();
    let registry = Arc::new(DetectorRegistry::with_defaults());
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem::new());

    if args.detect_only {
        return handle_detect_only(args, &ctx, &registry, fs, &repo_path, &config, spec).await;
    }

    let engine: Arc<dyn ContainerEngine> = match DockerEngine::connect().await {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            eprintln!("error [{}]: {}", ErrorKind::Engine, e);
            eprintln!("\nPossible solutions:");
            eprintln!("  - Ensure the Docker daemon is running");
            eprintln!("  - Check DOCKER_HOST if the daemon is not on the default socket");
            eprintln!("  - Use --detect-only to inspect the repository without building");
            return exit_code(ErrorKind::Engine);
        }
    };
    info!(engine = engine.name(), "Container engine ready");

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| repo_path.join("Dockerfile"));
    let mut pipeline_config = config.pipeline_config().with_output(output);
    if args.run {
        pipeline_config = pipeline_config.with_runtime_verification(config.health_timeout());
    }

    let orchestrator = Orchestrator::new(registry, create_generator(&config), engine, fs)
        .with_config(pipeline_config);

    info!("Analyzing repository: {}", repo_path.display());
    match orchestrator.run(&ctx, &repo_path, spec).await {
        Ok(outcome) => {
            info!(
                stack = %outcome.stack.name,
                build_tool = %outcome.stack.build_tool,
                attempts = outcome.attempts,
                "Build file verified"
            );
            if let Some(path) = outcome.output_path {
                println!("{}", path.display());
            }
            0
        }
        Err(e) => report_failure(&e),
    }
}

async fn handle_detect_only(
    args: &CliArgs,
    ctx: &RunContext,
    registry: &DetectorRegistry,
    fs: Arc<dyn FileSystem>,
    repo_path: &Path,
    config: &StackpackConfig,
    spec: Option<StackInfo>,
) -> i32 {
    let (stack, facts) =
        match pipeline::analyze(ctx, registry, fs, repo_path, config.max_depth, spec).await {
            Ok(result) => result,
            Err(e) => return report_failure(&e),
        };

    let formatter = OutputFormatter::new(args.format.into());
    let output = match formatter.format(&DetectionReport { stack, facts }) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return 1;
        }
    };

    if let Some(output_file) = &args.output {
        if let Err(e) = std::fs::write(output_file, &output) {
            eprintln!(
                "error [{}]: write {}: {}",
                ErrorKind::Output,
                output_file.display(),
                e
            );
            return exit_code(ErrorKind::Output);
        }
        info!("Output written to: {}", output_file.display());
        if !args.quiet {
            println!("Output written to: {}", output_file.display());
        }
    } else {
        println!("{}", output);
    }

    0
}

/// Repository root: the given path (or the working directory), which must be an
/// existing directory. Returned canonicalized.
pub fn resolve_repo_path(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => env::current_dir().context("Failed to get current directory")?,
    };

    if !path.exists() {
        bail!("Repository path does not exist: {}", path.display());
    }
    if !path.is_dir() {
        bail!("Repository path is not a directory: {}", path.display());
    }

    path.canonicalize()
        .with_context(|| format!("Failed to canonicalize {}", path.display()))
}

/// Layer command-line flags over the environment-derived configuration.
pub fn apply_overrides(mut config: StackpackConfig, args: &CliArgs) -> StackpackConfig {
    if let Some(attempts) = args.attempts {
        config.max_attempts = attempts;
    }
    if let Some(minutes) = args.timeout {
        config.build_timeout_mins = minutes;
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(generator) = args.generator {
        config.generator = generator.into();
    }
    if let Some(provider) = args.provider {
        if provider != config.provider && args.model.is_none() {
            config.model = default_model(provider);
        }
        config.provider = provider;
        debug!("Provider explicitly set to: {:?}", provider);
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
        debug!("Model overridden to: {}", model);
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config
}

pub fn create_generator(config: &StackpackConfig) -> Arc<dyn Generator> {
    match config.generator {
        GeneratorKind::Template => Arc::new(TemplateGenerator::new()),
        GeneratorKind::Llm => {
            info!(
                provider = config.provider.as_str(),
                model = %config.model,
                "Using LLM generator"
            );
            Arc::new(LlmGenerator::new(config.create_llm_client()))
        }
    }
}

pub fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => 3,
        ErrorKind::BuildFailure => 4,
        ErrorKind::DeadlineExceeded => 5,
        ErrorKind::Canceled => 130,
        _ => 1,
    }
}

fn report_failure(err: &PipelineError) -> i32 {
    eprintln!("error [{}]: {}", err.kind(), err);
    if let Some(log) = err.build_log() {
        eprintln!("\nLast build log:\n{}", tail(log, LOG_TAIL_LINES));
    }
    exit_code(err.kind())
}

fn tail(log: &str, lines: usize) -> String {
    let all: Vec<&str> = log.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Background context canceled on Ctrl-C.
fn cancel_on_interrupt() -> RunContext {
    let (ctx, cancel) = RunContext::background().with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, canceling");
            cancel.cancel();
        }
    });
    ctx
}
