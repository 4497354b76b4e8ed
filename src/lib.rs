//! stackpack - detect an application's stack and produce a verified Dockerfile for it
//!
//! The library identifies which application stack a repository implements, derives the
//! facts a build needs from its manifests, generates a container build file and proves it
//! by building it, feeding failures back into a fix step until the build succeeds or the
//! attempt budget runs out.
//!
//! # Core Concepts
//!
//! - **Detection**: concurrent, per-family [`stack::StackDetector`]s score manifests from
//!   pure signals; the [`DetectorRegistry`] picks one [`StackInfo`] deterministically
//! - **Facts**: build command, artifact, ports, health endpoint and language version read
//!   from Maven, Gradle and `package.json` manifests plus Spring runtime configuration
//! - **Generators**: static templates with rule-based fixes, or any LLM behind
//!   [`llm::LLMClient`]
//! - **Verification**: the [`Orchestrator`] builds each revision through a
//!   [`ContainerEngine`] under a [`RunContext`] that carries cancellation and the deadline
//!
//! # Example Usage
//!
//! ```no_run
//! use stackpack::engine::DockerEngine;
//! use stackpack::fs::RealFileSystem;
//! use stackpack::generator::TemplateGenerator;
//! use stackpack::{DetectorRegistry, Orchestrator, PipelineConfig, RunContext};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let orchestrator = Orchestrator::new(
//!     Arc::new(DetectorRegistry::with_defaults()),
//!     Arc::new(TemplateGenerator::new()),
//!     Arc::new(DockerEngine::connect().await?),
//!     Arc::new(RealFileSystem::new()),
//! )
//! .with_config(PipelineConfig::new().with_output("Dockerfile"));
//!
//! let outcome = orchestrator
//!     .run(&RunContext::background(), Path::new("."), None)
//!     .await?;
//! println!("{} built after {} attempt(s)", outcome.stack.name, outcome.attempts);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`stack`]: stack identifiers, signals, detectors and the registry
//! - [`facts`]: build fact extraction per build tool
//! - [`generator`]: build file generation and repair
//! - [`engine`]: container engine abstraction and the Docker implementation
//! - [`pipeline`]: run context, errors and the build/verify loop
//! - [`llm`]: LLM client abstraction over `genai`

pub mod cli;
pub mod config;
pub mod engine;
pub mod facts;
pub mod fs;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod stack;
pub mod util;

pub use config::{ConfigError, GeneratorKind, StackpackConfig};
pub use engine::{ContainerEngine, EngineError};
pub use facts::{extract_facts, Facts, FactsError};
pub use generator::{GenerationError, Generator};
pub use pipeline::{
    CancelHandle, ErrorKind, Orchestrator, PipelineConfig, PipelineError, PipelineOutcome,
    RunContext, Stage,
};
pub use stack::{BuildToolId, DetectionError, DetectorRegistry, StackId, StackInfo};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
