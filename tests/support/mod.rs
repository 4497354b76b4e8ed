//! Helpers shared by the integration tests

#![allow(dead_code)]

use stackpack::facts::Facts;
use stackpack::fs::RealFileSystem;
use stackpack::pipeline::{self, PipelineError, RunContext};
use stackpack::stack::{DetectionError, DetectorRegistry, StackInfo, DEFAULT_MAX_DEPTH};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

/// Detect a fixture repository with the default registry.
pub fn detect_fixture(name: &str) -> Result<StackInfo, DetectionError> {
    runtime().block_on(async {
        DetectorRegistry::with_defaults()
            .detect_all(
                Arc::new(RealFileSystem::new()),
                &fixture_path(name),
                DEFAULT_MAX_DEPTH,
            )
            .await
    })
}

/// Detect and extract facts for a fixture repository.
pub fn analyze_fixture(name: &str) -> Result<(StackInfo, Facts), PipelineError> {
    runtime().block_on(async {
        pipeline::analyze(
            &RunContext::background(),
            &DetectorRegistry::with_defaults(),
            Arc::new(RealFileSystem::new()),
            &fixture_path(name),
            DEFAULT_MAX_DEPTH,
            None,
        )
        .await
    })
}
