//! Repository analysis: stack detection followed by fact extraction
//!
//! Shared by the full pipeline and `--detect-only`, which never touches a container
//! engine.

use super::context::RunContext;
use super::error::PipelineError;
use crate::facts::{extract_facts, Facts};
use crate::fs::FileSystem;
use crate::stack::{DetectorRegistry, StackInfo};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn detect_stack(
    ctx: &RunContext,
    registry: &DetectorRegistry,
    fs: Arc<dyn FileSystem>,
    root: &Path,
    max_depth: usize,
) -> Result<StackInfo, PipelineError> {
    ctx.check("detect", 0)?;
    let info = ctx
        .guard("detect", 0, registry.detect_all(fs, root, max_depth))
        .await??;
    Ok(info)
}

pub fn gather_facts(
    ctx: &RunContext,
    fs: &dyn FileSystem,
    root: &Path,
    stack: &StackInfo,
) -> Result<Facts, PipelineError> {
    ctx.check("extract facts", 0)?;
    Ok(extract_facts(fs, root, stack)?)
}

/// Detect (unless `spec` is given, which is trusted as is) and extract facts.
pub async fn analyze(
    ctx: &RunContext,
    registry: &DetectorRegistry,
    fs: Arc<dyn FileSystem>,
    root: &Path,
    max_depth: usize,
    spec: Option<StackInfo>,
) -> Result<(StackInfo, Facts), PipelineError> {
    let stack = match spec {
        Some(stack) => {
            log_supplied(&stack);
            stack
        }
        None => detect_stack(ctx, registry, Arc::clone(&fs), root, max_depth).await?,
    };
    let facts = gather_facts(ctx, fs.as_ref(), root, &stack)?;
    Ok((stack, facts))
}

pub(crate) fn log_supplied(stack: &StackInfo) {
    info!(
        stack = %stack.name,
        build_tool = %stack.build_tool,
        "Using supplied stack, skipping detection"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::pipeline::ErrorKind;
    use crate::stack::{BuildToolId, StackId};

    const PACKAGE_JSON: &str = r#"{
  "name": "web",
  "scripts": { "build": "react-scripts build" },
  "dependencies": { "react": "^18.2.0", "react-dom": "^18.2.0" }
}"#;

    #[tokio::test]
    async fn test_analyze_detects_and_extracts() {
        let fs = MockFileSystem::new();
        fs.add_file("package.json", PACKAGE_JSON);

        let (stack, facts) = analyze(
            &RunContext::background(),
            &DetectorRegistry::with_defaults(),
            Arc::new(fs),
            Path::new("/mock"),
            4,
            None,
        )
        .await
        .unwrap();

        assert_eq!(stack.name, StackId::React);
        assert_eq!(facts.stack_type, StackId::React);
        assert_eq!(facts.build_tool, stack.build_tool);
    }

    #[tokio::test]
    async fn test_canceled_before_detection() {
        let (ctx, cancel) = RunContext::background().with_cancel();
        cancel.cancel();

        let err = detect_stack(
            &ctx,
            &DetectorRegistry::with_defaults(),
            Arc::new(MockFileSystem::new()),
            Path::new("/mock"),
            4,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert!(err.to_string().starts_with("detect"));
    }

    #[tokio::test]
    async fn test_supplied_stack_is_trusted() {
        let spec = StackInfo::new(
            StackId::Node,
            BuildToolId::Npm,
            "package.json".into(),
            1.0,
        );

        let (stack, facts) = analyze(
            &RunContext::background(),
            &DetectorRegistry::new(),
            Arc::new(MockFileSystem::new()),
            Path::new("/mock"),
            4,
            Some(spec),
        )
        .await
        .unwrap();

        assert_eq!(stack.name, StackId::Node);
        assert_eq!(facts.build_tool, BuildToolId::Npm);
    }
}
