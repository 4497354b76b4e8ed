use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Reports progress through `tracing`. The orchestrator's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { repo_path } => info!(repo = %repo_path, "Starting run"),
            ProgressEvent::StageEntered { stage } => debug!(stage = %stage, "Entering stage"),
            ProgressEvent::BuildStarted { attempt } => info!(attempt, "Building image"),
            ProgressEvent::BuildFailed { attempt, fixable } => {
                warn!(attempt, fixable, "Build failed")
            }
            ProgressEvent::FixApplied { attempt } => info!(attempt, "Applied fix to build file"),
            ProgressEvent::Completed {
                attempts,
                total_time,
            } => info!(
                attempts,
                total_time_ms = total_time.as_millis() as u64,
                "Build file verified"
            ),
            ProgressEvent::Failed { error } => warn!(error = %error, "Run failed"),
        }
    }
}
