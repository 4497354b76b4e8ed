use crate::pipeline::Stage;
use std::time::Duration;

/// Milestones of one run through the verify loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { repo_path: String },

    StageEntered { stage: Stage },

    /// `attempt` is 1-based.
    BuildStarted { attempt: u32 },

    /// `fixable` is false when the loop ends here instead of trying a fix.
    BuildFailed { attempt: u32, fixable: bool },

    /// The fix step produced a new build file after `attempt` failed.
    FixApplied { attempt: u32 },

    Completed { attempts: u32, total_time: Duration },

    Failed { error: String },
}

/// Receives [`ProgressEvent`]s synchronously from the orchestrator's task.
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct AttemptCounter {
        failed: Mutex<Vec<(u32, bool)>>,
    }

    impl ProgressHandler for AttemptCounter {
        fn on_progress(&self, event: &ProgressEvent) {
            if let ProgressEvent::BuildFailed { attempt, fixable } = event {
                self.failed.lock().unwrap().push((*attempt, *fixable));
            }
        }
    }

    #[test]
    fn test_handler_sees_failed_attempts() {
        let handler = AttemptCounter::default();
        for event in [
            ProgressEvent::BuildStarted { attempt: 1 },
            ProgressEvent::BuildFailed { attempt: 1, fixable: true },
            ProgressEvent::FixApplied { attempt: 1 },
            ProgressEvent::BuildStarted { attempt: 2 },
            ProgressEvent::BuildFailed { attempt: 2, fixable: false },
        ] {
            handler.on_progress(&event);
        }

        assert_eq!(*handler.failed.lock().unwrap(), vec![(1, true), (2, false)]);
    }
}
