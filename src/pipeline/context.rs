//! Cancellation and deadlines for a pipeline run

use super::error::PipelineError;
use futures_util::future::select_all;
use std::future::{pending, Future};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a [`RunContext`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Carries cancellation and an optional deadline through a run.
///
/// Contexts form a tree: a derived context is canceled when any ancestor is, and its
/// deadline is the earlier of its own and its parent's. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct RunContext {
    signals: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels the context returned alongside it by [`RunContext::with_cancel`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RunContext {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self {
            signals: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut signals = self.signals.clone();
        signals.push(rx);
        (
            Self {
                signals,
                deadline: self.deadline,
            },
            CancelHandle { tx },
        )
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            signals: self.signals.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_canceled(&self) -> bool {
        self.signals.iter().any(|rx| *rx.borrow())
    }

    /// `None` while the context is live. Cancellation takes precedence over an expired
    /// deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_canceled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        if let Some(err) = self.err() {
            return err;
        }

        let canceled = wait_for_cancel(self.signals.clone());
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = canceled => ContextError::Canceled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                canceled.await;
                ContextError::Canceled
            }
        }
    }
}

impl RunContext {
    /// Fail with the stage breadcrumb if the context is already done.
    pub(crate) fn check(&self, stage: &'static str, attempts: u32) -> Result<(), PipelineError> {
        match self.err() {
            Some(cause) => Err(PipelineError::interrupted(stage, attempts, cause)),
            None => Ok(()),
        }
    }

    /// Await `fut` unless the context finishes first.
    pub(crate) async fn guard<T>(
        &self,
        stage: &'static str,
        attempts: u32,
        fut: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        tokio::select! {
            biased;
            cause = self.done() => Err(PipelineError::interrupted(stage, attempts, cause)),
            value = fut => Ok(value),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::background()
    }
}

async fn wait_for_cancel(mut signals: Vec<watch::Receiver<bool>>) {
    if signals.is_empty() {
        return pending().await;
    }

    let waits = signals.iter_mut().map(|rx| {
        Box::pin(async move {
            let canceled = rx.wait_for(|canceled| *canceled).await.is_ok();
            // A dropped handle can no longer cancel.
            if !canceled {
                pending::<()>().await;
            }
        })
    });
    select_all(waits).await;
}
