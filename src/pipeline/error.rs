use super::context::ContextError;
use crate::engine::EngineError;
use crate::facts::FactsError;
use crate::generator::GenerationError;
use crate::stack::DetectionError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stable classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Detector,
    FactExtraction,
    Generation,
    BuildFailure,
    Engine,
    DeadlineExceeded,
    Canceled,
    Output,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Detector => "detector",
            ErrorKind::FactExtraction => "fact_extraction",
            ErrorKind::Generation => "generation",
            ErrorKind::BuildFailure => "build_failure",
            ErrorKind::Engine => "engine",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Output => "output",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("detect: {0}")]
    Detection(#[source] DetectionError),

    #[error("extract facts: {0}")]
    Facts(#[source] FactsError),

    #[error("{stage}: {source}")]
    Generation {
        stage: &'static str,
        attempts: u32,
        #[source]
        source: GenerationError,
    },

    /// Every allowed build failed, or no fix was available for the last failure.
    #[error("build failed after {attempts} attempt(s)")]
    BuildFailure { attempts: u32, log: String },

    #[error("{stage}: {source}")]
    Engine {
        stage: &'static str,
        attempts: u32,
        #[source]
        source: EngineError,
    },

    #[error("{stage}: {cause}")]
    Interrupted {
        stage: &'static str,
        attempts: u32,
        cause: ContextError,
    },

    #[error("write {}: {message}", .path.display())]
    Output { path: PathBuf, message: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Detection(DetectionError::NotFound(_)) => ErrorKind::NotFound,
            PipelineError::Detection(_) => ErrorKind::Detector,
            PipelineError::Facts(_) => ErrorKind::FactExtraction,
            PipelineError::Generation { .. } => ErrorKind::Generation,
            PipelineError::BuildFailure { .. } => ErrorKind::BuildFailure,
            PipelineError::Engine { .. } => ErrorKind::Engine,
            PipelineError::Interrupted {
                cause: ContextError::Canceled,
                ..
            } => ErrorKind::Canceled,
            PipelineError::Interrupted {
                cause: ContextError::DeadlineExceeded,
                ..
            } => ErrorKind::DeadlineExceeded,
            PipelineError::Output { .. } => ErrorKind::Output,
        }
    }

    /// Number of builds run before the failure.
    pub fn attempts(&self) -> u32 {
        match self {
            PipelineError::Generation { attempts, .. }
            | PipelineError::BuildFailure { attempts, .. }
            | PipelineError::Engine { attempts, .. }
            | PipelineError::Interrupted { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    /// Log of the last failed build, when there was one.
    pub fn build_log(&self) -> Option<&str> {
        match self {
            PipelineError::BuildFailure { log, .. } => Some(log),
            _ => None,
        }
    }

    pub(crate) fn interrupted(stage: &'static str, attempts: u32, cause: ContextError) -> Self {
        PipelineError::Interrupted {
            stage,
            attempts,
            cause,
        }
    }

    /// Engine errors that only report the context ending are interruptions, not engine
    /// faults.
    pub(crate) fn from_engine(stage: &'static str, attempts: u32, source: EngineError) -> Self {
        match source {
            EngineError::Canceled => Self::interrupted(stage, attempts, ContextError::Canceled),
            EngineError::DeadlineExceeded => {
                Self::interrupted(stage, attempts, ContextError::DeadlineExceeded)
            }
            source => PipelineError::Engine {
                stage,
                attempts,
                source,
            },
        }
    }
}

impl From<DetectionError> for PipelineError {
    fn from(err: DetectionError) -> Self {
        PipelineError::Detection(err)
    }
}

impl From<FactsError> for PipelineError {
    fn from(err: FactsError) -> Self {
        PipelineError::Facts(err)
    }
}
