//! Build/verify loop
//!
//! The [`Orchestrator`] moves a repository through
//! `Detecting -> FactGathering -> Generating -> Building -> {Success, Fixing -> Building, Failed}`,
//! with an optional `Verifying` step after each successful build. Every stage checks the
//! [`RunContext`] first, so cancellation and the overall deadline stop the loop between
//! steps as well as inside them.

pub mod analysis;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;

pub use analysis::{analyze, detect_stack, gather_facts};
pub use config::PipelineConfig;
pub use context::{CancelHandle, ContextError, RunContext};
pub use error::{ErrorKind, PipelineError};
pub use orchestrator::{Orchestrator, PipelineOutcome, Stage};
