//! Stack detection
//!
//! Identifies which application stack a repository implements. Each
//! [`StackDetector`](detector::StackDetector) owns one stack family and scores manifest
//! candidates from pure [`signals`]; the [`DetectorRegistry`] fans the detectors out
//! concurrently and reduces their results in registration order.
//!
//! # Example
//!
//! ```no_run
//! use stackpack::fs::RealFileSystem;
//! use stackpack::stack::{DetectorRegistry, DEFAULT_MAX_DEPTH};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let registry = DetectorRegistry::with_defaults();
//! let info = registry
//!     .detect_all(Arc::new(RealFileSystem::new()), Path::new("."), DEFAULT_MAX_DEPTH)
//!     .await?;
//! println!("{} ({}) confidence {}", info.name, info.build_tool, info.confidence);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod id_macro;

pub mod build_tool_id;
pub mod confidence;
pub mod detector;
pub mod info;
pub mod registry;
pub mod signals;
pub mod spec_file;
pub mod stack_id;

pub use build_tool_id::BuildToolId;
pub use confidence::{Signal, SignalSet};
pub use detector::{Candidate, DetectionContext, DetectorError, StackDetector};
pub use info::{StackFamily, StackInfo};
pub use registry::{DetectionError, DetectorRegistry, DEFAULT_MAX_DEPTH};
pub use spec_file::{load_spec, parse_spec, SpecFileError, SpecFormat};
pub use stack_id::StackId;
