//! Stack detectors
//!
//! A detector looks at one manifest candidate at a time and either recognises its stack
//! family there or reports nothing. Picking between several qualifying candidates of the
//! same detector is deterministic, see [`select_best`].

pub mod js;
pub mod jvm;

pub use js::JsDetector;
pub use jvm::JvmDetector;

use super::{StackFamily, StackInfo};
use crate::fs::FileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Directory names preferred when several modules of a multi-module build qualify.
pub const PREFERRED_MODULE_DIRS: &[&str] = &["app", "application"];

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("malformed manifest {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

impl DetectorError {
    pub fn path(&self) -> &Path {
        match self {
            DetectorError::Io { path, .. } | DetectorError::Malformed { path, .. } => path,
        }
    }
}

/// Read-only view of the repository shared by all detectors of one run.
#[derive(Clone)]
pub struct DetectionContext {
    pub fs: Arc<dyn FileSystem>,
    pub root: PathBuf,
}

impl DetectionContext {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn is_file(&self, relative: &Path) -> bool {
        self.fs.is_file(&self.absolute(relative))
    }

    pub fn read_optional(&self, relative: &Path) -> Result<Option<String>, DetectorError> {
        self.fs
            .read_optional(&self.absolute(relative))
            .map_err(|e| DetectorError::Io {
                path: relative.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Names of the regular files directly inside `relative`, sorted. Unlistable
    /// directories yield an empty list.
    pub fn file_names(&self, relative: &Path) -> Vec<String> {
        self.fs.file_names(&self.absolute(relative))
    }
}

/// A manifest discovered by the walk, with its content loaded.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Path relative to the repository root.
    pub manifest_path: PathBuf,
    pub content: String,
}

impl Candidate {
    pub fn new(manifest_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            content: content.into(),
        }
    }

    pub fn load(ctx: &DetectionContext, manifest_path: &Path) -> Result<Self, DetectorError> {
        let content = ctx
            .fs
            .read_to_string(&ctx.absolute(manifest_path))
            .map_err(|e| DetectorError::Io {
                path: manifest_path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self::new(manifest_path, content))
    }

    pub fn file_name(&self) -> &str {
        self.manifest_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Directory of the manifest relative to the root; empty at the root.
    pub fn module_dir(&self) -> &Path {
        self.manifest_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

pub trait StackDetector: Send + Sync {
    fn family(&self) -> StackFamily;

    fn name(&self) -> &str;

    /// Whether a file with this name is a manifest this detector inspects.
    fn is_manifest(&self, file_name: &str) -> bool;

    /// Classify a single candidate. `Ok(None)` means no hard signal was found.
    fn detect(
        &self,
        candidate: &Candidate,
        ctx: &DetectionContext,
    ) -> Result<Option<StackInfo>, DetectorError>;

    /// Runs [`detect`](Self::detect) over all candidates in discovery order and keeps the
    /// preferred match. Per-candidate errors degrade to "not found"; the first one is
    /// returned only when no candidate qualifies.
    fn detect_best(
        &self,
        candidates: &[PathBuf],
        ctx: &DetectionContext,
    ) -> Result<Option<StackInfo>, DetectorError> {
        let mut found = Vec::new();
        let mut first_error = None;

        for (index, path) in candidates.iter().enumerate() {
            let outcome = Candidate::load(ctx, path).and_then(|c| self.detect(&c, ctx));
            match outcome {
                Ok(Some(info)) => {
                    debug!(
                        detector = self.name(),
                        manifest = %path.display(),
                        confidence = info.confidence,
                        "Candidate qualifies"
                    );
                    found.push((index, info));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(detector = self.name(), "Skipping candidate: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match select_best(found) {
            Some(info) => Ok(Some(info)),
            None => first_error.map_or(Ok(None), Err),
        }
    }
}

/// Picks one result among qualifying candidates of the same detector.
///
/// Order: a module directory named `app`/`application`, then fewest path components,
/// then earliest discovery index.
pub fn select_best(found: Vec<(usize, StackInfo)>) -> Option<StackInfo> {
    found
        .into_iter()
        .min_by_key(|(index, info)| {
            let manifest = info.detected_files.first().cloned().unwrap_or_default();
            (!is_preferred_module(&manifest), manifest.components().count(), *index)
        })
        .map(|(_, info)| info)
}

fn is_preferred_module(manifest: &Path) -> bool {
    manifest
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|n| n.to_str())
        .map(|n| PREFERRED_MODULE_DIRS.contains(&n))
        .unwrap_or(false)
}
