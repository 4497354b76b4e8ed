use super::detector::{DetectionContext, DetectorError, JsDetector, JvmDetector, StackDetector};
use super::StackInfo;
use crate::fs::FileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_DEPTH: usize = 4;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("no supported stack found under {}", .0.display())]
    NotFound(PathBuf),

    #[error("{detector} detector: {source}")]
    Detector {
        detector: String,
        #[source]
        source: DetectorError,
    },

    #[error("cannot scan {}: {message}", .path.display())]
    Walk { path: PathBuf, message: String },

    #[error("detector task failed: {0}")]
    Task(String),
}

/// Ordered set of stack detectors.
///
/// Registration order is detection priority: when several detectors find a stack, the
/// earliest registered one wins regardless of which finishes first. Build it once while
/// wiring the application and share it read-only behind an `Arc`.
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn StackDetector>>,
}

type SlotResult = Result<Option<StackInfo>, DetectorError>;

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// JVM first, then JS.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JvmDetector::new()));
        registry.register(Arc::new(JsDetector::new()));
        registry
    }

    pub fn register(&mut self, detector: Arc<dyn StackDetector>) {
        self.detectors.push(detector);
    }

    pub fn detectors(&self) -> &[Arc<dyn StackDetector>] {
        &self.detectors
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Detect the repository's stack.
    ///
    /// Walks `root` once (bounded by `max_depth`), hands each detector the manifests it
    /// recognises, runs every detector on the blocking pool and reduces their results in
    /// registration order.
    pub async fn detect_all(
        &self,
        fs: Arc<dyn FileSystem>,
        root: &Path,
        max_depth: usize,
    ) -> Result<StackInfo, DetectionError> {
        if !fs.is_dir(root) {
            return Err(DetectionError::Walk {
                path: root.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        let files = {
            let fs = Arc::clone(&fs);
            let walk_root = root.to_path_buf();
            tokio::task::spawn_blocking(move || fs.walk(&walk_root, max_depth))
                .await
                .map_err(|e| DetectionError::Task(e.to_string()))?
                .map_err(|e| DetectionError::Walk {
                    path: root.to_path_buf(),
                    message: e.to_string(),
                })?
        };

        debug!(root = %root.display(), files = files.len(), max_depth, "Repository walked");

        let ctx = DetectionContext::new(fs, root);
        let (tx, mut rx) = mpsc::channel::<(usize, SlotResult)>(self.detectors.len().max(1));

        for (index, detector) in self.detectors.iter().enumerate() {
            let candidates: Vec<PathBuf> = files
                .iter()
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| detector.is_manifest(n))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();

            debug!(
                detector = detector.name(),
                candidates = candidates.len(),
                "Dispatching detector"
            );

            let detector = Arc::clone(detector);
            let ctx = ctx.clone();
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || {
                let result = detector.detect_best(&candidates, &ctx);
                // The receiver is gone once a higher-priority result has been returned.
                let _ = tx.blocking_send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<SlotResult>> = (0..self.detectors.len()).map(|_| None).collect();

        while let Some((index, result)) = rx.recv().await {
            slots[index] = Some(result);

            if let Some(found) = self.first_decided(&mut slots) {
                info!(
                    stack = %found.name,
                    build_tool = %found.build_tool,
                    confidence = found.confidence,
                    manifest = ?found.detected_files.first(),
                    "Stack detected"
                );
                return Ok(found);
            }
        }

        self.no_match(root, slots)
    }

    /// Returns the highest-priority found result once every detector registered before it
    /// has reported "not found".
    fn first_decided(&self, slots: &mut [Option<SlotResult>]) -> Option<StackInfo> {
        for slot in slots.iter_mut() {
            match slot {
                None => return None,
                Some(Ok(Some(_))) => {
                    return match slot.take() {
                        Some(Ok(Some(info))) => Some(info),
                        _ => None,
                    };
                }
                Some(_) => continue,
            }
        }
        None
    }

    fn no_match(
        &self,
        root: &Path,
        slots: Vec<Option<SlotResult>>,
    ) -> Result<StackInfo, DetectionError> {
        for (index, slot) in slots.into_iter().enumerate() {
            let name = self.detectors[index].name().to_string();
            match slot {
                None => {
                    return Err(DetectionError::Task(format!(
                        "{} detector exited without reporting",
                        name
                    )))
                }
                Some(Err(source)) => {
                    warn!(detector = %name, "Detection failed: {}", source);
                    return Err(DetectionError::Detector {
                        detector: name,
                        source,
                    });
                }
                Some(Ok(_)) => {}
            }
        }

        Err(DetectionError::NotFound(root.to_path_buf()))
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
