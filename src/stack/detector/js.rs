//! React and Node server detection for `package.json` projects

use super::{Candidate, DetectionContext, DetectorError, StackDetector};
use crate::stack::confidence::{Signal, SignalSet};
use crate::stack::signals::js as signals;
use crate::stack::{BuildToolId, StackFamily, StackId, StackInfo};
use std::path::Path;
use tracing::debug;

const MANIFEST: &str = "package.json";

pub struct JsDetector;

impl JsDetector {
    pub fn new() -> Self {
        Self
    }

    /// React wins over a server dependency in the same manifest.
    fn classify(content: &str) -> Option<(StackId, &'static str)> {
        if signals::has_named_dependency(content, signals::REACT_DEPENDENCY) {
            return Some((StackId::React, signals::REACT_DEPENDENCY));
        }

        signals::SERVER_DEPENDENCIES
            .iter()
            .find(|dep| signals::has_named_dependency(content, dep))
            .map(|dep| (StackId::Node, *dep))
    }

    /// `packageManager` field first, then lockfiles, then npm.
    pub fn package_manager(content: &str, module_dir: &Path, ctx: &DetectionContext) -> BuildToolId {
        if let Some(tool) = signals::package_manager_field(content) {
            return tool;
        }

        signals::LOCKFILES
            .iter()
            .filter(|lockfile| ctx.is_file(&module_dir.join(lockfile)))
            .find_map(|lockfile| signals::lockfile_kind(lockfile))
            .unwrap_or(BuildToolId::Npm)
    }

    fn has_lockfile(module_dir: &Path, ctx: &DetectionContext) -> bool {
        signals::LOCKFILES
            .iter()
            .any(|lockfile| ctx.is_file(&module_dir.join(lockfile)))
    }

    fn has_marker(stack: &StackId, module_dir: &Path, ctx: &DetectionContext) -> bool {
        let markers = match stack {
            StackId::React => signals::REACT_MARKERS,
            _ => signals::SERVER_MARKERS,
        };
        let top_level = ctx.file_names(module_dir);

        markers.iter().any(|marker| {
            if marker.ends_with(".*") {
                top_level
                    .iter()
                    .any(|name| signals::matches_marker(name, marker))
            } else {
                ctx.is_file(&module_dir.join(marker))
            }
        })
    }
}

impl Default for JsDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StackDetector for JsDetector {
    fn family(&self) -> StackFamily {
        StackFamily::Js
    }

    fn name(&self) -> &str {
        "js"
    }

    fn is_manifest(&self, file_name: &str) -> bool {
        file_name == MANIFEST
    }

    fn detect(
        &self,
        candidate: &Candidate,
        ctx: &DetectionContext,
    ) -> Result<Option<StackInfo>, DetectorError> {
        let content = candidate.content.as_str();
        if let Err(e) = serde_json::from_str::<serde_json::Value>(content) {
            return Err(DetectorError::Malformed {
                path: candidate.manifest_path.clone(),
                message: e.to_string(),
            });
        }

        let Some((stack, dependency)) = Self::classify(content) else {
            return Ok(None);
        };

        let module_dir = candidate.module_dir();
        let mut set = SignalSet::new();
        set.record(Signal::Manifest, signals::has_manifest(content));
        set.record(Signal::NamedDependency, true);
        set.record(Signal::Lockfile, Self::has_lockfile(module_dir, ctx));
        set.record(
            Signal::FrameworkMarkerFile,
            Self::has_marker(&stack, module_dir, ctx),
        );

        // A JSON array or scalar parses but is not a manifest.
        if !set.contains(Signal::Manifest) {
            return Ok(None);
        }

        let Some(confidence) = set.confidence() else {
            return Ok(None);
        };

        let build_tool = Self::package_manager(content, module_dir, ctx);
        let version = signals::dependency_version(content, dependency);

        debug!(
            manifest = %candidate.manifest_path.display(),
            stack = %stack,
            build_tool = %build_tool,
            signals = ?set.signals(),
            "JS signals"
        );

        Ok(Some(
            StackInfo::new(stack, build_tool, candidate.manifest_path.clone(), confidence)
                .with_version(version),
        ))
    }
}
