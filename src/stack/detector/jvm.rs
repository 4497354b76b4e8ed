//! Spring Boot detection for Maven and Gradle builds

use super::{Candidate, DetectionContext, DetectorError, StackDetector};
use crate::stack::confidence::{Signal, SignalSet};
use crate::stack::signals::jvm as signals;
use crate::stack::{BuildToolId, StackFamily, StackId, StackInfo};
use std::path::{Path, PathBuf};
use tracing::debug;

const MAVEN_MANIFEST: &str = "pom.xml";
const GRADLE_MANIFESTS: &[&str] = &["build.gradle.kts", "build.gradle"];

/// Source files inspected per module when looking for the entry-point annotation.
const MAX_SCANNED_SOURCES: usize = 200;
const MAX_SOURCE_DEPTH: usize = 12;

pub struct JvmDetector;

impl JvmDetector {
    pub fn new() -> Self {
        Self
    }

    fn maven_signals(candidate: &Candidate) -> Result<SignalSet, DetectorError> {
        signals::Pom::parse(&candidate.content).map_err(|e| DetectorError::Malformed {
            path: candidate.manifest_path.clone(),
            message: e.to_string(),
        })?;

        let pom = candidate.content.as_str();
        let mut set = SignalSet::new();
        set.record(Signal::ParentDeclaration, signals::has_parent_declaration(pom));
        set.record(Signal::StarterDependency, signals::has_starter_dependency(pom));
        set.record(Signal::PluginDeclaration, signals::has_plugin_declaration(pom));
        Ok(set)
    }

    fn gradle_signals(candidate: &Candidate) -> SignalSet {
        let script = candidate.content.as_str();
        let mut set = SignalSet::new();
        set.record(Signal::ParentDeclaration, signals::has_gradle_bom_import(script));
        set.record(
            Signal::StarterDependency,
            signals::has_gradle_starter_dependency(script),
        );
        set.record(
            Signal::PluginDeclaration,
            signals::has_gradle_plugin_declaration(script),
        );
        set
    }

    fn has_hard_signal(set: &SignalSet) -> bool {
        set.contains(Signal::ParentDeclaration)
            || set.contains(Signal::StarterDependency)
            || set.contains(Signal::PluginDeclaration)
    }

    fn has_runtime_config(module_dir: &Path, ctx: &DetectionContext) -> bool {
        signals::RUNTIME_CONFIG_PATHS
            .iter()
            .any(|p| ctx.is_file(&module_dir.join(p)))
    }

    fn has_annotated_source(module_dir: &Path, ctx: &DetectionContext) -> bool {
        let mut scanned = 0;

        for source_root in signals::SOURCE_ROOTS {
            let dir = ctx.absolute(&module_dir.join(source_root));
            if !ctx.fs.is_dir(&dir) {
                continue;
            }

            let Ok(files) = ctx.fs.walk(&dir, MAX_SOURCE_DEPTH) else {
                continue;
            };

            for file in files {
                let is_source = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(signals::is_jvm_source)
                    .unwrap_or(false);
                if !is_source {
                    continue;
                }

                if scanned >= MAX_SCANNED_SOURCES {
                    return false;
                }
                scanned += 1;

                if let Ok(source) = ctx.fs.read_to_string(&dir.join(&file)) {
                    if signals::has_framework_annotation(&source) {
                        return true;
                    }
                }
            }
        }

        false
    }

    fn maven_version(candidate: &Candidate, ctx: &DetectionContext) -> Option<String> {
        signals::maven_version(&candidate.content).or_else(|| {
            Self::ancestor_dirs(candidate).find_map(|dir| {
                read_quietly(ctx, &dir.join(MAVEN_MANIFEST))
                    .and_then(|pom| signals::maven_version(&pom))
            })
        })
    }

    fn gradle_version(candidate: &Candidate, ctx: &DetectionContext) -> Option<String> {
        signals::gradle_version(&candidate.content)
            .or_else(|| Self::gradle_dir_version(candidate.module_dir(), ctx, false))
            .or_else(|| {
                Self::ancestor_dirs(candidate)
                    .find_map(|dir| Self::gradle_dir_version(&dir, ctx, true))
            })
    }

    /// Version from the Gradle files of one directory. Build scripts are only read for
    /// ancestors; the candidate's own script has already been checked.
    fn gradle_dir_version(dir: &Path, ctx: &DetectionContext, scripts: bool) -> Option<String> {
        let script_version = || {
            GRADLE_MANIFESTS.iter().find_map(|name| {
                read_quietly(ctx, &dir.join(name))
                    .and_then(|s| signals::gradle_inherited_version(&s))
            })
        };

        let from_scripts = if scripts { script_version() } else { None };

        from_scripts
            .or_else(|| {
                read_quietly(ctx, &dir.join("gradle.properties"))
                    .and_then(|p| signals::gradle_version(&p))
            })
            .or_else(|| {
                read_quietly(ctx, &dir.join("gradle/libs.versions.toml"))
                    .and_then(|c| signals::gradle_catalog_version(&c))
            })
    }

    /// Parent directories of the candidate's module, nearest first, up to the root.
    fn ancestor_dirs(candidate: &Candidate) -> impl Iterator<Item = PathBuf> + '_ {
        candidate
            .module_dir()
            .ancestors()
            .skip(1)
            .map(Path::to_path_buf)
    }
}

impl Default for JvmDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Version lookups are best-effort: an unreadable ancestor just yields no version.
fn read_quietly(ctx: &DetectionContext, relative: &Path) -> Option<String> {
    ctx.read_optional(relative).ok().flatten()
}

impl StackDetector for JvmDetector {
    fn family(&self) -> StackFamily {
        StackFamily::Jvm
    }

    fn name(&self) -> &str {
        "jvm"
    }

    fn is_manifest(&self, file_name: &str) -> bool {
        file_name == MAVEN_MANIFEST || GRADLE_MANIFESTS.contains(&file_name)
    }

    fn detect(
        &self,
        candidate: &Candidate,
        ctx: &DetectionContext,
    ) -> Result<Option<StackInfo>, DetectorError> {
        let build_tool = if candidate.file_name() == MAVEN_MANIFEST {
            BuildToolId::Maven
        } else {
            BuildToolId::Gradle
        };

        let mut set = match build_tool {
            BuildToolId::Maven => Self::maven_signals(candidate)?,
            _ => Self::gradle_signals(candidate),
        };

        if !Self::has_hard_signal(&set) {
            return Ok(None);
        }

        let module_dir = candidate.module_dir();
        set.record(
            Signal::RuntimeConfigFile,
            Self::has_runtime_config(module_dir, ctx),
        );
        set.record(
            Signal::FrameworkAnnotation,
            Self::has_annotated_source(module_dir, ctx),
        );

        let Some(confidence) = set.confidence() else {
            return Ok(None);
        };

        let version = match build_tool {
            BuildToolId::Maven => Self::maven_version(candidate, ctx),
            _ => Self::gradle_version(candidate, ctx),
        };

        debug!(
            manifest = %candidate.manifest_path.display(),
            signals = ?set.signals(),
            weight = set.weight(),
            version = ?version,
            "Spring Boot signals"
        );

        Ok(Some(
            StackInfo::new(
                StackId::SpringBoot,
                build_tool,
                candidate.manifest_path.clone(),
                confidence,
            )
            .with_version(version),
        ))
    }
}
