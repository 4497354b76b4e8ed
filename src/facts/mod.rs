//! Fact extraction
//!
//! Turns a [`StackInfo`] into the [`Facts`] a generator needs: how to build, what the
//! build produces, which ports the application listens on and where it reports health.
//! Extraction is a pure function of the repository content; running it twice over the
//! same tree yields equal facts.

pub mod gradle;
pub mod maven;
pub mod node;
pub mod runtime_config;

use crate::fs::FileSystem;
use crate::stack::{BuildToolId, StackId, StackInfo};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_JDK_VERSION: &str = "21";
pub const DEFAULT_NODE_VERSION: &str = "20";

#[derive(Debug, Error)]
pub enum FactsError {
    #[error("failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("unsupported build tool: {0}")]
    UnsupportedBuildTool(String),
}

/// Everything a generator needs to produce a build file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    pub stack_type: StackId,
    pub build_tool: BuildToolId,
    /// Shell command run from the repository root inside the build stage.
    pub build_command: String,
    /// Build output, relative to the repository root. May be a glob (`target/*.jar`)
    /// or a directory (`dist`).
    pub artifact: String,
    /// Listening ports, primary first.
    pub ports: Vec<u16>,
    pub health_endpoint: Option<String>,
    /// JDK major version for JVM stacks, Node major version for JS stacks.
    pub language_version: String,
    pub framework_version: Option<String>,
    /// Directory of the built module, relative to the repository root. Empty at the root.
    pub module_path: PathBuf,
    pub metadata: BTreeMap<String, String>,
}

impl Facts {
    pub fn primary_port(&self) -> Option<u16> {
        self.ports.first().copied()
    }

    /// Port the health endpoint is served on when it is not the primary port.
    pub fn health_port(&self) -> Option<u16> {
        self.metadata("health_port").and_then(|p| p.parse().ok())
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Extract build facts for a detected (or user-specified) stack.
///
/// Only files that exist but cannot be read are errors. Missing or malformed files fall
/// back to defaults.
pub fn extract_facts(
    fs: &dyn FileSystem,
    root: &Path,
    info: &StackInfo,
) -> Result<Facts, FactsError> {
    let source = FactSource::new(fs, root);

    let facts = match &info.build_tool {
        BuildToolId::Maven => maven::extract(&source, info)?,
        BuildToolId::Gradle => gradle::extract(&source, info)?,
        BuildToolId::Npm | BuildToolId::Yarn | BuildToolId::Pnpm => node::extract(&source, info)?,
        BuildToolId::Custom(name) => return Err(FactsError::UnsupportedBuildTool(name.clone())),
    };

    debug!(
        stack = %facts.stack_type,
        build_command = %facts.build_command,
        artifact = %facts.artifact,
        ports = ?facts.ports,
        language_version = %facts.language_version,
        "Facts extracted"
    );

    Ok(facts)
}

/// Repository-relative file access for extractors.
pub struct FactSource<'a> {
    fs: &'a dyn FileSystem,
    root: &'a Path,
}

impl<'a> FactSource<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: &'a Path) -> Self {
        Self { fs, root }
    }

    pub fn read(&self, relative: &Path) -> Result<Option<String>, FactsError> {
        self.fs
            .read_optional(&self.root.join(relative))
            .map_err(|e| FactsError::Io {
                path: relative.to_path_buf(),
                message: e.to_string(),
            })
    }

    pub fn is_file(&self, relative: &Path) -> bool {
        self.fs.is_file(&self.root.join(relative))
    }

    pub fn is_dir(&self, relative: &Path) -> bool {
        self.fs.is_dir(&self.root.join(relative))
    }

    pub fn file_names(&self, relative: &Path) -> Vec<String> {
        self.fs.file_names(&self.root.join(relative))
    }
}

/// Joins a module directory and a path below it as a `/`-separated string.
pub(crate) fn module_relative(module: &Path, path: &str) -> String {
    if module.as_os_str().is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", to_slash(module), path)
    }
}

pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reduces `1.8`, `17.0.2` or `21-tem` to a JDK major version.
pub fn normalize_java_version(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(?:1\.)?(\d+)").expect("valid regex"));
    re.captures(raw.trim()).map(|c| c[1].to_string())
}

/// JDK version from `.java-version` or `.sdkmanrc` in `dir`.
pub(crate) fn jdk_from_toolchain_files(
    source: &FactSource<'_>,
    dir: &Path,
) -> Result<Option<String>, FactsError> {
    if let Some(content) = source.read(&dir.join(".java-version"))? {
        if let Some(version) = content.lines().next().and_then(normalize_java_version) {
            return Ok(Some(version));
        }
    }

    if let Some(content) = source.read(&dir.join(".sdkmanrc"))? {
        let version = content
            .lines()
            .filter_map(|line| line.trim().strip_prefix("java="))
            .find_map(normalize_java_version);
        if version.is_some() {
            return Ok(version);
        }
    }

    Ok(None)
}

/// First directory in `dirs` that yields a toolchain-file version.
pub(crate) fn jdk_from_dirs(
    source: &FactSource<'_>,
    dirs: &[&Path],
) -> Result<Option<String>, FactsError> {
    for dir in dirs {
        if let Some(version) = jdk_from_toolchain_files(source, dir)? {
            return Ok(Some(version));
        }
    }
    Ok(None)
}

pub(crate) fn stack_default_port(info: &StackInfo) -> u16 {
    if info.port == 0 {
        info.name.default_port()
    } else {
        info.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn test_normalize_java_version() {
        assert_eq!(normalize_java_version("1.8"), Some("8".to_string()));
        assert_eq!(normalize_java_version("17"), Some("17".to_string()));
        assert_eq!(normalize_java_version("21.0.2-tem"), Some("21".to_string()));
        assert_eq!(normalize_java_version(" 11\n"), Some("11".to_string()));
        assert_eq!(normalize_java_version("temurin"), None);
    }

    #[test]
    fn test_module_relative() {
        assert_eq!(module_relative(Path::new(""), "target/*.jar"), "target/*.jar");
        assert_eq!(
            module_relative(Path::new("svc/api"), "target/*.jar"),
            "svc/api/target/*.jar"
        );
    }

    #[test]
    fn test_toolchain_files() {
        let fs = MockFileSystem::new();
        fs.add_file(".sdkmanrc", "# sdkman\njava=17.0.9-tem\n");
        let source = FactSource::new(&fs, Path::new("/mock"));
        assert_eq!(
            jdk_from_toolchain_files(&source, Path::new("")).unwrap(),
            Some("17".to_string())
        );

        fs.add_file(".java-version", "11\n");
        assert_eq!(
            jdk_from_toolchain_files(&source, Path::new("")).unwrap(),
            Some("11".to_string())
        );
    }

    #[test]
    fn test_custom_build_tool_is_unsupported() {
        let fs = MockFileSystem::new();
        let info = StackInfo::new(
            StackId::SpringBoot,
            BuildToolId::Custom("bazel".to_string()),
            PathBuf::from("BUILD"),
            1.0,
        );

        assert!(matches!(
            extract_facts(&fs, Path::new("/mock"), &info),
            Err(FactsError::UnsupportedBuildTool(name)) if name == "bazel"
        ));
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_unreadable_file(".java-version");
        let source = FactSource::new(&fs, Path::new("/mock"));

        assert!(matches!(
            jdk_from_toolchain_files(&source, Path::new("")),
            Err(FactsError::Io { .. })
        ));
    }
}
