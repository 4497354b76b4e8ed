use super::{BuildToolId, StackId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stack families in fixed detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackFamily {
    /// Maven/Gradle builds (Spring Boot)
    Jvm,
    /// package.json builds (React, Node servers)
    Js,
}

impl StackFamily {
    pub fn of(build_tool: &BuildToolId) -> Option<Self> {
        match build_tool {
            BuildToolId::Maven | BuildToolId::Gradle => Some(StackFamily::Jvm),
            BuildToolId::Npm | BuildToolId::Yarn | BuildToolId::Pnpm => Some(StackFamily::Js),
            BuildToolId::Custom(_) => None,
        }
    }
}

/// Result of a successful detection.
///
/// A `StackInfo` only exists for a positive match: a stack name without a build tool
/// (or the reverse) cannot be represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackInfo {
    pub name: StackId,
    pub build_tool: BuildToolId,
    /// Framework version; `None` when the framework signal is present but no version parses.
    pub version: Option<String>,
    pub port: u16,
    pub confidence: f64,
    /// Repository-relative evidence, canonical manifest first.
    pub detected_files: Vec<PathBuf>,
}

impl StackInfo {
    pub fn new(name: StackId, build_tool: BuildToolId, manifest: PathBuf, confidence: f64) -> Self {
        let port = name.default_port();
        Self {
            name,
            build_tool,
            version: None,
            port,
            confidence,
            detected_files: vec![manifest],
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn family(&self) -> Option<StackFamily> {
        StackFamily::of(&self.build_tool)
    }

    /// The canonical evidence file, falling back to the build tool's root manifest.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.detected_files.first().cloned().or_else(|| {
            self.build_tool
                .default_manifest()
                .map(PathBuf::from)
        })
    }

    /// Directory containing the manifest, relative to the repository root.
    /// Empty for a root-level manifest.
    pub fn module_dir(&self) -> PathBuf {
        self.manifest_path()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_default()
    }

    pub fn validate(&self) -> bool {
        self.confidence > 0.0 && self.confidence <= 1.0 && !self.detected_files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_info_creation() {
        let info = StackInfo::new(
            StackId::SpringBoot,
            BuildToolId::Maven,
            PathBuf::from("pom.xml"),
            1.0,
        );

        assert_eq!(info.port, 8080);
        assert_eq!(info.version, None);
        assert_eq!(info.detected_files, vec![PathBuf::from("pom.xml")]);
        assert_eq!(info.family(), Some(StackFamily::Jvm));
        assert!(info.validate());
    }

    #[test]
    fn test_module_dir() {
        let nested = StackInfo::new(
            StackId::SpringBoot,
            BuildToolId::Gradle,
            PathBuf::from("sub/sub/build.gradle.kts"),
            0.5,
        );
        assert_eq!(nested.module_dir(), PathBuf::from("sub/sub"));

        let root = StackInfo::new(
            StackId::React,
            BuildToolId::Npm,
            PathBuf::from("package.json"),
            0.8,
        );
        assert_eq!(root.module_dir(), PathBuf::new());
    }

    #[test]
    fn test_manifest_path_defaults_by_build_tool() {
        let mut info = StackInfo::new(
            StackId::React,
            BuildToolId::Yarn,
            PathBuf::from("package.json"),
            0.8,
        );
        info.detected_files.clear();
        assert_eq!(info.manifest_path(), Some(PathBuf::from("package.json")));
        assert!(!info.validate());
    }

    #[test]
    fn test_family_priority_order() {
        assert!(StackFamily::Jvm < StackFamily::Js);
    }

    #[test]
    fn test_serialized_shape() {
        let info = StackInfo::new(
            StackId::SpringBoot,
            BuildToolId::Maven,
            PathBuf::from("pom.xml"),
            1.0,
        )
        .with_version(Some("3.2.0".to_string()));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "spring-boot");
        assert_eq!(json["build_tool"], "maven");
        assert_eq!(json["version"], "3.2.0");
        assert_eq!(json["detected_files"][0], "pom.xml");
    }
}
