//! Stack spec files
//!
//! A spec file states the stack up front and skips detection:
//!
//! ```yaml
//! name: spring-boot
//! build_tool: gradle
//! version: 3.2.0
//! port: 9000
//! detected_files: [service/build.gradle.kts]
//! ```

use super::{BuildToolId, StackId, StackInfo};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecFileError {
    #[error("failed to read spec file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON spec: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML spec: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported spec file extension for {} (expected .json, .yaml or .yml)", .0.display())]
    UnknownFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(SpecFormat::Json),
            Some("yaml") | Some("yml") => Some(SpecFormat::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StackSpec {
    name: StackId,
    build_tool: BuildToolId,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    detected_files: Option<Vec<PathBuf>>,
}

impl From<StackSpec> for StackInfo {
    fn from(spec: StackSpec) -> Self {
        let port = spec.port.unwrap_or_else(|| spec.name.default_port());
        let detected_files = spec
            .detected_files
            .filter(|files| !files.is_empty())
            .or_else(|| {
                spec.build_tool
                    .default_manifest()
                    .map(|m| vec![PathBuf::from(m)])
            })
            .unwrap_or_default();

        StackInfo {
            name: spec.name,
            build_tool: spec.build_tool,
            version: spec.version,
            port,
            confidence: 1.0,
            detected_files,
        }
    }
}

pub fn parse_spec(content: &str, format: SpecFormat) -> Result<StackInfo, SpecFileError> {
    let spec: StackSpec = match format {
        SpecFormat::Json => serde_json::from_str(content)?,
        SpecFormat::Yaml => serde_yaml::from_str(content)?,
    };
    Ok(spec.into())
}

pub fn load_spec(path: &Path) -> Result<StackInfo, SpecFileError> {
    let format =
        SpecFormat::from_path(path).ok_or_else(|| SpecFileError::UnknownFormat(path.into()))?;
    let content = std::fs::read_to_string(path).map_err(|source| SpecFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_spec(&content, format)
}
