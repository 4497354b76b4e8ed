//! Node/React signals for `package.json` and its neighbours

use super::is_literal_version;
use crate::stack::BuildToolId;
use serde_json::Value;

/// Dependency that makes a package a React frontend.
pub const REACT_DEPENDENCY: &str = "react";

/// Dependencies that make a package a Node server.
pub const SERVER_DEPENDENCIES: &[&str] = &["express", "fastify", "koa", "@nestjs/core", "@hapi/hapi"];

/// Lockfiles in resolution order after the `packageManager` field.
pub const LOCKFILES: &[&str] = &["pnpm-lock.yaml", "yarn.lock", "package-lock.json"];

/// Marker files relative to the package directory. Entries ending in `.*` match any extension.
pub const REACT_MARKERS: &[&str] = &[
    "public/index.html",
    "index.html",
    "vite.config.*",
    "src/App.js",
    "src/App.jsx",
    "src/App.ts",
    "src/App.tsx",
];

pub const SERVER_MARKERS: &[&str] = &[
    "server.js",
    "server.ts",
    "app.js",
    "index.js",
    "src/server.ts",
    "src/main.ts",
    "src/index.ts",
    "nest-cli.json",
];

const DEPENDENCY_SECTIONS: &[&str] = &["dependencies", "devDependencies", "peerDependencies"];

fn parse(content: &str) -> Option<Value> {
    serde_json::from_str::<Value>(content)
        .ok()
        .filter(|v| v.is_object())
}

/// The content is a `package.json` object.
pub fn has_manifest(content: &str) -> bool {
    parse(content).is_some()
}

/// `name` appears as a key of one of the dependency sections.
///
/// Matching is on object keys only, so a script mentioning `react` does not count.
pub fn has_named_dependency(content: &str, name: &str) -> bool {
    dependency_spec(content, name).is_some()
}

fn dependency_spec(content: &str, name: &str) -> Option<String> {
    let manifest = parse(content)?;
    DEPENDENCY_SECTIONS.iter().find_map(|section| {
        manifest
            .get(section)
            .and_then(|deps| deps.get(name))
            .map(|spec| spec.as_str().unwrap_or_default().to_string())
    })
}

/// Concrete version of a dependency, with range operators stripped.
///
/// `^18.2.0` yields `18.2.0`; `latest`, tags and git URLs yield `None`.
pub fn dependency_version(content: &str, name: &str) -> Option<String> {
    dependency_spec(content, name).and_then(|spec| clean_version(&spec))
}

pub fn clean_version(spec: &str) -> Option<String> {
    let first = spec.split("||").next()?.split_whitespace().next()?;
    let trimmed = first.trim_start_matches(['^', '~', '>', '<', '=', 'v']);
    if is_literal_version(trimmed) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// `"packageManager": "pnpm@8.15.0"`
pub fn package_manager_field(content: &str) -> Option<BuildToolId> {
    let manifest = parse(content)?;
    let field = manifest.get("packageManager")?.as_str()?;
    let tool = field.split('@').next()?.trim();
    match tool {
        "npm" => Some(BuildToolId::Npm),
        "yarn" => Some(BuildToolId::Yarn),
        "pnpm" => Some(BuildToolId::Pnpm),
        _ => None,
    }
}

pub fn lockfile_kind(file_name: &str) -> Option<BuildToolId> {
    BuildToolId::from_lockfile(file_name)
}

pub fn script(content: &str, name: &str) -> Option<String> {
    parse(content)?
        .get("scripts")?
        .get(name)?
        .as_str()
        .map(str::to_string)
}

pub fn scripts(content: &str) -> Vec<(String, String)> {
    parse(content)
        .and_then(|m| m.get("scripts").and_then(|s| s.as_object()).cloned())
        .map(|obj| {
            obj.into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// `engines.node`, with range operators stripped down to the major version.
pub fn engines_node(content: &str) -> Option<String> {
    let spec = parse(content)?.get("engines")?.get("node")?.as_str()?.to_string();
    let version = clean_version(&spec).or_else(|| {
        spec.trim_start_matches(['^', '~', '>', '<', '=', 'v', ' '])
            .split(['.', ' '])
            .next()
            .filter(|major| !major.is_empty() && major.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
    })?;
    version.split('.').next().map(str::to_string)
}

pub fn main_entry(content: &str) -> Option<String> {
    parse(content)?
        .get("main")?
        .as_str()
        .map(str::to_string)
}

/// Whether `rel_path` (relative to the package directory) matches a marker pattern.
pub fn matches_marker(rel_path: &str, marker: &str) -> bool {
    match marker.strip_suffix(".*") {
        Some(stem) => rel_path
            .strip_prefix(stem)
            .map(|rest| rest.starts_with('.') && !rest[1..].contains('/'))
            .unwrap_or(false),
        None => rel_path == marker,
    }
}
