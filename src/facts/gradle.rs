//! Gradle build facts

use super::runtime_config::{self, ACTUATOR_ARTIFACT};
use super::{
    jdk_from_dirs, module_relative, normalize_java_version, stack_default_port, to_slash,
    FactSource, Facts, FactsError, DEFAULT_JDK_VERSION,
};
use crate::stack::signals::jvm as signals;
use crate::stack::StackInfo;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

const SCRIPTS: &[&str] = &["build.gradle.kts", "build.gradle"];
const SETTINGS: &[&str] = &["settings.gradle.kts", "settings.gradle"];
const WRAPPER: &str = "gradlew";
const CYCLONEDX_PLUGIN: &str = "org.cyclonedx.bom";

fn toolchain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:JavaLanguageVersion\.of\(\s*(\d+)\s*\)|jvmToolchain\(\s*(\d+)\s*\))")
            .expect("valid regex")
    })
}

fn source_compat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"sourceCompatibility\s*=\s*(?:JavaVersion\.VERSION_)?["']?([\d._]+)"#)
            .expect("valid regex")
    })
}

fn war_plugin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)^\s*(?:id\s*\(?\s*["']war["']\s*\)?|war|apply\s*\(?\s*plugin\s*[:=]\s*["']war["']\s*\)?)\s*$"#,
        )
        .expect("valid regex")
    })
}

pub fn extract(source: &FactSource<'_>, info: &StackInfo) -> Result<Facts, FactsError> {
    let module_dir = info.module_dir();
    let root = Path::new("");

    let manifest = info.manifest_path().unwrap_or_else(|| module_dir.join("build.gradle"));
    let script = match source.read(&manifest)? {
        Some(content) => content,
        None => read_first(source, &module_dir, SCRIPTS)?.unwrap_or_default(),
    };
    let root_script = if module_dir.as_os_str().is_empty() {
        String::new()
    } else {
        read_first(source, root, SCRIPTS)?.unwrap_or_default()
    };

    let is_war = war_plugin_re().is_match(&script);
    let (task, extension) = if is_war { ("bootWar", "war") } else { ("bootJar", "jar") };
    let artifact = module_relative(&module_dir, &format!("build/libs/*.{}", extension));

    let has_root_settings = SETTINGS.iter().any(|s| source.is_file(Path::new(s)));
    let wrapper = if source.is_file(Path::new(WRAPPER)) {
        Some("./gradlew".to_string())
    } else if source.is_file(&module_dir.join(WRAPPER)) {
        Some(format!("./{}", module_relative(&module_dir, WRAPPER)))
    } else {
        None
    };
    let gradle = wrapper.clone().unwrap_or_else(|| "gradle".to_string());

    let project_path = project_path(&module_dir);
    let build_command = if module_dir.as_os_str().is_empty() {
        format!("{} {} -x test --no-daemon", gradle, task)
    } else if has_root_settings {
        format!("{} {}:{} -x test --no-daemon", gradle, project_path, task)
    } else {
        format!(
            "{} -p {} {} -x test --no-daemon",
            gradle,
            to_slash(&module_dir),
            task
        )
    };

    let language_version = match jdk_from_script(&script).or_else(|| jdk_from_script(&root_script)) {
        Some(version) => version,
        None => jdk_from_dirs(source, &[module_dir.as_path(), root])?
            .unwrap_or_else(|| DEFAULT_JDK_VERSION.to_string()),
    };

    let runtime = runtime_config::load(source, &module_dir)?;
    let has_actuator = signals::has_gradle_dependency(&script, ACTUATOR_ARTIFACT);
    let ports = runtime.ports(stack_default_port(info));
    let health_endpoint = has_actuator.then(|| runtime.health_endpoint());

    let mut metadata = BTreeMap::new();
    metadata.insert("task".to_string(), task.to_string());
    metadata.insert("wrapper".to_string(), wrapper.is_some().to_string());
    if !module_dir.as_os_str().is_empty() {
        metadata.insert("project_path".to_string(), project_path);
    }
    if script.contains(CYCLONEDX_PLUGIN) || root_script.contains(CYCLONEDX_PLUGIN) {
        metadata.insert(
            "sbom_path".to_string(),
            module_relative(&module_dir, "build/reports/bom.json"),
        );
    }
    if let Some(port) = runtime.health_port(stack_default_port(info)).filter(|_| has_actuator) {
        metadata.insert("health_port".to_string(), port.to_string());
    }
    if !runtime.env_vars.is_empty() {
        metadata.insert("env_vars".to_string(), runtime.env_vars.join(","));
    }

    Ok(Facts {
        stack_type: info.name.clone(),
        build_tool: info.build_tool.clone(),
        build_command,
        artifact,
        ports,
        health_endpoint,
        language_version,
        framework_version: info.version.clone(),
        module_path: module_dir,
        metadata,
    })
}

fn read_first(
    source: &FactSource<'_>,
    dir: &Path,
    names: &[&str],
) -> Result<Option<String>, FactsError> {
    for name in names {
        if let Some(content) = source.read(&dir.join(name))? {
            return Ok(Some(content));
        }
    }
    Ok(None)
}

/// `a/b` becomes `:a:b`.
fn project_path(module_dir: &Path) -> String {
    module_dir
        .components()
        .map(|c| format!(":{}", c.as_os_str().to_string_lossy()))
        .collect()
}

fn jdk_from_script(script: &str) -> Option<String> {
    if let Some(caps) = toolchain_re().captures(script) {
        return caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
    }

    source_compat_re()
        .captures(script)
        .and_then(|caps| normalize_java_version(&caps[1].replace('_', ".")))
}
