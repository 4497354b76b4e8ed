//! npm / Yarn / pnpm build facts

use super::{
    module_relative, stack_default_port, to_slash, FactSource, Facts, FactsError,
    DEFAULT_NODE_VERSION,
};
use crate::stack::signals::js as signals;
use crate::stack::{BuildToolId, StackId, StackInfo};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

fn script_port_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\bPORT=|--port[=\s]+)(\d{2,5})\b").expect("valid regex")
    })
}

fn env_port_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*(?:export\s+)?PORT\s*=\s*["']?(\d{2,5})"#).expect("valid regex")
    })
}

/// Package-manager specific command words.
struct Commands {
    install: String,
    run: &'static str,
}

fn commands(tool: &BuildToolId, source: &FactSource<'_>, module_dir: &Path) -> Commands {
    let has = |name: &str| source.is_file(&module_dir.join(name));
    match tool {
        BuildToolId::Yarn => Commands {
            install: if has("yarn.lock") {
                "yarn install --frozen-lockfile".to_string()
            } else {
                "yarn install".to_string()
            },
            run: "yarn",
        },
        BuildToolId::Pnpm => Commands {
            install: if has("pnpm-lock.yaml") {
                "corepack enable && pnpm install --frozen-lockfile".to_string()
            } else {
                "corepack enable && pnpm install".to_string()
            },
            run: "pnpm",
        },
        _ => Commands {
            install: if has("package-lock.json") || has("npm-shrinkwrap.json") {
                "npm ci".to_string()
            } else {
                "npm install".to_string()
            },
            run: "npm run",
        },
    }
}

pub fn extract(source: &FactSource<'_>, info: &StackInfo) -> Result<Facts, FactsError> {
    let module_dir = info.module_dir();
    let manifest = source
        .read(&module_dir.join("package.json"))?
        .unwrap_or_default();

    let cmds = commands(&info.build_tool, source, &module_dir);
    let build_script = signals::script(&manifest, "build");

    let mut steps = vec![cmds.install.clone()];
    if build_script.is_some() {
        steps.push(format!("{} build", cmds.run));
    }
    let mut build_command = steps.join(" && ");
    if !module_dir.as_os_str().is_empty() {
        build_command = format!("cd {} && {}", to_slash(&module_dir), build_command);
    }

    let mut metadata = BTreeMap::new();
    metadata.insert("package_manager".to_string(), info.build_tool.to_string());

    let artifact = match info.name {
        StackId::React => {
            let output = if uses_vite(source, &module_dir, &manifest) { "dist" } else { "build" };
            metadata.insert("output_dir".to_string(), output.to_string());
            module_relative(&module_dir, output)
        }
        _ => {
            let start = start_command(source, &module_dir, &manifest, &cmds);
            metadata.insert("start_command".to_string(), start);
            if module_dir.as_os_str().is_empty() {
                ".".to_string()
            } else {
                to_slash(&module_dir)
            }
        }
    };

    let language_version = node_version(source, &module_dir, &manifest)?;
    let ports = ports(source, &module_dir, &manifest, stack_default_port(info))?;

    Ok(Facts {
        stack_type: info.name.clone(),
        build_tool: info.build_tool.clone(),
        build_command,
        artifact,
        ports,
        health_endpoint: None,
        language_version,
        framework_version: info.version.clone(),
        module_path: module_dir,
        metadata,
    })
}

fn uses_vite(source: &FactSource<'_>, module_dir: &Path, manifest: &str) -> bool {
    signals::has_named_dependency(manifest, "vite")
        || source
            .file_names(module_dir)
            .iter()
            .any(|name| signals::matches_marker(name, "vite.config.*"))
}

fn start_command(
    source: &FactSource<'_>,
    module_dir: &Path,
    manifest: &str,
    cmds: &Commands,
) -> String {
    if signals::script(manifest, "start").is_some() {
        // `npm run start` and `npm start` are equivalent; keep the short form.
        return match cmds.run {
            "npm run" => "npm start".to_string(),
            run => format!("{} start", run),
        };
    }

    if let Some(main) = signals::main_entry(manifest) {
        return format!("node {}", main);
    }

    ["server.js", "app.js", "index.js"]
        .iter()
        .find(|name| source.is_file(&module_dir.join(name)))
        .map(|name| format!("node {}", name))
        .unwrap_or_else(|| "node index.js".to_string())
}

/// `engines.node`, `.nvmrc`, `.node-version`, then the default. Major version only.
fn node_version(
    source: &FactSource<'_>,
    module_dir: &Path,
    manifest: &str,
) -> Result<String, FactsError> {
    if let Some(version) = signals::engines_node(manifest) {
        return Ok(version);
    }

    for dir in [module_dir, Path::new("")] {
        for file in [".nvmrc", ".node-version"] {
            if let Some(content) = source.read(&dir.join(file))? {
                if let Some(version) = major_from_version_file(&content) {
                    return Ok(version);
                }
            }
        }
    }

    Ok(DEFAULT_NODE_VERSION.to_string())
}

/// `v20.11.0` or `18` become the major; aliases like `lts/*` are ignored.
fn major_from_version_file(content: &str) -> Option<String> {
    let line = content.lines().next()?.trim().trim_start_matches('v');
    let major = line.split('.').next()?;
    (!major.is_empty() && major.chars().all(|c| c.is_ascii_digit())).then(|| major.to_string())
}

fn ports(
    source: &FactSource<'_>,
    module_dir: &Path,
    manifest: &str,
    default_port: u16,
) -> Result<Vec<u16>, FactsError> {
    if let Some(env) = source.read(&module_dir.join(".env"))? {
        if let Some(port) = env_port_re()
            .captures(&env)
            .and_then(|c| c[1].parse::<u16>().ok())
        {
            return Ok(vec![port]);
        }
    }

    let mut scripts = signals::scripts(manifest);
    // `start` decides the runtime port; check it before the rest.
    scripts.sort_by_key(|(name, _)| name != "start");
    let from_scripts = scripts.iter().find_map(|(_, body)| {
        script_port_re()
            .captures(body)
            .and_then(|c| c[1].parse::<u16>().ok())
    });

    Ok(vec![from_scripts.unwrap_or(default_port)])
}
