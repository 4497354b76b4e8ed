//! Spring Boot runtime configuration (`application.properties` / `application.yml`)

use super::{FactSource, FactsError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const ACTUATOR_ARTIFACT: &str = "spring-boot-starter-actuator";
pub const DEFAULT_ACTUATOR_BASE_PATH: &str = "/actuator";

const CONFIG_FILES: &[&str] = &[
    "src/main/resources/application.properties",
    "src/main/resources/application.yml",
    "src/main/resources/application.yaml",
];

/// Settings that affect where the application listens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub server_port: Option<u16>,
    pub management_port: Option<u16>,
    pub management_base_path: Option<String>,
    pub context_path: Option<String>,
    /// Environment variables referenced through `${VAR}` placeholders.
    pub env_vars: Vec<String>,
}

impl RuntimeConfig {
    /// Fills unset fields from `other`; values already set win.
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.server_port = self.server_port.or(other.server_port);
        self.management_port = self.management_port.or(other.management_port);
        if self.management_base_path.is_none() {
            self.management_base_path = other.management_base_path;
        }
        if self.context_path.is_none() {
            self.context_path = other.context_path;
        }
        for var in other.env_vars {
            if !self.env_vars.contains(&var) {
                self.env_vars.push(var);
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        let value = value.trim();
        extract_env_vars(value, &mut self.env_vars);

        match key {
            "server.port" => self.server_port = self.server_port.or(parse_port(value)),
            "management.server.port" => {
                self.management_port = self.management_port.or(parse_port(value))
            }
            "management.endpoints.web.base-path" => {
                if self.management_base_path.is_none() {
                    self.management_base_path = Some(normalize_path(value));
                }
            }
            "server.servlet.context-path" | "server.servlet.contextPath" => {
                if self.context_path.is_none() {
                    self.context_path = Some(normalize_path(value));
                }
            }
            _ => {}
        }
    }

    /// Ports in listening order: the server port, then a distinct management port.
    pub fn ports(&self, default_port: u16) -> Vec<u16> {
        let server = self.server_port.unwrap_or(default_port);
        let mut ports = vec![server];
        if let Some(management) = self.management_port {
            if management != server {
                ports.push(management);
            }
        }
        ports
    }

    /// The separate management port actuator listens on, if it differs from the server
    /// port.
    pub fn health_port(&self, default_port: u16) -> Option<u16> {
        let server = self.server_port.unwrap_or(default_port);
        self.management_port.filter(|m| *m != server)
    }

    /// Actuator health path. The servlet context path only prefixes it when actuator
    /// shares the server port.
    pub fn health_endpoint(&self) -> String {
        let base = self
            .management_base_path
            .as_deref()
            .unwrap_or(DEFAULT_ACTUATOR_BASE_PATH);
        let base = if base == "/" { "" } else { base };

        let context = match (self.management_port, self.server_port) {
            (Some(m), s) if Some(m) != s => "",
            _ => self
                .context_path
                .as_deref()
                .filter(|c| *c != "/")
                .unwrap_or(""),
        };

        format!("{}{}/health", context, base)
    }
}

/// Reads all Spring config files of a module. Properties take precedence over YAML.
pub fn load(source: &FactSource<'_>, module_dir: &Path) -> Result<RuntimeConfig, FactsError> {
    let mut config = RuntimeConfig::default();

    for file in CONFIG_FILES {
        let Some(content) = source.read(&module_dir.join(file))? else {
            continue;
        };

        let parsed = if file.ends_with(".properties") {
            parse_properties(&content)
        } else {
            parse_yaml(&content)
        };
        config.merge(parsed);
    }

    Ok(config)
}

pub fn parse_properties(content: &str) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let split = line
            .find(['=', ':'])
            .map(|idx| (&line[..idx], &line[idx + 1..]));
        if let Some((key, value)) = split {
            config.apply(key.trim(), value);
        }
    }

    config
}

/// Parses every YAML document that is not bound to a profile; earlier documents win.
pub fn parse_yaml(content: &str) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    for document in serde_yaml::Deserializer::from_str(content) {
        let Ok(value) = serde_yaml::Value::deserialize(document) else {
            continue;
        };

        let mut flat = BTreeMap::new();
        flatten("", &value, &mut flat);

        let profile_bound = flat.keys().any(|k| {
            k == "spring.config.activate.on-profile" || k == "spring.profiles"
        });
        if profile_bound {
            continue;
        }

        for (key, value) in &flat {
            config.apply(key, value);
        }
    }

    config
}

fn flatten(prefix: &str, value: &serde_yaml::Value, out: &mut BTreeMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&full, v, out);
            }
        }
        serde_yaml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_yaml::Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        serde_yaml::Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        _ => {}
    }
}

/// Accepts `8081` and `${PORT:8081}`.
fn parse_port(value: &str) -> Option<u16> {
    if let Ok(port) = value.parse::<u16>() {
        return Some(port);
    }

    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .and_then(|inner| inner.split_once(':'))
        .and_then(|(_, default)| default.trim().parse::<u16>().ok())
}

fn normalize_path(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn extract_env_vars(value: &str, env_vars: &mut Vec<String>) {
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = after[..end].split(':').next().unwrap_or_default().trim();
        let is_env_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if is_env_name && !env_vars.iter().any(|v| v == name) {
            env_vars.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties() {
        let config = parse_properties(
            "# comment\nserver.port=9090\nmanagement.endpoints.web.base-path=/manage\nspring.datasource.url=${DATABASE_URL}\n",
        );
        assert_eq!(config.server_port, Some(9090));
        assert_eq!(config.management_base_path, Some("/manage".to_string()));
        assert_eq!(config.env_vars, vec!["DATABASE_URL".to_string()]);
        assert_eq!(config.health_endpoint(), "/manage/health");
    }

    #[test]
    fn test_placeholder_port_default() {
        let config = parse_properties("server.port=${PORT:8081}\n");
        assert_eq!(config.server_port, Some(8081));
        assert_eq!(config.env_vars, vec!["PORT".to_string()]);
    }

    #[test]
    fn test_parse_yaml_nested_and_dotted() {
        let yaml = r#"
server:
  port: 8085
  servlet:
    context-path: /api
management.endpoints.web.base-path: /ops
"#;
        let config = parse_yaml(yaml);
        assert_eq!(config.server_port, Some(8085));
        assert_eq!(config.context_path, Some("/api".to_string()));
        assert_eq!(config.health_endpoint(), "/api/ops/health");
        assert_eq!(config.ports(8080), vec![8085]);
    }

    #[test]
    fn test_yaml_profile_documents_are_skipped() {
        let yaml = r#"
server:
  port: 8080
---
spring:
  config:
    activate:
      on-profile: prod
server:
  port: 80
"#;
        assert_eq!(parse_yaml(yaml).server_port, Some(8080));
    }

    #[test]
    fn test_management_port_drops_context_path() {
        let config = parse_properties(
            "server.port=8080\nserver.servlet.context-path=/app\nmanagement.server.port=9001\n",
        );
        assert_eq!(config.ports(8080), vec![8080, 9001]);
        assert_eq!(config.health_port(8080), Some(9001));
        assert_eq!(config.health_endpoint(), "/actuator/health");
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.ports(8080), vec![8080]);
        assert_eq!(config.health_endpoint(), "/actuator/health");
    }

    #[test]
    fn test_malformed_yaml_is_ignored() {
        assert_eq!(parse_yaml("server: [port"), RuntimeConfig::default());
    }
}
