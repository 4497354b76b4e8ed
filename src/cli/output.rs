//! Output formatting for `--detect-only`
//!
//! The same report renders as JSON, YAML or a human-readable summary.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::facts::Facts;
use crate::stack::StackInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable summary
    Human,
}

/// What detection and fact extraction found.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub stack: StackInfo,
    pub facts: Facts,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, report: &DetectionReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize detection report to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(report)
                .context("Failed to serialize detection report to YAML"),
            OutputFormat::Human => Ok(self.format_human(report)),
        }
    }

    fn format_human(&self, report: &DetectionReport) -> String {
        let stack = &report.stack;
        let facts = &report.facts;
        let mut output = String::new();

        output.push_str("\u{2713} Stack Detection Result\n");
        output.push_str(&"\u{2501}".repeat(42));
        output.push_str("\n\n");

        output.push_str(&format!("Stack:       {}\n", stack.name));
        output.push_str(&format!("Build Tool:  {}\n", stack.build_tool));
        output.push_str(&format!(
            "Version:     {}\n\n",
            stack.version.as_deref().unwrap_or("(unknown)")
        ));

        output.push_str("Build Information:\n");
        output.push_str(&format!("\u{251C}\u{2500} Command:   {}\n", facts.build_command));
        output.push_str(&format!("\u{251C}\u{2500} Artifact:  {}\n", facts.artifact));
        output.push_str(&format!(
            "\u{2514}\u{2500} Runtime:   {} {}\n\n",
            runtime_label(facts),
            facts.language_version
        ));

        output.push_str("Runtime Information:\n");
        let ports: Vec<String> = facts.ports.iter().map(u16::to_string).collect();
        output.push_str(&format!("\u{251C}\u{2500} Ports:     {}\n", ports.join(", ")));
        output.push_str(&format!(
            "\u{2514}\u{2500} Health:    {}\n\n",
            facts.health_endpoint.as_deref().unwrap_or("(none)")
        ));

        if !facts.metadata.is_empty() {
            output.push_str("Metadata:\n");
            let last = facts.metadata.len() - 1;
            for (i, (key, value)) in facts.metadata.iter().enumerate() {
                let connector = if i == last { "\u{2514}" } else { "\u{251C}" };
                output.push_str(&format!("{}\u{2500} {}: {}\n", connector, key, value));
            }
            output.push('\n');
        }

        let confidence = stack.confidence.clamp(0.0, 1.0);
        let filled = (confidence * 10.0).round() as usize;
        output.push_str(&format!(
            "Confidence: {}{} {}%\n",
            "\u{2588}".repeat(filled),
            "\u{2591}".repeat(10 - filled),
            (confidence * 100.0).round() as u8
        ));

        let files: Vec<String> = stack
            .detected_files
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        output.push_str(&format!("Evidence:   {}\n", files.join(", ")));

        output
    }
}

fn runtime_label(facts: &Facts) -> &'static str {
    if facts.build_tool.is_node() {
        "node"
    } else {
        "jdk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{BuildToolId, StackId};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn report() -> DetectionReport {
        let stack = StackInfo::new(
            StackId::SpringBoot,
            BuildToolId::Maven,
            PathBuf::from("pom.xml"),
            0.8,
        )
        .with_version(Some("3.2.1".to_string()));

        let mut metadata = BTreeMap::new();
        metadata.insert("packaging".to_string(), "jar".to_string());

        let facts = Facts {
            stack_type: StackId::SpringBoot,
            build_tool: BuildToolId::Maven,
            build_command: "mvn -B -DskipTests package".to_string(),
            artifact: "target/*.jar".to_string(),
            ports: vec![8080],
            health_endpoint: Some("/actuator/health".to_string()),
            language_version: "21".to_string(),
            framework_version: Some("3.2.1".to_string()),
            module_path: PathBuf::new(),
            metadata,
        };

        DetectionReport { stack, facts }
    }

    #[test]
    fn test_json_output() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format(&report())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["stack"]["confidence"], 0.8);
        assert_eq!(value["facts"]["artifact"], "target/*.jar");
        assert_eq!(value["facts"]["ports"][0], 8080);
    }

    #[test]
    fn test_yaml_output() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format(&report())
            .unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();

        assert_eq!(value["facts"]["build_command"].as_str(), Some("mvn -B -DskipTests package"));
    }

    #[test]
    fn test_human_output() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format(&report())
            .unwrap();

        assert!(output.contains("Build Tool:  maven"));
        assert!(output.contains("Health:    /actuator/health"));
        assert!(output.contains("packaging: jar"));
        assert!(output.contains("80%"));
        assert!(output.contains("Evidence:   pom.xml"));
    }
}
