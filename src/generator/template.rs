use super::{fixes, GenerationError, Generator};
use crate::facts::Facts;
use crate::stack::{BuildToolId, StackId};
use async_trait::async_trait;
use tracing::debug;

/// Renders fixed multi-stage Dockerfiles per stack and repairs them with rule-based fixes.
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn render(facts: &Facts) -> Result<String, GenerationError> {
        match (&facts.stack_type, &facts.build_tool) {
            (StackId::SpringBoot, BuildToolId::Maven) => {
                Ok(jvm(facts, &format!("maven:3.9-eclipse-temurin-{}", facts.language_version)))
            }
            (StackId::SpringBoot, BuildToolId::Gradle) => {
                Ok(jvm(facts, &format!("gradle:8-jdk{}", facts.language_version)))
            }
            (StackId::React, tool) if tool.is_node() => Ok(react(facts)),
            (StackId::Node, tool) if tool.is_node() => Ok(node_server(facts)),
            (stack, tool) => Err(GenerationError::UnsupportedStack(format!(
                "{} with {}",
                stack, tool
            ))),
        }
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for TemplateGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, facts: &Facts) -> Result<String, GenerationError> {
        Self::render(facts)
    }

    async fn fix(&self, build_file: &str, build_error: &str) -> Result<String, GenerationError> {
        let (rule, fixed) = fixes::apply_first(build_file, build_error).ok_or(GenerationError::NoFix)?;
        debug!(rule, "Applied template fix");
        Ok(fixed)
    }
}

fn expose(lines: &mut Vec<String>, ports: &[u16]) {
    if !ports.is_empty() {
        let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
        lines.push(format!("EXPOSE {}", ports.join(" ")));
    }
}

fn build_stage(lines: &mut Vec<String>, image: &str, command: &str) {
    lines.push("# syntax=docker/dockerfile:1".to_string());
    lines.push(format!("FROM {} AS build", image));
    lines.push("WORKDIR /workspace".to_string());
    lines.push("COPY . .".to_string());
    lines.push(format!("RUN {}", command));
}

fn jvm(facts: &Facts, build_image: &str) -> String {
    let extension = if facts.artifact.ends_with(".war") { "war" } else { "jar" };
    let mut lines = Vec::new();

    build_stage(&mut lines, build_image, &facts.build_command);
    lines.push(format!(
        "RUN mkdir -p /out && cp \"$(ls {} | grep -v -- '-plain' | head -n 1)\" /out/app.{}",
        facts.artifact, extension
    ));
    lines.push(String::new());
    lines.push(format!("FROM eclipse-temurin:{}-jre", facts.language_version));
    lines.push("WORKDIR /app".to_string());
    lines.push(format!("COPY --from=build /out/app.{0} /app/app.{0}", extension));
    expose(&mut lines, &facts.ports);
    lines.push(format!(
        "ENTRYPOINT [\"java\", \"-jar\", \"/app/app.{}\"]",
        extension
    ));

    lines.join("\n") + "\n"
}

fn react(facts: &Facts) -> String {
    let port = facts.primary_port().unwrap_or(3000);
    let mut lines = Vec::new();

    build_stage(
        &mut lines,
        &format!("node:{}-slim", facts.language_version),
        &facts.build_command,
    );
    lines.push(String::new());
    lines.push("FROM nginx:alpine".to_string());
    lines.push(format!(
        "COPY --from=build /workspace/{} /usr/share/nginx/html",
        facts.artifact
    ));
    lines.push(format!(
        "RUN sed -i 's/listen\\(\\s*\\)80;/listen\\1{};/' /etc/nginx/conf.d/default.conf",
        port
    ));
    expose(&mut lines, &facts.ports);
    lines.push("CMD [\"nginx\", \"-g\", \"daemon off;\"]".to_string());

    lines.join("\n") + "\n"
}

fn node_server(facts: &Facts) -> String {
    let port = facts.primary_port().unwrap_or(3000);
    let image = format!("node:{}-slim", facts.language_version);
    let start = facts.metadata("start_command").unwrap_or("node index.js");
    let mut lines = Vec::new();

    build_stage(&mut lines, &image, &facts.build_command);
    lines.push(String::new());
    lines.push(format!("FROM {}", image));
    if facts.build_tool == BuildToolId::Pnpm {
        lines.push("RUN corepack enable".to_string());
    }
    lines.push(format!("ENV NODE_ENV=production PORT={}", port));
    lines.push("WORKDIR /app".to_string());
    let source = if facts.artifact == "." {
        "/workspace".to_string()
    } else {
        format!("/workspace/{}", facts.artifact)
    };
    lines.push(format!("COPY --from=build {} /app", source));
    expose(&mut lines, &facts.ports);
    lines.push(format!("CMD [\"sh\", \"-c\", \"{}\"]", start.replace('"', "\\\"")));

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn facts(stack: StackId, tool: BuildToolId, command: &str, artifact: &str, version: &str) -> Facts {
        Facts {
            stack_type: stack,
            build_tool: tool,
            build_command: command.to_string(),
            artifact: artifact.to_string(),
            ports: vec![8080],
            health_endpoint: None,
            language_version: version.to_string(),
            framework_version: None,
            module_path: PathBuf::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_maven_template() {
        let facts = facts(
            StackId::SpringBoot,
            BuildToolId::Maven,
            "./mvnw -B -DskipTests package",
            "target/*.jar",
            "17",
        );
        let text = TemplateGenerator::new().generate(&facts).await.unwrap();

        assert!(text.contains("FROM maven:3.9-eclipse-temurin-17 AS build"));
        assert!(text.contains("RUN ./mvnw -B -DskipTests package"));
        assert!(text.contains("FROM eclipse-temurin:17-jre"));
        assert!(text.contains("EXPOSE 8080"));
        assert!(text.contains("ENTRYPOINT [\"java\", \"-jar\", \"/app/app.jar\"]"));
    }

    #[tokio::test]
    async fn test_gradle_war_template() {
        let facts = facts(
            StackId::SpringBoot,
            BuildToolId::Gradle,
            "gradle bootWar -x test --no-daemon",
            "build/libs/*.war",
            "21",
        );
        let text = TemplateGenerator::new().generate(&facts).await.unwrap();

        assert!(text.contains("FROM gradle:8-jdk21 AS build"));
        assert!(text.contains("/out/app.war"));
    }

    #[tokio::test]
    async fn test_react_template() {
        let mut facts = facts(
            StackId::React,
            BuildToolId::Yarn,
            "yarn install --frozen-lockfile && yarn build",
            "dist",
            "20",
        );
        facts.ports = vec![3000];
        let text = TemplateGenerator::new().generate(&facts).await.unwrap();

        assert!(text.contains("FROM node:20-slim AS build"));
        assert!(text.contains("COPY --from=build /workspace/dist /usr/share/nginx/html"));
        assert!(text.contains("listen\\13000;"));
        assert!(text.contains("EXPOSE 3000"));
    }

    #[tokio::test]
    async fn test_node_server_template() {
        let mut facts = facts(
            StackId::Node,
            BuildToolId::Pnpm,
            "corepack enable && pnpm install --frozen-lockfile",
            ".",
            "20",
        );
        facts.ports = vec![4000];
        facts
            .metadata
            .insert("start_command".to_string(), "pnpm start".to_string());
        let text = TemplateGenerator::new().generate(&facts).await.unwrap();

        assert!(text.contains("RUN corepack enable"));
        assert!(text.contains("ENV NODE_ENV=production PORT=4000"));
        assert!(text.contains("COPY --from=build /workspace /app"));
        assert!(text.contains("CMD [\"sh\", \"-c\", \"pnpm start\"]"));
    }

    #[tokio::test]
    async fn test_mismatched_stack_is_unsupported() {
        let facts = facts(StackId::React, BuildToolId::Maven, "mvn package", "target/*.jar", "21");
        assert!(matches!(
            TemplateGenerator::new().generate(&facts).await,
            Err(GenerationError::UnsupportedStack(_))
        ));
    }

    #[tokio::test]
    async fn test_fix_without_known_signature() {
        let result = TemplateGenerator::new()
            .fix("FROM alpine\n", "segmentation fault")
            .await;
        assert!(matches!(result, Err(GenerationError::NoFix)));
    }
}
