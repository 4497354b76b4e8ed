//! Maven build facts

use super::runtime_config::{self, ACTUATOR_ARTIFACT};
use super::{
    jdk_from_dirs, module_relative, normalize_java_version, stack_default_port, to_slash,
    FactSource, Facts, FactsError, DEFAULT_JDK_VERSION,
};
use crate::stack::detector::PREFERRED_MODULE_DIRS;
use crate::stack::signals::jvm::{self as signals, Pom};
use crate::stack::StackInfo;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const WRAPPER: &str = "mvnw";
const CYCLONEDX_PLUGIN: &str = "cyclonedx-maven-plugin";
const JDK_PROPERTIES: &[&str] = &["java.version", "maven.compiler.release", "maven.compiler.source"];
const MAX_AGGREGATOR_DEPTH: usize = 3;

/// How the module to build was reached.
enum ModuleSelection {
    /// The detected manifest itself.
    Manifest(PathBuf),
    /// A Spring Boot module found below a detected aggregator POM.
    Aggregated { aggregator: PathBuf, module: PathBuf },
}

impl ModuleSelection {
    fn module_dir(&self) -> &Path {
        match self {
            ModuleSelection::Manifest(dir) => dir,
            ModuleSelection::Aggregated { module, .. } => module,
        }
    }
}

pub fn extract(source: &FactSource<'_>, info: &StackInfo) -> Result<Facts, FactsError> {
    let detected_dir = info.module_dir();
    let root_pom = source.read(&detected_dir.join("pom.xml"))?.unwrap_or_default();

    let selection = select_module(source, &detected_dir, &root_pom, 0)?;
    let module_dir = selection.module_dir().to_path_buf();
    let module_pom = if module_dir == detected_dir {
        root_pom.clone()
    } else {
        source.read(&module_dir.join("pom.xml"))?.unwrap_or_default()
    };

    let parsed = Pom::parse(&module_pom).ok();

    let packaging = parsed
        .as_ref()
        .map(|p| p.packaging())
        .filter(|p| p == "war")
        .unwrap_or_else(|| "jar".to_string());

    let artifact_name = parsed
        .as_ref()
        .and_then(|p| p.final_name())
        .map(|name| format!("{}.{}", name, packaging))
        .unwrap_or_else(|| format!("*.{}", packaging));
    let artifact = module_relative(&module_dir, &format!("target/{}", artifact_name));

    let language_version = jdk_version(source, &module_pom, &root_pom, &module_dir, &detected_dir)?;

    let has_wrapper = source.is_file(Path::new(WRAPPER));
    let build_command = build_command(has_wrapper, &selection);

    let runtime = runtime_config::load(source, &module_dir)?;
    let has_actuator = signals::has_maven_dependency(&module_pom, ACTUATOR_ARTIFACT);
    let ports = runtime.ports(stack_default_port(info));
    let health_endpoint = has_actuator.then(|| runtime.health_endpoint());

    let mut metadata = BTreeMap::new();
    metadata.insert("packaging".to_string(), packaging);
    metadata.insert("wrapper".to_string(), has_wrapper.to_string());
    if parsed.as_ref().map(|p| p.has_plugin(CYCLONEDX_PLUGIN)).unwrap_or(false) {
        metadata.insert(
            "sbom_path".to_string(),
            module_relative(&module_dir, "target/bom.json"),
        );
    }
    if let Some(port) = runtime.health_port(stack_default_port(info)).filter(|_| has_actuator) {
        metadata.insert("health_port".to_string(), port.to_string());
    }
    if !runtime.env_vars.is_empty() {
        metadata.insert("env_vars".to_string(), runtime.env_vars.join(","));
    }
    if let ModuleSelection::Aggregated { aggregator, .. } = &selection {
        metadata.insert(
            "aggregator".to_string(),
            module_relative(aggregator, "pom.xml"),
        );
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

fn build_command(has_wrapper: bool, selection: &ModuleSelection) -> String {
    let mvn = if has_wrapper { "./mvnw" } else { "mvn" };
    let base = format!("{} -B -DskipTests package", mvn);

    match selection {
        ModuleSelection::Manifest(dir) if dir.as_os_str().is_empty() => base,
        ModuleSelection::Manifest(dir) => format!("{} -f {}/pom.xml", base, to_slash(dir)),
        ModuleSelection::Aggregated { aggregator, module } => {
            let relative = module.strip_prefix(aggregator).unwrap_or(module);
            let mut command = format!("{} -pl {} -am", base, to_slash(relative));
            if !aggregator.as_os_str().is_empty() {
                command.push_str(&format!(" -f {}/pom.xml", to_slash(aggregator)));
            }
            command
        }
    }
}

/// Resolves an aggregator POM (packaging `pom` with `<modules>`) to the module that
/// actually builds the Spring Boot application.
fn select_module(
    source: &FactSource<'_>,
    dir: &Path,
    pom: &str,
    depth: usize,
) -> Result<ModuleSelection, FactsError> {
    let manifest = ModuleSelection::Manifest(dir.to_path_buf());

    let Ok(parsed) = Pom::parse(pom) else {
        return Ok(manifest);
    };
    if parsed.packaging() != "pom" || depth >= MAX_AGGREGATOR_DEPTH {
        return Ok(manifest);
    }

    let mut modules = parsed.modules();
    modules.sort_by_key(|m| {
        let name = Path::new(m).file_name().and_then(|n| n.to_str()).unwrap_or_default();
        !PREFERRED_MODULE_DIRS.contains(&name)
    });

    for module in modules {
        let module_dir = dir.join(&module);
        let Some(module_pom) = source.read(&module_dir.join("pom.xml"))? else {
            continue;
        };

        if is_boot_application(&module_pom) {
            return Ok(ModuleSelection::Aggregated {
                aggregator: dir.to_path_buf(),
                module: module_dir,
            });
        }

        if let ModuleSelection::Aggregated { module, .. } =
            select_module(source, &module_dir, &module_pom, depth + 1)?
        {
            return Ok(ModuleSelection::Aggregated {
                aggregator: dir.to_path_buf(),
                module,
            });
        }
    }

    Ok(manifest)
}

/// A module that repackages an executable: the Boot plugin, or a starter in a non-pom module.
fn is_boot_application(pom: &str) -> bool {
    let packaging = Pom::parse(pom).map(|p| p.packaging()).unwrap_or_default();
    signals::has_plugin_declaration(pom)
        || (packaging != "pom" && signals::has_starter_dependency(pom))
}

fn jdk_version(
    source: &FactSource<'_>,
    module_pom: &str,
    root_pom: &str,
    module_dir: &Path,
    detected_dir: &Path,
) -> Result<String, FactsError> {
    let from_pom = |content: &str| {
        let pom = Pom::parse(content).ok()?;
        JDK_PROPERTIES
            .iter()
            .find_map(|prop| pom.property(prop).and_then(|v| normalize_java_version(&v)))
    };

    if let Some(version) = from_pom(module_pom).or_else(|| from_pom(root_pom)) {
        return Ok(version);
    }

    // Parent POMs, nearest first. The detected POM has already been checked.
    for dir in module_dir.ancestors().skip(1).filter(|d| *d != detected_dir) {
        if let Some(version) = source.read(&dir.join("pom.xml"))?.and_then(|pom| from_pom(&pom)) {
            return Ok(version);
        }
    }

    let root = Path::new("");
    let dirs = [module_dir, detected_dir, root];
    Ok(jdk_from_dirs(source, &dirs)?.unwrap_or_else(|| DEFAULT_JDK_VERSION.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::extract_facts;
    use crate::fs::MockFileSystem;
    use crate::stack::{BuildToolId, StackId};

    fn maven_info(manifest: &str) -> StackInfo {
        StackInfo::new(StackId::SpringBoot, BuildToolId::Maven, PathBuf::from(manifest), 1.0)
    }

    const APP_POM: &str = r#"<project>
  <parent>
    <groupId>org.springframework.boot</groupId>
    <artifactId>spring-boot-starter-parent</artifactId>
    <version>3.2.1</version>
  </parent>
  <properties><java.version>17</java.version></properties>
  <dependencies>
    <dependency><artifactId>spring-boot-starter-web</artifactId></dependency>
    <dependency><artifactId>spring-boot-starter-actuator</artifactId></dependency>
  </dependencies>
  <build><plugins>
    <plugin><artifactId>spring-boot-maven-plugin</artifactId></plugin>
    <plugin><groupId>org.cyclonedx</groupId><artifactId>cyclonedx-maven-plugin</artifactId></plugin>
  </plugins></build>
</project>"#;

    #[test]
    fn test_root_module_with_wrapper() {
        let fs = MockFileSystem::new();
        fs.add_file("pom.xml", APP_POM);
        fs.add_file("mvnw", "#!/bin/sh");
        fs.add_file("src/main/resources/application.properties", "server.port=8181\n");

        let facts = extract_facts(&fs, Path::new("/mock"), &maven_info("pom.xml")).unwrap();
        assert_eq!(facts.build_command, "./mvnw -B -DskipTests package");
        assert_eq!(facts.artifact, "target/*.jar");
        assert_eq!(facts.language_version, "17");
        assert_eq!(facts.ports, vec![8181]);
        assert_eq!(facts.health_endpoint, Some("/actuator/health".to_string()));
        assert_eq!(facts.metadata("sbom_path"), Some("target/bom.json"));
        assert_eq!(facts.metadata("packaging"), Some("jar"));
    }

    #[test]
    fn test_nested_manifest_uses_file_flag() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "backend/pom.xml",
            "<project><packaging>war</packaging><dependencies><dependency><artifactId>spring-boot-starter-web</artifactId></dependency></dependencies></project>",
        );

        let facts =
            extract_facts(&fs, Path::new("/mock"), &maven_info("backend/pom.xml")).unwrap();
        assert_eq!(facts.build_command, "mvn -B -DskipTests package -f backend/pom.xml");
        assert_eq!(facts.artifact, "backend/target/*.war");
        assert_eq!(facts.language_version, "21");
        assert_eq!(facts.health_endpoint, None);
        assert_eq!(facts.ports, vec![8080]);
    }

    #[test]
    fn test_aggregator_resolves_boot_module() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "pom.xml",
            r#"<project>
  <parent>
    <groupId>org.springframework.boot</groupId>
    <artifactId>spring-boot-starter-parent</artifactId>
    <version>3.2.1</version>
  </parent>
  <packaging>pom</packaging>
  <modules><module>common</module><module>service</module></modules>
  <properties><maven.compiler.release>21</maven.compiler.release></properties>
</project>"#,
        );
        fs.add_file("common/pom.xml", "<project><artifactId>common</artifactId></project>");
        fs.add_file(
            "service/pom.xml",
            r#"<project>
  <build>
    <finalName>service</finalName>
    <plugins><plugin><artifactId>spring-boot-maven-plugin</artifactId></plugin></plugins>
  </build>
</project>"#,
        );

        let facts = extract_facts(&fs, Path::new("/mock"), &maven_info("pom.xml")).unwrap();
        assert_eq!(facts.module_path, PathBuf::from("service"));
        assert_eq!(facts.artifact, "service/target/service.jar");
        assert_eq!(facts.build_command, "mvn -B -DskipTests package -pl service -am");
        assert_eq!(facts.language_version, "21");
        assert_eq!(facts.metadata("aggregator"), Some("pom.xml"));
    }

    #[test]
    fn test_aggregator_prefers_app_module() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "pom.xml",
            "<project><packaging>pom</packaging><modules><module>worker</module><module>app</module></modules></project>",
        );
        let boot = "<project><build><plugins><plugin><artifactId>spring-boot-maven-plugin</artifactId></plugin></plugins></build></project>";
        fs.add_file("worker/pom.xml", boot);
        fs.add_file("app/pom.xml", boot);

        let facts = extract_facts(&fs, Path::new("/mock"), &maven_info("pom.xml")).unwrap();
        assert_eq!(facts.module_path, PathBuf::from("app"));
    }

    #[test]
    fn test_jdk_version_from_parent_pom() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "pom.xml",
            "<project><packaging>pom</packaging><modules><module>app</module></modules><properties><java.version>17</java.version></properties></project>",
        );
        fs.add_file(
            "app/pom.xml",
            "<project><dependencies><dependency><artifactId>spring-boot-starter-web</artifactId></dependency></dependencies></project>",
        );
        fs.add_file(".java-version", "11\n");

        let facts = extract_facts(&fs, Path::new("/mock"), &maven_info("app/pom.xml")).unwrap();
        assert_eq!(facts.module_path, PathBuf::from("app"));
        assert_eq!(facts.language_version, "17");
    }

    #[test]
    fn test_management_port_recorded_for_health_probe() {
        let fs = MockFileSystem::new();
        fs.add_file("pom.xml", APP_POM);
        fs.add_file(
            "src/main/resources/application.properties",
            "server.port=8080\nmanagement.server.port=9001\n",
        );

        let facts = extract_facts(&fs, Path::new("/mock"), &maven_info("pom.xml")).unwrap();
        assert_eq!(facts.ports, vec![8080, 9001]);
        assert_eq!(facts.health_port(), Some(9001));
        assert_eq!(facts.metadata("health_port"), Some("9001"));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let fs = MockFileSystem::new();
        fs.add_file("pom.xml", APP_POM);
        let info = maven_info("pom.xml");

        let first = extract_facts(&fs, Path::new("/mock"), &info).unwrap();
        let second = extract_facts(&fs, Path::new("/mock"), &info).unwrap();
        assert_eq!(first, second);
    }
}
