//! Spring Boot signals for Maven POMs and Gradle build scripts

use super::is_literal_version;
use regex::Regex;
use roxmltree::{Document, Node};
use std::sync::OnceLock;

pub const SPRING_BOOT_GROUP: &str = "org.springframework.boot";
pub const PARENT_ARTIFACT: &str = "spring-boot-starter-parent";
pub const BOM_ARTIFACT: &str = "spring-boot-dependencies";
pub const MAVEN_PLUGIN_ARTIFACT: &str = "spring-boot-maven-plugin";
pub const GRADLE_PLUGIN_ID: &str = "org.springframework.boot";
pub const VERSION_PROPERTY: &str = "spring-boot.version";

/// Starter artifacts that mark an application (as opposed to a library) build.
pub const STARTER_ARTIFACTS: &[&str] = &[
    "spring-boot-starter",
    "spring-boot-starter-web",
    "spring-boot-starter-webflux",
    "spring-boot-starter-actuator",
    "spring-boot-starter-data-jpa",
    "spring-boot-starter-data-mongodb",
    "spring-boot-starter-data-redis",
    "spring-boot-starter-security",
    "spring-boot-starter-thymeleaf",
    "spring-boot-starter-validation",
    "spring-boot-starter-jdbc",
    "spring-boot-starter-amqp",
    "spring-boot-starter-oauth2-resource-server",
];

/// Annotations that mark the application entry point in Java/Kotlin sources.
pub const FRAMEWORK_ANNOTATIONS: &[&str] = &["@SpringBootApplication", "@EnableAutoConfiguration"];

/// Runtime config files, relative to the module directory.
pub const RUNTIME_CONFIG_PATHS: &[&str] = &[
    "src/main/resources/application.properties",
    "src/main/resources/application.yml",
    "src/main/resources/application.yaml",
];

/// Source roots scanned for framework annotations, relative to the module directory.
pub const SOURCE_ROOTS: &[&str] = &["src/main/java", "src/main/kotlin"];

/// Maven coordinates as they appear in a POM element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coordinates {
    pub group_id: Option<String>,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub kind: Option<String>,
}

/// A parsed `pom.xml`.
pub struct Pom<'a> {
    doc: Document<'a>,
}

impl<'a> Pom<'a> {
    pub fn parse(content: &'a str) -> Result<Self, roxmltree::Error> {
        Ok(Self {
            doc: Document::parse(content)?,
        })
    }

    fn project(&self) -> Node<'_, 'a> {
        self.doc.root_element()
    }

    pub fn parent(&self) -> Option<Coordinates> {
        child(self.project(), "parent").map(coordinates)
    }

    pub fn dependencies(&self) -> Vec<Coordinates> {
        child(self.project(), "dependencies")
            .map(|deps| children(deps, "dependency").map(coordinates).collect())
            .unwrap_or_default()
    }

    pub fn managed_dependencies(&self) -> Vec<Coordinates> {
        child(self.project(), "dependencyManagement")
            .and_then(|dm| child(dm, "dependencies"))
            .map(|deps| children(deps, "dependency").map(coordinates).collect())
            .unwrap_or_default()
    }

    /// Plugins from `<build><plugins>` and `<build><pluginManagement><plugins>`.
    pub fn plugins(&self) -> Vec<Coordinates> {
        let Some(build) = child(self.project(), "build") else {
            return Vec::new();
        };

        let direct = child(build, "plugins");
        let managed = child(build, "pluginManagement").and_then(|pm| child(pm, "plugins"));

        direct
            .into_iter()
            .chain(managed)
            .flat_map(|plugins| children(plugins, "plugin").map(coordinates))
            .collect()
    }

    pub fn property(&self, name: &str) -> Option<String> {
        child(self.project(), "properties")
            .and_then(|props| child(props, name))
            .and_then(|node| node.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub fn packaging(&self) -> String {
        child_text(self.project(), "packaging").unwrap_or_else(|| "jar".to_string())
    }

    pub fn modules(&self) -> Vec<String> {
        child(self.project(), "modules")
            .map(|m| {
                children(m, "module")
                    .filter_map(|n| n.text())
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `<build><finalName>`, resolved against `<properties>`.
    pub fn final_name(&self) -> Option<String> {
        child(self.project(), "build")
            .and_then(|build| child_text(build, "finalName"))
            .and_then(|name| self.resolve(&name))
    }

    pub fn has_plugin(&self, artifact_id: &str) -> bool {
        self.plugins().iter().any(|p| p.artifact_id == artifact_id)
    }

    /// Resolves `${property}` references against `<properties>`.
    ///
    /// Returns `None` when the value still contains an unresolved reference.
    pub fn resolve(&self, value: &str) -> Option<String> {
        let value = value.trim();
        let resolved = match value
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(name) => self.property(name)?,
            None => value.to_string(),
        };

        if resolved.contains("${") {
            None
        } else {
            Some(resolved)
        }
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn coordinates(node: Node<'_, '_>) -> Coordinates {
    Coordinates {
        group_id: child_text(node, "groupId"),
        artifact_id: child_text(node, "artifactId").unwrap_or_default(),
        version: child_text(node, "version"),
        scope: child_text(node, "scope"),
        kind: child_text(node, "type"),
    }
}

fn is_spring_group(coords: &Coordinates) -> bool {
    coords
        .group_id
        .as_deref()
        .map(|g| g == SPRING_BOOT_GROUP)
        .unwrap_or(true)
}

fn literal(version: Option<String>) -> Option<String> {
    version.filter(|v| is_literal_version(v))
}

// ---------------------------------------------------------------------------
// Maven
// ---------------------------------------------------------------------------

pub fn has_parent_declaration(pom: &str) -> bool {
    Pom::parse(pom)
        .ok()
        .and_then(|p| p.parent())
        .map(|parent| is_spring_group(&parent) && parent.artifact_id == PARENT_ARTIFACT)
        .unwrap_or(false)
}

pub fn has_starter_dependency(pom: &str) -> bool {
    Pom::parse(pom)
        .map(|p| {
            p.dependencies()
                .iter()
                .any(|d| STARTER_ARTIFACTS.contains(&d.artifact_id.as_str()))
        })
        .unwrap_or(false)
}

pub fn has_plugin_declaration(pom: &str) -> bool {
    Pom::parse(pom)
        .map(|p| {
            p.plugins()
                .iter()
                .any(|plugin| plugin.artifact_id == MAVEN_PLUGIN_ARTIFACT)
        })
        .unwrap_or(false)
}

pub fn has_maven_dependency(pom: &str, artifact_id: &str) -> bool {
    Pom::parse(pom)
        .map(|p| p.dependencies().iter().any(|d| d.artifact_id == artifact_id))
        .unwrap_or(false)
}

/// Version declared directly: the Spring Boot parent, or the `spring-boot.version` property.
pub fn maven_declared_version(pom: &str) -> Option<String> {
    let pom = Pom::parse(pom).ok()?;

    if let Some(parent) = pom.parent() {
        if is_spring_group(&parent) && parent.artifact_id == PARENT_ARTIFACT {
            if let Some(version) = parent.version.as_deref().and_then(|v| pom.resolve(v)) {
                return literal(Some(version));
            }
        }
    }

    literal(pom.property(VERSION_PROPERTY))
}

/// Version of an imported `spring-boot-dependencies` BOM.
pub fn maven_managed_version(pom: &str) -> Option<String> {
    let pom = Pom::parse(pom).ok()?;
    pom.managed_dependencies()
        .into_iter()
        .filter(|d| d.artifact_id == BOM_ARTIFACT)
        .find_map(|d| literal(d.version.as_deref().and_then(|v| pom.resolve(v))))
}

pub fn maven_plugin_version(pom: &str) -> Option<String> {
    let pom = Pom::parse(pom).ok()?;
    pom.plugins()
        .into_iter()
        .filter(|p| p.artifact_id == MAVEN_PLUGIN_ARTIFACT)
        .find_map(|p| literal(p.version.as_deref().and_then(|v| pom.resolve(v))))
}

/// First-match-wins version lookup within a single POM.
pub fn maven_version(pom: &str) -> Option<String> {
    maven_declared_version(pom)
        .or_else(|| maven_managed_version(pom))
        .or_else(|| maven_plugin_version(pom))
}

// ---------------------------------------------------------------------------
// Gradle
// ---------------------------------------------------------------------------

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn gradle_plugin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?x)
        id\s*\(?\s*["']org\.springframework\.boot["']
        | apply\s*\(?\s*plugin\s*[:=]\s*["']org\.springframework\.boot["']
        | alias\s*\(\s*libs\.plugins\.spring[._-]?boot\s*\)
        "#,
    )
}

fn gradle_plugin_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"id\s*\(?\s*["']org\.springframework\.boot["']\s*\)?\s*version\s*\(?\s*["']([^"']+)["']"#,
    )
}

fn apply_false_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bapply\s*\(?\s*false\b")
}

/// Whether the rest of the line after `end` holds `apply false`, i.e. the plugin is only
/// put on the classpath for subprojects.
fn is_unapplied(script: &str, end: usize) -> bool {
    let rest = &script[end..];
    let line = rest.split('\n').next().unwrap_or_default();
    apply_false_re().is_match(line)
}

fn gradle_starter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"["']org\.springframework\.boot:(spring-boot-starter[\w-]*)"#)
}

fn gradle_bom_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?:platform|mavenBom|enforcedPlatform)\s*\(?\s*["']org\.springframework\.boot:spring-boot-dependencies(?::([^"']+))?["']"#,
    )
}

fn gradle_version_property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"\b(?:springBootVersion|spring_boot_version)["']?\s*[=,:]\s*["']?([0-9][^"'\s)]*)"#,
    )
}

fn gradle_classpath_plugin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"org\.springframework\.boot:spring-boot-gradle-plugin:([^"'\s)]+)"#,
    )
}

/// The Boot plugin applied to this project. `apply false` declarations in a root script
/// do not count.
pub fn has_gradle_plugin_declaration(script: &str) -> bool {
    gradle_plugin_re()
        .find_iter(script)
        .any(|m| !is_unapplied(script, m.end()))
}

pub fn has_gradle_starter_dependency(script: &str) -> bool {
    gradle_starter_re()
        .captures_iter(script)
        .any(|c| STARTER_ARTIFACTS.contains(&&c[1]))
}

/// Gradle has no `<parent>`; importing the Spring Boot BOM plays the same role.
pub fn has_gradle_bom_import(script: &str) -> bool {
    gradle_bom_re().is_match(script)
}

pub fn has_gradle_dependency(script: &str, artifact_id: &str) -> bool {
    script.contains(&format!("{}:{}", SPRING_BOOT_GROUP, artifact_id))
}

/// `id("org.springframework.boot") version "3.2.0"`, applied to this project.
pub fn gradle_declared_version(script: &str) -> Option<String> {
    plugin_version(script, false)
}

fn plugin_version(script: &str, include_unapplied: bool) -> Option<String> {
    gradle_plugin_version_re()
        .captures_iter(script)
        .filter(|c| include_unapplied || !is_unapplied(script, c.get(0).map_or(0, |m| m.end())))
        .find_map(|c| literal(Some(c[1].to_string())))
}

/// BOM coordinates with a version, or a `springBootVersion` variable.
pub fn gradle_managed_version(script: &str) -> Option<String> {
    gradle_bom_re()
        .captures_iter(script)
        .find_map(|c| literal(c.get(1).map(|m| m.as_str().to_string())))
        .or_else(|| {
            literal(
                gradle_version_property_re()
                    .captures(script)
                    .map(|c| c[1].to_string()),
            )
        })
}

/// `classpath("org.springframework.boot:spring-boot-gradle-plugin:2.7.18")`
pub fn gradle_plugin_version(script: &str) -> Option<String> {
    literal(
        gradle_classpath_plugin_re()
            .captures(script)
            .map(|c| c[1].to_string()),
    )
}

fn gradle_catalog_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?m)^\s*["']?spring[-_.]?[bB]oot(?:[-_.]?[vV]ersion)?["']?\s*=\s*["']([^"']+)["']"#,
    )
}

/// `spring-boot = "3.2.0"` in the `[versions]` table of `gradle/libs.versions.toml`.
pub fn gradle_catalog_version(catalog: &str) -> Option<String> {
    literal(gradle_catalog_re().captures(catalog).map(|c| c[1].to_string()))
}

/// First-match-wins version lookup within a single build script or `gradle.properties`.
pub fn gradle_version(script: &str) -> Option<String> {
    gradle_declared_version(script)
        .or_else(|| gradle_managed_version(script))
        .or_else(|| gradle_plugin_version(script))
}

/// Version a subproject inherits from an ancestor build script. Unlike
/// [`gradle_version`], an `apply false` plugin declaration still pins the version.
pub fn gradle_inherited_version(script: &str) -> Option<String> {
    plugin_version(script, true)
        .or_else(|| gradle_managed_version(script))
        .or_else(|| gradle_plugin_version(script))
}

// ---------------------------------------------------------------------------
// Sources and config
// ---------------------------------------------------------------------------

pub fn has_framework_annotation(source: &str) -> bool {
    FRAMEWORK_ANNOTATIONS.iter().any(|a| source.contains(a))
}

pub fn is_jvm_source(file_name: &str) -> bool {
    file_name.ends_with(".java") || file_name.ends_with(".kt")
}
