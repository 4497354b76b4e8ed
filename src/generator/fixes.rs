//! Rule-based repairs for known build failure signatures

use regex::Regex;
use std::sync::OnceLock;

type Rule = fn(&str, &str) -> Option<String>;

const RULES: &[(&str, Rule)] = &[
    ("wrapper-permission", wrapper_permission),
    ("npm-ci-without-lockfile", npm_ci_without_lockfile),
    ("outdated-lockfile", outdated_lockfile),
    ("jdk-release", jdk_release),
    ("unknown-image-tag", unknown_image_tag),
    ("react-output-dir", react_output_dir),
];

/// Applies the first rule that matches the log and actually changes the text.
pub fn apply_first(build_file: &str, log: &str) -> Option<(&'static str, String)> {
    RULES.iter().find_map(|(name, rule)| {
        rule(build_file, log)
            .filter(|fixed| fixed != build_file)
            .map(|fixed| (*name, fixed))
    })
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn wrapper_permission(text: &str, log: &str) -> Option<String> {
    static LOG: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&LOG, r"\./(\S*(?:mvnw|gradlew)):? [Pp]ermission denied").captures(log)?;
    let wrapper = caps[1].to_string();

    let chmod = format!("RUN chmod +x {}", wrapper);
    if text.contains(&chmod) {
        return None;
    }

    insert_before_line(text, |line| {
        line.starts_with("RUN ") && line.contains(&format!("./{}", wrapper))
    }, &chmod)
}

fn npm_ci_without_lockfile(text: &str, log: &str) -> Option<String> {
    let signature = log.contains("npm ci` can only install")
        || log.contains("can only install packages when your package.json and package-lock.json")
        || (log.contains("npm ci") && log.contains("package-lock.json") && log.contains("ERR"));
    signature.then(|| text.replace("npm ci", "npm install"))
}

fn outdated_lockfile(text: &str, log: &str) -> Option<String> {
    let signature = log.contains("ERR_PNPM_OUTDATED_LOCKFILE")
        || log.contains("Your lockfile needs to be updated")
        || log.contains("The lockfile would have been modified");
    signature.then(|| text.replace(" --frozen-lockfile", ""))
}

/// The build requested a newer release than the build image's JDK provides.
fn jdk_release(text: &str, log: &str) -> Option<String> {
    static LOG: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &LOG,
        r"(?:release version (\d+) not supported|invalid target release: (\d+)|invalid source release: (\d+))",
    )
    .captures(log)?;
    let version = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?.as_str();
    Some(set_jdk(text, version))
}

/// A base image tag does not exist; fall back to the default language versions.
fn unknown_image_tag(text: &str, log: &str) -> Option<String> {
    if !(log.contains("manifest unknown") || log.contains("not found: manifest")) {
        return None;
    }

    static NODE: OnceLock<Regex> = OnceLock::new();
    let with_jdk = set_jdk(text, crate::facts::DEFAULT_JDK_VERSION);
    let fixed = regex(&NODE, r"(?m)^(FROM\s+node:)[\w.]+?(-slim|-alpine)?(\s|$)")
        .replace_all(&with_jdk, format!("${{1}}{}${{2}}${{3}}", crate::facts::DEFAULT_NODE_VERSION).as_str())
        .into_owned();
    Some(fixed)
}

fn react_output_dir(text: &str, log: &str) -> Option<String> {
    let copy_failed = log.contains("COPY --from=build")
        || log.contains("failed to compute cache key")
        || log.contains("not found");
    if !copy_failed || !text.contains("/usr/share/nginx/html") {
        return None;
    }

    static COPY: OnceLock<Regex> = OnceLock::new();
    let re = regex(&COPY, r"(?m)^(COPY --from=build \S*/)(build|dist)( /usr/share/nginx/html)$");
    let caps = re.captures(text)?;
    let swapped = if &caps[2] == "build" { "dist" } else { "build" };
    Some(
        re.replace(text, format!("${{1}}{}${{3}}", swapped).as_str())
            .into_owned(),
    )
}

fn set_jdk(text: &str, version: &str) -> String {
    static TEMURIN: OnceLock<Regex> = OnceLock::new();
    static GRADLE: OnceLock<Regex> = OnceLock::new();
    static JRE: OnceLock<Regex> = OnceLock::new();

    let text = regex(&TEMURIN, r"eclipse-temurin-\d+")
        .replace_all(text, format!("eclipse-temurin-{}", version).as_str())
        .into_owned();
    let text = regex(&GRADLE, r"gradle:(\w+)-jdk\d+")
        .replace_all(&text, format!("gradle:${{1}}-jdk{}", version).as_str())
        .into_owned();
    regex(&JRE, r"eclipse-temurin:\d+-jre")
        .replace_all(&text, format!("eclipse-temurin:{}-jre", version).as_str())
        .into_owned()
}

fn insert_before_line(text: &str, matches: impl Fn(&str) -> bool, new_line: &str) -> Option<String> {
    let mut out = Vec::new();
    let mut inserted = false;
    for line in text.lines() {
        if !inserted && matches(line) {
            out.push(new_line.to_string());
            inserted = true;
        }
        out.push(line.to_string());
    }

    inserted.then(|| {
        let mut joined = out.join("\n");
        if text.ends_with('\n') {
            joined.push('\n');
        }
        joined
    })
}
