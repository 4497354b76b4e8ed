crate::id_enum! {
    /// Build tool, scoped to a stack family
    BuildToolId {
        Maven("maven", "Maven", ["mvn"]),
        Gradle("gradle", "Gradle"),
        Npm("npm", "npm"),
        Yarn("yarn", "Yarn"),
        Pnpm("pnpm", "pnpm"),
    }
}

impl BuildToolId {
    /// Manifest conventionally found at the root of a project using this tool.
    pub fn default_manifest(&self) -> Option<&'static str> {
        match self {
            BuildToolId::Maven => Some("pom.xml"),
            BuildToolId::Gradle => Some("build.gradle"),
            BuildToolId::Npm | BuildToolId::Yarn | BuildToolId::Pnpm => Some("package.json"),
            BuildToolId::Custom(_) => None,
        }
    }

    /// Maps a lockfile name to the package manager that writes it.
    pub fn from_lockfile(file_name: &str) -> Option<Self> {
        match file_name {
            "package-lock.json" | "npm-shrinkwrap.json" => Some(BuildToolId::Npm),
            "yarn.lock" => Some(BuildToolId::Yarn),
            "pnpm-lock.yaml" => Some(BuildToolId::Pnpm),
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(
            self,
            BuildToolId::Npm | BuildToolId::Yarn | BuildToolId::Pnpm
        )
    }
}
