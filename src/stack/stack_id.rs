crate::id_enum! {
    /// Application stack a repository implements
    StackId {
        SpringBoot("spring-boot", "Spring Boot", ["springboot", "spring"]),
        React("react", "React"),
        Node("node", "Node.js", ["nodejs"]),
    }
}

impl StackId {
    /// Port the stack listens on when nothing in the repository overrides it.
    pub fn default_port(&self) -> u16 {
        match self {
            StackId::SpringBoot => 8080,
            StackId::React | StackId::Node => 3000,
            StackId::Custom(_) => 8080,
        }
    }
}
