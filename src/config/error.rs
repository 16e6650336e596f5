#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("deploy config validation failed: {0}")]
    Invalid(String),
    #[error("environment `{0}` is not configured")]
    UnknownEnvironment(String),
    #[error("missing credential `{field}`; set it in the config file or via `{env_key}`")]
    MissingCredential {
        field: &'static str,
        env_key: &'static str,
    },
}
