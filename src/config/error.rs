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
    #[error("invalid json in {path}: {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported command catalog format for {path}; expected .yaml, .yml or .json")]
    UnsupportedCatalogFormat { path: String },
    #[error("settings validation failed: {0}")]
    Settings(String),
    #[error("command catalog validation failed: {0}")]
    Catalog(String),
    #[error("confirmation signing secret is missing; set `{env}` or enable `confirmation.allow_ephemeral_secret`")]
    MissingSecret { env: String },
    #[error("failed to generate ephemeral confirmation secret: {0}")]
    SecretGeneration(String),
}
