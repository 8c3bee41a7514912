use crate::config::ConfigError;
use crate::doclinks::DoclinksError;
use crate::runtime::RuntimeError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Doclinks(#[from] DoclinksError),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}
