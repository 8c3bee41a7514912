use super::{CommandSpec, ConfigError};
use crate::shared::ids::{PrincipalId, RoleName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SECRET_ENV: &str = "CHATOPS_CONFIRM_SECRET";
pub const MAX_CONFIRMATION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub backend: BackendConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub command_files: Vec<PathBuf>,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleSourceKind {
    #[default]
    Static,
    Directory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub source: RoleSourceKind,
    #[serde(default)]
    pub principals: BTreeMap<PrincipalId, Vec<RoleName>>,
    #[serde(default = "default_roles")]
    pub default_roles: Vec<RoleName>,
    #[serde(default)]
    pub always_granted: Vec<RoleName>,
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            source: RoleSourceKind::default(),
            principals: BTreeMap::new(),
            default_roles: default_roles(),
            always_granted: Vec::new(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    pub url: String,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    #[serde(default = "default_confirmation_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub allow_ephemeral_secret: bool,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
            ttl_secs: default_confirmation_ttl_secs(),
            allow_ephemeral_secret: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub grafana: Option<String>,
    #[serde(default)]
    pub mlflow: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_directory_timeout_secs() -> u64 {
    5
}

fn default_roles() -> Vec<RoleName> {
    vec![RoleName::viewer()]
}

fn default_secret_env() -> String {
    DEFAULT_SECRET_ENV.to_string()
}

fn default_confirmation_ttl_secs() -> u64 {
    900
}

fn default_max_concurrency() -> usize {
    8
}

fn is_http_url(raw: &str) -> bool {
    let trimmed = raw.trim();
    (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
        && trimmed.len() > "https://".len()
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.backend.base_url) {
            return Err(ConfigError::Settings(
                "`backend.base_url` must be an http or https URL".to_string(),
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Settings(
                "`backend.timeout_secs` must be > 0".to_string(),
            ));
        }
        if let Some(env) = &self.backend.token_env {
            if env.trim().is_empty() {
                return Err(ConfigError::Settings(
                    "`backend.token_env` must be non-empty when set".to_string(),
                ));
            }
        }

        match (&self.roles.source, &self.roles.directory) {
            (RoleSourceKind::Directory, None) => {
                return Err(ConfigError::Settings(
                    "`roles.directory` is required when `roles.source=directory`".to_string(),
                ));
            }
            (_, Some(directory)) => {
                if !is_http_url(&directory.url) {
                    return Err(ConfigError::Settings(
                        "`roles.directory.url` must be an http or https URL".to_string(),
                    ));
                }
                if directory.timeout_secs == 0 {
                    return Err(ConfigError::Settings(
                        "`roles.directory.timeout_secs` must be > 0".to_string(),
                    ));
                }
            }
            (RoleSourceKind::Static, None) => {}
        }

        for (principal, roles) in &self.roles.principals {
            if roles.is_empty() {
                return Err(ConfigError::Settings(format!(
                    "principal `{principal}` must list at least one role"
                )));
            }
        }

        if self.confirmation.secret_env.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`confirmation.secret_env` must be non-empty".to_string(),
            ));
        }
        if self.confirmation.ttl_secs == 0 {
            return Err(ConfigError::Settings(
                "`confirmation.ttl_secs` must be > 0".to_string(),
            ));
        }
        if self.confirmation.ttl_secs > MAX_CONFIRMATION_TTL_SECS {
            return Err(ConfigError::Settings(format!(
                "`confirmation.ttl_secs` must be <= {MAX_CONFIRMATION_TTL_SECS}"
            )));
        }

        for (key, value) in [
            ("grafana", &self.integrations.grafana),
            ("mlflow", &self.integrations.mlflow),
        ] {
            if let Some(url) = value {
                if !is_http_url(url) {
                    return Err(ConfigError::Settings(format!(
                        "`integrations.{key}` must be an http or https URL"
                    )));
                }
            }
        }

        if self.runtime.max_concurrency == 0 {
            return Err(ConfigError::Settings(
                "`runtime.max_concurrency` must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn backend_token(&self) -> Option<String> {
        read_env_secret(self.backend.token_env.as_deref())
    }
}

impl DirectoryConfig {
    pub fn token(&self) -> Option<String> {
        read_env_secret(self.token_env.as_deref())
    }
}

impl ConfirmationConfig {
    pub fn resolve_secret(&self) -> Result<Vec<u8>, ConfigError> {
        if let Some(secret) = read_env_secret(Some(&self.secret_env)) {
            return Ok(secret.into_bytes());
        }
        if !self.allow_ephemeral_secret {
            return Err(ConfigError::MissingSecret {
                env: self.secret_env.clone(),
            });
        }
        let mut bytes = vec![0_u8; 32];
        getrandom::getrandom(&mut bytes)
            .map_err(|err| ConfigError::SecretGeneration(err.to_string()))?;
        tracing::warn!(
            env = %self.secret_env,
            "using an ephemeral confirmation secret; pending confirmations will not survive a restart"
        );
        Ok(bytes)
    }
}

fn read_env_secret(name: Option<&str>) -> Option<String> {
    let name = name?.trim();
    if name.is_empty() {
        return None;
    }
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Settings {
        serde_yaml::from_str(
            r#"
backend:
  base_url: https://ml.internal.example
"#,
        )
        .expect("parse settings")
    }

    #[test]
    fn defaults_grant_viewer_to_unlisted_principals() {
        let settings = minimal();
        assert_eq!(settings.roles.source, RoleSourceKind::Static);
        assert_eq!(
            settings.roles.default_roles,
            vec![RoleName::parse("viewer").expect("role")]
        );
        assert!(settings.roles.always_granted.is_empty());
        assert_eq!(settings.confirmation.ttl_secs, 900);
        assert_eq!(settings.runtime.max_concurrency, 8);
        settings.validate().expect("valid");
    }

    #[test]
    fn directory_source_requires_directory_section() {
        let mut settings = minimal();
        settings.roles.source = RoleSourceKind::Directory;
        let err = settings.validate().expect_err("missing directory");
        assert!(err.to_string().contains("roles.directory"));
    }

    #[test]
    fn rejects_non_http_backend() {
        let mut settings = minimal();
        settings.backend.base_url = "ftp://ml".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut settings = minimal();
        settings.runtime.max_concurrency = 0;
        let err = settings.validate().expect_err("zero concurrency");
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn rejects_confirmation_ttl_beyond_thirty_days() {
        let mut settings = minimal();
        settings.confirmation.ttl_secs = MAX_CONFIRMATION_TTL_SECS;
        settings.validate().expect("thirty days is allowed");

        settings.confirmation.ttl_secs = u64::MAX;
        let err = settings.validate().expect_err("ttl too large");
        assert!(err.to_string().contains("confirmation.ttl_secs"));
    }

    #[test]
    fn missing_secret_is_fatal_without_ephemeral_opt_in() {
        let confirmation = ConfirmationConfig {
            secret_env: "CHATOPS_TEST_SECRET_THAT_IS_NEVER_SET".to_string(),
            ttl_secs: 60,
            allow_ephemeral_secret: false,
        };
        let err = confirmation.resolve_secret().expect_err("missing secret");
        assert!(matches!(err, ConfigError::MissingSecret { .. }));
    }

    #[test]
    fn ephemeral_secret_is_generated_when_allowed() {
        let confirmation = ConfirmationConfig {
            secret_env: "CHATOPS_TEST_SECRET_THAT_IS_NEVER_SET".to_string(),
            ttl_secs: 60,
            allow_ephemeral_secret: true,
        };
        let secret = confirmation.resolve_secret().expect("secret");
        assert_eq!(secret.len(), 32);
    }
}
