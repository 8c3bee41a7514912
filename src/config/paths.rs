use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "CHATOPS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/chatops/config.yaml";

pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Resolves `path` against the directory holding the settings file.
pub fn resolve_relative_to(settings_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    settings_path
        .parent()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|| path.to_path_buf())
}
