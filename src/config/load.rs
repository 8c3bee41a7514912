use super::catalog::load_catalog_file;
use super::paths::resolve_relative_to;
use super::{CommandCatalog, ConfigError, Settings};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub catalog: CommandCatalog,
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let settings = Settings::from_path(path)?;
    settings.validate()?;
    let catalog = build_catalog(path, &settings)?;
    tracing::info!(
        path = %path.display(),
        commands = catalog.len(),
        "configuration loaded"
    );
    Ok(LoadedConfig { settings, catalog })
}

pub fn build_catalog(
    settings_path: &Path,
    settings: &Settings,
) -> Result<CommandCatalog, ConfigError> {
    if settings.command_files.is_empty() && settings.commands.is_empty() {
        return CommandCatalog::builtin();
    }
    let mut specs = Vec::new();
    for file in &settings.command_files {
        let resolved = resolve_relative_to(settings_path, file);
        specs.extend(load_catalog_file(&resolved)?);
    }
    specs.extend(settings.commands.iter().cloned());
    CommandCatalog::from_specs(specs)
}
