pub mod catalog;
pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use catalog::{
    load_catalog_file, ArgSpec, CatalogEntry, CatalogFile, CommandCatalog, CommandSpec,
    HandlerKind,
};
pub use error::ConfigError;
pub use load::{build_catalog, load_config, LoadedConfig};
pub use paths::{default_config_path, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
pub use settings::{
    BackendConfig, ConfirmationConfig, DirectoryConfig, IntegrationsConfig, RoleSourceKind,
    RolesConfig, RuntimeConfig, Settings, DEFAULT_SECRET_ENV,
};
