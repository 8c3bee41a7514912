use super::ConfigError;
use crate::router::parser::CONFIRM_KEYWORD;
use crate::shared::ids::{CommandName, RoleName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Deploy,
    Status,
    Train,
    Predict,
    Analyze,
    Explain,
    Investigate,
    Automate,
    Workflow,
    Dashboard,
    Help,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 11] = [
        Self::Deploy,
        Self::Status,
        Self::Train,
        Self::Predict,
        Self::Analyze,
        Self::Explain,
        Self::Investigate,
        Self::Automate,
        Self::Workflow,
        Self::Dashboard,
        Self::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Status => "status",
            Self::Train => "train",
            Self::Predict => "predict",
            Self::Analyze => "analyze",
            Self::Explain => "explain",
            Self::Investigate => "investigate",
            Self::Automate => "automate",
            Self::Workflow => "workflow",
            Self::Dashboard => "dashboard",
            Self::Help => "help",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|handler| handler.as_str() == lowered)
    }

    /// Handlers that change remote state require a second, confirming invocation.
    pub fn confirm_by_default(self) -> bool {
        matches!(self, Self::Deploy | Self::Automate | Self::Workflow)
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandSpec {
    pub name: CommandName,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub permissions: Vec<RoleName>,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub handler: Option<HandlerKind>,
    #[serde(default)]
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogFile {
    pub commands: Vec<CommandSpec>,
}

fn default_true() -> bool {
    true
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub spec: CommandSpec,
    pub handler: HandlerKind,
    pub confirm: bool,
    pub required_roles: BTreeSet<RoleName>,
}

impl CatalogEntry {
    pub fn usage(&self) -> String {
        self.spec.usage.clone().unwrap_or_else(|| {
            let mut usage = self.spec.name.to_string();
            for arg in &self.spec.args {
                if arg.required {
                    usage.push_str(&format!(" <{}>", arg.name));
                } else {
                    usage.push_str(&format!(" [{}]", arg.name));
                }
            }
            usage
        })
    }

    pub fn required_arg_count(&self) -> usize {
        self.spec.args.iter().filter(|arg| arg.required).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    entries: BTreeMap<CommandName, CatalogEntry>,
}

impl CommandCatalog {
    pub fn from_specs(specs: Vec<CommandSpec>) -> Result<Self, ConfigError> {
        let mut entries = BTreeMap::new();
        for spec in specs {
            let entry = resolve_entry(spec)?;
            let name = entry.spec.name.clone();
            if entries.insert(name.clone(), entry).is_some() {
                return Err(ConfigError::Catalog(format!(
                    "command `{name}` is defined more than once"
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_yaml::from_str(BUILTIN_CATALOG_YAML).map_err(|source| {
            ConfigError::Parse {
                path: "<builtin catalog>".to_string(),
                source,
            }
        })?;
        Self::from_specs(file.commands)
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }
}

fn resolve_entry(spec: CommandSpec) -> Result<CatalogEntry, ConfigError> {
    let name = spec.name.clone();
    if name.as_str() == CONFIRM_KEYWORD {
        return Err(ConfigError::Catalog(format!(
            "command name `{CONFIRM_KEYWORD}` is reserved for confirmations"
        )));
    }
    let handler = match spec.handler {
        Some(handler) => handler,
        None => HandlerKind::parse(name.as_str()).ok_or_else(|| {
            ConfigError::Catalog(format!(
                "command `{name}` has no `handler` and its name matches no built-in handler"
            ))
        })?,
    };
    if spec.permissions.is_empty() {
        return Err(ConfigError::Catalog(format!(
            "command `{name}` must list at least one permitted role"
        )));
    }

    let mut seen_optional = false;
    let mut arg_names = HashSet::new();
    for arg in &spec.args {
        if arg.name.trim().is_empty() {
            return Err(ConfigError::Catalog(format!(
                "command `{name}` has an argument with an empty name"
            )));
        }
        if !arg_names.insert(arg.name.as_str()) {
            return Err(ConfigError::Catalog(format!(
                "command `{name}` declares argument `{}` twice",
                arg.name
            )));
        }
        if arg.required && seen_optional {
            return Err(ConfigError::Catalog(format!(
                "command `{name}` declares required argument `{}` after an optional one",
                arg.name
            )));
        }
        seen_optional |= !arg.required;
    }

    let confirm = spec
        .confirm
        .unwrap_or_else(|| handler.confirm_by_default());
    let required_roles = spec.permissions.iter().cloned().collect();
    Ok(CatalogEntry {
        spec,
        handler,
        confirm,
        required_roles,
    })
}

pub fn load_catalog_file(path: &Path) -> Result<Vec<CommandSpec>, ConfigError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let file: CatalogFile = match extension.as_deref() {
        Some("json") => serde_json::from_str(&raw).map_err(|source| ConfigError::ParseJson {
            path: display,
            source,
        })?,
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?
        }
        _ => return Err(ConfigError::UnsupportedCatalogFormat { path: display }),
    };
    Ok(file.commands)
}

const BUILTIN_CATALOG_YAML: &str = r#"
commands:
  - name: deploy
    category: Model Management
    description: Deploy ML model
    usage: "deploy model <name> <version> [environment]"
    permissions: [ml_admin, ml_engineer]
    args:
      - { name: subject, description: "literal `model`" }
      - { name: name, description: Model name }
      - { name: version, description: Model version }
      - { name: environment, required: false, description: "Target environment (default staging)" }
  - name: status
    category: Model Management
    description: Show model status
    usage: "status models [name]"
    permissions: [viewer]
    args:
      - { name: subject, description: "literal `models`" }
      - { name: name, required: false, description: Model name }
  - name: train
    category: Model Management
    description: Start training
    usage: "train <model> --dataset <data>"
    permissions: [ml_admin, ml_engineer]
    args:
      - { name: model, description: Model name }
  - name: predict
    category: Predictions & Analytics
    description: Traffic prediction
    usage: "predict traffic --device <id>"
    permissions: [viewer]
    args:
      - { name: subject, description: Prediction subject }
  - name: analyze
    category: Predictions & Analytics
    description: Anomaly analysis
    usage: "analyze anomalies --severity <level>"
    permissions: [viewer]
    args:
      - { name: subject, description: Analysis subject }
  - name: explain
    category: Predictions & Analytics
    description: Prediction explanation
    usage: "explain prediction <id>"
    permissions: [viewer]
    args:
      - { name: subject, description: "literal `prediction`" }
      - { name: id, description: Prediction id }
  - name: investigate
    category: Predictions & Analytics
    description: Start anomaly investigation
    usage: "investigate <anomaly_id>"
    permissions: [ml_admin, network_admin, network_operator]
    args:
      - { name: anomaly_id, description: Anomaly id }
  - name: automate
    category: Automation Control
    description: Enable or disable automation rule
    usage: "automate <enable|disable> <rule>"
    permissions: [network_admin]
    args:
      - { name: action, description: "enable or disable" }
      - { name: rule, description: Automation rule }
  - name: workflow
    category: Automation Control
    description: Execute workflow
    usage: "workflow run <name>"
    permissions: [network_admin, network_operator]
    args:
      - { name: subject, description: "literal `run`" }
      - { name: name, description: Workflow name }
  - name: dashboard
    category: Automation Control
    description: Show dashboard link
    usage: "dashboard <type>"
    permissions: [viewer]
    args:
      - { name: type, description: Dashboard type }
  - name: help
    category: General
    description: Show available commands
    permissions: [viewer]
"#;
