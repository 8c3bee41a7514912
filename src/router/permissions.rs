use crate::config::{CatalogEntry, DirectoryConfig, RoleSourceKind, RolesConfig};
use crate::shared::ids::{PrincipalId, RoleName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

pub type RoleSet = BTreeSet<RoleName>;

#[derive(Debug, thiserror::Error)]
pub enum RoleLookupError {
    #[error("role directory request failed: {0}")]
    Transport(String),
    #[error("role directory returned status {code}")]
    Status { code: u16 },
    #[error("failed to decode role directory response: {0}")]
    Decode(String),
}

/// Resolves the roles held by a principal. Implementations may fail; callers
/// must treat a failure as "no roles".
pub trait RoleSource: Send + Sync {
    fn roles_for(&self, principal: &PrincipalId) -> Result<RoleSet, RoleLookupError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticRoleSource {
    table: BTreeMap<PrincipalId, RoleSet>,
    default_roles: RoleSet,
}

impl StaticRoleSource {
    pub fn new(table: BTreeMap<PrincipalId, RoleSet>, default_roles: RoleSet) -> Self {
        Self {
            table,
            default_roles,
        }
    }

    pub fn from_config(config: &RolesConfig) -> Self {
        let table = config
            .principals
            .iter()
            .map(|(principal, roles)| (principal.clone(), roles.iter().cloned().collect()))
            .collect();
        Self::new(table, config.default_roles.iter().cloned().collect())
    }
}

impl RoleSource for StaticRoleSource {
    fn roles_for(&self, principal: &PrincipalId) -> Result<RoleSet, RoleLookupError> {
        Ok(self
            .table
            .get(principal)
            .cloned()
            .unwrap_or_else(|| self.default_roles.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryRoleSource {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryRolesBody {
    #[serde(default)]
    roles: Vec<String>,
}

impl DirectoryRoleSource {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(
            &config.url,
            config.token(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, principal: &PrincipalId) -> String {
        format!(
            "{}/principals/{}/roles",
            self.base_url,
            urlencoding::encode(principal.as_str())
        )
    }
}

impl RoleSource for DirectoryRoleSource {
    fn roles_for(&self, principal: &PrincipalId) -> Result<RoleSet, RoleLookupError> {
        let mut request = self.agent.get(&self.endpoint(principal));
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let body: DirectoryRolesBody = match request.call() {
            Ok(response) => response
                .into_json()
                .map_err(|e| RoleLookupError::Decode(e.to_string()))?,
            Err(ureq::Error::Status(404, _)) => return Ok(RoleSet::new()),
            Err(ureq::Error::Status(code, _)) => return Err(RoleLookupError::Status { code }),
            Err(ureq::Error::Transport(err)) => {
                return Err(RoleLookupError::Transport(err.to_string()))
            }
        };

        let mut roles = RoleSet::new();
        for raw in body.roles {
            match RoleName::parse(&raw) {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(err) => {
                    tracing::warn!(
                        principal = %principal,
                        role = %raw,
                        "ignoring directory role: {err}"
                    );
                }
            }
        }
        Ok(roles)
    }
}

pub fn role_source_from_config(config: &RolesConfig) -> Box<dyn RoleSource> {
    match (config.source, &config.directory) {
        (RoleSourceKind::Directory, Some(directory)) => {
            Box::new(DirectoryRoleSource::from_config(directory))
        }
        _ => Box::new(StaticRoleSource::from_config(config)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    MissingRole { required: Vec<RoleName> },
    NotViewer,
    LookupFailed,
    InvalidPrincipal { detail: String },
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRole { .. } => "missing_role",
            Self::NotViewer => "not_viewer",
            Self::LookupFailed => "lookup_failed",
            Self::InvalidPrincipal { .. } => "invalid_principal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoles {
    pub roles: RoleSet,
    pub lookup_failed: bool,
}

pub struct PermissionResolver {
    source: Box<dyn RoleSource>,
    always_granted: RoleSet,
    viewer: RoleName,
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("always_granted", &self.always_granted)
            .field("viewer", &self.viewer)
            .finish_non_exhaustive()
    }
}

impl PermissionResolver {
    pub fn new(source: Box<dyn RoleSource>, always_granted: RoleSet) -> Self {
        Self {
            source,
            always_granted,
            viewer: RoleName::viewer(),
        }
    }

    pub fn from_config(config: &RolesConfig) -> Self {
        Self::new(
            role_source_from_config(config),
            config.always_granted.iter().cloned().collect(),
        )
    }

    pub fn resolve_roles(&self, principal: &PrincipalId) -> ResolvedRoles {
        let (mut roles, lookup_failed) = match self.source.roles_for(principal) {
            Ok(roles) => (roles, false),
            Err(err) => {
                tracing::warn!(
                    principal = %principal,
                    "role lookup failed, treating as roleless: {err}"
                );
                (RoleSet::new(), true)
            }
        };
        roles.extend(self.always_granted.iter().cloned());
        ResolvedRoles {
            roles,
            lookup_failed,
        }
    }

    /// Known commands need an overlap with their required roles; unknown
    /// commands need the viewer role.
    pub fn decide(&self, principal: &PrincipalId, entry: Option<&CatalogEntry>) -> Decision {
        let resolved = self.resolve_roles(principal);
        let allowed = match entry {
            Some(entry) => !resolved.roles.is_disjoint(&entry.required_roles),
            None => resolved.roles.contains(&self.viewer),
        };
        if allowed {
            return Decision::Allow;
        }
        if resolved.lookup_failed {
            return Decision::Deny(DenyReason::LookupFailed);
        }
        match entry {
            Some(entry) => Decision::Deny(DenyReason::MissingRole {
                required: entry.required_roles.iter().cloned().collect(),
            }),
            None => Decision::Deny(DenyReason::NotViewer),
        }
    }
}
