pub mod confirm;
pub mod dispatch;
pub mod help;
pub mod parser;
pub mod permissions;
pub mod result;

pub use confirm::{ConfirmationClaims, ConfirmationSigner, TokenError};
pub use dispatch::{ActionPlan, DispatchContext, Dispatcher};
pub use help::HelpText;
pub use parser::{parse, ParsedInput};
pub use permissions::{
    Decision, DenyReason, DirectoryRoleSource, PermissionResolver, RoleLookupError, RoleSet,
    RoleSource, StaticRoleSource,
};
pub use result::{ConfirmationPrompt, DispatchResult};

use crate::backend::{Backend, HttpBackend};
use crate::config::{CommandCatalog, ConfigError, HandlerKind, LoadedConfig};
use crate::shared::ids::{ChannelId, PrincipalId};
use crate::shared::logging::redact_tail;
use crate::shared::time::now_secs;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One message delivered by a chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(default)]
    pub id: Option<String>,
    pub principal: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Token handed back by an interactive "confirm" button; equivalent to
    /// sending `confirm <token>` as text.
    #[serde(default)]
    pub confirmation: Option<String>,
}

impl Invocation {
    pub fn new(principal: &str, text: &str) -> Self {
        Self {
            id: None,
            principal: principal.to_string(),
            channel: None,
            text: text.to_string(),
            confirmation: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    pub fn confirming(principal: &str, token: &str) -> Self {
        Self {
            confirmation: Some(token.to_string()),
            ..Self::new(principal, "")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterReply {
    Help(HelpText),
    Denied {
        command: String,
        reason: DenyReason,
        message: String,
    },
    Dispatched(DispatchResult),
}

impl RouterReply {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    pub fn dispatch_result(&self) -> Option<&DispatchResult> {
        match self {
            Self::Dispatched(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Router {
    catalog: CommandCatalog,
    resolver: PermissionResolver,
    dispatcher: Dispatcher,
}

impl Router {
    pub fn new(
        catalog: CommandCatalog,
        resolver: PermissionResolver,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            catalog,
            resolver,
            dispatcher,
        }
    }

    pub fn from_config(config: &LoadedConfig) -> Result<Self, ConfigError> {
        let settings = &config.settings;
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_config(
            &settings.backend,
            settings.backend_token(),
        ));
        let signer = ConfirmationSigner::new(
            settings.confirmation.resolve_secret()?,
            settings.confirmation.ttl_secs,
        );
        Ok(Self::new(
            config.catalog.clone(),
            PermissionResolver::from_config(&settings.roles),
            Dispatcher::new(backend, signer, settings.integrations.clone()),
        ))
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn handle(&self, invocation: &Invocation) -> RouterReply {
        self.handle_at(invocation, now_secs())
    }

    pub fn handle_at(&self, invocation: &Invocation, now: i64) -> RouterReply {
        let parsed = match invocation.confirmation.as_deref() {
            Some(token) if !token.trim().is_empty() => ParsedInput::Confirm {
                token: token.trim().to_string(),
            },
            _ => parse(&invocation.text),
        };

        let (name, args) = match parsed {
            ParsedInput::Empty => return RouterReply::Help(self.help()),
            ParsedInput::Malformed { token, reason } => {
                tracing::debug!(token = %token, "unparseable invocation: {reason}");
                return RouterReply::Help(
                    self.help()
                        .with_notice(format!("Could not understand `{token}`: {reason}")),
                );
            }
            ParsedInput::Confirm { token } => {
                return self.handle_confirmation(invocation, &token, now);
            }
            ParsedInput::Command { name, args } => (name, args),
        };

        let principal = match PrincipalId::parse(&invocation.principal) {
            Ok(principal) => principal,
            Err(detail) => return invalid_principal(name.as_str(), detail),
        };
        let channel = parse_channel(invocation.channel.as_deref());

        let entry = self.catalog.get(name.as_str());
        let decision = self.resolver.decide(&principal, entry);
        tracing::info!(
            principal = %principal,
            command = %name,
            channel = channel.as_ref().map(ChannelId::as_str).unwrap_or("-"),
            decision = decision_label(&decision),
            "routing invocation"
        );
        if let Decision::Deny(reason) = decision {
            return denied(name.as_str(), reason);
        }

        if entry.is_some_and(|entry| entry.handler == HandlerKind::Help) {
            return RouterReply::Help(self.help());
        }

        let ctx = DispatchContext {
            principal: &principal,
            channel: channel.as_ref(),
            now,
        };
        RouterReply::Dispatched(self.dispatcher.dispatch(&name, entry, &args, &ctx))
    }

    fn handle_confirmation(&self, invocation: &Invocation, token: &str, now: i64) -> RouterReply {
        let claims = match self.dispatcher.signer().verify(token, now) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(
                    principal = %invocation.principal,
                    token = %redact_tail(token),
                    "rejected confirmation token: {err}"
                );
                return RouterReply::Dispatched(DispatchResult::failure(
                    "Confirmation was not accepted. Please issue the command again.",
                    err.to_string(),
                ));
            }
        };

        let principal = match PrincipalId::parse(&invocation.principal) {
            Ok(principal) => principal,
            Err(detail) => return invalid_principal(claims.command.as_str(), detail),
        };
        let channel = parse_channel(invocation.channel.as_deref());

        // Re-check against the current catalog; a command removed since the
        // proposal cannot be confirmed.
        let Some(entry) = self.catalog.get(claims.command.as_str()) else {
            return RouterReply::Dispatched(DispatchResult::failure(
                format!("Command `{}` is no longer available", claims.command),
                "confirmed command is missing from the catalog",
            ));
        };
        let decision = self.resolver.decide(&principal, Some(entry));
        tracing::info!(
            principal = %principal,
            command = %claims.command,
            decision = decision_label(&decision),
            "routing confirmation"
        );
        if let Decision::Deny(reason) = decision {
            return denied(claims.command.as_str(), reason);
        }

        let ctx = DispatchContext {
            principal: &principal,
            channel: channel.as_ref(),
            now,
        };
        RouterReply::Dispatched(self.dispatcher.confirm(&claims, &ctx))
    }

    fn help(&self) -> HelpText {
        HelpText::from_catalog(&self.catalog)
    }
}

fn parse_channel(raw: Option<&str>) -> Option<ChannelId> {
    let raw = raw?;
    match ChannelId::parse(raw) {
        Ok(channel) => Some(channel),
        Err(err) => {
            tracing::warn!("ignoring invalid channel id: {err}");
            None
        }
    }
}

fn decision_label(decision: &Decision) -> &'static str {
    match decision {
        Decision::Allow => "allow",
        Decision::Deny(reason) => reason.code(),
    }
}

fn denied(command: &str, reason: DenyReason) -> RouterReply {
    let message = match &reason {
        DenyReason::MissingRole { required } => {
            let roles: Vec<&str> = required.iter().map(|role| role.as_str()).collect();
            format!(
                "You don't have permission to run `{command}`. Required role: one of {}",
                roles.join(", ")
            )
        }
        DenyReason::NotViewer => {
            format!("You don't have permission to run `{command}`.")
        }
        DenyReason::LookupFailed => {
            "Your roles could not be verified right now; the request was denied.".to_string()
        }
        DenyReason::InvalidPrincipal { .. } => {
            "The request did not carry a valid user identity.".to_string()
        }
    };
    RouterReply::Denied {
        command: command.to_string(),
        reason,
        message,
    }
}

fn invalid_principal(command: &str, detail: String) -> RouterReply {
    tracing::warn!(command = %command, "invocation rejected: {detail}");
    denied(command, DenyReason::InvalidPrincipal { detail })
}
