use super::confirm::{ConfirmationClaims, ConfirmationSigner};
use super::parser::split_positional;
use super::result::{ConfirmationPrompt, DispatchResult};
use crate::backend::{Backend, BackendCall, BackendContext, BackendResponse};
use crate::config::{CatalogEntry, HandlerKind, IntegrationsConfig};
use crate::shared::ids::{validate_identifier_value, ChannelId, CommandName, PrincipalId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub mod actions {
    pub const DEPLOY_MODEL: &str = "deploy_model";
    pub const MODEL_STATUS: &str = "model_status";
    pub const TRAIN_MODEL: &str = "train_model";
    pub const PREDICT: &str = "predict";
    pub const ANALYZE: &str = "analyze";
    pub const EXPLAIN_PREDICTION: &str = "explain_prediction";
    pub const ANOMALY_DETAILS: &str = "anomaly_details";
    pub const START_INVESTIGATION: &str = "start_investigation";
    pub const EXECUTE_AUTOMATION: &str = "execute_automation";
    pub const RUN_WORKFLOW: &str = "run_workflow";
}

pub const DEFAULT_ENVIRONMENT: &str = "staging";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPlan {
    Backend(BackendCall),
    Investigation { anomaly_id: String },
    DashboardLink { dashboard: String },
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub principal: &'a PrincipalId,
    pub channel: Option<&'a ChannelId>,
    pub now: i64,
}

pub fn plan_invocation(entry: &CatalogEntry, args: &[String]) -> Result<ActionPlan, String> {
    let (positional, options) = split_positional(args);
    check_arity(entry, positional)?;

    match entry.handler {
        HandlerKind::Deploy => {
            expect_keyword(positional, 0, &["model"])?;
            let name = required_positional(positional, 1, "name")?;
            let version = required_positional(positional, 2, "version")?;
            let environment = positional
                .get(3)
                .map(String::as_str)
                .unwrap_or(DEFAULT_ENVIRONMENT);
            let call = BackendCall::new(actions::DEPLOY_MODEL, name)
                .with_param("model_name", name)
                .with_param("version", version)
                .with_param("environment", environment);
            Ok(ActionPlan::Backend(with_options(call, options)))
        }
        HandlerKind::Status => {
            expect_keyword(positional, 0, &["models", "model"])?;
            let target = positional.get(1).map(String::as_str).unwrap_or("all");
            Ok(ActionPlan::Backend(with_options(
                BackendCall::new(actions::MODEL_STATUS, target),
                options,
            )))
        }
        HandlerKind::Train => {
            let model = required_positional(positional, 0, "model")?;
            let call =
                BackendCall::new(actions::TRAIN_MODEL, model).with_param("model_name", model);
            Ok(ActionPlan::Backend(with_options(call, options)))
        }
        HandlerKind::Predict => {
            let subject = required_positional(positional, 0, "subject")?;
            Ok(ActionPlan::Backend(with_options(
                BackendCall::new(actions::PREDICT, subject),
                options,
            )))
        }
        HandlerKind::Analyze => {
            let subject = required_positional(positional, 0, "subject")?;
            Ok(ActionPlan::Backend(with_options(
                BackendCall::new(actions::ANALYZE, subject),
                options,
            )))
        }
        HandlerKind::Explain => {
            expect_keyword(positional, 0, &["prediction"])?;
            let id = required_positional(positional, 1, "id")?;
            Ok(ActionPlan::Backend(BackendCall::new(
                actions::EXPLAIN_PREDICTION,
                id,
            )))
        }
        HandlerKind::Investigate => {
            let anomaly_id = required_positional(positional, 0, "anomaly_id")?;
            Ok(ActionPlan::Investigation {
                anomaly_id: anomaly_id.to_string(),
            })
        }
        HandlerKind::Automate => {
            let operation = expect_keyword(positional, 0, &["enable", "disable"])?;
            let rule = required_positional(positional, 1, "rule")?;
            let call = BackendCall::new(actions::EXECUTE_AUTOMATION, rule)
                .with_param("action_type", format!("{operation}_rule"));
            Ok(ActionPlan::Backend(with_options(call, options)))
        }
        HandlerKind::Workflow => {
            expect_keyword(positional, 0, &["run"])?;
            let name = required_positional(positional, 1, "name")?;
            Ok(ActionPlan::Backend(with_options(
                BackendCall::new(actions::RUN_WORKFLOW, name),
                options,
            )))
        }
        HandlerKind::Dashboard => {
            let dashboard = required_positional(positional, 0, "type")?;
            validate_identifier_value("dashboard type", dashboard)?;
            Ok(ActionPlan::DashboardLink {
                dashboard: dashboard.to_ascii_lowercase(),
            })
        }
        HandlerKind::Help => Err("help has no action to run".to_string()),
    }
}

fn check_arity(entry: &CatalogEntry, positional: &[String]) -> Result<(), String> {
    // Catalogs that only list names and roles leave shape checks to the handler.
    if entry.spec.args.is_empty() {
        return Ok(());
    }
    let required = entry.required_arg_count();
    if positional.len() < required {
        return Err(format!(
            "expected at least {required} argument(s), got {}",
            positional.len()
        ));
    }
    if positional.len() > entry.spec.args.len() {
        return Err(format!(
            "expected at most {} argument(s), got {}",
            entry.spec.args.len(),
            positional.len()
        ));
    }
    Ok(())
}

fn required_positional<'a>(
    positional: &'a [String],
    index: usize,
    name: &str,
) -> Result<&'a str, String> {
    positional
        .get(index)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("missing required argument `{name}`"))
}

fn expect_keyword<'a>(
    positional: &[String],
    index: usize,
    allowed: &[&'a str],
) -> Result<&'a str, String> {
    let value = positional
        .get(index)
        .ok_or_else(|| format!("expected one of: {}", allowed.join(", ")))?;
    allowed
        .iter()
        .copied()
        .find(|keyword| value.eq_ignore_ascii_case(keyword))
        .ok_or_else(|| {
            format!(
                "expected one of: {}, got `{value}`",
                allowed.join(", ")
            )
        })
}

fn with_options(call: BackendCall, options: &[String]) -> BackendCall {
    if options.is_empty() {
        return call;
    }
    let tokens: Vec<Value> = options.iter().cloned().map(Value::String).collect();
    call.with_param("options", Value::Array(tokens))
}

pub fn describe_plan(plan: &ActionPlan) -> String {
    match plan {
        ActionPlan::Backend(call) => match call.action_type.as_str() {
            actions::DEPLOY_MODEL => format!(
                "deploy {} v{} to {}",
                call.target,
                call.param_str("version").unwrap_or("?"),
                call.param_str("environment").unwrap_or(DEFAULT_ENVIRONMENT)
            ),
            actions::EXECUTE_AUTOMATION => format!(
                "{} automation rule {}",
                automation_operation(call),
                call.target
            ),
            actions::RUN_WORKFLOW => format!("run workflow {}", call.target),
            other => format!("{other} on {}", call.target),
        },
        ActionPlan::Investigation { anomaly_id } => {
            format!("investigate anomaly {anomaly_id}")
        }
        ActionPlan::DashboardLink { dashboard } => format!("open dashboard {dashboard}"),
    }
}

fn automation_operation(call: &BackendCall) -> &str {
    call.param_str("action_type")
        .and_then(|value| value.strip_suffix("_rule"))
        .unwrap_or("apply")
}

pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    signer: ConfirmationSigner,
    integrations: IntegrationsConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("signer", &self.signer)
            .field("integrations", &self.integrations)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        signer: ConfirmationSigner,
        integrations: IntegrationsConfig,
    ) -> Self {
        Self {
            backend,
            signer,
            integrations,
        }
    }

    pub fn signer(&self) -> &ConfirmationSigner {
        &self.signer
    }

    pub fn dispatch(
        &self,
        name: &CommandName,
        entry: Option<&CatalogEntry>,
        args: &[String],
        ctx: &DispatchContext<'_>,
    ) -> DispatchResult {
        let Some(entry) = entry else {
            return DispatchResult::failure(
                format!("Unknown command `{name}`. Send `help` to list available commands."),
                format!("`{name}` is not in the command catalog"),
            );
        };

        let plan = match plan_invocation(entry, args) {
            Ok(plan) => plan,
            Err(err) => {
                return DispatchResult::failure(
                    format!("Invalid arguments for `{name}`. Usage: {}", entry.usage()),
                    err,
                );
            }
        };

        if entry.confirm {
            return self.propose(name, plan, ctx);
        }
        self.execute(name, &plan, ctx, None)
    }

    /// Runs a previously proposed plan; the token nonce is forwarded so the
    /// backend can reject replays.
    pub fn confirm(&self, claims: &ConfirmationClaims, ctx: &DispatchContext<'_>) -> DispatchResult {
        tracing::info!(
            command = %claims.command,
            principal = %ctx.principal,
            proposed_by = %claims.proposed_by,
            "executing confirmed action"
        );
        self.execute(&claims.command, &claims.plan, ctx, Some(&claims.nonce))
    }

    fn propose(
        &self,
        name: &CommandName,
        plan: ActionPlan,
        ctx: &DispatchContext<'_>,
    ) -> DispatchResult {
        let summary = describe_plan(&plan);
        match self
            .signer
            .issue(name, &plan, ctx.principal, ctx.channel, ctx.now)
        {
            Ok((token, _claims)) => {
                tracing::info!(
                    command = %name,
                    principal = %ctx.principal,
                    "proposed action awaiting confirmation"
                );
                let prompt = ConfirmationPrompt {
                    token,
                    command: name.to_string(),
                    summary: summary.clone(),
                    expires_at: self.signer.expires_at(ctx.now),
                };
                DispatchResult::proposed(
                    format!("Please confirm: {summary}. Reply with `confirm <token>` to proceed."),
                    prompt,
                )
                .with_payload(json!({ "plan": plan }))
            }
            Err(err) => DispatchResult::failure(
                format!("Could not prepare confirmation for `{name}`"),
                err.to_string(),
            ),
        }
    }

    fn execute(
        &self,
        name: &CommandName,
        plan: &ActionPlan,
        ctx: &DispatchContext<'_>,
        idempotency_key: Option<&str>,
    ) -> DispatchResult {
        let backend_ctx = BackendContext {
            principal: ctx.principal.to_string(),
            idempotency_key: idempotency_key.map(str::to_string),
        };
        let result = match plan {
            ActionPlan::Backend(call) => self.run_call(name, call, &backend_ctx),
            ActionPlan::Investigation { anomaly_id } => {
                self.run_investigation(anomaly_id, &backend_ctx)
            }
            ActionPlan::DashboardLink { dashboard } => self.dashboard_link(dashboard),
        };
        tracing::info!(
            command = %name,
            principal = %ctx.principal,
            success = result.success,
            "dispatch finished"
        );
        result
    }

    fn run_call(
        &self,
        name: &CommandName,
        call: &BackendCall,
        ctx: &BackendContext,
    ) -> DispatchResult {
        match self.backend.execute(call, ctx) {
            Ok(response) if response.success => {
                DispatchResult::success(success_message(call, &response))
                    .with_payload(response.fields_value())
            }
            Ok(response) => DispatchResult::failure(
                failure_message(name, call),
                response
                    .error
                    .clone()
                    .or(response.message.clone())
                    .unwrap_or_default(),
            ),
            Err(err) => {
                tracing::warn!(
                    command = %name,
                    action = %call.action_type,
                    "backend call failed: {err}"
                );
                DispatchResult::failure(failure_message(name, call), err.to_string())
            }
        }
    }

    fn run_investigation(&self, anomaly_id: &str, ctx: &BackendContext) -> DispatchResult {
        let details_call = BackendCall::new(actions::ANOMALY_DETAILS, anomaly_id);
        let anomaly = match self.backend.execute(&details_call, ctx) {
            Ok(response) if response.success => response,
            Ok(_) | Err(crate::backend::BackendError::Status { code: 404, .. }) => {
                return DispatchResult::failure(
                    format!("Anomaly {anomaly_id} not found"),
                    format!("backend has no anomaly `{anomaly_id}`"),
                );
            }
            Err(err) => {
                return DispatchResult::failure("Investigation failed", err.to_string());
            }
        };

        let start_call = BackendCall::new(actions::START_INVESTIGATION, anomaly_id);
        let investigation = match self.backend.execute(&start_call, ctx) {
            Ok(response) if response.success => response,
            Ok(response) => {
                return DispatchResult::failure(
                    "Investigation failed",
                    response.error.unwrap_or_default(),
                );
            }
            Err(err) => {
                return DispatchResult::failure("Investigation failed", err.to_string());
            }
        };

        let mut message = format!("Investigation started for anomaly {anomaly_id}");
        if let Some(id) = investigation.identifier("id") {
            message.push_str(&format!(" (investigation ID: {id})"));
        }
        for (label, key) in [
            ("type", "type"),
            ("severity", "severity"),
            ("device", "device"),
        ] {
            if let Some(value) = anomaly.field_text(key) {
                message.push_str(&format!("\n{label}: {value}"));
            }
        }
        if let Some(analysis) = investigation.field_text("analysis") {
            message.push_str(&format!("\nRoot cause analysis: {analysis}"));
        }
        DispatchResult::success(message).with_payload(json!({
            "anomaly": anomaly.fields_value(),
            "investigation": investigation.fields_value(),
        }))
    }

    fn dashboard_link(&self, dashboard: &str) -> DispatchResult {
        match &self.integrations.grafana {
            Some(base) => {
                let url = format!("{}/d/{dashboard}", base.trim_end_matches('/'));
                DispatchResult::success(format!("Dashboard `{dashboard}`: {url}"))
                    .with_payload(json!({ "url": url }))
            }
            None => DispatchResult::failure(
                "Dashboard links are unavailable",
                "grafana integration is not configured",
            ),
        }
    }
}

fn success_message(call: &BackendCall, response: &BackendResponse) -> String {
    match call.action_type.as_str() {
        actions::DEPLOY_MODEL => {
            let mut message = format!(
                "Successfully deployed {} v{} to {}",
                call.target,
                call.param_str("version").unwrap_or("?"),
                call.param_str("environment").unwrap_or(DEFAULT_ENVIRONMENT)
            );
            if let Some(id) = response.identifier("deployment_id") {
                message.push_str(&format!(" (deployment ID: {id})"));
            }
            message
        }
        actions::EXECUTE_AUTOMATION => {
            let mut message = format!(
                "Automation executed: {} {}",
                automation_operation(call),
                call.target
            );
            let id = response.identifier("execution_id");
            let status = response.field_text("status");
            match (id, status) {
                (Some(id), Some(status)) => {
                    message.push_str(&format!(" (execution ID: {id}, status: {status})"))
                }
                (Some(id), None) => message.push_str(&format!(" (execution ID: {id})")),
                (None, Some(status)) => message.push_str(&format!(" (status: {status})")),
                (None, None) => {}
            }
            message
        }
        actions::RUN_WORKFLOW => {
            let mut message = format!("Workflow {} started", call.target);
            if let Some(id) = response.identifier("execution_id") {
                message.push_str(&format!(" (execution ID: {id})"));
            }
            message
        }
        _ => response
            .message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("`{}` completed for {}", call.action_type, call.target)),
    }
}

fn failure_message(name: &CommandName, call: &BackendCall) -> String {
    match call.action_type.as_str() {
        actions::DEPLOY_MODEL => format!("Failed to deploy {}", call.target),
        actions::EXECUTE_AUTOMATION => "Automation failed".to_string(),
        actions::RUN_WORKFLOW => format!("Workflow {} failed to start", call.target),
        _ => format!("`{name}` failed"),
    }
}
