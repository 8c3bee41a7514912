use chatops_router::backend::{
    Backend, BackendCall, BackendContext, BackendError, BackendResponse,
};
use chatops_router::config::{CommandCatalog, IntegrationsConfig};
use chatops_router::router::{
    ConfirmationSigner, DenyReason, Dispatcher, Invocation, PermissionResolver, RoleLookupError,
    RoleSet, RoleSource, Router, RouterReply, StaticRoleSource,
};
use chatops_router::shared::ids::{PrincipalId, RoleName};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const NOW: i64 = 1_700_000_000;
const ADMIN: &str = "admin@company.com";
const VIEWER: &str = "viewer@company.com";
const NETOPS: &str = "netops@company.com";

type Responder = Box<dyn Fn(&BackendCall) -> Result<BackendResponse, BackendError> + Send + Sync>;

struct RecordingBackend {
    calls: Mutex<Vec<(BackendCall, BackendContext)>>,
    respond: Responder,
}

impl RecordingBackend {
    fn new(respond: Responder) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond,
        })
    }

    fn succeeding() -> Arc<Self> {
        Self::new(Box::new(|call| {
            Ok(match call.action_type.as_str() {
                "deploy_model" => BackendResponse::ok().with_field("deployment_id", "dep-123"),
                "execute_automation" => BackendResponse::ok()
                    .with_field("execution_id", "exec-9")
                    .with_field("status", "running"),
                "anomaly_details" => BackendResponse::ok()
                    .with_field("type", "latency_spike")
                    .with_field("severity", "high"),
                "start_investigation" => BackendResponse::ok().with_field("id", "inv-4"),
                _ => BackendResponse::ok().with_field("models", 3),
            })
        }))
    }

    fn calls(&self) -> Vec<(BackendCall, BackendContext)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Backend for RecordingBackend {
    fn execute(
        &self,
        call: &BackendCall,
        context: &BackendContext,
    ) -> Result<BackendResponse, BackendError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((call.clone(), context.clone()));
        (self.respond)(call)
    }
}

struct CountingSource {
    inner: StaticRoleSource,
    lookups: Arc<AtomicUsize>,
}

impl RoleSource for CountingSource {
    fn roles_for(&self, principal: &PrincipalId) -> Result<RoleSet, RoleLookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.roles_for(principal)
    }
}

struct TimeoutSource;

impl RoleSource for TimeoutSource {
    fn roles_for(&self, _principal: &PrincipalId) -> Result<RoleSet, RoleLookupError> {
        Err(RoleLookupError::Transport("timed out after 5s".to_string()))
    }
}

fn roles(names: &[&str]) -> RoleSet {
    names
        .iter()
        .map(|name| RoleName::parse(name).expect("role"))
        .collect()
}

fn static_source() -> StaticRoleSource {
    let mut table = BTreeMap::new();
    table.insert(PrincipalId::parse(ADMIN).expect("admin"), roles(&["ml_admin"]));
    table.insert(PrincipalId::parse(VIEWER).expect("viewer"), roles(&["viewer"]));
    table.insert(
        PrincipalId::parse(NETOPS).expect("netops"),
        roles(&["network_admin", "viewer"]),
    );
    StaticRoleSource::new(table, RoleSet::new())
}

fn signer() -> ConfirmationSigner {
    ConfirmationSigner::new(b"router-test-secret".to_vec(), 900)
}

fn build_router(source: Box<dyn RoleSource>, backend: Arc<RecordingBackend>) -> Router {
    build_router_with(source, RoleSet::new(), backend, IntegrationsConfig::default())
}

fn build_router_with(
    source: Box<dyn RoleSource>,
    always_granted: RoleSet,
    backend: Arc<RecordingBackend>,
    integrations: IntegrationsConfig,
) -> Router {
    Router::new(
        CommandCatalog::builtin().expect("catalog"),
        PermissionResolver::new(source, always_granted),
        Dispatcher::new(backend, signer(), integrations),
    )
}

fn proposal_token(reply: &RouterReply) -> String {
    let result = reply.dispatch_result().expect("dispatched");
    assert!(result.success, "proposal failed: {result:?}");
    result
        .confirmation
        .as_ref()
        .expect("confirmation prompt")
        .token
        .clone()
}

#[test]
fn deploy_by_ml_admin_is_proposed_without_backend_call() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());

    let reply = router.handle_at(&Invocation::new(ADMIN, "deploy model fraud-detector 2.1"), NOW);

    let result = reply.dispatch_result().expect("dispatched");
    let prompt = result.confirmation.as_ref().expect("prompt");
    assert_eq!(prompt.command, "deploy");
    assert_eq!(prompt.summary, "deploy fraud-detector v2.1 to staging");
    assert_eq!(prompt.expires_at, NOW + 900);
    let plan = &result.payload.as_ref().expect("payload")["plan"];
    assert_eq!(plan["target"], "fraud-detector");
    assert_eq!(plan["parameters"]["version"], "2.1");
    assert!(backend.calls().is_empty());
}

#[test]
fn oversized_ttl_still_proposes_and_confirms() {
    let backend = RecordingBackend::succeeding();
    let router = Router::new(
        CommandCatalog::builtin().expect("catalog"),
        PermissionResolver::new(Box::new(static_source()), RoleSet::new()),
        Dispatcher::new(
            backend.clone(),
            ConfirmationSigner::new(b"router-test-secret".to_vec(), i64::MAX as u64),
            IntegrationsConfig::default(),
        ),
    );

    let reply = router.handle_at(&Invocation::new(ADMIN, "deploy model x 1.0"), NOW);
    let prompt = reply
        .dispatch_result()
        .and_then(|result| result.confirmation.clone())
        .expect("prompt");
    assert_eq!(prompt.expires_at, i64::MAX);

    let reply = router.handle_at(&Invocation::confirming(ADMIN, &prompt.token), NOW + 86_400);
    assert!(reply.dispatch_result().expect("dispatched").success);
    assert_eq!(backend.calls().len(), 1);
}

#[test]
fn confirming_deploy_executes_once_with_nonce_as_idempotency_key() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());
    let token = proposal_token(
        &router.handle_at(&Invocation::new(ADMIN, "deploy model fraud-detector 2.1"), NOW),
    );

    let reply = router.handle_at(&Invocation::confirming(ADMIN, &token), NOW + 30);

    let result = reply.dispatch_result().expect("dispatched");
    assert!(result.success);
    assert!(result.message.contains("dep-123"), "{}", result.message);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.action_type, "deploy_model");
    assert_eq!(calls[0].1.principal, ADMIN);
    let key = calls[0].1.idempotency_key.as_deref().expect("idempotency key");
    assert_eq!(key.len(), 32);
}

#[test]
fn confirm_keyword_in_text_is_equivalent_to_confirmation_field() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());
    let token = proposal_token(&router.handle_at(
        &Invocation::new(NETOPS, "automate enable bgp-flap-guard"),
        NOW,
    ));

    let reply = router.handle_at(&Invocation::new(NETOPS, &format!("confirm {token}")), NOW + 5);

    let result = reply.dispatch_result().expect("dispatched");
    assert!(result.success);
    assert!(result.message.contains("exec-9"));
    assert!(result.message.contains("running"));
    assert_eq!(
        backend.calls()[0].0.param_str("action_type"),
        Some("enable_rule")
    );
}

#[test]
fn viewer_cannot_deploy_and_backend_is_untouched() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());

    let reply = router.handle_at(&Invocation::new(VIEWER, "deploy model x 1.0"), NOW);

    match reply {
        RouterReply::Denied {
            command, reason, ..
        } => {
            assert_eq!(command, "deploy");
            assert_eq!(
                reason,
                DenyReason::MissingRole {
                    required: vec![
                        RoleName::parse("ml_admin").expect("role"),
                        RoleName::parse("ml_engineer").expect("role"),
                    ]
                }
            );
        }
        other => panic!("expected denial, got {other:?}"),
    }
    assert!(backend.calls().is_empty());
}

#[test]
fn role_lookup_timeout_denies_even_viewer_commands() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(TimeoutSource), backend.clone());

    let reply = router.handle_at(&Invocation::new("q@company.com", "status models"), NOW);

    match reply {
        RouterReply::Denied { reason, .. } => assert_eq!(reason, DenyReason::LookupFailed),
        other => panic!("expected denial, got {other:?}"),
    }
    assert!(backend.calls().is_empty());
}

#[test]
fn always_granted_viewer_survives_lookup_failure() {
    let backend = RecordingBackend::succeeding();
    let router = build_router_with(
        Box::new(TimeoutSource),
        roles(&["viewer"]),
        backend.clone(),
        IntegrationsConfig::default(),
    );

    let status = router.handle_at(&Invocation::new("q@company.com", "status models"), NOW);
    assert!(status.dispatch_result().expect("dispatched").success);

    let deploy = router.handle_at(&Invocation::new("q@company.com", "deploy model a 1"), NOW);
    assert!(deploy.is_denied());
}

#[test]
fn blank_input_returns_help_without_role_lookup() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: static_source(),
        lookups: lookups.clone(),
    };
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(source), backend.clone());

    for text in ["", "   ", "<@U0BOT>"] {
        match router.handle_at(&Invocation::new(ADMIN, text), NOW) {
            RouterReply::Help(help) => assert!(!help.sections.is_empty()),
            other => panic!("expected help for {text:?}, got {other:?}"),
        }
    }
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
    assert!(backend.calls().is_empty());
}

#[test]
fn help_command_requires_viewer() {
    let router = build_router(Box::new(static_source()), RecordingBackend::succeeding());
    assert!(matches!(
        router.handle_at(&Invocation::new(VIEWER, "help"), NOW),
        RouterReply::Help(_)
    ));
    assert!(router
        .handle_at(&Invocation::new("stranger@company.com", "help"), NOW)
        .is_denied());
}

#[test]
fn unknown_command_needs_viewer_and_reports_unknown() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());

    let reply = router.handle_at(&Invocation::new(VIEWER, "reboot core-1"), NOW);
    let result = reply.dispatch_result().expect("dispatched");
    assert!(!result.success);
    assert!(result.message.contains("Unknown command"));
    assert!(result.message.contains("help"));

    match router.handle_at(&Invocation::new(ADMIN, "reboot core-1"), NOW) {
        RouterReply::Denied { reason, .. } => assert_eq!(reason, DenyReason::NotViewer),
        other => panic!("expected denial, got {other:?}"),
    }
    assert!(backend.calls().is_empty());
}

#[test]
fn confirmation_rechecks_roles_of_confirming_principal() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());
    let token = proposal_token(
        &router.handle_at(&Invocation::new(ADMIN, "deploy model fraud-detector 2.1"), NOW),
    );

    let reply = router.handle_at(&Invocation::confirming(VIEWER, &token), NOW + 1);

    assert!(reply.is_denied());
    assert!(backend.calls().is_empty());
}

#[test]
fn expired_or_forged_tokens_do_not_execute() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());
    let token = proposal_token(
        &router.handle_at(&Invocation::new(ADMIN, "deploy model fraud-detector 2.1"), NOW),
    );

    let expired = router.handle_at(&Invocation::confirming(ADMIN, &token), NOW + 901);
    let result = expired.dispatch_result().expect("dispatched");
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or_default().contains("expired"));

    let forged = format!("{}0", token);
    let result = router.handle_at(&Invocation::confirming(ADMIN, &forged), NOW);
    assert!(!result.dispatch_result().expect("dispatched").success);

    let other_router = Router::new(
        CommandCatalog::builtin().expect("catalog"),
        PermissionResolver::new(Box::new(static_source()), RoleSet::new()),
        Dispatcher::new(
            backend.clone(),
            ConfirmationSigner::new(b"different".to_vec(), 900),
            IntegrationsConfig::default(),
        ),
    );
    let result = other_router.handle_at(&Invocation::confirming(ADMIN, &token), NOW);
    assert!(!result.dispatch_result().expect("dispatched").success);

    assert!(backend.calls().is_empty());
}

#[test]
fn backend_failure_becomes_unsuccessful_result() {
    let backend = RecordingBackend::new(Box::new(|_| {
        Err(BackendError::Status {
            code: 503,
            message: "model registry unavailable".to_string(),
        })
    }));
    let router = build_router(Box::new(static_source()), backend.clone());

    let reply = router.handle_at(&Invocation::new(VIEWER, "status models fraud-detector"), NOW);

    let result = reply.dispatch_result().expect("dispatched");
    assert!(!result.success);
    assert!(!result.message.trim().is_empty());
    assert!(result
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("model registry unavailable"));
    assert_eq!(backend.calls()[0].0.target, "fraud-detector");
}

#[test]
fn backend_reported_failure_keeps_its_error_text() {
    let backend = RecordingBackend::new(Box::new(|_| {
        Ok(BackendResponse::failed("version 9.9 does not exist"))
    }));
    let router = build_router(Box::new(static_source()), backend);
    let token = proposal_token(&router.handle_at(
        &Invocation::new(ADMIN, "deploy model fraud-detector 9.9 production"),
        NOW,
    ));

    let reply = router.handle_at(&Invocation::confirming(ADMIN, &token), NOW);

    let result = reply.dispatch_result().expect("dispatched");
    assert!(!result.success);
    assert_eq!(result.message, "Failed to deploy fraud-detector");
    assert_eq!(result.error.as_deref(), Some("version 9.9 does not exist"));
}

#[test]
fn invalid_arguments_report_usage() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());

    let reply = router.handle_at(&Invocation::new(ADMIN, "deploy model fraud-detector"), NOW);

    let result = reply.dispatch_result().expect("dispatched");
    assert!(!result.success);
    assert!(result.message.contains("deploy model <name> <version> [environment]"));
    assert!(backend.calls().is_empty());
}

#[test]
fn investigation_runs_details_then_start() {
    let backend = RecordingBackend::succeeding();
    let router = build_router(Box::new(static_source()), backend.clone());

    let reply = router.handle_at(&Invocation::new(NETOPS, "investigate anom-7"), NOW);

    let result = reply.dispatch_result().expect("dispatched");
    assert!(result.success, "{result:?}");
    assert!(result.message.contains("inv-4"));
    assert!(result.message.contains("severity: high"));
    let actions: Vec<String> = backend
        .calls()
        .into_iter()
        .map(|(call, _)| call.action_type)
        .collect();
    assert_eq!(actions, vec!["anomaly_details", "start_investigation"]);
}

#[test]
fn investigation_of_unknown_anomaly_is_not_found() {
    let backend = RecordingBackend::new(Box::new(|call| match call.action_type.as_str() {
        "anomaly_details" => Err(BackendError::Status {
            code: 404,
            message: "no such anomaly".to_string(),
        }),
        _ => Ok(BackendResponse::ok()),
    }));
    let router = build_router(Box::new(static_source()), backend.clone());

    let reply = router.handle_at(&Invocation::new(NETOPS, "investigate anom-404"), NOW);

    let result = reply.dispatch_result().expect("dispatched");
    assert!(!result.success);
    assert!(result.message.contains("not found"));
    assert_eq!(backend.calls().len(), 1);
}

#[test]
fn dashboard_link_uses_grafana_integration() {
    let integrations = IntegrationsConfig {
        grafana: Some("https://grafana.example/".to_string()),
        mlflow: None,
    };
    let router = build_router_with(
        Box::new(static_source()),
        RoleSet::new(),
        RecordingBackend::succeeding(),
        integrations,
    );

    let reply = router.handle_at(&Invocation::new(VIEWER, "dashboard traffic"), NOW);
    let result = reply.dispatch_result().expect("dispatched");
    assert!(result.success);
    assert_eq!(
        result.payload.as_ref().expect("payload")["url"],
        "https://grafana.example/d/traffic"
    );

    let unconfigured = build_router(Box::new(static_source()), RecordingBackend::succeeding());
    let reply = unconfigured.handle_at(&Invocation::new(VIEWER, "dashboard traffic"), NOW);
    assert!(!reply.dispatch_result().expect("dispatched").success);
}

#[test]
fn invalid_principal_is_denied() {
    let router = build_router(Box::new(static_source()), RecordingBackend::succeeding());
    match router.handle_at(&Invocation::new("", "status models"), NOW) {
        RouterReply::Denied { reason, .. } => {
            assert!(matches!(reason, DenyReason::InvalidPrincipal { .. }))
        }
        other => panic!("expected denial, got {other:?}"),
    }
}

#[test]
fn reply_serializes_with_type_tag() {
    let router = build_router(Box::new(static_source()), RecordingBackend::succeeding());
    let reply = router.handle_at(&Invocation::new(VIEWER, "deploy model x 1.0"), NOW);
    let value = serde_json::to_value(&reply).expect("encode");
    assert_eq!(value["type"], "denied");
    assert_eq!(value["reason"]["kind"], "missing_role");
}
