use super::{AppError, CheckLinksArgs, Cli, Command, ConfigArgs, InvokeArgs, ServeArgs};
use crate::config::{load_config, LoadedConfig};
use crate::doclinks::{local_timestamp, render_report, DoclinksError, LinkChecker};
use crate::router::{Invocation, Router};
use crate::runtime::serve_json_lines;
use std::fs;
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Option<String>,
    pub exit_code: i32,
}

impl CommandOutput {
    fn text(stdout: String) -> Self {
        Self {
            stdout: Some(stdout),
            exit_code: 0,
        }
    }
}

pub fn run(cli: Cli) -> Result<CommandOutput, AppError> {
    match cli.command {
        Command::Serve(args) => serve(&args),
        Command::Invoke(args) => invoke(&args),
        Command::CheckConfig(args) => check_config(&args),
        Command::CheckLinks(args) => check_links(&args),
    }
}

fn load(args: &ConfigArgs) -> Result<LoadedConfig, AppError> {
    let path = args.resolve_path();
    load_config(&path).map_err(AppError::from)
}

fn serve(args: &ServeArgs) -> Result<CommandOutput, AppError> {
    let loaded = load(&args.config)?;
    let max_concurrency = args
        .max_concurrency
        .unwrap_or(loaded.settings.runtime.max_concurrency);
    let router = Arc::new(Router::from_config(&loaded)?);
    tracing::info!(max_concurrency, "serving invocations on stdin");
    let stdin = io::BufReader::new(io::stdin());
    serve_json_lines(stdin, io::stdout().lock(), router, max_concurrency)?;
    Ok(CommandOutput::default())
}

fn invoke(args: &InvokeArgs) -> Result<CommandOutput, AppError> {
    let loaded = load(&args.config)?;
    let router = Router::from_config(&loaded)?;
    let mut invocation = Invocation::new(&args.principal, &args.text.join(" "));
    invocation.channel = args.channel.clone();
    invocation.confirmation = args.confirm.clone();
    let reply = router.handle(&invocation);
    Ok(CommandOutput::text(serde_json::to_string_pretty(&reply)?))
}

fn check_config(args: &ConfigArgs) -> Result<CommandOutput, AppError> {
    let path = args.resolve_path();
    let loaded = load_config(&path)?;
    let mut lines = vec![format!("configuration ok: {}", path.display())];
    lines.push(format!("commands: {}", loaded.catalog.len()));
    for entry in loaded.catalog.entries() {
        let roles: Vec<&str> = entry.required_roles.iter().map(|r| r.as_str()).collect();
        lines.push(format!(
            "  {} -> {} [{}]{}",
            entry.spec.name,
            entry.handler,
            roles.join(", "),
            if entry.confirm { " (confirm)" } else { "" }
        ));
    }
    Ok(CommandOutput::text(lines.join("\n")))
}

fn check_links(args: &CheckLinksArgs) -> Result<CommandOutput, AppError> {
    let checker = LinkChecker::new(&args.directory)?;
    let report = checker.scan();
    let rendered = render_report(&report, &local_timestamp());

    let mut lines = Vec::new();
    if !args.quiet {
        lines.push(format!(
            "Found {} documentation files to validate...",
            report.files_scanned
        ));
    }
    match &args.output {
        Some(path) => {
            fs::write(path, &rendered).map_err(|source| DoclinksError::WriteReport {
                path: path.display().to_string(),
                source,
            })?;
            if !args.quiet {
                lines.push(format!("Report written to: {}", path.display()));
            }
        }
        None if !args.quiet => lines.push(rendered),
        None => {}
    }

    let broken = report.broken.len();
    if !args.quiet {
        lines.push(String::new());
        lines.push("=".repeat(50));
        lines.push(format!("Validation Complete: {broken} broken links found"));
        if broken > 0 {
            lines.push("❌ CRITICAL: Fix broken links immediately".to_string());
        } else {
            lines.push("✅ SUCCESS: All links are valid".to_string());
        }
    }

    Ok(CommandOutput {
        stdout: (!lines.is_empty()).then(|| lines.join("\n")),
        exit_code: if args.exit_code && broken > 0 { 1 } else { 0 },
    })
}
