use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "chatops-router")]
#[command(about = "Role-gated chat command router for ML and network operations")]
#[command(version)]
pub struct Cli {
    /// Log filter directive, overrides CHATOPS_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve JSON-line invocations from stdin, replying on stdout
    Serve(ServeArgs),
    /// Route a single message and print the reply as JSON
    Invoke(InvokeArgs),
    /// Validate the configuration and command catalog
    CheckConfig(ConfigArgs),
    /// Scan documentation files for broken internal links
    CheckLinks(CheckLinksArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Settings file (defaults to /etc/chatops/config.yaml)
    #[arg(short, long, env = "CHATOPS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Override `runtime.max_concurrency`
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(long)]
    pub principal: String,

    #[arg(long)]
    pub channel: Option<String>,

    /// Confirmation token from an earlier proposal
    #[arg(long)]
    pub confirm: Option<String>,

    /// Message text, e.g. `status models`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub text: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CheckLinksArgs {
    /// Directory to scan
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with status 1 when broken links are found
    #[arg(long)]
    pub exit_code: bool,
}

impl ConfigArgs {
    pub fn resolve_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::default_config_path)
    }
}
