use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "CHATOPS_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

static INSTALLED: OnceLock<()> = OnceLock::new();

pub fn init_tracing(filter_override: Option<&str>) {
    INSTALLED.get_or_init(|| {
        let filter = filter_override
            .map(EnvFilter::new)
            .or_else(|| EnvFilter::try_from_env(LOG_FILTER_ENV).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));
        // Replies go to stdout, so logs must stay on stderr.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

/// Shortens an opaque value for log fields so tokens never appear whole.
pub fn redact_tail(value: &str) -> String {
    const VISIBLE: usize = 8;
    if value.len() <= VISIBLE {
        return "[redacted]".to_string();
    }
    let tail: String = value
        .chars()
        .rev()
        .take(VISIBLE)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing(Some("debug"));
        init_tracing(Some("trace"));
    }

    #[test]
    fn redact_tail_keeps_only_suffix() {
        assert_eq!(redact_tail("short"), "[redacted]");
        assert_eq!(redact_tail("abcdefghijklmnop"), "…ijklmnop");
    }
}
