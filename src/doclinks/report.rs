use super::LinkReport;
use std::collections::BTreeMap;

pub const REPORT_TITLE: &str = "# Documentation Link Validation Report";
const EXTERNAL_PREVIEW_LIMIT: usize = 10;

pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn render_report(report: &LinkReport, timestamp: &str) -> String {
    let mut out = vec![
        REPORT_TITLE.to_string(),
        format!("Generated: {timestamp}"),
        String::new(),
        "## Summary".to_string(),
        format!("- **Files Scanned**: {}", report.files_scanned),
        format!("- **Valid Links**: {}", report.valid.len()),
        format!("- **Broken Links**: {}", report.broken.len()),
        format!("- **Warnings**: {}", report.warnings.len()),
        String::new(),
    ];

    if report.has_broken_links() {
        out.push("❌ **STATUS**: Broken links found - immediate attention required".to_string());
    } else {
        out.push("✅ **STATUS**: All internal links are valid!".to_string());
    }
    out.push(String::new());

    if report.has_broken_links() {
        out.push("## 🚨 Broken Links (CRITICAL)".to_string());
        out.push(String::new());
        for broken in &report.broken {
            out.push(format!("**File**: `{}`", broken.link.file));
            out.push(format!("**Line**: {}", broken.link.line));
            out.push(format!("**Text**: {}", broken.link.text));
            out.push(format!("**URL**: `{}`", broken.link.url));
            out.push(format!("**Issue**: {}", broken.message));
            out.push(String::new());
        }
    }

    if !report.warnings.is_empty() {
        out.push("## ⚠️ Warnings".to_string());
        out.push(String::new());

        let external: Vec<_> = report.external_warnings().collect();
        if !external.is_empty() {
            out.push("### External Links (Manual Verification Recommended)".to_string());
            for warning in external.iter().take(EXTERNAL_PREVIEW_LIMIT) {
                out.push(format!(
                    "- `{}:{}` - {}",
                    warning.file,
                    warning.line.unwrap_or_default(),
                    warning.url.as_deref().unwrap_or_default()
                ));
            }
            if external.len() > EXTERNAL_PREVIEW_LIMIT {
                out.push(format!(
                    "- ... and {} more external links",
                    external.len() - EXTERNAL_PREVIEW_LIMIT
                ));
            }
            out.push(String::new());
        }

        let other: Vec<_> = report.other_warnings().collect();
        if !other.is_empty() {
            out.push("### Other Warnings".to_string());
            for warning in other {
                out.push(format!("- `{}` - {}", warning.file, warning.message));
            }
            out.push(String::new());
        }
    }

    if report.has_broken_links() {
        out.push("## Broken Links by File".to_string());
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for broken in &report.broken {
            *counts.entry(broken.link.file.as_str()).or_default() += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        for (file, count) in ranked {
            let plural = if count > 1 { "s" } else { "" };
            out.push(format!("- `{file}`: {count} broken link{plural}"));
        }
        out.push(String::new());
    }

    out.join("\n")
}
