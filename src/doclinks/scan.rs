use super::DoclinksError;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DOC_EXTENSIONS: [&str; 3] = ["md", "txt", "rst"];

const INLINE_LINK_PATTERN: &str = r"\[([^\]]*)\]\(([^)]+)\)";
const REFERENCE_LINK_PATTERN: &str = r"\[([^\]]*)\]:\s*(.+)";
const SKIPPED_SCHEMES: [&str; 3] = ["mailto:", "tel:", "javascript:"];
const EXTERNAL_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub text: String,
    pub url: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClass {
    Skipped,
    External,
    /// Same-document anchor or empty target.
    Anchor,
    Internal(String),
}

pub fn classify_url(url: &str) -> LinkClass {
    if SKIPPED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return LinkClass::Skipped;
    }
    if EXTERNAL_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return LinkClass::External;
    }
    let path = url.split('#').next().unwrap_or_default();
    if path.is_empty() {
        LinkClass::Anchor
    } else {
        LinkClass::Internal(path.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub file: String,
    pub text: String,
    pub url: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    #[serde(flatten)]
    pub link: LinkRecord,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ExternalLink,
    FileError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkWarning {
    pub kind: WarningKind,
    pub file: String,
    pub line: Option<usize>,
    pub url: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub files_scanned: usize,
    pub valid: Vec<LinkRecord>,
    pub broken: Vec<BrokenLink>,
    pub warnings: Vec<LinkWarning>,
}

impl LinkReport {
    pub fn has_broken_links(&self) -> bool {
        !self.broken.is_empty()
    }

    pub fn external_warnings(&self) -> impl Iterator<Item = &LinkWarning> {
        self.warnings
            .iter()
            .filter(|warning| warning.kind == WarningKind::ExternalLink)
    }

    pub fn other_warnings(&self) -> impl Iterator<Item = &LinkWarning> {
        self.warnings
            .iter()
            .filter(|warning| warning.kind != WarningKind::ExternalLink)
    }
}

#[derive(Debug, Clone)]
pub struct LinkChecker {
    root: PathBuf,
    inline: Regex,
    reference: Regex,
}

impl LinkChecker {
    pub fn new(root: &Path) -> Result<Self, DoclinksError> {
        let root = fs::canonicalize(root).map_err(|source| DoclinksError::ResolveRoot {
            path: root.display().to_string(),
            source,
        })?;
        if !root.is_dir() {
            return Err(DoclinksError::NotADirectory {
                path: root.display().to_string(),
            });
        }
        Ok(Self {
            root,
            inline: Regex::new(INLINE_LINK_PATTERN)?,
            reference: Regex::new(REFERENCE_LINK_PATTERN)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find_documents(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!("skipping unreadable directory entry: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_document(path))
            .collect()
    }

    pub fn scan(&self) -> LinkReport {
        let documents = self.find_documents();
        tracing::info!(
            root = %self.root.display(),
            files = documents.len(),
            "scanning documentation links"
        );
        let mut report = LinkReport {
            files_scanned: documents.len(),
            ..LinkReport::default()
        };
        for path in &documents {
            self.check_file(path, &mut report);
        }
        report
    }

    fn check_file(&self, path: &Path, report: &mut LinkReport) {
        let file = self.display_path(path);
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                report.warnings.push(LinkWarning {
                    kind: WarningKind::FileError,
                    file,
                    line: None,
                    url: None,
                    message: format!("Error reading file: {err}"),
                });
                return;
            }
        };

        for link in extract_with(&self.inline, &self.reference, &content) {
            let record = LinkRecord {
                file: file.clone(),
                text: link.text,
                url: link.url,
                line: link.line,
            };
            match classify_url(&record.url) {
                LinkClass::Skipped => {}
                LinkClass::External => report.warnings.push(LinkWarning {
                    kind: WarningKind::ExternalLink,
                    file: record.file,
                    line: Some(record.line),
                    url: Some(record.url),
                    message: "External link - manual verification recommended".to_string(),
                }),
                LinkClass::Anchor => report.valid.push(record),
                LinkClass::Internal(target) => {
                    if internal_target_exists(path, &target) {
                        report.valid.push(record);
                    } else {
                        report.broken.push(BrokenLink {
                            link: record,
                            message: "Internal link target not found".to_string(),
                        });
                    }
                }
            }
        }
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOC_EXTENSIONS.contains(&ext))
}

fn internal_target_exists(document: &Path, target: &str) -> bool {
    let base = document.parent().unwrap_or(document);
    base.join(target).exists()
}

/// Inline `[text](url)` and reference `[text]: url` links with 1-based lines.
pub fn extract_links(content: &str) -> Result<Vec<ExtractedLink>, DoclinksError> {
    let inline = Regex::new(INLINE_LINK_PATTERN)?;
    let reference = Regex::new(REFERENCE_LINK_PATTERN)?;
    Ok(extract_with(&inline, &reference, content))
}

fn extract_with(inline: &Regex, reference: &Regex, content: &str) -> Vec<ExtractedLink> {
    let mut links = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        for (pattern, trim) in [(inline, false), (reference, true)] {
            for captures in pattern.captures_iter(line) {
                let text = captures.get(1).map_or("", |m| m.as_str());
                let url = captures.get(2).map_or("", |m| m.as_str());
                let url = if trim { url.trim() } else { url };
                links.push(ExtractedLink {
                    text: text.to_string(),
                    url: url.to_string(),
                    line: idx + 1,
                });
            }
        }
    }
    links
}
