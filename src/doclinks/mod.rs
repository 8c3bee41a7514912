pub mod report;
pub mod scan;

pub use report::{local_timestamp, render_report, REPORT_TITLE};
pub use scan::{
    classify_url, extract_links, BrokenLink, ExtractedLink, LinkChecker, LinkClass, LinkRecord,
    LinkReport, LinkWarning, WarningKind, DOC_EXTENSIONS,
};

#[derive(Debug, thiserror::Error)]
pub enum DoclinksError {
    #[error("failed to resolve scan directory {path}: {source}")]
    ResolveRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scan root {path} is not a directory")]
    NotADirectory { path: String },
    #[error("invalid link pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to write report {path}: {source}")]
    WriteReport {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
