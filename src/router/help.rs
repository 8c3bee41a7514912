use crate::config::CommandCatalog;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpLine {
    pub usage: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpSection {
    pub category: String,
    pub commands: Vec<HelpLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpText {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub sections: Vec<HelpSection>,
}

pub const HELP_TITLE: &str = "AI Network Intelligence - Available Commands";

impl HelpText {
    pub fn from_catalog(catalog: &CommandCatalog) -> Self {
        let mut sections: Vec<HelpSection> = Vec::new();
        for entry in catalog.entries() {
            let line = HelpLine {
                usage: entry.usage(),
                description: entry.spec.description.clone(),
            };
            match sections
                .iter_mut()
                .find(|section| section.category == entry.spec.category)
            {
                Some(section) => section.commands.push(line),
                None => sections.push(HelpSection {
                    category: entry.spec.category.clone(),
                    commands: vec![line],
                }),
            }
        }
        Self {
            title: HELP_TITLE.to_string(),
            notice: None,
            sections,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn render_text(&self) -> String {
        let mut out = vec![self.title.clone()];
        if let Some(notice) = &self.notice {
            out.push(notice.clone());
        }
        for section in &self.sections {
            out.push(String::new());
            out.push(format!("{}:", section.category));
            for line in &section.commands {
                if line.description.is_empty() {
                    out.push(format!("  {}", line.usage));
                } else {
                    out.push(format!("  {} - {}", line.usage, line.description));
                }
            }
        }
        out.join("\n")
    }
}
