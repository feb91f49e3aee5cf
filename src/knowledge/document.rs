use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Txt,
    Pdf,
}

impl DocumentKind {
    /// Upper-case badge used in listings and prompt context headers.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Txt => "TXT",
            DocumentKind::Pdf => "PDF",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A document whose text has been extracted and kept in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub content: String,
    pub upload_date: DateTime<Utc>,
    pub size: u64,
    pub pages: usize,
}

impl Document {
    pub fn new(name: String, kind: DocumentKind, content: String, size: u64, pages: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            kind,
            content,
            upload_date: Utc::now(),
            size,
            pages,
        }
    }

    /// One-line summary: `name [TYPE]  size • N pages`.
    pub fn summary_line(&self) -> String {
        let pages = if self.pages > 1 {
            format!(" • {} pages", self.pages)
        } else {
            String::new()
        };
        format!(
            "{} [{}]  {}{}",
            self.name,
            self.kind.label(),
            format_file_size(self.size),
            pages
        )
    }
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    if bytes < 1024 * 1024 {
        return format!("{:.1} KB", bytes as f64 / 1024.0);
    }
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}
