//! Core domain types for masterdoc runs.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SegmentRole
// ---------------------------------------------------------------------------

/// Meaning of one path segment in the configured path schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRole {
    /// The article file itself (must be the last role).
    Article,
    /// The section (category) directory.
    Section,
    /// The issue month directory.
    Month,
    /// A segment that carries no metadata.
    Ignore,
}

// ---------------------------------------------------------------------------
// ArticleMeta
// ---------------------------------------------------------------------------

/// Metadata derived from an article document path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMeta {
    /// File name without its extension.
    pub name: String,
    /// Section label taken from the path.
    pub section: String,
    /// Month label, when the path is deep enough to carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

// ---------------------------------------------------------------------------
// RunWarning
// ---------------------------------------------------------------------------

/// A non-fatal condition noticed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// The article's section is not in the priority list; the article is
    /// filed under the catch-all section.
    UnknownSection { article: String, section: String },
    /// The summary's first line repeats the article title; it was kept.
    SummaryRepeatsTitle { article: String },
    /// Footnote, endnote, or comment markers were removed from the article
    /// body; the note text itself is not carried into the master document.
    NotesDropped { article: String, count: usize },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSection { article, section } => {
                write!(f, "article {article:?} has unrecognized section {section:?}")
            }
            Self::SummaryRepeatsTitle { article } => {
                write!(f, "summary of {article:?} starts with the article title")
            }
            Self::NotesDropped { article, count } => {
                write!(f, "{count} footnote, endnote, or comment marker(s) dropped from {article:?}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// One catalog entry as recorded in the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    pub section_start: bool,
    pub document_path: PathBuf,
}

/// Summary of a completed master document build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Where the master document was written.
    pub output_path: PathBuf,
    /// SHA-256 of the written file (hex).
    pub sha256: String,
    /// Size of the written file in bytes.
    pub size_bytes: usize,
    /// Number of distinct sections in the output.
    pub section_count: usize,
    /// Entries in final catalog order.
    pub entries: Vec<ReportEntry>,
    /// Non-fatal warnings raised during the run.
    #[serde(default)]
    pub warnings: Vec<RunWarning>,
    /// When the build finished.
    pub generated_at: DateTime<Utc>,
    /// Wall-clock duration of the build in milliseconds.
    pub elapsed_ms: u64,
}
