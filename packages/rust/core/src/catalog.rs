//! Catalog builder: pairs article documents with their summaries, orders
//! them by section priority, and marks section boundaries.
//!
//! Planning ([`plan_catalog`]) only looks at path strings; loading
//! ([`Catalog::load`]) opens every file through an [`ArticleLoader`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use masterdoc_docx::Document;
use masterdoc_shared::{AppConfig, ArticleMeta, MasterDocError, Result, RunWarning};

use crate::paths::{PathSchema, strip_extension};

/// One article before any file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub meta: ArticleMeta,
    pub document_path: PathBuf,
    pub summary_path: PathBuf,
    /// First entry of its section in catalog order.
    pub is_section_start: bool,
    /// Whether the parsed section appears in the priority list. Unlisted
    /// sections are filed under the catch-all label.
    pub recognized: bool,
}

/// The ordered catalog, paths and metadata only.
#[derive(Debug, Clone, Default)]
pub struct CatalogPlan {
    pub entries: Vec<PlannedEntry>,
    pub warnings: Vec<RunWarning>,
}

impl CatalogPlan {
    /// Distinct sections in catalog order.
    pub fn sections(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_section_start)
            .map(|e| e.meta.section.as_str())
            .collect()
    }
}

/// Build the ordered catalog from document and summary paths.
///
/// Fails with [`MasterDocError::InputMismatch`] when the lists cannot be
/// paired one-to-one by file stem, and with [`MasterDocError::InvalidPath`]
/// when a document path does not fit the path schema.
#[instrument(skip_all, fields(documents = documents.len(), summaries = summaries.len()))]
pub fn plan_catalog(
    documents: &[PathBuf],
    summaries: &[PathBuf],
    config: &AppConfig,
) -> Result<CatalogPlan> {
    if documents.len() != summaries.len() {
        return Err(MasterDocError::input_mismatch(format!(
            "{} documents but {} summaries",
            documents.len(),
            summaries.len()
        )));
    }

    let schema = PathSchema::from_config(&config.paths)?;
    let summary_for = pair_by_stem(documents, summaries, &schema, &config.paths.summary_suffix)?;

    let order = &config.sections.order;
    let catch_all = &config.sections.catch_all;
    let catch_all_rank = order
        .iter()
        .position(|s| s == catch_all)
        .unwrap_or(order.len());
    let mut keyed = Vec::with_capacity(documents.len());
    let mut warnings = Vec::new();

    for (index, document_path) in documents.iter().enumerate() {
        let mut meta = schema.parse(&document_path.to_string_lossy())?;
        let listed = order.iter().position(|s| *s == meta.section);
        if listed.is_none() {
            warn!(article = %meta.name, section = %meta.section, "section not in priority list");
            warnings.push(RunWarning::UnknownSection {
                article: meta.name.clone(),
                section: std::mem::replace(&mut meta.section, catch_all.clone()),
            });
        }
        let rank = listed.unwrap_or(catch_all_rank);
        let summary_path = summaries[summary_for[index]].clone();
        keyed.push((
            (rank, index),
            PlannedEntry {
                meta,
                document_path: document_path.clone(),
                summary_path,
                is_section_start: false,
                recognized: listed.is_some(),
            },
        ));
    }

    keyed.sort_by_key(|(key, _)| *key);

    let mut entries: Vec<PlannedEntry> = keyed.into_iter().map(|(_, entry)| entry).collect();
    let mut previous: Option<String> = None;
    for entry in &mut entries {
        entry.is_section_start = previous.as_deref() != Some(entry.meta.section.as_str());
        previous = Some(entry.meta.section.clone());
    }

    let plan = CatalogPlan { entries, warnings };
    debug!(
        entries = plan.entries.len(),
        sections = plan.sections().len(),
        "catalog planned"
    );
    Ok(plan)
}

/// For each document index, the index of its summary.
fn pair_by_stem(
    documents: &[PathBuf],
    summaries: &[PathBuf],
    schema: &PathSchema,
    summary_suffix: &str,
) -> Result<Vec<usize>> {
    let document_stems = stems(documents, schema, |name| name)?;
    let summary_stems = stems(summaries, schema, |name| {
        name.strip_suffix(summary_suffix).unwrap_or(name)
    })?;

    let mut problems = Vec::new();
    for (side, table) in [("document", &document_stems), ("summary", &summary_stems)] {
        for (stem, indices) in table {
            if indices.len() > 1 {
                problems.push(format!("{} {side} files share the stem {stem:?}", indices.len()));
            }
        }
    }

    let unmatched_documents: Vec<&str> = document_stems
        .keys()
        .filter(|stem| !summary_stems.contains_key(*stem))
        .map(String::as_str)
        .collect();
    if !unmatched_documents.is_empty() {
        problems.push(format!("documents without a summary: {unmatched_documents:?}"));
    }
    let unmatched_summaries: Vec<&str> = summary_stems
        .keys()
        .filter(|stem| !document_stems.contains_key(*stem))
        .map(String::as_str)
        .collect();
    if !unmatched_summaries.is_empty() {
        problems.push(format!("summaries without a document: {unmatched_summaries:?}"));
    }

    if !problems.is_empty() {
        return Err(MasterDocError::input_mismatch(problems.join("; ")));
    }

    let mut pairing = vec![0; documents.len()];
    for (stem, doc_indices) in &document_stems {
        if let (Some(&doc), Some(&summary)) = (
            doc_indices.first(),
            summary_stems.get(stem).and_then(|s| s.first()),
        ) {
            pairing[doc] = summary;
        }
    }
    Ok(pairing)
}

fn stems<F>(paths: &[PathBuf], schema: &PathSchema, trim: F) -> Result<BTreeMap<String, Vec<usize>>>
where
    F: Fn(&str) -> &str,
{
    let mut out: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, path) in paths.iter().enumerate() {
        let text = path.to_string_lossy();
        let file_name = schema
            .file_name(&text)
            .ok_or_else(|| MasterDocError::invalid_path(text.to_string(), "no file name"))?;
        let stem = trim(strip_extension(file_name)).to_string();
        out.entry(stem).or_default().push(index);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Source of article documents and summary texts.
pub trait ArticleLoader {
    fn load_document(&self, path: &Path) -> Result<Document>;
    fn load_summary(&self, path: &Path) -> Result<String>;
}

/// Loads articles from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl ArticleLoader for FsLoader {
    fn load_document(&self, path: &Path) -> Result<Document> {
        Document::open(path).map_err(|e| MasterDocError::UnreadableDocument {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn load_summary(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|source| MasterDocError::UnreadableSummary {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One loaded article.
#[derive(Debug, Clone)]
pub struct ArticleEntry {
    pub meta: ArticleMeta,
    pub document_path: PathBuf,
    pub document: Document,
    /// The summary file's contents, verbatim.
    pub summary_text: String,
    pub is_section_start: bool,
}

/// The loaded catalog, in final order.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub entries: Vec<ArticleEntry>,
    pub warnings: Vec<RunWarning>,
}

impl Catalog {
    /// Open every planned document and summary. The first failure aborts.
    #[instrument(skip_all, fields(entries = plan.entries.len()))]
    pub fn load(plan: CatalogPlan, loader: &dyn ArticleLoader) -> Result<Self> {
        let CatalogPlan {
            entries: planned,
            mut warnings,
        } = plan;

        let mut entries = Vec::with_capacity(planned.len());
        for entry in planned {
            let document = loader.load_document(&entry.document_path)?;
            let summary_text = loader.load_summary(&entry.summary_path)?;

            if summary_repeats_title(&summary_text, &entry.meta.name) {
                warn!(article = %entry.meta.name, "summary starts with the article title");
                warnings.push(RunWarning::SummaryRepeatsTitle {
                    article: entry.meta.name.clone(),
                });
            }

            entries.push(ArticleEntry {
                meta: entry.meta,
                document_path: entry.document_path,
                document,
                summary_text,
                is_section_start: entry.is_section_start,
            });
        }

        debug!(entries = entries.len(), warnings = warnings.len(), "catalog loaded");
        Ok(Self { entries, warnings })
    }
}

/// Whether the first non-empty line of `summary` is the article title.
pub fn summary_repeats_title(summary: &str, article_name: &str) -> bool {
    summary
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line == article_name.trim())
}
