//! End-to-end `build` pipeline: inputs → catalog → decorate → compose → landscape → file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use masterdoc_shared::{
    AppConfig, MasterDocError, ReportEntry, Result, RunReport, RunWarning, write_atomic,
};

use crate::banners::BannerSet;
use crate::catalog::{ArticleLoader, Catalog, FsLoader, plan_catalog};
use crate::composer;
use crate::decorator::Decorator;
use crate::orientation;
use crate::styles::StyleSet;
use crate::toc;

/// Configuration for one `build_master` run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Article documents, in any order.
    pub documents: Vec<PathBuf>,
    /// One summary per document, paired by file stem.
    pub summaries: Vec<PathBuf>,
    /// Where the master document is written.
    pub output_path: PathBuf,
    /// Base directory for relative banner paths.
    pub banner_dir: PathBuf,
    pub config: AppConfig,
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildResult {
    pub report: RunReport,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each article is decorated.
    fn article_decorated(&self, name: &str, current: usize, total: usize);
    /// Called after each document is appended to the master.
    fn document_appended(&self, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn article_decorated(&self, _name: &str, _current: usize, _total: usize) {}
    fn document_appended(&self, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Build the master document from files on disk.
pub fn build_master(config: &BuildConfig, progress: &dyn ProgressReporter) -> Result<BuildResult> {
    progress.phase("Loading banners");
    let banners = BannerSet::load(&config.config.banners, &config.banner_dir)?;
    build_master_with(config, &FsLoader, &banners, progress)
}

/// Run the full pipeline with an explicit article loader and banner set.
///
/// 1. Plan and load the catalog
/// 2. Build the table of contents document
/// 3. Decorate every article
/// 4. Compose the table of contents and articles in catalog order
/// 5. Force landscape page setup
/// 6. Write the output atomically and hash it
///
/// Nothing is written unless every step succeeds.
#[instrument(skip_all, fields(documents = config.documents.len(), output = %config.output_path.display()))]
pub fn build_master_with(
    config: &BuildConfig,
    loader: &dyn ArticleLoader,
    banners: &BannerSet,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();
    let app = &config.config;

    // --- Phase 1: Catalog ---
    progress.phase("Planning catalog");
    let plan = plan_catalog(&config.documents, &config.summaries, app)?;
    progress.phase("Reading articles");
    let catalog = Catalog::load(plan, loader)?;
    for warning in &catalog.warnings {
        debug!(%warning, "run warning");
    }

    // --- Phase 2: Table of contents ---
    progress.phase("Building table of contents");
    let styles = StyleSet::from_config(&app.typography);
    let toc_document = toc::build_toc_document(&styles, &app.output)?;

    // --- Phase 3: Decorate ---
    progress.phase("Decorating articles");
    let decorator = Decorator::new(&styles, banners, &app.sections);
    let total = catalog.entries.len();
    let mut report_entries = Vec::with_capacity(total);
    let mut documents = Vec::with_capacity(total + 1);
    documents.push(toc_document);

    let mut warnings = catalog.warnings;
    for (i, entry) in catalog.entries.into_iter().enumerate() {
        let mut document = entry.document;
        let notes = document.note_marks()?;
        if notes > 0 {
            warn!(article = %entry.meta.name, count = notes, "notes will be dropped");
            warnings.push(RunWarning::NotesDropped {
                article: entry.meta.name.clone(),
                count: notes,
            });
        }
        decorator.decorate(
            &mut document,
            &entry.summary_text,
            &entry.meta.section,
            &entry.meta.name,
            entry.is_section_start,
        )?;
        progress.article_decorated(&entry.meta.name, i + 1, total);

        report_entries.push(ReportEntry {
            name: entry.meta.name,
            section: entry.meta.section,
            month: entry.meta.month,
            section_start: entry.is_section_start,
            document_path: entry.document_path,
        });
        documents.push(document);
    }

    // --- Phase 4: Compose ---
    progress.phase("Composing master document");
    let (mut master, _totals) =
        composer::compose(documents, app.output.style_conflict, |current, total| {
            progress.document_appended(current, total)
        })?;

    // --- Phase 5: Landscape ---
    if app.output.landscape {
        progress.phase("Applying landscape orientation");
        orientation::apply(&mut master)?;
    }

    // --- Phase 6: Write ---
    progress.phase("Writing output");
    let bytes = master.to_bytes()?;
    write_atomic(&config.output_path, &bytes)?;

    let sha256 = format!("{:x}", Sha256::digest(&bytes));
    let section_count = report_entries
        .iter()
        .map(|e| e.section.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    let elapsed = start.elapsed();
    let report = RunReport {
        output_path: config.output_path.clone(),
        sha256,
        size_bytes: bytes.len(),
        section_count,
        entries: report_entries,
        warnings,
        generated_at: Utc::now(),
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    };

    if !report.warnings.is_empty() {
        warn!(count = report.warnings.len(), "build finished with warnings");
    }
    info!(
        articles = report.entries.len(),
        sections = report.section_count,
        size = report.size_bytes,
        elapsed_ms = report.elapsed_ms,
        "master document written"
    );

    let result = BuildResult { report, elapsed };
    progress.done(&result);
    Ok(result)
}

/// Write the run report as pretty JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        MasterDocError::validation(format!("JSON serialization failed: {e}"))
    })?;
    write_atomic(path, json.as_bytes())?;
    debug!(path = %path.display(), "wrote run report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::banners::BannerImage;
    use crate::decorator::{ABSTRACT_LABEL, ARTICLE_LABEL_TEXT};
    use crate::styles::{ARTICLE_HEADING, SECTION_HEADING};
    use crate::toc::TOC_INSTRUCTION;
    use masterdoc_docx::{Block, Document, ParagraphBuilder};
    use masterdoc_shared::{BannerConfig, RunWarning};

    struct MemoryLoader {
        bodies: HashMap<PathBuf, Vec<String>>,
        summaries: HashMap<PathBuf, String>,
    }

    impl MemoryLoader {
        fn new(articles: &[(&str, &[&str], &str, &str)]) -> Self {
            let mut bodies = HashMap::new();
            let mut summaries = HashMap::new();
            for (doc, body, summary_path, summary) in articles {
                bodies.insert(
                    PathBuf::from(doc),
                    body.iter().map(|s| s.to_string()).collect(),
                );
                summaries.insert(PathBuf::from(summary_path), summary.to_string());
            }
            Self { bodies, summaries }
        }
    }

    impl ArticleLoader for MemoryLoader {
        fn load_document(&self, path: &Path) -> Result<Document> {
            let body = self.bodies.get(path).ok_or_else(|| MasterDocError::UnreadableDocument {
                path: path.to_path_buf(),
                message: "not found".into(),
            })?;
            let mut doc = Document::blank()?;
            for text in body {
                // Raw paragraphs pass through as written.
                let block = if text.starts_with("<w:p") {
                    Block::from_xml(text.as_str())
                } else {
                    ParagraphBuilder::new().style("Title").text(text.as_str()).build()
                };
                doc.push_block(block);
            }
            Ok(doc)
        }

        fn load_summary(&self, path: &Path) -> Result<String> {
            self.summaries.get(path).cloned().ok_or_else(|| MasterDocError::UnreadableSummary {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: RefCell<Vec<String>>,
        decorated: RefCell<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.borrow_mut().push(name.to_string());
        }
        fn article_decorated(&self, name: &str, _current: usize, _total: usize) {
            self.decorated.borrow_mut().push(name.to_string());
        }
        fn document_appended(&self, _current: usize, _total: usize) {}
        fn done(&self, _result: &BuildResult) {}
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("masterdoc-pipeline-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn banners() -> BannerSet {
        let image = |name: &str, byte: u8| BannerImage {
            bytes: vec![byte],
            extension: "png".into(),
            source: PathBuf::from(format!("{name}.png")),
        };
        BannerSet::from_images(
            image("default", 0),
            BTreeMap::from([
                ("Content + Training".to_string(), image("training", 1)),
                ("Partner Update".to_string(), image("partner", 2)),
            ]),
            &BannerConfig::default(),
        )
    }

    fn build_config(dir: &Path, documents: &[&str], summaries: &[&str], order: &[&str]) -> BuildConfig {
        let mut config = AppConfig::default();
        config.sections.order = order.iter().map(|s| s.to_string()).collect();
        BuildConfig {
            documents: documents.iter().map(PathBuf::from).collect(),
            summaries: summaries.iter().map(PathBuf::from).collect(),
            output_path: dir.join("out").join("master_doc.docx"),
            banner_dir: dir.to_path_buf(),
            config,
        }
    }

    /// Paragraph texts of the output; fields, banners, and page breaks as markers.
    fn outline(doc: &Document) -> Vec<String> {
        doc.blocks()
            .iter()
            .map(|b| {
                if let Some(instr) = b.field_instruction().unwrap() {
                    return format!("[{instr}]");
                }
                if !b.image_rel_ids().unwrap().is_empty() {
                    return "[banner]".to_string();
                }
                if b.xml().contains("w:type=\"page\"") {
                    return "[page]".to_string();
                }
                b.text().unwrap()
            })
            .collect()
    }

    #[test]
    fn two_sections_produce_the_expected_reading_order() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[
            ("Content + Training/a.docx", &["body-of-a"], "a_summary.txt", "sum a"),
            ("Partner Update/b.docx", &["body-of-b"], "b_summary.txt", "sum b"),
        ]);
        let config = build_config(
            &dir,
            &["Content + Training/a.docx", "Partner Update/b.docx"],
            &["a_summary.txt", "b_summary.txt"],
            &["Content + Training", "Partner Update", "nocat"],
        );
        let progress = RecordingProgress::default();

        let result = build_master_with(&config, &loader, &banners(), &progress).unwrap();
        let master = Document::open(&config.output_path).unwrap();

        let toc_marker = format!("[{TOC_INSTRUCTION}]");
        let expected: Vec<String> = [
            toc_marker.as_str(),
            "[page]",
            "Content + Training",
            "[banner]",
            "a",
            ABSTRACT_LABEL,
            "sum a",
            ARTICLE_LABEL_TEXT,
            "body-of-a",
            "Partner Update",
            "[banner]",
            "b",
            ABSTRACT_LABEL,
            "sum b",
            ARTICLE_LABEL_TEXT,
            "body-of-b",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(outline(&master), expected);

        let blocks = master.blocks();
        assert_eq!(blocks[2].style_id().unwrap().as_deref(), Some(SECTION_HEADING));
        assert_eq!(blocks[4].style_id().unwrap().as_deref(), Some(ARTICLE_HEADING));
        assert!(master.section_properties().unwrap().contains("w:orient=\"landscape\""));

        let report = &result.report;
        assert_eq!(report.section_count, 2);
        assert_eq!(report.entries.len(), 2);
        assert!(report.entries.iter().all(|e| e.section_start));
        assert_eq!(report.sha256.len(), 64);
        assert_eq!(
            report.size_bytes as u64,
            std::fs::metadata(&config.output_path).unwrap().len()
        );
        assert_eq!(*progress.decorated.borrow(), vec!["a", "b"]);
        assert!(progress.phases.borrow().iter().any(|p| p == "Writing output"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn shared_section_gets_one_heading_and_banner() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[
            ("News/a.docx", &["A"], "a_summary.txt", "sa"),
            ("News/b.docx", &["B"], "b_summary.txt", "sb"),
        ]);
        let config = build_config(
            &dir,
            &["News/a.docx", "News/b.docx"],
            &["a_summary.txt", "b_summary.txt"],
            &["News"],
        );

        let result = build_master_with(&config, &loader, &banners(), &SilentProgress).unwrap();
        let master = Document::open(&config.output_path).unwrap();
        let outline = outline(&master);

        assert_eq!(outline.iter().filter(|t| *t == "[banner]").count(), 1);
        assert_eq!(outline.iter().filter(|t| *t == "News").count(), 1);
        assert_eq!(result.report.section_count, 1);
        assert!(result.report.entries[0].section_start);
        assert!(!result.report.entries[1].section_start);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unlisted_section_sorts_last_with_default_banner() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[
            ("Misc/z.docx", &["Z"], "z_summary.txt", "sz"),
            ("Partner Update/p.docx", &["P"], "p_summary.txt", "sp"),
        ]);
        let config = build_config(
            &dir,
            &["Misc/z.docx", "Partner Update/p.docx"],
            &["z_summary.txt", "p_summary.txt"],
            &["Content + Training", "Partner Update"],
        );

        let result = build_master_with(&config, &loader, &banners(), &SilentProgress).unwrap();
        let names: Vec<_> = result.report.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["p", "z"]);
        assert_eq!(
            result.report.warnings,
            vec![RunWarning::UnknownSection {
                article: "z".into(),
                section: "Misc".into()
            }]
        );

        let master = Document::open(&config.output_path).unwrap();
        let banner_blocks: Vec<_> = master
            .blocks()
            .iter()
            .filter(|b| !b.image_rel_ids().unwrap().is_empty())
            .collect();
        assert_eq!(banner_blocks.len(), 2);
        let rel_id = banner_blocks[1].image_rel_ids().unwrap().remove(0);
        let target = master.relationships().get(&rel_id).unwrap().target.clone();
        assert_eq!(master.package().part(&format!("word/{target}")), Some(&[0u8][..]));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn footnote_markers_are_dropped_with_a_warning() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[(
            "News/a.docx",
            &[r#"<w:p><w:r><w:t>cited</w:t></w:r><w:r><w:footnoteReference w:id="1"/></w:r></w:p>"#],
            "a_summary.txt",
            "sa",
        )]);
        let config = build_config(&dir, &["News/a.docx"], &["a_summary.txt"], &["News"]);

        let result = build_master_with(&config, &loader, &banners(), &SilentProgress).unwrap();
        assert_eq!(
            result.report.warnings,
            vec![RunWarning::NotesDropped {
                article: "a".into(),
                count: 1
            }]
        );

        let master = Document::open(&config.output_path).unwrap();
        assert_eq!(master.note_marks().unwrap(), 0);
        assert!(outline(&master).contains(&"cited".to_string()));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_build_writes_nothing() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[("News/a.docx", &["A"], "a_summary.txt", "sa")]);
        let config = build_config(
            &dir,
            &["News/a.docx", "News/b.docx"],
            &["a_summary.txt", "b_summary.txt"],
            &["News"],
        );

        let err = build_master_with(&config, &loader, &banners(), &SilentProgress).unwrap_err();
        assert!(matches!(err, MasterDocError::UnreadableDocument { .. }));
        assert!(!config.output_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mismatched_inputs_fail_before_loading() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[]);
        let config = build_config(&dir, &["News/a.docx"], &[], &["News"]);
        let err = build_master_with(&config, &loader, &banners(), &SilentProgress).unwrap_err();
        assert!(matches!(err, MasterDocError::InputMismatch { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn portrait_output_when_landscape_disabled() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[("News/a.docx", &["A"], "a_summary.txt", "sa")]);
        let mut config = build_config(&dir, &["News/a.docx"], &["a_summary.txt"], &["News"]);
        config.config.output.landscape = false;

        build_master_with(&config, &loader, &banners(), &SilentProgress).unwrap();
        let master = Document::open(&config.output_path).unwrap();
        assert!(!master.section_properties().unwrap().contains("landscape"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = temp_dir();
        let loader = MemoryLoader::new(&[("News/a.docx", &["A"], "a_summary.txt", "sa")]);
        let config = build_config(&dir, &["News/a.docx"], &["a_summary.txt"], &["News"]);
        let result = build_master_with(&config, &loader, &banners(), &SilentProgress).unwrap();

        let path = dir.join("report.json");
        write_report(&path, &result.report).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["section_count"], 1);
        assert_eq!(json["entries"][0]["name"], "a");
        assert_eq!(json["sha256"], result.report.sha256.as_str());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
