//! Landscape fixup for in-memory documents and saved files.

use std::path::Path;

use tracing::{info, instrument};

use masterdoc_docx::{Document, OrientationReport};
use masterdoc_shared::Result;

/// Force every section of `document` to landscape.
pub fn apply(document: &mut Document) -> Result<OrientationReport> {
    document.force_landscape()
}

/// Open a `.docx`, make it landscape, and save it back in place.
///
/// The file is only rewritten when something changed.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn fixup_file(path: &Path) -> Result<OrientationReport> {
    let mut document = Document::open(path)?;
    let report = apply(&mut document)?;
    if report.changed() {
        document.save(path)?;
        info!(
            rotated = report.rotated,
            inserted = report.inserted,
            "landscape fixup saved"
        );
    } else {
        info!(sections = report.sections, "already landscape, file untouched");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use masterdoc_docx::ParagraphBuilder;

    fn temp_file() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("masterdoc-orient-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("doc.docx")
    }

    #[test]
    fn fixup_file_is_idempotent() {
        let path = temp_file();
        let mut doc = Document::blank().unwrap();
        doc.push_block(ParagraphBuilder::new().text("body").build());
        doc.save(&path).unwrap();

        let first = fixup_file(&path).unwrap();
        assert!(first.changed());
        assert_eq!(first.rotated, 1);
        let after_first = std::fs::read(&path).unwrap();

        let second = fixup_file(&path).unwrap();
        assert!(!second.changed());
        assert_eq!(second.already_landscape, 1);
        assert_eq!(std::fs::read(&path).unwrap(), after_first);

        let reopened = Document::open(&path).unwrap();
        let sect = reopened.section_properties().unwrap();
        assert!(sect.contains("w:orient=\"landscape\""));
        assert_eq!(reopened.paragraph_texts().unwrap(), vec!["body"]);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = temp_file().with_file_name("absent.docx");
        assert!(matches!(
            fixup_file(&path),
            Err(masterdoc_shared::MasterDocError::Io { .. })
        ));
    }
}
