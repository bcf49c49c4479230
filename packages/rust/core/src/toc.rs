//! Table of contents document.
//!
//! The master document starts with this document: an optional title, a
//! dirty `TOC` field that Word rebuilds from the heading outline when the
//! file is opened, and an optional page break.

use tracing::{debug, instrument};

use masterdoc_docx::{Document, ParagraphBuilder};
use masterdoc_shared::{OutputConfig, Result};

use crate::styles::{ARTICLE_LABEL, StyleSet};

/// Field instruction: heading levels 1-3, hyperlinked entries, no page
/// numbers in web view, outline levels included.
pub const TOC_INSTRUCTION: &str = r#"TOC \o "1-3" \h \z \u"#;

/// Shown until the field is refreshed.
pub const TOC_PLACEHOLDER: &str = "Right-click to update field.";

#[instrument(skip_all, fields(title = output.toc_title.is_some()))]
pub fn build_toc_document(styles: &StyleSet, output: &OutputConfig) -> Result<Document> {
    let mut doc = Document::blank()?;
    styles.apply(&mut doc)?;

    if let Some(title) = &output.toc_title {
        doc.push_block(
            ParagraphBuilder::new()
                .style(ARTICLE_LABEL)
                .text(title.as_str())
                .build(),
        );
    }
    doc.push_block(
        ParagraphBuilder::new()
            .field(TOC_INSTRUCTION, TOC_PLACEHOLDER)
            .build(),
    );
    if output.toc_page_break {
        doc.push_block(ParagraphBuilder::new().page_break().build());
    }

    debug!(blocks = doc.blocks().len(), "toc document built");
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use masterdoc_shared::TypographyConfig;

    fn styles() -> StyleSet {
        StyleSet::from_config(&TypographyConfig::default())
    }

    #[test]
    fn field_is_first_without_title() {
        let doc = build_toc_document(&styles(), &OutputConfig::default()).unwrap();
        let blocks = doc.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].field_instruction().unwrap().as_deref(),
            Some(TOC_INSTRUCTION)
        );
        assert!(blocks[0].xml().contains("w:dirty=\"true\""));
        assert_eq!(blocks[0].text().unwrap(), TOC_PLACEHOLDER);
        assert!(blocks[1].xml().contains("w:type=\"page\""));
        assert!(doc.styles().unwrap().unwrap().contains(ARTICLE_LABEL));
    }

    #[test]
    fn title_precedes_field_and_is_not_a_heading() {
        let output = OutputConfig {
            toc_title: Some("TABLE OF CONTENTS".into()),
            toc_page_break: false,
            ..OutputConfig::default()
        };
        let doc = build_toc_document(&styles(), &output).unwrap();
        let blocks = doc.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text().unwrap(), "TABLE OF CONTENTS");
        assert_eq!(blocks[0].style_id().unwrap().as_deref(), Some(ARTICLE_LABEL));
        assert!(blocks[1].field_instruction().unwrap().is_some());
    }
}
