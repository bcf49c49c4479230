//! The fixed set of paragraph styles used by the master document.

use tracing::debug;

use masterdoc_docx::{Document, StyleDef, StyleSheet};
use masterdoc_shared::{Result, TypographyConfig};

/// Section divider heading (Word built-in `heading 1`).
pub const SECTION_HEADING: &str = "Heading1";
/// Article title heading (Word built-in `heading 2`).
pub const ARTICLE_HEADING: &str = "Heading2";
/// Body text of articles and abstracts.
pub const ARTICLE_BODY: &str = "ArticleBody";
/// "Abstract:" / "Article:" labels and the table of contents title.
pub const ARTICLE_LABEL: &str = "ArticleLabel";

const BASE_STYLE: &str = "Normal";

/// Style definitions built once per run from `[typography]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSet {
    section_heading: StyleDef,
    article_heading: StyleDef,
    body: StyleDef,
    label: StyleDef,
}

impl StyleSet {
    pub fn from_config(typography: &TypographyConfig) -> Self {
        let heading_size = half_points(typography.heading_size_pt);
        let body_size = half_points(typography.body_size_pt);

        let def = |id: &str, name: &str, font: &str, size: u32, color: &str| StyleDef {
            id: id.to_string(),
            name: name.to_string(),
            based_on: Some(BASE_STYLE.to_string()),
            next: None,
            font: font.to_string(),
            size_half_points: size,
            color: color.to_string(),
            bold: false,
            outline_level: None,
            custom: false,
        };

        Self {
            section_heading: StyleDef {
                next: Some(ARTICLE_BODY.to_string()),
                outline_level: Some(0),
                ..def(
                    SECTION_HEADING,
                    "heading 1",
                    &typography.semibold_font,
                    heading_size,
                    &typography.section_color,
                )
            },
            article_heading: StyleDef {
                next: Some(ARTICLE_BODY.to_string()),
                outline_level: Some(1),
                ..def(
                    ARTICLE_HEADING,
                    "heading 2",
                    &typography.semibold_font,
                    heading_size,
                    &typography.text_color,
                )
            },
            body: StyleDef {
                custom: true,
                ..def(
                    ARTICLE_BODY,
                    "Article Body",
                    &typography.regular_font,
                    body_size,
                    &typography.text_color,
                )
            },
            label: StyleDef {
                custom: true,
                next: Some(ARTICLE_BODY.to_string()),
                ..def(
                    ARTICLE_LABEL,
                    "Article Label",
                    &typography.semibold_font,
                    body_size,
                    &typography.text_color,
                )
            },
        }
    }

    pub fn definitions(&self) -> [&StyleDef; 4] {
        [
            &self.section_heading,
            &self.article_heading,
            &self.body,
            &self.label,
        ]
    }

    /// Upsert all four definitions into the document's style table.
    pub fn apply(&self, document: &mut Document) -> Result<()> {
        let mut sheet = document.styles()?.unwrap_or_else(StyleSheet::empty);
        for def in self.definitions() {
            sheet.upsert(def);
        }
        document.set_styles(&sheet)
    }

    /// Reassign every paragraph, nested ones included, to the body style;
    /// text is untouched.
    pub fn normalize(&self, document: &mut Document) -> Result<usize> {
        let count = document.restyle_paragraphs(&self.body.id)?;
        debug!(paragraphs = count, "paragraphs normalized");
        Ok(count)
    }
}

fn half_points(points: f32) -> u32 {
    (points * 2.0).round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use masterdoc_docx::ParagraphBuilder;

    fn typography() -> TypographyConfig {
        TypographyConfig {
            section_color: "1F3864".into(),
            ..TypographyConfig::default()
        }
    }

    #[test]
    fn definitions_follow_typography() {
        let set = StyleSet::from_config(&typography());
        let [section, article, body, label] = set.definitions();

        assert_eq!(section.id, SECTION_HEADING);
        assert_eq!(section.name, "heading 1");
        assert_eq!(section.outline_level, Some(0));
        assert_eq!(section.size_half_points, 24);
        assert_eq!(section.color, "1F3864");
        assert_eq!(section.font, "Segoe UI Semibold");

        assert_eq!(article.name, "heading 2");
        assert_eq!(article.outline_level, Some(1));
        assert_eq!(article.color, "000000");

        assert_eq!(body.font, "Segoe UI");
        assert_eq!(body.size_half_points, 22);
        assert!(body.custom);
        assert_eq!(body.outline_level, None);

        assert_eq!(label.font, "Segoe UI Semibold");
        assert_eq!(label.size_half_points, 22);
    }

    #[test]
    fn apply_is_repeatable() {
        let set = StyleSet::from_config(&typography());
        let mut doc = Document::blank().unwrap();
        set.apply(&mut doc).unwrap();
        set.apply(&mut doc).unwrap();

        let ids = doc.styles().unwrap().unwrap().style_ids();
        for id in [SECTION_HEADING, ARTICLE_HEADING, ARTICLE_BODY, ARTICLE_LABEL] {
            assert_eq!(ids.iter().filter(|s| *s == id).count(), 1, "{id}");
        }
        assert!(ids.iter().any(|s| s == "Normal"));
    }

    #[test]
    fn normalize_restyles_paragraphs_without_touching_text() {
        let set = StyleSet::from_config(&typography());
        let mut doc = Document::blank().unwrap();
        doc.push_block(ParagraphBuilder::new().style("Title").text("Original title").build());
        doc.push_block(ParagraphBuilder::new().text("Plain body").build());

        assert_eq!(set.normalize(&mut doc).unwrap(), 2);
        for block in doc.blocks() {
            assert_eq!(block.style_id().unwrap().as_deref(), Some(ARTICLE_BODY));
        }
        assert_eq!(doc.paragraph_texts().unwrap(), vec!["Original title", "Plain body"]);
    }

    #[test]
    fn fractional_sizes_round_to_half_points() {
        assert_eq!(half_points(10.5), 21);
        assert_eq!(half_points(0.0), 1);
    }
}
