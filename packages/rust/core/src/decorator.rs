//! Section decorator: the preamble placed in front of each article.
//!
//! Reading order of a decorated article:
//! section heading, banner (both only at a section start), article
//! heading, "Abstract:", summary, "Article:", then the original body.

use tracing::{debug, instrument};

use masterdoc_docx::{Block, Document, InlineImage, ParagraphBuilder};
use masterdoc_shared::{Result, SectionsConfig};

use crate::banners::BannerSet;
use crate::styles::{ARTICLE_BODY, ARTICLE_HEADING, ARTICLE_LABEL, SECTION_HEADING, StyleSet};

pub const ABSTRACT_LABEL: &str = "Abstract:";
pub const ARTICLE_LABEL_TEXT: &str = "Article:";

/// One planned preamble paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreambleBlock {
    /// Section divider heading text.
    SectionHeading(String),
    /// Banner image for a section.
    Banner { section: String },
    ArticleHeading(String),
    AbstractLabel,
    /// The summary, verbatim.
    AbstractText(String),
    ArticleLabel,
}

/// Decorates article documents with their preamble.
#[derive(Debug, Clone, Copy)]
pub struct Decorator<'a> {
    styles: &'a StyleSet,
    banners: &'a BannerSet,
    sections: &'a SectionsConfig,
}

impl<'a> Decorator<'a> {
    pub fn new(styles: &'a StyleSet, banners: &'a BannerSet, sections: &'a SectionsConfig) -> Self {
        Self {
            styles,
            banners,
            sections,
        }
    }

    /// The preamble for one article, in reading order.
    pub fn plan(
        &self,
        summary_text: &str,
        section: &str,
        article_name: &str,
        is_section_start: bool,
    ) -> Vec<PreambleBlock> {
        let mut blocks = Vec::with_capacity(6);
        if is_section_start {
            let heading = self
                .sections
                .display_names
                .get(section)
                .map(String::as_str)
                .unwrap_or(section);
            blocks.push(PreambleBlock::SectionHeading(heading.to_string()));
            blocks.push(PreambleBlock::Banner {
                section: section.to_string(),
            });
        }
        blocks.push(PreambleBlock::ArticleHeading(article_name.to_string()));
        blocks.push(PreambleBlock::AbstractLabel);
        blocks.push(PreambleBlock::AbstractText(summary_text.to_string()));
        blocks.push(PreambleBlock::ArticleLabel);
        blocks
    }

    /// Style the document, normalize its body, and insert the preamble
    /// before its first block in one pass.
    #[instrument(skip(self, document, summary_text), fields(section = %section))]
    pub fn decorate(
        &self,
        document: &mut Document,
        summary_text: &str,
        section: &str,
        article_name: &str,
        is_section_start: bool,
    ) -> Result<()> {
        self.styles.apply(document)?;
        self.styles.normalize(document)?;

        let plan = self.plan(summary_text, section, article_name, is_section_start);
        let blocks = self.render(document, &plan)?;
        debug!(blocks = blocks.len(), "preamble rendered");
        document.prepend_blocks(blocks);
        Ok(())
    }

    fn render(&self, document: &mut Document, plan: &[PreambleBlock]) -> Result<Vec<Block>> {
        let mut out = Vec::with_capacity(plan.len());
        for block in plan {
            let paragraph = match block {
                PreambleBlock::SectionHeading(text) => {
                    ParagraphBuilder::new().style(SECTION_HEADING).text(text.as_str())
                }
                PreambleBlock::Banner { section } => {
                    let image = self.banners.lookup(section);
                    let rel_id = document.add_image(image.bytes.clone(), &image.extension)?;
                    let drawing_id = document.next_drawing_id()?;
                    ParagraphBuilder::new()
                        .indent_left(self.banners.indent_twips)
                        .image(InlineImage::with_inches(
                            rel_id,
                            drawing_id,
                            image.name(),
                            self.banners.width_in,
                            self.banners.height_in,
                        ))
                }
                PreambleBlock::ArticleHeading(name) => {
                    ParagraphBuilder::new().style(ARTICLE_HEADING).text(name.as_str())
                }
                PreambleBlock::AbstractLabel => {
                    ParagraphBuilder::new().style(ARTICLE_LABEL).text(ABSTRACT_LABEL)
                }
                PreambleBlock::AbstractText(summary) => {
                    ParagraphBuilder::new().style(ARTICLE_BODY).text(summary.as_str())
                }
                PreambleBlock::ArticleLabel => {
                    ParagraphBuilder::new().style(ARTICLE_LABEL).text(ARTICLE_LABEL_TEXT)
                }
            };
            out.push(paragraph.build());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::banners::BannerImage;
    use masterdoc_shared::{BannerConfig, TypographyConfig};

    fn fixtures() -> (StyleSet, BannerSet, SectionsConfig) {
        let image = |name: &str, byte: u8| BannerImage {
            bytes: vec![byte],
            extension: "png".into(),
            source: PathBuf::from(format!("{name}.png")),
        };
        let banners = BannerSet::from_images(
            image("default", 0),
            BTreeMap::from([("News".to_string(), image("news", 1))]),
            &BannerConfig::default(),
        );
        let mut sections = SectionsConfig::default();
        sections
            .display_names
            .insert("News".into(), "Latest News".into());
        (StyleSet::from_config(&TypographyConfig::default()), banners, sections)
    }

    fn article(body: &[&str]) -> Document {
        let mut doc = Document::blank().unwrap();
        for text in body {
            doc.push_block(ParagraphBuilder::new().text(*text).build());
        }
        doc
    }

    #[test]
    fn plan_without_section_start_has_no_heading_or_banner() {
        let (styles, banners, sections) = fixtures();
        let decorator = Decorator::new(&styles, &banners, &sections);
        let plan = decorator.plan("sum", "News", "a", false);
        assert_eq!(
            plan,
            vec![
                PreambleBlock::ArticleHeading("a".into()),
                PreambleBlock::AbstractLabel,
                PreambleBlock::AbstractText("sum".into()),
                PreambleBlock::ArticleLabel,
            ]
        );
    }

    #[test]
    fn plan_at_section_start_puts_banner_right_after_heading() {
        let (styles, banners, sections) = fixtures();
        let decorator = Decorator::new(&styles, &banners, &sections);
        let plan = decorator.plan("sum", "News", "a", true);
        assert_eq!(plan[0], PreambleBlock::SectionHeading("Latest News".into()));
        assert_eq!(plan[1], PreambleBlock::Banner { section: "News".into() });
        assert_eq!(
            plan.iter()
                .filter(|b| matches!(b, PreambleBlock::Banner { .. }))
                .count(),
            1
        );

        let fallback = decorator.plan("sum", "Other", "b", true);
        assert_eq!(fallback[0], PreambleBlock::SectionHeading("Other".into()));
    }

    #[test]
    fn decorate_prepends_in_reading_order() {
        let (styles, banners, sections) = fixtures();
        let decorator = Decorator::new(&styles, &banners, &sections);
        let mut doc = article(&["body one", "body two"]);
        decorator
            .decorate(&mut doc, "the summary", "News", "Big news", true)
            .unwrap();

        let blocks = doc.blocks();
        assert_eq!(blocks.len(), 8);
        assert_eq!(blocks[0].text().unwrap(), "Latest News");
        assert_eq!(blocks[0].style_id().unwrap().as_deref(), Some(SECTION_HEADING));
        assert_eq!(blocks[1].image_rel_ids().unwrap().len(), 1);
        assert!(blocks[1].xml().contains("w:left=\"-1080\""));
        assert_eq!(blocks[2].text().unwrap(), "Big news");
        assert_eq!(blocks[2].style_id().unwrap().as_deref(), Some(ARTICLE_HEADING));
        assert_eq!(blocks[3].text().unwrap(), ABSTRACT_LABEL);
        assert_eq!(blocks[4].text().unwrap(), "the summary");
        assert_eq!(blocks[5].text().unwrap(), ARTICLE_LABEL_TEXT);
        assert_eq!(blocks[6].text().unwrap(), "body one");
        assert_eq!(blocks[7].style_id().unwrap().as_deref(), Some(ARTICLE_BODY));

        let rel = doc
            .relationships()
            .get(&blocks[1].image_rel_ids().unwrap()[0])
            .unwrap()
            .clone();
        let part = format!("word/{}", rel.target);
        assert_eq!(doc.package().part(&part), Some(&[1u8][..]));
    }

    #[test]
    fn decorate_without_section_start_adds_no_image() {
        let (styles, banners, sections) = fixtures();
        let decorator = Decorator::new(&styles, &banners, &sections);
        let mut doc = article(&["body"]);
        decorator.decorate(&mut doc, "", "News", "a", false).unwrap();

        assert_eq!(doc.blocks().len(), 5);
        assert!(doc.blocks().iter().all(|b| b.image_rel_ids().unwrap().is_empty()));
        // An empty summary still yields its paragraph.
        assert_eq!(doc.blocks()[2].text().unwrap(), "");
        assert_eq!(doc.blocks()[2].style_id().unwrap().as_deref(), Some(ARTICLE_BODY));
    }

    #[test]
    fn decorate_normalizes_paragraphs_inside_tables() {
        let (styles, banners, sections) = fixtures();
        let decorator = Decorator::new(&styles, &banners, &sections);
        let mut doc = article(&["intro"]);
        doc.push_block(Block::from_xml(
            r#"<w:tbl><w:tr><w:tc><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Cell heading</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        ));
        decorator.decorate(&mut doc, "sum", "News", "a", false).unwrap();

        let table = doc.blocks().last().unwrap();
        assert!(!table.xml().contains("Heading1"));
        assert_eq!(table.style_id().unwrap().as_deref(), Some(ARTICLE_BODY));
        assert_eq!(table.text().unwrap(), "Cell heading");
    }

    #[test]
    fn multiline_summary_keeps_breaks() {
        let (styles, banners, sections) = fixtures();
        let decorator = Decorator::new(&styles, &banners, &sections);
        let mut doc = article(&[]);
        decorator
            .decorate(&mut doc, "line one\nline\ttwo", "News", "a", false)
            .unwrap();
        assert_eq!(doc.blocks()[2].text().unwrap(), "line one\nline\ttwo");
    }
}
