//! Body blocks: top-level children of `<w:body>` and builders for the
//! paragraphs this crate generates.

use std::fmt::Write as _;

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use masterdoc_shared::Result;

use crate::xml::{self, escape, xml_err};

/// English Metric Units per inch (DrawingML geometry).
pub const EMU_PER_INCH: f64 = 914_400.0;

/// What kind of element a block is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Table,
    /// Anything else (`w:sdt`, bookmarks, custom XML, ...).
    Other,
}

/// One serialized top-level body element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    xml: String,
}

impl Block {
    /// Wrap raw WordprocessingML. The string must hold exactly one element.
    pub fn from_xml(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn into_xml(self) -> String {
        self.xml
    }

    pub fn kind(&self) -> BlockKind {
        let name = self
            .xml
            .trim_start()
            .trim_start_matches('<')
            .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .next()
            .unwrap_or("");
        match name {
            "w:p" => BlockKind::Paragraph,
            "w:tbl" => BlockKind::Table,
            _ => BlockKind::Other,
        }
    }

    pub fn is_paragraph(&self) -> bool {
        self.kind() == BlockKind::Paragraph
    }

    /// Visible text of the block.
    pub fn text(&self) -> Result<String> {
        xml::collect_text(&self.xml)
    }

    /// The paragraph style id, if any.
    pub fn style_id(&self) -> Result<Option<String>> {
        let mut style = None;
        xml::visit_elements(&self.xml, |name, attrs| {
            if style.is_none() && name == "w:pStyle" {
                style = xml::attr(attrs, "w:val").map(str::to_string);
            }
        })?;
        Ok(style)
    }

    /// Relationship ids of embedded pictures.
    pub fn image_rel_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        xml::visit_elements(&self.xml, |name, attrs| {
            if name == "a:blip" {
                if let Some(id) = xml::attr(attrs, "r:embed") {
                    ids.push(id.to_string());
                }
            }
        })?;
        Ok(ids)
    }

    /// Concatenated field instruction text (e.g. `TOC \o "1-3"`), if any.
    pub fn field_instruction(&self) -> Result<Option<String>> {
        Ok(xml::element_text(&self.xml, "w:instrText")?.map(|s| s.trim().to_string()))
    }

    /// Whether the block carries section properties (a section break).
    pub fn has_section_properties(&self) -> bool {
        self.xml.contains("<w:sectPr")
    }

    /// The same block with the `w:pStyle` of every paragraph in it, nested
    /// ones included, set to `style_id`.
    ///
    /// Only paragraph properties change; runs and their formatting are
    /// copied through.
    pub fn restyled(&self, style_id: &str) -> Result<Block> {
        Ok(self.restyle_all(style_id)?.0)
    }

    /// [`Block::restyled`] plus the number of paragraphs it touched.
    pub fn restyle_all(&self, style_id: &str) -> Result<(Block, usize)> {
        let style = format!("<w:pStyle w:val=\"{}\"/>", escape(style_id));
        let props = format!("<w:pPr>{style}</w:pPr>");

        let mut reader = Reader::from_str(&self.xml);
        let mut writer = Writer::new(Vec::new());
        let mut stage = Restyle::Scan;
        let mut count = 0;

        loop {
            let event = reader.read_event().map_err(xml_err)?;
            if matches!(event, Event::Eof) {
                break;
            }
            stage = match stage {
                Restyle::Scan => match event {
                    Event::Start(e) if e.name().as_ref() == b"w:p" => {
                        count += 1;
                        writer.write_event(Event::Start(e)).map_err(xml_err)?;
                        Restyle::FirstChild
                    }
                    Event::Empty(e) if e.name().as_ref() == b"w:p" => {
                        count += 1;
                        let end = e.to_end().into_owned();
                        writer.write_event(Event::Start(e)).map_err(xml_err)?;
                        writer.get_mut().extend_from_slice(props.as_bytes());
                        writer.write_event(Event::End(end)).map_err(xml_err)?;
                        Restyle::Scan
                    }
                    other => {
                        writer.write_event(other).map_err(xml_err)?;
                        Restyle::Scan
                    }
                },
                Restyle::FirstChild => match event {
                    Event::Start(e) if e.name().as_ref() == b"w:pPr" => {
                        writer.write_event(Event::Start(e)).map_err(xml_err)?;
                        Restyle::FirstProperty
                    }
                    Event::Empty(e) if e.name().as_ref() == b"w:pPr" => {
                        let end = e.to_end().into_owned();
                        writer.write_event(Event::Start(e)).map_err(xml_err)?;
                        writer.get_mut().extend_from_slice(style.as_bytes());
                        writer.write_event(Event::End(end)).map_err(xml_err)?;
                        Restyle::Scan
                    }
                    Event::Text(t) => {
                        writer.write_event(Event::Text(t)).map_err(xml_err)?;
                        Restyle::FirstChild
                    }
                    other => {
                        writer.get_mut().extend_from_slice(props.as_bytes());
                        writer.write_event(other).map_err(xml_err)?;
                        Restyle::Scan
                    }
                },
                // w:pStyle is the first child of w:pPr when present.
                Restyle::FirstProperty => match event {
                    Event::Empty(e) if e.name().as_ref() == b"w:pStyle" => {
                        writer.get_mut().extend_from_slice(style.as_bytes());
                        Restyle::Scan
                    }
                    Event::Start(e) if e.name().as_ref() == b"w:pStyle" => {
                        writer.get_mut().extend_from_slice(style.as_bytes());
                        Restyle::SkipStyle
                    }
                    Event::Text(t) => {
                        writer.write_event(Event::Text(t)).map_err(xml_err)?;
                        Restyle::FirstProperty
                    }
                    other => {
                        writer.get_mut().extend_from_slice(style.as_bytes());
                        writer.write_event(other).map_err(xml_err)?;
                        Restyle::Scan
                    }
                },
                Restyle::SkipStyle => match event {
                    Event::End(e) if e.name().as_ref() == b"w:pStyle" => Restyle::Scan,
                    _ => Restyle::SkipStyle,
                },
            };
        }

        Ok((Block::from_xml(xml::into_string(writer)?), count))
    }
}

enum Restyle {
    /// Copying; waiting for the next `w:p`.
    Scan,
    FirstChild,
    FirstProperty,
    SkipStyle,
}

// ---------------------------------------------------------------------------
// Paragraph builder
// ---------------------------------------------------------------------------

/// An inline picture placed in a paragraph.
#[derive(Debug, Clone)]
pub struct InlineImage {
    /// Relationship id of the image part (from [`crate::Document::add_image`]).
    pub rel_id: String,
    /// Drawing object id, unique within the document.
    pub drawing_id: u32,
    pub name: String,
    pub width_emu: u64,
    pub height_emu: u64,
}

impl InlineImage {
    /// Size an image in inches.
    pub fn with_inches(
        rel_id: impl Into<String>,
        drawing_id: u32,
        name: impl Into<String>,
        width_in: f64,
        height_in: f64,
    ) -> Self {
        Self {
            rel_id: rel_id.into(),
            drawing_id,
            name: name.into(),
            width_emu: (width_in * EMU_PER_INCH).round() as u64,
            height_emu: (height_in * EMU_PER_INCH).round() as u64,
        }
    }
}

#[derive(Debug, Clone)]
enum Inline {
    Text(String),
    Image(InlineImage),
    Field {
        instruction: String,
        placeholder: String,
    },
    PageBreak,
}

/// Builds a `<w:p>` block.
#[derive(Debug, Clone, Default)]
pub struct ParagraphBuilder {
    style: Option<String>,
    indent_left: Option<i32>,
    inlines: Vec<Inline>,
}

impl ParagraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(mut self, style_id: impl Into<String>) -> Self {
        self.style = Some(style_id.into());
        self
    }

    /// Left indent in twips; negative values pull into the margin.
    pub fn indent_left(mut self, twips: i32) -> Self {
        self.indent_left = Some(twips);
        self
    }

    /// Text run. `\n` becomes a line break and `\t` a tab; empty text adds nothing.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.inlines.push(Inline::Text(text));
        }
        self
    }

    pub fn image(mut self, image: InlineImage) -> Self {
        self.inlines.push(Inline::Image(image));
        self
    }

    /// A complex field whose result is computed by the viewer.
    pub fn field(mut self, instruction: impl Into<String>, placeholder: impl Into<String>) -> Self {
        self.inlines.push(Inline::Field {
            instruction: instruction.into(),
            placeholder: placeholder.into(),
        });
        self
    }

    pub fn page_break(mut self) -> Self {
        self.inlines.push(Inline::PageBreak);
        self
    }

    pub fn build(self) -> Block {
        let mut out = String::from("<w:p>");

        if self.style.is_some() || self.indent_left.is_some() {
            out.push_str("<w:pPr>");
            if let Some(style) = &self.style {
                let _ = write!(out, "<w:pStyle w:val=\"{}\"/>", escape(style));
            }
            if let Some(left) = self.indent_left {
                let _ = write!(out, "<w:ind w:left=\"{left}\"/>");
            }
            out.push_str("</w:pPr>");
        }

        for inline in &self.inlines {
            match inline {
                Inline::Text(text) => push_text_run(&mut out, text),
                Inline::Image(image) => push_image_run(&mut out, image),
                Inline::Field {
                    instruction,
                    placeholder,
                } => {
                    out.push_str(
                        "<w:r><w:fldChar w:fldCharType=\"begin\" w:dirty=\"true\"/></w:r>",
                    );
                    let _ = write!(
                        out,
                        "<w:r><w:instrText xml:space=\"preserve\"> {} </w:instrText></w:r>",
                        escape(instruction)
                    );
                    out.push_str("<w:r><w:fldChar w:fldCharType=\"separate\"/></w:r>");
                    let _ = write!(
                        out,
                        "<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r>",
                        escape(placeholder)
                    );
                    out.push_str("<w:r><w:fldChar w:fldCharType=\"end\"/></w:r>");
                }
                Inline::PageBreak => out.push_str("<w:r><w:br w:type=\"page\"/></w:r>"),
            }
        }

        out.push_str("</w:p>");
        Block::from_xml(out)
    }
}

fn push_text_run(out: &mut String, text: &str) {
    let normalized = text.replace("\r\n", "\n");
    out.push_str("<w:r>");
    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        for (j, piece) in line.split('\t').enumerate() {
            if j > 0 {
                out.push_str("<w:tab/>");
            }
            if !piece.is_empty() {
                let _ = write!(out, "<w:t xml:space=\"preserve\">{}</w:t>", escape(piece));
            }
        }
    }
    out.push_str("</w:r>");
}

fn push_image_run(out: &mut String, image: &InlineImage) {
    let name = escape(&image.name);
    let _ = write!(
        out,
        "<w:r><w:drawing>\
<wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">\
<wp:extent cx=\"{cx}\" cy=\"{cy}\"/>\
<wp:docPr id=\"{id}\" name=\"{name}\"/>\
<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect=\"1\"/></wp:cNvGraphicFramePr>\
<a:graphic><a:graphicData uri=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">\
<pic:pic><pic:nvPicPr><pic:cNvPr id=\"0\" name=\"{name}\"/><pic:cNvPicPr/></pic:nvPicPr>\
<pic:blipFill><a:blip r:embed=\"{rel}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>\
<pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>\
<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>\
</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>",
        cx = image.width_emu,
        cy = image.height_emu,
        id = image.drawing_id,
        rel = escape(&image.rel_id),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styled_text_paragraph() {
        let block = ParagraphBuilder::new()
            .style("Heading2")
            .text("Q3 <launch> & more")
            .build();
        assert!(block.is_paragraph());
        assert_eq!(block.style_id().unwrap().as_deref(), Some("Heading2"));
        assert_eq!(block.text().unwrap(), "Q3 <launch> & more");
    }

    #[test]
    fn newlines_and_tabs_become_breaks() {
        let block = ParagraphBuilder::new().text("line one\r\nline\ttwo").build();
        assert!(block.xml().contains("<w:br/>"));
        assert!(block.xml().contains("<w:tab/>"));
        assert_eq!(block.text().unwrap(), "line one\nline\ttwo");
    }

    #[test]
    fn empty_text_still_builds_a_paragraph() {
        let block = ParagraphBuilder::new().style("ArticleBody").text("").build();
        assert!(block.is_paragraph());
        assert_eq!(block.text().unwrap(), "");
        assert!(!block.xml().contains("<w:r>"));
    }

    #[test]
    fn image_paragraph_references_relationship() {
        let image = InlineImage::with_inches("rId7", 3, "banner", 2.0, 0.5);
        assert_eq!(image.width_emu, 1_828_800);
        let block = ParagraphBuilder::new().indent_left(-720).image(image).build();
        assert_eq!(block.image_rel_ids().unwrap(), vec!["rId7".to_string()]);
        assert!(block.xml().contains("<w:ind w:left=\"-720\"/>"));
        assert!(block.xml().contains("<wp:docPr id=\"3\""));
    }

    #[test]
    fn field_paragraph_exposes_instruction() {
        let block = ParagraphBuilder::new()
            .field(r#"TOC \o "1-3" \h \z \u"#, "Update field")
            .build();
        assert_eq!(
            block.field_instruction().unwrap().as_deref(),
            Some(r#"TOC \o "1-3" \h \z \u"#)
        );
        assert_eq!(block.text().unwrap(), "Update field");
    }

    #[test]
    fn restyle_replaces_existing_style() {
        let block = Block::from_xml(
            r#"<w:p><w:pPr><w:pStyle w:val="Title"/><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Hi</w:t></w:r></w:p>"#,
        );
        let out = block.restyled("ArticleBody").unwrap();
        assert_eq!(
            out.xml(),
            r#"<w:p><w:pPr><w:pStyle w:val="ArticleBody"/><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Hi</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn restyle_inserts_missing_properties() {
        let bare = Block::from_xml("<w:p><w:r><w:t>x</w:t></w:r></w:p>");
        assert_eq!(
            bare.restyled("ArticleBody").unwrap().xml(),
            r#"<w:p><w:pPr><w:pStyle w:val="ArticleBody"/></w:pPr><w:r><w:t>x</w:t></w:r></w:p>"#
        );

        let empty = Block::from_xml("<w:p/>");
        assert_eq!(
            empty.restyled("ArticleBody").unwrap().xml(),
            r#"<w:p><w:pPr><w:pStyle w:val="ArticleBody"/></w:pPr></w:p>"#
        );

        let no_style = Block::from_xml(r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr></w:p>"#);
        assert_eq!(
            no_style.restyled("ArticleBody").unwrap().style_id().unwrap().as_deref(),
            Some("ArticleBody")
        );

        let empty_props = Block::from_xml("<w:p><w:pPr/><w:r/></w:p>");
        assert_eq!(
            empty_props.restyled("ArticleBody").unwrap().xml(),
            r#"<w:p><w:pPr><w:pStyle w:val="ArticleBody"/></w:pPr><w:r/></w:p>"#
        );
    }

    #[test]
    fn restyle_reaches_paragraphs_in_tables_and_content_controls() {
        let table = Block::from_xml(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="Grid"/></w:tblPr><w:tr><w:tc><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Cell heading</w:t></w:r></w:p><w:p/></w:tc></w:tr></w:tbl>"#,
        );
        let (out, count) = table.restyle_all("ArticleBody").unwrap();
        assert_eq!(count, 2);
        assert!(!out.xml().contains("Heading1"));
        assert!(out.xml().contains(r#"<w:tblStyle w:val="Grid"/>"#));
        assert_eq!(out.xml().matches(r#"<w:pStyle w:val="ArticleBody"/>"#).count(), 2);
        assert_eq!(out.text().unwrap(), "Cell heading");

        let sdt = Block::from_xml(
            r#"<w:sdt><w:sdtPr/><w:sdtContent><w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr></w:p></w:sdtContent></w:sdt>"#,
        );
        let out = sdt.restyled("ArticleBody").unwrap();
        assert!(!out.xml().contains("Heading2"));
        assert_eq!(out.style_id().unwrap().as_deref(), Some("ArticleBody"));
    }

    #[test]
    fn restyle_without_paragraphs_is_a_no_op() {
        let table = Block::from_xml("<w:tbl><w:tr/></w:tbl>");
        assert_eq!(table.restyle_all("ArticleBody").unwrap(), (table.clone(), 0));
    }

    #[test]
    fn block_kinds() {
        assert_eq!(Block::from_xml("<w:p/>").kind(), BlockKind::Paragraph);
        assert_eq!(Block::from_xml("<w:tbl><w:tr/></w:tbl>").kind(), BlockKind::Table);
        assert_eq!(Block::from_xml("<w:sdt></w:sdt>").kind(), BlockKind::Other);
        assert_eq!(Block::from_xml("<w:pPr/>").kind(), BlockKind::Other);
    }
}
