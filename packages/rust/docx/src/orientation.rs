//! Landscape page setup for every section of a document.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use masterdoc_shared::Result;

use crate::block::Block;
use crate::document::Document;
use crate::template::{LETTER_LONG_TWIPS, LETTER_SHORT_TWIPS};
use crate::xml::{self, xml_err};

/// `w:sectPr` children that come after `w:pgSz` in schema order.
const PGSZ_FOLLOWERS: &[&[u8]] = &[
    b"w:pgMar",
    b"w:paperSrc",
    b"w:pgBorders",
    b"w:lnNumType",
    b"w:pgNumType",
    b"w:cols",
    b"w:formProt",
    b"w:vAlign",
    b"w:noEndnote",
    b"w:titlePg",
    b"w:textDirection",
    b"w:bidi",
    b"w:rtlGutter",
    b"w:docGrid",
    b"w:printerSettings",
    b"w:sectPrChange",
];

/// What a landscape pass found and changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrientationReport {
    /// Section property blocks seen.
    pub sections: usize,
    /// Portrait sections whose width and height were swapped.
    pub rotated: usize,
    /// Sections that were already landscape-shaped.
    pub already_landscape: usize,
    /// Landscape-shaped sections that lacked `w:orient="landscape"`.
    pub marked: usize,
    /// Sections that had no page size and received a landscape one.
    pub inserted: usize,
}

impl OrientationReport {
    fn add(&mut self, other: OrientationReport) {
        self.sections += other.sections;
        self.rotated += other.rotated;
        self.already_landscape += other.already_landscape;
        self.marked += other.marked;
        self.inserted += other.inserted;
    }

    /// Whether the pass modified anything.
    pub fn changed(&self) -> bool {
        self.rotated > 0 || self.marked > 0 || self.inserted > 0
    }
}

impl Document {
    /// Make every section landscape.
    ///
    /// Portrait pages are rotated; pages that are already wider than tall
    /// keep their dimensions, so running this twice equals running it once.
    pub fn force_landscape(&mut self) -> Result<OrientationReport> {
        let mut report = OrientationReport::default();

        for block in &mut self.blocks {
            if !block.has_section_properties() {
                continue;
            }
            let (rewritten, found) = landscape_sections(block.xml())?;
            report.add(found);
            *block = Block::from_xml(rewritten);
        }

        let body = match self.sect_pr.as_deref() {
            Some(sect_pr) => {
                let (rewritten, found) = landscape_sections(sect_pr)?;
                report.add(found);
                rewritten
            }
            None => {
                report.sections += 1;
                report.inserted += 1;
                format!("<w:sectPr>{}</w:sectPr>", landscape_page_size())
            }
        };
        self.sect_pr = Some(body);

        debug!(
            sections = report.sections,
            rotated = report.rotated,
            already = report.already_landscape,
            marked = report.marked,
            inserted = report.inserted,
            "landscape applied"
        );
        Ok(report)
    }
}

fn landscape_page_size() -> String {
    format!(
        "<w:pgSz w:w=\"{LETTER_LONG_TWIPS}\" w:h=\"{LETTER_SHORT_TWIPS}\" w:orient=\"landscape\"/>"
    )
}

/// Rewrite the page size of every outermost `w:sectPr` in `xml`.
///
/// A `w:sectPr` nested in `w:sectPrChange` records a previous revision and
/// is left alone.
fn landscape_sections(xml_text: &str) -> Result<(String, OrientationReport)> {
    let mut reader = Reader::from_str(xml_text);
    let mut writer = Writer::new(Vec::new());
    let mut report = OrientationReport::default();
    let insert = landscape_page_size();

    // Depth below the current outermost sectPr; None when outside one.
    let mut depth: Option<usize> = None;
    let mut has_page_size = false;

    loop {
        let event = reader.read_event().map_err(xml_err)?;
        match (depth, event) {
            (_, Event::Eof) => break,

            (None, Event::Start(e)) if e.name().as_ref() == b"w:sectPr" => {
                report.sections += 1;
                has_page_size = false;
                depth = Some(0);
                writer.write_event(Event::Start(e)).map_err(xml_err)?;
            }
            (None, Event::Empty(e)) if e.name().as_ref() == b"w:sectPr" => {
                report.sections += 1;
                report.inserted += 1;
                let end = e.to_end().into_owned();
                writer.write_event(Event::Start(e)).map_err(xml_err)?;
                writer.get_mut().extend_from_slice(insert.as_bytes());
                writer.write_event(Event::End(end)).map_err(xml_err)?;
            }
            (None, other) => writer.write_event(other).map_err(xml_err)?,

            (Some(0), Event::Empty(e)) if e.name().as_ref() == b"w:pgSz" => {
                has_page_size = true;
                let rotated = rotate_page_size(&e, &mut report)?;
                writer.write_event(Event::Empty(rotated)).map_err(xml_err)?;
            }
            (Some(0), Event::Start(e)) if e.name().as_ref() == b"w:pgSz" => {
                has_page_size = true;
                let rotated = rotate_page_size(&e, &mut report)?;
                writer.write_event(Event::Start(rotated)).map_err(xml_err)?;
                depth = Some(1);
            }
            (Some(d), Event::Start(e)) => {
                if d == 0 && !has_page_size && is_follower(&e) {
                    writer.get_mut().extend_from_slice(insert.as_bytes());
                    report.inserted += 1;
                    has_page_size = true;
                }
                writer.write_event(Event::Start(e)).map_err(xml_err)?;
                depth = Some(d + 1);
            }
            (Some(d), Event::Empty(e)) => {
                if d == 0 && !has_page_size && is_follower(&e) {
                    writer.get_mut().extend_from_slice(insert.as_bytes());
                    report.inserted += 1;
                    has_page_size = true;
                }
                writer.write_event(Event::Empty(e)).map_err(xml_err)?;
            }
            (Some(0), Event::End(e)) => {
                if !has_page_size {
                    writer.get_mut().extend_from_slice(insert.as_bytes());
                    report.inserted += 1;
                }
                writer.write_event(Event::End(e)).map_err(xml_err)?;
                depth = None;
            }
            (Some(d), Event::End(e)) => {
                writer.write_event(Event::End(e)).map_err(xml_err)?;
                depth = Some(d - 1);
            }
            (Some(_), other) => writer.write_event(other).map_err(xml_err)?,
        }
    }

    Ok((xml::into_string(writer)?, report))
}

fn is_follower(e: &BytesStart<'_>) -> bool {
    PGSZ_FOLLOWERS.contains(&e.name().as_ref())
}

fn rotate_page_size(e: &BytesStart<'_>, report: &mut OrientationReport) -> Result<BytesStart<'static>> {
    let name = xml::element_name(e);
    let mut attrs = xml::attributes(e)?;
    let width = xml::attr(&attrs, "w:w")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(LETTER_SHORT_TWIPS);
    let height = xml::attr(&attrs, "w:h")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(LETTER_LONG_TWIPS);

    if width < height {
        xml::set_attr(&mut attrs, "w:w", height.to_string());
        xml::set_attr(&mut attrs, "w:h", width.to_string());
        report.rotated += 1;
    } else {
        xml::set_attr(&mut attrs, "w:w", width.to_string());
        xml::set_attr(&mut attrs, "w:h", height.to_string());
        report.already_landscape += 1;
        if xml::attr(&attrs, "w:orient") != Some("landscape") {
            report.marked += 1;
        }
    }
    xml::set_attr(&mut attrs, "w:orient", "landscape");
    Ok(xml::build_start(&name, &attrs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ParagraphBuilder;

    fn with_section(sect_pr: &str) -> Document {
        let mut doc = Document::blank().unwrap();
        doc.sect_pr = Some(sect_pr.to_string());
        doc
    }

    #[test]
    fn portrait_section_is_rotated() {
        let mut doc = Document::blank().unwrap();
        let report = doc.force_landscape().unwrap();
        assert_eq!(report, OrientationReport { sections: 1, rotated: 1, already_landscape: 0, marked: 0, inserted: 0 });
        let sect = doc.section_properties().unwrap();
        assert!(sect.contains(r#"<w:pgSz w:w="15840" w:h="12240" w:orient="landscape"/>"#));
        assert!(sect.contains("<w:pgMar"));
    }

    #[test]
    fn applying_twice_equals_applying_once() {
        let mut doc = Document::blank().unwrap();
        doc.push_block(ParagraphBuilder::new().text("body").build());
        doc.force_landscape().unwrap();
        let once = doc.to_bytes().unwrap();
        let first_xml = doc.body_xml();

        let report = doc.force_landscape().unwrap();
        assert!(!report.changed());
        assert_eq!(report.already_landscape, 1);
        assert_eq!(doc.body_xml(), first_xml);
        assert_eq!(
            Document::from_bytes(&once).unwrap().section_properties(),
            doc.section_properties()
        );
    }

    #[test]
    fn landscape_shaped_section_only_gains_orient() {
        let mut doc = with_section(r#"<w:sectPr><w:pgSz w:w="16838" w:h="11906" w:code="9"/></w:sectPr>"#);
        let report = doc.force_landscape().unwrap();
        assert_eq!(report.already_landscape, 1);
        assert_eq!(report.marked, 1);
        assert!(report.changed());
        assert_eq!(
            doc.section_properties().unwrap(),
            r#"<w:sectPr><w:pgSz w:w="16838" w:h="11906" w:code="9" w:orient="landscape"/></w:sectPr>"#
        );
    }

    #[test]
    fn missing_page_size_is_inserted_in_schema_order() {
        let mut doc = with_section(
            r#"<w:sectPr><w:headerReference w:type="default" r:id="rId9"/><w:pgMar w:top="720"/></w:sectPr>"#,
        );
        let report = doc.force_landscape().unwrap();
        assert_eq!(report.inserted, 1);
        let sect = doc.section_properties().unwrap();
        let header = sect.find("w:headerReference").unwrap();
        let size = sect.find("w:pgSz").unwrap();
        let margin = sect.find("w:pgMar").unwrap();
        assert!(header < size && size < margin);
    }

    #[test]
    fn empty_and_absent_sections_get_page_size() {
        let mut doc = with_section("<w:sectPr/>");
        assert_eq!(doc.force_landscape().unwrap().inserted, 1);
        assert!(doc.section_properties().unwrap().contains("w:orient=\"landscape\""));

        let mut doc = Document::blank().unwrap();
        doc.sect_pr = None;
        let report = doc.force_landscape().unwrap();
        assert_eq!(report.sections, 1);
        assert_eq!(report.inserted, 1);
        assert!(doc.section_properties().is_some());
    }

    #[test]
    fn paragraph_level_sections_are_rotated_but_revisions_are_not() {
        let mut doc = Document::blank().unwrap();
        doc.push_block(Block::from_xml(
            r#"<w:p><w:pPr><w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:sectPrChange w:id="1"><w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:sectPrChange></w:sectPr></w:pPr></w:p>"#,
        ));
        let report = doc.force_landscape().unwrap();
        assert_eq!(report.sections, 2);
        assert_eq!(report.rotated, 2);

        let block = doc.blocks()[0].xml();
        assert!(block.starts_with(r#"<w:p><w:pPr><w:sectPr><w:pgSz w:w="15840" w:h="12240" w:orient="landscape"/>"#));
        assert!(block.contains(r#"<w:sectPrChange w:id="1"><w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#));
    }
}
