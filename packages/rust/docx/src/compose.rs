//! Appending one document's body to another.

use std::collections::HashMap;

use tracing::{debug, warn};

use masterdoc_shared::{MasterDocError, Result, StyleConflict};

use crate::block::Block;
use crate::document::Document;
use crate::package::Package;
use crate::rels::{
    REL_NUMBERING, REL_STYLES, Relationship, Relationships, rels_part_for, relative_target,
    resolve_target,
};
use crate::styles::{StyleMergeStats, StyleSheet};
use crate::xml;

/// Relationship types that belong to the document as a whole and are merged
/// (or ignored) rather than copied.
const DOCUMENT_LEVEL_RELS: &[&str] = &[
    REL_STYLES,
    REL_NUMBERING,
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings",
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/webSettings",
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/fontTable",
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme",
];

/// Body markers that point into the footnotes, endnotes, or comments parts.
/// Those parts are not carried over, so the markers are dropped on append.
pub const NOTE_MARKS: &[&str] = &[
    "w:footnoteReference",
    "w:endnoteReference",
    "w:commentReference",
    "w:commentRangeStart",
    "w:commentRangeEnd",
];

/// What one append did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendStats {
    pub blocks: usize,
    pub styles: StyleMergeStats,
    pub relationships: usize,
    pub parts_copied: usize,
    pub numbering_ids: usize,
    /// Footnote, endnote, and comment markers removed from the appended body.
    pub notes_dropped: usize,
}

impl Document {
    /// Append `other`'s body blocks after this document's blocks.
    ///
    /// `other`'s body-level section properties are dropped; this document's
    /// page setup stays in effect for the appended content. Footnote,
    /// endnote, and comment markers are removed (see [`NOTE_MARKS`]).
    pub fn append(&mut self, other: &Document, policy: StyleConflict) -> Result<AppendStats> {
        let mut stats = AppendStats::default();

        self.merge_namespaces(other)?;

        if let Some(their_styles) = other.styles()? {
            let mut ours = match self.styles()? {
                Some(sheet) => sheet,
                None => StyleSheet::empty(),
            };
            stats.styles = ours.merge_from(&their_styles, policy);
            self.set_styles(&ours)?;
        }

        let mut num_map = HashMap::new();
        if let Some(their_numbering) = other.numbering()? {
            let mut ours = self.numbering_or_empty()?;
            num_map = ours.merge_from(&their_numbering)?;
            stats.numbering_ids = num_map.len();
            self.set_numbering(&ours)?;
        }

        let mut copier = PartCopier::new(&other.package, &mut self.package);
        let mut rel_map: HashMap<String, String> = HashMap::new();
        for block in &other.blocks {
            for id in referenced_rel_ids(block)? {
                if rel_map.contains_key(&id) {
                    continue;
                }
                let Some(rel) = other.rels.get(&id) else {
                    warn!(rel_id = %id, "appended block references a missing relationship");
                    continue;
                };
                let new_id = if rel.external {
                    self.rels.add(&rel.rel_type, &rel.target, true)
                } else if DOCUMENT_LEVEL_RELS.contains(&rel.rel_type.as_str()) {
                    continue;
                } else {
                    let source = resolve_target(&other.main_part, &rel.target);
                    let copied = copier.copy(&source)?;
                    self.rels
                        .add(&rel.rel_type, &relative_target(&self.main_part, &copied), false)
                };
                rel_map.insert(id, new_id);
            }
        }
        stats.relationships = rel_map.len();
        stats.parts_copied = copier.finish()?;

        for block in &other.blocks {
            let (stripped, dropped) = xml::remove_elements(block.xml(), NOTE_MARKS)?;
            let block = if dropped > 0 {
                stats.notes_dropped += dropped;
                Block::from_xml(stripped)
            } else {
                block.clone()
            };
            self.blocks.push(remap_block(&block, &rel_map, &num_map)?);
            stats.blocks += 1;
        }
        if stats.notes_dropped > 0 {
            warn!(count = stats.notes_dropped, "footnote, endnote, and comment markers dropped");
        }

        self.renumber_drawing_ids()?;
        debug!(
            blocks = stats.blocks,
            relationships = stats.relationships,
            parts = stats.parts_copied,
            "document appended"
        );
        Ok(stats)
    }

    /// Number of [`NOTE_MARKS`] elements in the body.
    pub fn note_marks(&self) -> Result<usize> {
        let mut count = 0;
        for block in &self.blocks {
            xml::visit_elements(block.xml(), |name, _| {
                if NOTE_MARKS.contains(&name) {
                    count += 1;
                }
            })?;
        }
        Ok(count)
    }

    fn merge_namespaces(&mut self, other: &Document) -> Result<()> {
        let ours: HashMap<String, String> = self.namespaces()?.into_iter().collect();
        let mut declared = Vec::new();
        for (prefix, uri) in other.namespaces()? {
            match ours.get(&prefix) {
                Some(existing) if *existing != uri => {
                    warn!(prefix = %prefix, "namespace prefix bound to a different URI; keeping the first");
                }
                Some(_) => {}
                None => {
                    self.ensure_namespace(&prefix, &uri)?;
                    declared.push(prefix);
                }
            }
        }

        let their_attrs = other.root_attributes()?;
        if let Some(ignorable) = xml::attr(&their_attrs, "mc:Ignorable") {
            let bound: Vec<String> = self
                .namespaces()?
                .into_iter()
                .map(|(prefix, _)| prefix)
                .collect();
            let prefixes: Vec<String> = ignorable
                .split_whitespace()
                .filter(|p| bound.iter().any(|b| b == p))
                .map(str::to_string)
                .collect();
            if !prefixes.is_empty() {
                self.extend_ignorable(&prefixes)?;
            }
        }
        if !declared.is_empty() {
            debug!(prefixes = ?declared, "namespaces merged");
        }
        Ok(())
    }
}

/// Relationship ids referenced through `r:` attributes, in document order.
fn referenced_rel_ids(block: &Block) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    xml::visit_elements(block.xml(), |_, attrs| {
        for (key, value) in attrs {
            if key.starts_with("r:") && !ids.contains(value) {
                ids.push(value.clone());
            }
        }
    })?;
    Ok(ids)
}

fn remap_block(
    block: &Block,
    rel_map: &HashMap<String, String>,
    num_map: &HashMap<u32, u32>,
) -> Result<Block> {
    if rel_map.is_empty() && num_map.is_empty() {
        return Ok(block.clone());
    }
    let rewritten = xml::rewrite_elements(block.xml(), |name, attrs| {
        let mut changed = false;
        for (key, value) in attrs.iter_mut() {
            if key.starts_with("r:") {
                if let Some(new_id) = rel_map.get(value.as_str()) {
                    *value = new_id.clone();
                    changed = true;
                }
            }
        }
        if name == "w:numId" {
            let old = xml::attr(attrs, "w:val").and_then(|v| v.parse::<u32>().ok());
            // numId 0 means "no numbering".
            if let Some(new) = old.filter(|&id| id != 0).and_then(|id| num_map.get(&id)) {
                xml::set_attr(attrs, "w:val", new.to_string());
                changed = true;
            }
        }
        changed
    })?;
    Ok(Block::from_xml(rewritten))
}

// ---------------------------------------------------------------------------
// Part copying
// ---------------------------------------------------------------------------

/// Copies parts (and, transitively, their own relationships) from one
/// package into another under fresh names.
struct PartCopier<'a> {
    source: &'a Package,
    target: &'a mut Package,
    copied: HashMap<String, String>,
    pending_types: Vec<(String, Option<String>, String)>,
}

impl<'a> PartCopier<'a> {
    fn new(source: &'a Package, target: &'a mut Package) -> Self {
        Self {
            source,
            target,
            copied: HashMap::new(),
            pending_types: Vec::new(),
        }
    }

    /// Copy `part` and return its name in the target package.
    fn copy(&mut self, part: &str) -> Result<String> {
        if let Some(name) = self.copied.get(part) {
            return Ok(name.clone());
        }
        let data = self.source.part(part).ok_or_else(|| {
            MasterDocError::document(format!("relationship points at missing part {part}"))
        })?;

        let new_name = fresh_name(self.target, part);
        self.target.set_part(new_name.clone(), data.to_vec());
        self.copied.insert(part.to_string(), new_name.clone());

        let source_types = self.source.content_types()?;
        let ext = part.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match source_types.override_for(part) {
            Some(ct) => self.pending_types.push((new_name.clone(), None, ct.to_string())),
            None => {
                if let Some(ct) = ext.as_deref().and_then(|e| source_types.default_for(e)) {
                    self.pending_types
                        .push((new_name.clone(), ext.clone(), ct.to_string()));
                }
            }
        }

        // The copied part's own relationships (e.g. images in a header).
        if let Some(rels_text) = self.source.part_str(&rels_part_for(part))? {
            let rels = Relationships::parse(&rels_text)?;
            let mut out = Relationships::default();
            for rel in rels.iter() {
                let target = if rel.external {
                    rel.target.clone()
                } else {
                    let copied = self.copy(&resolve_target(part, &rel.target))?;
                    relative_target(&new_name, &copied)
                };
                // Ids are referenced from inside the copied part and must not change.
                out.insert(Relationship {
                    id: rel.id.clone(),
                    rel_type: rel.rel_type.clone(),
                    target,
                    external: rel.external,
                });
            }
            self.target
                .set_part(rels_part_for(&new_name), out.to_xml().into_bytes());
        }
        Ok(new_name)
    }

    /// Record content types for everything copied; returns the part count.
    fn finish(self) -> Result<usize> {
        if self.pending_types.is_empty() {
            return Ok(self.copied.len());
        }
        let mut types = self.target.content_types()?;
        for (part, ext, ct) in &self.pending_types {
            match ext {
                Some(ext) => types.ensure_default(ext, ct),
                None => types.set_override(part, ct),
            }
        }
        self.target.set_content_types(&types);
        Ok(self.copied.len())
    }
}

/// A name for `part` that is free in `package`: same directory and
/// extension, with a numeric suffix.
fn fresh_name(package: &Package, part: &str) -> String {
    let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
    let (stem, ext) = file.rsplit_once('.').unwrap_or((file, "bin"));
    let stem = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let stem = if stem.is_empty() { "part" } else { stem };
    if dir.is_empty() {
        package.unique_part_name("word", stem, ext)
    } else {
        package.unique_part_name(dir, stem, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{InlineImage, ParagraphBuilder};
    use crate::numbering::Numbering;
    use crate::rels::{REL_HYPERLINK, REL_IMAGE};
    use crate::styles::StyleDef;

    fn doc_with(texts: &[&str]) -> Document {
        let mut doc = Document::blank().unwrap();
        for text in texts {
            doc.push_block(ParagraphBuilder::new().text(*text).build());
        }
        doc
    }

    fn with_image(mut doc: Document, bytes: Vec<u8>) -> Document {
        let rel = doc.add_image(bytes, "png").unwrap();
        let id = doc.next_drawing_id().unwrap();
        doc.push_block(
            ParagraphBuilder::new()
                .image(InlineImage::with_inches(rel, id, "pic", 1.0, 1.0))
                .build(),
        );
        doc
    }

    fn compose(documents: Vec<Document>, policy: StyleConflict) -> Result<Document> {
        let mut iter = documents.into_iter();
        let mut base = iter.next().unwrap();
        for doc in iter {
            base.append(&doc, policy)?;
        }
        Ok(base)
    }

    fn style(id: &str, color: &str) -> StyleDef {
        StyleDef {
            id: id.into(),
            name: id.into(),
            based_on: None,
            next: None,
            font: "Segoe UI".into(),
            size_half_points: 22,
            color: color.into(),
            bold: false,
            outline_level: None,
            custom: true,
        }
    }

    #[test]
    fn blocks_are_appended_in_order_and_section_dropped() {
        let merged = compose(
            vec![doc_with(&["a1", "a2"]), doc_with(&["b1"]), doc_with(&["c1"])],
            StyleConflict::KeepFirst,
        )
        .unwrap();
        assert_eq!(merged.paragraph_texts().unwrap(), vec!["a1", "a2", "b1", "c1"]);
        assert!(merged.section_properties().is_some());
        assert!(!merged.blocks().iter().any(Block::has_section_properties));
    }

    #[test]
    fn note_marks_are_dropped_with_their_parts() {
        const REL_FOOTNOTES: &str =
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footnotes";
        let mut other = doc_with(&["b"]);
        other.package.set_part(
            "word/footnotes.xml",
            br#"<w:footnotes><w:footnote w:id="1"><w:p><w:r><w:t>note</w:t></w:r></w:p></w:footnote></w:footnotes>"#.to_vec(),
        );
        other.rels.add(REL_FOOTNOTES, "footnotes.xml", false);
        other.push_block(Block::from_xml(
            r#"<w:p><w:commentRangeStart w:id="0"/><w:r><w:t>cited</w:t></w:r><w:r><w:footnoteReference w:id="1"/></w:r><w:commentRangeEnd w:id="0"/><w:r><w:commentReference w:id="0"/></w:r></w:p>"#,
        ));
        assert_eq!(other.note_marks().unwrap(), 4);

        let mut merged = doc_with(&["a"]);
        let stats = merged.append(&other, StyleConflict::KeepFirst).unwrap();
        assert_eq!(stats.notes_dropped, 4);
        assert_eq!(merged.note_marks().unwrap(), 0);
        assert_eq!(merged.paragraph_texts().unwrap(), vec!["a", "b", "cited"]);
        assert!(merged.package().part("word/footnotes.xml").is_none());
        assert!(!merged.relationships().iter().any(|r| r.rel_type == REL_FOOTNOTES));

        let reopened = Document::from_bytes(&merged.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.note_marks().unwrap(), 0);
    }

    #[test]
    fn images_are_copied_under_fresh_names() {
        let base = with_image(doc_with(&["a"]), vec![1, 1, 1]);
        let other = with_image(doc_with(&["b"]), vec![2, 2]);

        let mut merged = base.clone();
        let stats = merged.append(&other, StyleConflict::KeepFirst).unwrap();
        assert_eq!(stats.relationships, 1);
        assert_eq!(stats.parts_copied, 1);

        let ids: Vec<String> = merged
            .blocks()
            .iter()
            .flat_map(|b| b.image_rel_ids().unwrap())
            .collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        let second = merged.relationships().get(&ids[1]).unwrap();
        assert_eq!(second.rel_type, REL_IMAGE);
        let part = resolve_target("word/document.xml", &second.target);
        assert_eq!(merged.package().part(&part), Some(&[2u8, 2][..]));
        assert_eq!(
            merged.package().part("word/media/image1.png"),
            Some(&[1u8, 1, 1][..])
        );

        // Drawing ids stay unique after the merge.
        assert_eq!(merged.next_drawing_id().unwrap(), 3);
    }

    #[test]
    fn external_hyperlinks_keep_their_target() {
        let mut other = doc_with(&[]);
        let id = other.rels.add(REL_HYPERLINK, "https://example.com", true);
        other.push_block(Block::from_xml(format!(
            r#"<w:p><w:hyperlink r:id="{id}"><w:r><w:t>link</w:t></w:r></w:hyperlink></w:p>"#
        )));

        let mut base = doc_with(&["a"]);
        base.append(&other, StyleConflict::KeepFirst).unwrap();

        let block = base.blocks().last().unwrap();
        let (_, attrs) = xml::root_element(
            &block.xml()[block.xml().find("<w:hyperlink").unwrap()..],
        )
        .unwrap();
        let new_id = xml::attr(&attrs, "r:id").unwrap();
        let rel = base.relationships().get(new_id).unwrap();
        assert!(rel.external);
        assert_eq!(rel.target, "https://example.com");
    }

    #[test]
    fn styles_follow_conflict_policy() {
        let mut base = doc_with(&["a"]);
        let mut sheet = base.styles().unwrap().unwrap();
        sheet.upsert(&style("Quote", "111111"));
        base.set_styles(&sheet).unwrap();

        let mut other = doc_with(&["b"]);
        let mut sheet = other.styles().unwrap().unwrap();
        sheet.upsert(&style("Quote", "222222"));
        sheet.upsert(&style("Callout", "333333"));
        other.set_styles(&sheet).unwrap();

        let mut keep = base.clone();
        keep.append(&other, StyleConflict::KeepFirst).unwrap();
        let merged = keep.styles().unwrap().unwrap();
        assert!(merged.get("Quote").unwrap().contains("111111"));
        assert!(merged.contains("Callout"));

        let mut last = base.clone();
        last.append(&other, StyleConflict::LastWins).unwrap();
        assert!(last.styles().unwrap().unwrap().get("Quote").unwrap().contains("222222"));
    }

    #[test]
    fn numbering_references_are_rewritten() {
        let list = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"/><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#;
        let item = r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>item</w:t></w:r></w:p>"#;

        let mut base = doc_with(&[]);
        base.set_numbering(&Numbering::parse(list).unwrap()).unwrap();
        base.push_block(Block::from_xml(item));
        let mut other = doc_with(&[]);
        other.set_numbering(&Numbering::parse(list).unwrap()).unwrap();
        other.push_block(Block::from_xml(item));

        base.append(&other, StyleConflict::KeepFirst).unwrap();
        assert!(base.blocks()[0].xml().contains(r#"<w:numId w:val="1"/>"#));
        assert!(base.blocks()[1].xml().contains(r#"<w:numId w:val="2"/>"#));
        assert_eq!(base.numbering().unwrap().unwrap().num_ids(), vec![1, 2]);
    }

    #[test]
    fn namespaces_are_unioned() {
        let mut other = doc_with(&["b"]);
        other
            .ensure_namespace("w14", "http://schemas.microsoft.com/office/word/2010/wordml")
            .unwrap();
        let mut base = doc_with(&["a"]);
        base.append(&other, StyleConflict::KeepFirst).unwrap();
        assert!(base.namespaces().unwrap().iter().any(|(p, _)| p == "w14"));
    }

    #[test]
    fn merged_document_survives_serialization() {
        let base = with_image(doc_with(&["a"]), vec![1]);
        let other = with_image(doc_with(&["b"]), vec![2]);
        let merged = compose(vec![base, other], StyleConflict::KeepFirst).unwrap();
        let reread = Document::from_bytes(&merged.to_bytes().unwrap()).unwrap();
        assert_eq!(reread.blocks().len(), 4);
        assert!(reread.package().has_part("word/media/image2.png"));
        let _ = StyleSheet::parse(&reread.package().part_str("word/styles.xml").unwrap().unwrap()).unwrap();
    }
}
