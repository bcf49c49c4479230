//! A WordprocessingML document: the main part's body as a list of blocks,
//! plus the package it lives in.

use std::path::Path;

use tracing::debug;

use masterdoc_shared::{MasterDocError, Result, write_atomic};

use crate::block::Block;
use crate::numbering::Numbering;
use crate::package::{Package, image_content_type};
use crate::rels::{
    REL_IMAGE, REL_NUMBERING, REL_OFFICE_DOCUMENT, REL_STYLES, Relationships, rels_part_for,
    relative_target, resolve_target,
};
use crate::styles::StyleSheet;
use crate::template::{
    self, CT_NUMBERING, CT_STYLES, NUMBERING_PART, REQUIRED_NAMESPACES, STYLES_PART,
};
use crate::xml::{self, Split};

const NUMBERING_SKELETON: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#;

/// An open `.docx` document.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) package: Package,
    /// Name of the main document part (usually `word/document.xml`).
    pub(crate) main_part: String,
    /// Markup up to and including `<w:body>`.
    pub(crate) head: String,
    pub(crate) blocks: Vec<Block>,
    /// The body-level `w:sectPr`, always last in the body.
    pub(crate) sect_pr: Option<String>,
    /// `</w:body>` and everything after it.
    pub(crate) tail: String,
    pub(crate) rels: Relationships,
}

impl Document {
    /// A new document with Letter portrait page setup and a minimal style table.
    pub fn blank() -> Result<Self> {
        let mut package = Package::default();
        for (name, content) in template::blank_parts() {
            package.set_part(name, content.into_bytes());
        }
        Self::from_package(package)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_package(Package::from_bytes(bytes)?)
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::from_package(Package::open(path)?)
    }

    pub fn from_package(package: Package) -> Result<Self> {
        let root_rels = package
            .part_str("_rels/.rels")?
            .ok_or_else(|| MasterDocError::document("package has no _rels/.rels"))?;
        let main_part = Relationships::parse(&root_rels)?
            .find_by_type(REL_OFFICE_DOCUMENT)
            .map(|rel| resolve_target("", &rel.target))
            .ok_or_else(|| MasterDocError::document("package has no main document relationship"))?;

        let body_xml = package
            .part_str(&main_part)?
            .ok_or_else(|| MasterDocError::document(format!("missing main part {main_part}")))?;
        let Split {
            head,
            mut children,
            tail,
        } = xml::split_children(&body_xml, "w:body")?;

        let ends_with_section = match children.last() {
            Some(last) => xml::root_element(last)?.0 == "w:sectPr",
            None => false,
        };
        let sect_pr = if ends_with_section { children.pop() } else { None };

        let rels = match package.part_str(&rels_part_for(&main_part))? {
            Some(text) => Relationships::parse(&text)?,
            None => Relationships::default(),
        };

        debug!(main_part = %main_part, blocks = children.len(), "document parsed");
        Ok(Self {
            package,
            main_part,
            head,
            blocks: children.into_iter().map(Block::from_xml).collect(),
            sect_pr,
            tail,
            rels,
        })
    }

    /// Serialize to `.docx` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut package = self.package.clone();
        package.set_part(self.main_part.clone(), self.body_xml().into_bytes());
        package.set_part(rels_part_for(&self.main_part), self.rels.to_xml().into_bytes());
        package.to_bytes()
    }

    /// Write to `path` through a temporary sibling file and a rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "document saved");
        Ok(())
    }

    pub(crate) fn body_xml(&self) -> String {
        let mut out = String::with_capacity(
            self.head.len() + self.tail.len() + self.blocks.iter().map(|b| b.xml().len()).sum::<usize>(),
        );
        out.push_str(&self.head);
        for block in &self.blocks {
            out.push_str(block.xml());
        }
        if let Some(sect_pr) = &self.sect_pr {
            out.push_str(sect_pr);
        }
        out.push_str(&self.tail);
        out
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn relationships(&self) -> &Relationships {
        &self.rels
    }

    // -----------------------------------------------------------------------
    // Body
    // -----------------------------------------------------------------------

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Text of every top-level paragraph, in order.
    pub fn paragraph_texts(&self) -> Result<Vec<String>> {
        self.blocks
            .iter()
            .filter(|b| b.is_paragraph())
            .map(Block::text)
            .collect()
    }

    pub fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Insert blocks, in order, before the current first block.
    pub fn prepend_blocks(&mut self, blocks: Vec<Block>) {
        self.blocks.splice(0..0, blocks);
    }

    /// The body-level section properties, if the body has any.
    pub fn section_properties(&self) -> Option<&str> {
        self.sect_pr.as_deref()
    }

    /// Set the style of every paragraph in the body, including those in
    /// tables and content controls; returns how many were restyled.
    pub fn restyle_paragraphs(&mut self, style_id: &str) -> Result<usize> {
        let mut count = 0;
        for block in &mut self.blocks {
            let (restyled, touched) = block.restyle_all(style_id)?;
            if touched > 0 {
                *block = restyled;
                count += touched;
            }
        }
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Root namespaces
    // -----------------------------------------------------------------------

    /// Attributes of the root element (namespace declarations and
    /// `mc:Ignorable`).
    pub fn root_attributes(&self) -> Result<Vec<(String, String)>> {
        Ok(xml::root_element(&self.head)?.1)
    }

    /// `(prefix, uri)` namespace declarations on the root element.
    pub fn namespaces(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .root_attributes()?
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix("xmlns:")
                    .map(|prefix| (prefix.to_string(), value))
            })
            .collect())
    }

    /// Declare `prefix` on the root element unless it is already declared.
    ///
    /// Returns `false` when the prefix exists with a different URI; the
    /// existing declaration wins.
    pub fn ensure_namespace(&mut self, prefix: &str, uri: &str) -> Result<bool> {
        let key = format!("xmlns:{prefix}");
        let mut compatible = true;
        let mut changed = false;
        let head = xml::rewrite_root(&self.head, |_, attrs| match xml::attr(attrs, &key) {
            Some(existing) => compatible = existing == uri,
            None => {
                xml::set_attr(attrs, &key, uri);
                changed = true;
            }
        })?;
        if changed {
            self.head = head;
        }
        Ok(compatible)
    }

    /// Add prefixes to the root's `mc:Ignorable` list.
    pub(crate) fn extend_ignorable(&mut self, prefixes: &[String]) -> Result<()> {
        let mut changed = false;
        let head = xml::rewrite_root(&self.head, |_, attrs| {
            let mut list: Vec<String> = xml::attr(attrs, "mc:Ignorable")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            for prefix in prefixes {
                if !list.contains(prefix) {
                    list.push(prefix.clone());
                    changed = true;
                }
            }
            if changed {
                xml::set_attr(attrs, "mc:Ignorable", list.join(" "));
            }
        })?;
        if changed {
            self.head = head;
        }
        Ok(())
    }

    /// Make sure the prefixes used by generated paragraphs are declared.
    fn ensure_required_namespaces(&mut self) -> Result<()> {
        for (prefix, uri) in REQUIRED_NAMESPACES {
            self.ensure_namespace(prefix, uri)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Styles and numbering parts
    // -----------------------------------------------------------------------

    fn related_part(&self, rel_type: &str) -> Option<String> {
        self.rels
            .find_by_type(rel_type)
            .filter(|rel| !rel.external)
            .map(|rel| resolve_target(&self.main_part, &rel.target))
    }

    /// The style table, if the document has one.
    pub fn styles(&self) -> Result<Option<StyleSheet>> {
        match self.related_part(REL_STYLES) {
            Some(part) => match self.package.part_str(&part)? {
                Some(text) => Ok(Some(StyleSheet::parse(&text)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Replace the style table, creating the part when missing.
    pub fn set_styles(&mut self, sheet: &StyleSheet) -> Result<()> {
        let part = self.ensure_related_part(REL_STYLES, STYLES_PART, CT_STYLES)?;
        self.package.set_part(part, sheet.to_xml().into_bytes());
        Ok(())
    }

    pub fn numbering(&self) -> Result<Option<Numbering>> {
        match self.related_part(REL_NUMBERING) {
            Some(part) => match self.package.part_str(&part)? {
                Some(text) => Ok(Some(Numbering::parse(&text)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// An existing numbering table, or an empty one.
    pub(crate) fn numbering_or_empty(&self) -> Result<Numbering> {
        match self.numbering()? {
            Some(numbering) => Ok(numbering),
            None => Numbering::parse(NUMBERING_SKELETON),
        }
    }

    pub fn set_numbering(&mut self, numbering: &Numbering) -> Result<()> {
        let part = self.ensure_related_part(REL_NUMBERING, NUMBERING_PART, CT_NUMBERING)?;
        self.package.set_part(part, numbering.to_xml().into_bytes());
        Ok(())
    }

    fn ensure_related_part(
        &mut self,
        rel_type: &str,
        default_part: &str,
        content_type: &str,
    ) -> Result<String> {
        if let Some(part) = self.related_part(rel_type) {
            return Ok(part);
        }
        let part = default_part.to_string();
        let target = relative_target(&self.main_part, &part);
        self.rels.add(rel_type, &target, false);
        let mut types = self.package.content_types()?;
        types.set_override(&part, content_type);
        self.package.set_content_types(&types);
        Ok(part)
    }

    // -----------------------------------------------------------------------
    // Images and drawings
    // -----------------------------------------------------------------------

    /// Store image bytes as a media part and return the relationship id
    /// to reference it with.
    pub fn add_image(&mut self, bytes: Vec<u8>, ext: &str) -> Result<String> {
        let ext = ext.to_ascii_lowercase();
        let content_type = image_content_type(&ext).ok_or_else(|| {
            MasterDocError::document(format!("unsupported image type .{ext}"))
        })?;
        // Picture runs use the drawing prefixes.
        self.ensure_required_namespaces()?;

        let dir = match self.main_part.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/media"),
            None => "media".to_string(),
        };
        let part = self.package.unique_part_name(&dir, "image", &ext);
        self.package.set_part(part.clone(), bytes);

        let mut types = self.package.content_types()?;
        types.ensure_default(&ext, content_type);
        self.package.set_content_types(&types);

        let target = relative_target(&self.main_part, &part);
        Ok(self.rels.add(REL_IMAGE, &target, false))
    }

    /// Largest `wp:docPr` id in use plus one.
    pub fn next_drawing_id(&self) -> Result<u32> {
        let mut max = 0u32;
        for block in &self.blocks {
            xml::visit_elements(block.xml(), |name, attrs| {
                if name == "wp:docPr" {
                    if let Some(id) = xml::attr(attrs, "id").and_then(|v| v.parse::<u32>().ok()) {
                        max = max.max(id);
                    }
                }
            })?;
        }
        Ok(max + 1)
    }

    /// Renumber every `wp:docPr` id sequentially from 1.
    pub fn renumber_drawing_ids(&mut self) -> Result<u32> {
        let mut next = 1u32;
        for block in &mut self.blocks {
            if !block.xml().contains("<wp:docPr") {
                continue;
            }
            let rewritten = xml::rewrite_elements(block.xml(), |name, attrs| {
                if name != "wp:docPr" {
                    return false;
                }
                xml::set_attr(attrs, "id", next.to_string());
                next += 1;
                true
            })?;
            *block = Block::from_xml(rewritten);
        }
        Ok(next - 1)
    }
}
