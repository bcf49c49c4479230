//! Style table (`word/styles.xml`).

use std::fmt::Write as _;

use tracing::debug;

use masterdoc_shared::{Result, StyleConflict};

use crate::xml::{self, Split, escape};

/// A paragraph style definition.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDef {
    /// Style id referenced by `w:pStyle` (e.g. `Heading1`).
    pub id: String,
    /// Display name (e.g. `heading 1`; built-in names keep TOC detection working).
    pub name: String,
    pub based_on: Option<String>,
    pub next: Option<String>,
    pub font: String,
    /// Size in half-points (`22` = 11pt).
    pub size_half_points: u32,
    /// Hex RGB without `#`.
    pub color: String,
    pub bold: bool,
    /// Outline level (0 = level 1) for headings collected by TOC fields.
    pub outline_level: Option<u8>,
    /// Marks styles that are not Word built-ins.
    pub custom: bool,
}

impl StyleDef {
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "<w:style w:type=\"paragraph\"{} w:styleId=\"{}\">",
            if self.custom { " w:customStyle=\"1\"" } else { "" },
            escape(&self.id)
        );
        let _ = write!(out, "<w:name w:val=\"{}\"/>", escape(&self.name));
        if let Some(base) = &self.based_on {
            let _ = write!(out, "<w:basedOn w:val=\"{}\"/>", escape(base));
        }
        if let Some(next) = &self.next {
            let _ = write!(out, "<w:next w:val=\"{}\"/>", escape(next));
        }
        out.push_str("<w:qFormat/>");
        if let Some(level) = self.outline_level {
            let _ = write!(
                out,
                "<w:pPr><w:keepNext/><w:outlineLvl w:val=\"{level}\"/></w:pPr>"
            );
        }
        let font = escape(&self.font);
        let _ = write!(
            out,
            "<w:rPr><w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:eastAsia=\"{font}\" w:cs=\"{font}\"/>"
        );
        if self.bold {
            out.push_str("<w:b/><w:bCs/>");
        }
        let _ = write!(
            out,
            "<w:color w:val=\"{}\"/><w:sz w:val=\"{size}\"/><w:szCs w:val=\"{size}\"/></w:rPr>",
            escape(&self.color),
            size = self.size_half_points
        );
        out.push_str("</w:style>");
        out
    }
}

/// Counts from merging one style table into another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleMergeStats {
    pub added: usize,
    pub replaced: usize,
    pub kept: usize,
}

/// Parsed `w:styles` part; children are kept as serialized XML.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    split: Split,
}

impl StyleSheet {
    /// A style table with no definitions.
    pub fn empty() -> Self {
        Self {
            split: Split {
                head: "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
                       <w:styles xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">"
                    .to_string(),
                children: Vec::new(),
                tail: "</w:styles>".to_string(),
            },
        }
    }

    pub fn parse(xml_text: &str) -> Result<Self> {
        Ok(Self {
            split: xml::split_children(xml_text, "w:styles")?,
        })
    }

    pub fn to_xml(&self) -> String {
        self.split.join()
    }

    /// Ids of all `w:style` definitions, in document order.
    pub fn style_ids(&self) -> Vec<String> {
        self.split
            .children
            .iter()
            .filter_map(|child| style_id_of(child))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Serialized definition of a style.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.position(id).map(|i| self.split.children[i].as_str())
    }

    /// Insert a definition, replacing any existing style with the same id.
    pub fn upsert(&mut self, def: &StyleDef) {
        self.upsert_raw(&def.id, def.to_xml());
    }

    fn upsert_raw(&mut self, id: &str, xml_text: String) {
        match self.position(id) {
            Some(i) => self.split.children[i] = xml_text,
            None => self.split.children.push(xml_text),
        }
    }

    /// Copy style definitions from `other`, resolving id collisions per `policy`.
    pub fn merge_from(&mut self, other: &StyleSheet, policy: StyleConflict) -> StyleMergeStats {
        let mut stats = StyleMergeStats::default();
        for child in &other.split.children {
            let Some(id) = style_id_of(child) else {
                continue;
            };
            match (self.position(&id), policy) {
                (None, _) => {
                    self.split.children.push(child.clone());
                    stats.added += 1;
                }
                (Some(i), StyleConflict::LastWins) => {
                    if self.split.children[i] != *child {
                        self.split.children[i] = child.clone();
                        stats.replaced += 1;
                    } else {
                        stats.kept += 1;
                    }
                }
                (Some(_), StyleConflict::KeepFirst) => stats.kept += 1,
            }
        }
        debug!(
            added = stats.added,
            replaced = stats.replaced,
            kept = stats.kept,
            "styles merged"
        );
        stats
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.split
            .children
            .iter()
            .position(|child| style_id_of(child).as_deref() == Some(id))
    }
}

fn style_id_of(child: &str) -> Option<String> {
    if !child.starts_with("<w:style") || child.starts_with("<w:styles") {
        return None;
    }
    let (name, attrs) = xml::root_element(child).ok()?;
    if name != "w:style" {
        return None;
    }
    xml::attr(&attrs, "w:styleId").map(str::to_string)
}
