//! Package relationships (`*.rels` parts).

use masterdoc_shared::Result;

use crate::xml::{self, escape};

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"` (hyperlinks and linked files).
    pub external: bool,
}

/// The relationships of one source part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml_text: &str) -> Result<Self> {
        let mut items = Vec::new();
        xml::visit_elements(xml_text, |name, attrs| {
            if name != "Relationship" {
                return;
            }
            if let (Some(id), Some(rel_type), Some(target)) = (
                xml::attr(attrs, "Id"),
                xml::attr(attrs, "Type"),
                xml::attr(attrs, "Target"),
            ) {
                items.push(Relationship {
                    id: id.to_string(),
                    rel_type: rel_type.to_string(),
                    target: target.to_string(),
                    external: xml::attr(attrs, "TargetMode") == Some("External"),
                });
            }
        })?;
        Ok(Self { items })
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        );
        for rel in &self.items {
            out.push_str(&format!(
                "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"{}/>",
                escape(&rel.id),
                escape(&rel.rel_type),
                escape(&rel.target),
                if rel.external {
                    " TargetMode=\"External\""
                } else {
                    ""
                }
            ));
        }
        out.push_str("</Relationships>");
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn find_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type == rel_type)
    }

    /// Insert a relationship keeping its id; an existing entry with that id
    /// is replaced.
    pub fn insert(&mut self, rel: Relationship) {
        match self.items.iter_mut().find(|r| r.id == rel.id) {
            Some(slot) => *slot = rel,
            None => self.items.push(rel),
        }
    }

    /// Add a relationship under a fresh `rIdN` id and return that id.
    pub fn add(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let id = (1..)
            .map(|n| format!("rId{n}"))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| format!("rId{}", self.items.len() + 1));
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external,
        });
        id
    }
}

/// Name of the `.rels` part holding a part's relationships.
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target relative to the directory of its source part.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Express `part` as a target relative to the directory of `source_part`.
///
/// Parts outside that directory are given as absolute (`/`-prefixed) names.
pub fn relative_target(source_part: &str, part: &str) -> String {
    match source_part.rsplit_once('/') {
        Some((dir, _)) => match part.strip_prefix(&format!("{dir}/")) {
            Some(rest) => rest.to_string(),
            None => format!("/{part}"),
        },
        None => part.to_string(),
    }
}
