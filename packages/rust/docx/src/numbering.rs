//! Numbering definitions (`word/numbering.xml`) and their merge.

use std::collections::HashMap;

use masterdoc_shared::Result;

use crate::xml::{self, Split};

/// Parsed `w:numbering` part.
#[derive(Debug, Clone)]
pub struct Numbering {
    split: Split,
}

impl Numbering {
    pub fn parse(xml_text: &str) -> Result<Self> {
        Ok(Self {
            split: xml::split_children(xml_text, "w:numbering")?,
        })
    }

    pub fn to_xml(&self) -> String {
        self.split.join()
    }

    pub fn abstract_ids(&self) -> Vec<u32> {
        self.ids_of("w:abstractNum", "w:abstractNumId")
    }

    pub fn num_ids(&self) -> Vec<u32> {
        self.ids_of("w:num", "w:numId")
    }

    fn ids_of(&self, element: &str, key: &str) -> Vec<u32> {
        self.split
            .children
            .iter()
            .filter_map(|child| {
                let (name, attrs) = xml::root_element(child).ok()?;
                if name != element {
                    return None;
                }
                xml::attr(&attrs, key)?.parse().ok()
            })
            .collect()
    }

    /// Append `other`'s definitions with ids shifted past this table's.
    ///
    /// Returns the mapping from `other`'s `w:numId` values to the new ones,
    /// which callers apply to the paragraphs they move across.
    pub fn merge_from(&mut self, other: &Numbering) -> Result<HashMap<u32, u32>> {
        let abstract_offset = self.abstract_ids().into_iter().max().map_or(0, |m| m + 1);
        let num_offset = self.num_ids().into_iter().max().unwrap_or(0);

        let mut num_map = HashMap::new();
        let mut abstracts = Vec::new();
        let mut nums = Vec::new();

        for child in &other.split.children {
            let (name, attrs) = xml::root_element(child)?;
            match name.as_str() {
                "w:abstractNum" => {
                    let rewritten = xml::rewrite_elements(child, |elem, attrs| {
                        elem == "w:abstractNum" && shift_attr(attrs, "w:abstractNumId", abstract_offset)
                    })?;
                    abstracts.push(rewritten);
                }
                "w:num" => {
                    if let Some(old) = xml::attr(&attrs, "w:numId").and_then(|v| v.parse::<u32>().ok()) {
                        num_map.insert(old, old + num_offset);
                    }
                    let rewritten = xml::rewrite_elements(child, |elem, attrs| match elem {
                        "w:num" => shift_attr(attrs, "w:numId", num_offset),
                        "w:abstractNumId" => shift_attr(attrs, "w:val", abstract_offset),
                        _ => false,
                    })?;
                    nums.push(rewritten);
                }
                // numIdMacAtCleanup and friends only make sense for the source file.
                _ => {}
            }
        }

        // Schema order: every w:abstractNum precedes every w:num.
        let insert_at = self
            .split
            .children
            .iter()
            .position(|child| child.starts_with("<w:num ") || child.starts_with("<w:num>"))
            .unwrap_or(self.split.children.len());
        self.split.children.splice(insert_at..insert_at, abstracts);

        let nums_end = self
            .split
            .children
            .iter()
            .rposition(|child| child.starts_with("<w:num ") || child.starts_with("<w:num>"))
            .map_or(self.split.children.len(), |i| i + 1);
        self.split.children.splice(nums_end..nums_end, nums);

        Ok(num_map)
    }
}

fn shift_attr(attrs: &mut Vec<(String, String)>, key: &str, offset: u32) -> bool {
    let Some(value) = xml::attr(attrs, key).and_then(|v| v.parse::<u32>().ok()) else {
        return false;
    };
    xml::set_attr(attrs, key, (value + offset).to_string());
    true
}
