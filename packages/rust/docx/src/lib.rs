//! Minimal WordprocessingML (`.docx`) package layer for masterdoc.
//!
//! A [`Document`] keeps its main part's body as a list of serialized
//! [`Block`]s and edits the rest of the package (styles, numbering,
//! relationships, media) through small typed views. It supports what the
//! master-document pipeline needs:
//! - open / create / save (atomic) documents
//! - build paragraphs with text, inline images, and fields
//! - upsert paragraph styles and restyle paragraphs
//! - append one document to another ([`Document::append`])
//! - force landscape page setup ([`OrientationReport`])

pub mod block;
pub mod compose;
pub mod document;
pub mod numbering;
pub mod orientation;
pub mod package;
pub mod rels;
pub mod styles;

mod template;
mod xml;

pub use block::{Block, BlockKind, EMU_PER_INCH, InlineImage, ParagraphBuilder};
pub use compose::AppendStats;
pub use document::Document;
pub use numbering::Numbering;
pub use orientation::OrientationReport;
pub use package::{ContentTypes, Package, image_content_type};
pub use rels::{Relationship, Relationships};
pub use styles::{StyleDef, StyleMergeStats, StyleSheet};
pub use xml::escape;
