//! Merging decorated documents into one.

use tracing::{debug, info, instrument};

use masterdoc_docx::{AppendStats, Document};
use masterdoc_shared::{MasterDocError, Result, StyleConflict};

/// Totals over every append of one composition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeTotals {
    pub documents: usize,
    pub blocks: usize,
    pub styles_added: usize,
    pub styles_replaced: usize,
    pub parts_copied: usize,
    pub relationships: usize,
}

impl ComposeTotals {
    fn add(&mut self, stats: &AppendStats) {
        self.documents += 1;
        self.blocks += stats.blocks;
        self.styles_added += stats.styles.added;
        self.styles_replaced += stats.styles.replaced;
        self.parts_copied += stats.parts_copied;
        self.relationships += stats.relationships;
    }
}

/// Merge `documents` in order into the first one.
///
/// `on_append` is called with the 1-based index of each appended document.
#[instrument(skip_all, fields(documents = documents.len(), ?policy))]
pub fn compose(
    documents: Vec<Document>,
    policy: StyleConflict,
    mut on_append: impl FnMut(usize, usize),
) -> Result<(Document, ComposeTotals)> {
    let total = documents.len();
    let mut iter = documents.into_iter();
    let mut base = iter
        .next()
        .ok_or_else(|| MasterDocError::compose("no documents to compose"))?;

    let mut totals = ComposeTotals {
        documents: 1,
        blocks: base.blocks().len(),
        ..ComposeTotals::default()
    };
    for (i, doc) in iter.enumerate() {
        let stats = base.append(&doc, policy)?;
        debug!(index = i + 1, blocks = stats.blocks, parts = stats.parts_copied, "document appended");
        totals.add(&stats);
        on_append(i + 1, total - 1);
    }

    info!(
        documents = totals.documents,
        blocks = totals.blocks,
        styles_added = totals.styles_added,
        parts_copied = totals.parts_copied,
        "composition complete"
    );
    Ok((base, totals))
}
