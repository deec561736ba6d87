//! Range selection and deselection

use crate::commands::filter_mergeinfo;
use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::Result;
use crate::properties::Properties;
use crate::range::SelectionRange;

/// Keep (or, inverted, drop) the revisions and nodes inside a selection.
///
/// Mergeinfo in whatever survives is trimmed to revisions that actually
/// made it out, so the output never references history it no longer has.
pub struct Select {
    range: SelectionRange,
    invert: bool,
}

impl Select {
    pub fn new(range: SelectionRange) -> Self {
        Select {
            range,
            invert: false,
        }
    }

    /// The `deselect` flavor: drop what the range matches.
    pub fn inverted(range: SelectionRange) -> Self {
        Select {
            range,
            invert: true,
        }
    }

    fn keeps(&self, rev: u64, node: u32) -> bool {
        self.range.contains_node(rev, node) != self.invert
    }
}

impl Surgeon for Select {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        filter_mergeinfo(props, &ctx.emitted);
        if ctx.index == 0 && !self.keeps(ctx.revision, 0) {
            Ok(PropVerdict::Suppress)
        } else {
            Ok(PropVerdict::Keep)
        }
    }

    fn header(&mut self, ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        if self.keeps(ctx.revision, ctx.index) {
            Ok(vec![node])
        } else {
            Ok(vec![])
        }
    }
}
