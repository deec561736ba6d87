//! Pattern-driven node filtering: `expunge` and `sift`

use crate::commands::{any_match, PathPattern};
use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::Result;
use crate::mergeinfo::MergeRanges;
use crate::properties::Properties;
use crate::range::SelectionRange;

/// Drop (`expunge`) or keep only (`sift`) the nodes whose path or copy
/// source matches one of the patterns.
///
/// Mergeinfo lines whose path falls on the dropped side go with them, and
/// the ranges that remain are trimmed to emitted revisions. Revisions
/// left without nodes are omitted.
pub struct Sift {
    patterns: Vec<PathPattern>,
    keep_matching: bool,
    range: SelectionRange,
}

impl Sift {
    pub fn expunge(patterns: Vec<PathPattern>, range: SelectionRange) -> Self {
        Sift {
            patterns,
            keep_matching: false,
            range,
        }
    }

    pub fn sift(patterns: Vec<PathPattern>, range: SelectionRange) -> Self {
        Sift {
            patterns,
            keep_matching: true,
            range,
        }
    }

    fn keeps_path(&self, path: &str) -> bool {
        any_match(&self.patterns, path) == self.keep_matching
    }
}

impl Surgeon for Sift {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(PropVerdict::Keep);
        }
        let keep_matching = self.keep_matching;
        let patterns = &self.patterns;
        let emitted = &ctx.emitted;
        props.mutate_mergeinfo(|path, ranges| {
            if any_match(patterns, path.trim_start_matches('/')) != keep_matching {
                return None;
            }
            let Ok(mut parsed) = MergeRanges::parse(ranges) else {
                return Some((path.to_string(), ranges.to_string()));
            };
            parsed.retain_revisions(|rev| emitted.contains(rev));
            if parsed.is_empty() {
                None
            } else {
                Some((path.to_string(), parsed.to_string()))
            }
        });
        if ctx.index == 0 {
            Ok(PropVerdict::Suppress)
        } else {
            Ok(PropVerdict::Keep)
        }
    }

    fn header(&mut self, ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(vec![node]);
        }
        let path_hit = node.header.path().map(|p| !self.keeps_path(&p));
        let copy_hit = node
            .header
            .copyfrom()
            .map(|(_, src)| !self.keeps_path(&src));
        if path_hit.unwrap_or(false) || copy_hit.unwrap_or(false) {
            Ok(vec![])
        } else {
            Ok(vec![node])
        }
    }
}
