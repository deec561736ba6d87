//! Contiguous revision renumbering

use std::collections::BTreeMap;

use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::Result;
use crate::mergeinfo::MergeRanges;
use crate::properties::Properties;

/// Reassign revision numbers contiguously from a base.
///
/// Copy sources are looked up in the old-to-new map; an unknown
/// predecessor resolves to the highest renumbered revision at or below
/// it. Mergeinfo is rewritten revision by revision through the map and
/// re-coalesced.
pub struct Renumber {
    next: u64,
    map: BTreeMap<u64, u64>,
}

impl Renumber {
    pub fn new(base: u64) -> Self {
        Renumber {
            next: base,
            map: BTreeMap::new(),
        }
    }

    fn lookup(&self, old: u64) -> Option<u64> {
        self.map
            .get(&old)
            .or_else(|| self.map.range(..=old).next_back().map(|(_, new)| new))
            .copied()
    }
}

impl Surgeon for Renumber {
    fn revision(&mut self, ctx: &mut Context, _line: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let new = self.next;
        self.next += 1;
        self.map.insert(ctx.revision, new);
        Ok(Some(format!("Revision-number: {new}\n").into_bytes()))
    }

    fn properties(&mut self, _ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        let map = &self.map;
        props.mutate_mergeinfo(|path, ranges| {
            let Ok(mut parsed) = MergeRanges::parse(ranges) else {
                return Some((path.to_string(), ranges.to_string()));
            };
            parsed.map_revisions(|rev| map.get(&rev).copied());
            if parsed.is_empty() {
                None
            } else {
                Some((path.to_string(), parsed.to_string()))
            }
        });
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, _ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        node.header.replace_field("Node-copyfrom-rev", |old| {
            let mapped = std::str::from_utf8(old)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .and_then(|r| self.lookup(r));
            match mapped {
                Some(new) => new.to_string().into_bytes(),
                None => old.to_vec(),
            }
        });
        Ok(vec![node])
    }
}
