//! Copy-graph surgery: `filecopy`, `skipcopy`, `reduce`

use std::collections::HashMap;
use std::io::Write;

use crate::commands::filter_mergeinfo;
use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::{DumpError, Result};
use crate::range::SelectionRange;
use crate::section::NodeAction;

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Materialize pure file copies.
///
/// The stream is walked with the most recent content per path (and per
/// basename) cached. A file node that is nothing but a copy reference
/// gets the cached source content inlined and its copy headers removed.
pub struct FileCopy {
    range: SelectionRange,
    by_basename: bool,
    contents: HashMap<String, Vec<u8>>,
    basenames: HashMap<String, Vec<u8>>,
}

impl FileCopy {
    pub fn new(range: SelectionRange, by_basename: bool) -> Self {
        FileCopy {
            range,
            by_basename,
            contents: HashMap::new(),
            basenames: HashMap::new(),
        }
    }

    fn lookup(&self, source: &str) -> Option<&Vec<u8>> {
        if self.by_basename {
            self.contents
                .get(source)
                .or_else(|| self.basenames.get(basename(source)))
        } else {
            self.contents.get(source)
        }
    }
}

impl Surgeon for FileCopy {
    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        let in_range = self.range.contains_node(ctx.revision, ctx.index);
        if in_range && node.content.is_none() && !node.header.is_dir(&ctx.dirs) {
            if let Some((_, source)) = node.header.copyfrom() {
                if let Some(stash) = self.lookup(&source) {
                    node.content = Some(stash.clone());
                    node.header.delete_field("Node-copyfrom-rev");
                    node.header.delete_field("Node-copyfrom-path");
                    node.header.strip_checksums();
                }
            }
        }
        if let (Some(path), Some(content)) = (node.header.path(), &node.content) {
            self.basenames
                .insert(basename(&path).to_string(), content.clone());
            self.contents.insert(path, content.clone());
        }
        Ok(vec![node])
    }
}

/// Splice out an intermediate copy: the second selected copy node takes
/// the first one's copy source.
pub struct SkipCopy {
    range: SelectionRange,
    source: Option<(u64, String)>,
    seen: u32,
}

impl SkipCopy {
    pub fn new(range: SelectionRange) -> Self {
        SkipCopy {
            range,
            source: None,
            seen: 0,
        }
    }
}

impl Surgeon for SkipCopy {
    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(vec![node]);
        }
        self.seen += 1;
        let copyfrom = node.header.copyfrom().ok_or_else(|| {
            DumpError::conflict(format!(
                "skipcopy: selected node {}.{} is not a copy",
                ctx.revision, ctx.index
            ))
        })?;
        match self.seen {
            1 => self.source = Some(copyfrom),
            2 => {
                if let Some((rev, path)) = self.source.clone() {
                    node.header
                        .replace_field("Node-copyfrom-rev", |_| rev.to_string().into_bytes());
                    node.header
                        .replace_field("Node-copyfrom-path", |_| path.into_bytes());
                }
            }
            _ => {
                return Err(DumpError::conflict(
                    "skipcopy: selection matched more than two nodes",
                ))
            }
        }
        Ok(vec![node])
    }

    fn finish(&mut self, _ctx: &mut Context, _out: &mut dyn Write) -> Result<()> {
        if self.seen != 2 {
            return Err(DumpError::conflict(format!(
                "skipcopy: selection matched {} nodes, wanted exactly two copies",
                self.seen
            )));
        }
        Ok(())
    }
}

/// Drop plain file modifications, keeping everything structurally
/// significant; useful for shrinking a stream into a test case.
pub struct Reduce {
    range: SelectionRange,
}

impl Reduce {
    pub fn new(range: SelectionRange) -> Self {
        Reduce { range }
    }
}

impl Surgeon for Reduce {
    fn properties(
        &mut self,
        ctx: &mut Context,
        props: &mut crate::properties::Properties,
    ) -> Result<PropVerdict> {
        filter_mergeinfo(props, &ctx.emitted);
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        let plain_change = self.range.contains_node(ctx.revision, ctx.index)
            && node.header.action() == Some(NodeAction::Change)
            && !node.header.has_properties()
            && !node.header.is_dir(&ctx.dirs)
            && node.header.copyfrom().is_none();
        if plain_change {
            Ok(vec![])
        } else {
            Ok(vec![node])
        }
    }
}
