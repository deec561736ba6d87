//! Path surgery: `pop`, `push`, `pathrename`, `setpath`, `setcopyfrom`,
//! `swap`
//!
//! `pop` and `push` deliberately take no range: restricting them would
//! desynchronize copy references across revisions, so the CLI refuses the
//! combination outright.

use crate::commands::PathPattern;
use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::Result;
use crate::properties::Properties;
use crate::range::SelectionRange;

fn rewrite_paths<F>(node: &mut Node, mut f: F)
where
    F: FnMut(&str) -> String,
{
    for field in ["Node-path", "Node-copyfrom-path"] {
        node.header.replace_field(field, |old| {
            let old = String::from_utf8_lossy(old);
            f(&old).into_bytes()
        });
    }
}

/// Rewrite a mergeinfo path, preserving its rooted-slash flag.
fn rewrite_mergeinfo_path<F>(path: &str, f: F) -> String
where
    F: FnOnce(&str) -> String,
{
    match path.strip_prefix('/') {
        Some(rest) => format!("/{}", f(rest)),
        None => f(path),
    }
}

/// Remove the leading path segment everywhere.
pub struct Pop;

fn popped(path: &str) -> String {
    match path.split_once('/') {
        Some((_, rest)) => rest.to_string(),
        // A single segment has nothing left to pop.
        None => path.to_string(),
    }
}

impl Surgeon for Pop {
    fn header(&mut self, _ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        rewrite_paths(&mut node, popped);
        Ok(vec![node])
    }
}

/// Prepend a segment everywhere, mergeinfo paths included.
pub struct Push {
    segment: String,
}

impl Push {
    pub fn new(segment: impl Into<String>) -> Self {
        Push {
            segment: segment.into(),
        }
    }
}

impl Surgeon for Push {
    fn properties(&mut self, _ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        let segment = self.segment.clone();
        props.mutate_mergeinfo(|path, ranges| {
            let path = rewrite_mergeinfo_path(path, |p| format!("{segment}/{p}"));
            Some((path, ranges.to_string()))
        });
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, _ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        let segment = self.segment.clone();
        rewrite_paths(&mut node, |path| format!("{segment}/{path}"));
        Ok(vec![node])
    }
}

/// Apply regex → replacement pairs, in order, to node paths, copy sources
/// and mergeinfo paths.
pub struct PathRename {
    pairs: Vec<(PathPattern, String)>,
    range: SelectionRange,
}

impl PathRename {
    pub fn new(pairs: Vec<(PathPattern, String)>, range: SelectionRange) -> Self {
        PathRename { pairs, range }
    }

    fn apply(&self, path: &str) -> String {
        let mut path = path.to_string();
        for (pattern, replacement) in &self.pairs {
            path = pattern.replace(&path, replacement);
        }
        path
    }
}

impl Surgeon for PathRename {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            props.mutate_mergeinfo(|path, ranges| {
                let path = rewrite_mergeinfo_path(path, |p| self.apply(p));
                Some((path, ranges.to_string()))
            });
        }
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            rewrite_paths(&mut node, |path| self.apply(path));
        }
        Ok(vec![node])
    }
}

/// Literal replacement of `Node-path` on selected nodes.
pub struct SetPath {
    value: String,
    range: SelectionRange,
}

impl SetPath {
    pub fn new(value: impl Into<String>, range: SelectionRange) -> Self {
        SetPath {
            value: value.into(),
            range,
        }
    }
}

impl Surgeon for SetPath {
    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            node.header
                .replace_field("Node-path", |_| self.value.clone().into_bytes());
        }
        Ok(vec![node])
    }
}

/// Literal replacement of `Node-copyfrom-path` on selected nodes.
pub struct SetCopyfrom {
    value: String,
    range: SelectionRange,
}

impl SetCopyfrom {
    pub fn new(value: impl Into<String>, range: SelectionRange) -> Self {
        SetCopyfrom {
            value: value.into(),
            range,
        }
    }
}

impl Surgeon for SetCopyfrom {
    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            node.header
                .replace_field("Node-copyfrom-path", |_| self.value.clone().into_bytes());
        }
        Ok(vec![node])
    }
}

/// Swap the first two segments of every path.
pub struct Swap {
    range: SelectionRange,
}

impl Swap {
    pub fn new(range: SelectionRange) -> Self {
        Swap { range }
    }
}

pub(crate) fn swap_two(path: &str) -> String {
    let mut parts = path.splitn(3, '/');
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => {
            let rest = parts.next();
            match rest {
                Some(rest) => format!("{second}/{first}/{rest}"),
                None => format!("{second}/{first}"),
            }
        }
        _ => path.to_string(),
    }
}

impl Surgeon for Swap {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            props.mutate_mergeinfo(|path, ranges| {
                let path = rewrite_mergeinfo_path(path, swap_two);
                Some((path, ranges.to_string()))
            });
        }
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            rewrite_paths(&mut node, |path| swap_two(path));
        }
        Ok(vec![node])
    }
}
