//! Property mutation: `propdel`, `propset`, `proprename`, `propclean`

use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::{DumpError, Result};
use crate::properties::{svn_props, Properties};
use crate::range::SelectionRange;
use crate::section::NodeAction;

/// Delete properties by name.
///
/// A file `change` node whose whole reason to exist was the deleted
/// property becomes vacuous and is dropped; a revision left with nothing
/// emitted disappears with it.
pub struct PropDel {
    names: Vec<String>,
    range: SelectionRange,
    node_emptied: Option<bool>,
}

impl PropDel {
    pub fn new(names: Vec<String>, range: SelectionRange) -> Self {
        PropDel {
            names,
            range,
            node_emptied: None,
        }
    }
}

impl Surgeon for PropDel {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(PropVerdict::Keep);
        }
        for name in &self.names {
            props.delete(name);
        }
        if ctx.index == 0 {
            Ok(PropVerdict::Suppress)
        } else {
            self.node_emptied = Some(props.is_empty());
            Ok(PropVerdict::Keep)
        }
    }

    fn header(&mut self, ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        let emptied = self.node_emptied.take().unwrap_or(false);
        let vacuous = emptied
            && node.header.action() == Some(NodeAction::Change)
            && !node.header.is_dir(&ctx.dirs)
            && node.content.is_none();
        if vacuous {
            Ok(vec![])
        } else {
            Ok(vec![node])
        }
    }
}

/// Set `NAME=VALUE` pairs on every selected property block.
pub struct PropSet {
    pairs: Vec<(String, String)>,
    range: SelectionRange,
}

impl PropSet {
    /// Arguments come as `NAME=VALUE` strings.
    pub fn new(specs: &[String], range: SelectionRange) -> Result<Self> {
        let mut pairs = Vec::new();
        for spec in specs {
            let (name, value) = spec
                .split_once('=')
                .ok_or_else(|| DumpError::argument(format!("not a NAME=VALUE pair: {spec:?}")))?;
            pairs.push((name.to_string(), value.to_string()));
        }
        Ok(PropSet { pairs, range })
    }
}

impl Surgeon for PropSet {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            for (name, value) in &self.pairs {
                props.set(name, value.as_bytes());
            }
        }
        Ok(PropVerdict::Keep)
    }
}

/// Rename properties, in set entries and delete keys alike.
pub struct PropRename {
    pairs: Vec<(String, String)>,
    range: SelectionRange,
}

impl PropRename {
    /// Arguments come as `OLD->NEW` strings.
    pub fn new(specs: &[String], range: SelectionRange) -> Result<Self> {
        let mut pairs = Vec::new();
        for spec in specs {
            let (old, new) = spec
                .split_once("->")
                .ok_or_else(|| DumpError::argument(format!("not an OLD->NEW pair: {spec:?}")))?;
            pairs.push((old.to_string(), new.to_string()));
        }
        Ok(PropRename { pairs, range })
    }
}

impl Surgeon for PropRename {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            for (old, new) in &self.pairs {
                props.rename(old, new);
            }
        }
        Ok(PropVerdict::Keep)
    }
}

/// Remove one property (default `svn:executable`) from nodes whose path
/// ends in any of the given suffixes; no suffixes means every node.
pub struct PropClean {
    property: String,
    suffixes: Vec<String>,
    range: SelectionRange,
}

impl PropClean {
    pub fn new(property: Option<String>, suffixes: Vec<String>, range: SelectionRange) -> Self {
        PropClean {
            property: property.unwrap_or_else(|| svn_props::EXECUTABLE.to_string()),
            suffixes,
            range,
        }
    }
}

impl Surgeon for PropClean {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if ctx.index == 0 || !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(PropVerdict::Keep);
        }
        let path = ctx.node_path.as_deref().unwrap_or_default();
        if self.suffixes.is_empty() || self.suffixes.iter().any(|s| path.ends_with(s)) {
            props.delete(&self.property);
        }
        Ok(PropVerdict::Keep)
    }
}
