//! Report commands: `see`, `log`, `closure`, `pathlist`
//!
//! These never rewrite the stream; the engine runs them with emission
//! disabled and they print what they gathered from `finish`. Running
//! without emission still maintains the emitted-revision set, so copy
//! headers reach the hooks exactly as a filtering run would see them.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::Result;
use crate::logmsg;
use crate::properties::{svn_props, Properties};
use crate::range::SelectionRange;
use crate::section::NodeAction;

fn report_line(rev: u64, index: u32, action: &str, rest: &str) -> String {
    format!("{:<6}{:<9}{}", format!("{rev}.{index}"), action, rest)
}

/// One line per node: index, action, decorated path, copy source; plus a
/// `propset` line wherever a block carries more than the standard
/// metadata.
pub struct See {
    range: SelectionRange,
    lines: Vec<String>,
    pending_props: Option<Vec<String>>,
}

impl See {
    pub fn new(range: SelectionRange) -> Self {
        See {
            range,
            lines: Vec::new(),
            pending_props: None,
        }
    }
}

impl Surgeon for See {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            let keys: Vec<String> = props.user_keys().iter().map(|k| k.to_string()).collect();
            if ctx.index == 0 {
                if !keys.is_empty() {
                    self.lines
                        .push(report_line(ctx.revision, 0, "propset", &keys.join(" ")));
                }
            } else {
                self.pending_props = Some(keys);
            }
        }
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        let pending = self.pending_props.take().unwrap_or_default();
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(vec![node]);
        }
        let copyfrom = node.header.copyfrom();
        let action = match node.header.action() {
            Some(NodeAction::Add) if copyfrom.is_some() => "copy",
            Some(action) => action.as_str(),
            None => "?",
        };
        let mut rest = node.header.path().unwrap_or_default();
        if node.header.is_dir(&ctx.dirs) {
            rest.push('/');
        }
        if let Some((src_rev, src_path)) = copyfrom {
            let slash = if ctx.dirs.is_dir(&src_path) == Some(true) {
                "/"
            } else {
                ""
            };
            rest.push_str(&format!(" from {src_rev}:{src_path}{slash}"));
        }
        self.lines
            .push(report_line(ctx.revision, ctx.index, action, &rest));
        if !pending.is_empty() {
            self.lines.push(report_line(
                ctx.revision,
                ctx.index,
                "propset",
                &pending.join(" "),
            ));
        }
        Ok(vec![node])
    }

    fn finish(&mut self, _ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        for line in &self.lines {
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// Emit `svn:log` entries in the standard display format.
pub struct LogReport {
    range: SelectionRange,
    entries: Vec<String>,
}

impl LogReport {
    pub fn new(range: SelectionRange) -> Self {
        LogReport {
            range,
            entries: Vec::new(),
        }
    }
}

impl Surgeon for LogReport {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if ctx.index == 0 && self.range.contains_node(ctx.revision, 0) {
            let author = props.get_str(svn_props::AUTHOR).unwrap_or_default();
            let date = props.get_str(svn_props::DATE).unwrap_or_default();
            let text = props.get_str(svn_props::LOG).unwrap_or_default();
            self.entries
                .push(logmsg::format_entry(ctx.revision, &author, &date, &text));
        }
        Ok(PropVerdict::Keep)
    }

    fn finish(&mut self, _ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        for entry in &self.entries {
            writeln!(out, "{}", logmsg::SEPARATOR)?;
            out.write_all(entry.as_bytes())?;
        }
        if !self.entries.is_empty() {
            writeln!(out, "{}", logmsg::SEPARATOR)?;
        }
        Ok(())
    }
}

/// Transitive closure of a path set under "copies from".
pub struct Closure {
    set: BTreeSet<String>,
}

impl Closure {
    pub fn new(paths: Vec<String>) -> Self {
        Closure {
            set: paths.into_iter().collect(),
        }
    }
}

impl Surgeon for Closure {
    fn header(&mut self, _ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        if let (Some(path), Some((_, src))) = (node.header.path(), node.header.copyfrom()) {
            if self.set.contains(&src) {
                self.set.insert(path);
            }
        }
        Ok(vec![node])
    }

    fn finish(&mut self, _ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        for path in &self.set {
            writeln!(out, "{path}")?;
        }
        Ok(())
    }
}

/// Every distinct node path, in stream order.
pub struct PathList {
    range: SelectionRange,
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl PathList {
    pub fn new(range: SelectionRange) -> Self {
        PathList {
            range,
            seen: HashSet::new(),
            ordered: Vec::new(),
        }
    }
}

impl Surgeon for PathList {
    fn header(&mut self, ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            if let Some(path) = node.header.path() {
                if self.seen.insert(path.clone()) {
                    self.ordered.push(path);
                }
            }
        }
        Ok(vec![node])
    }

    fn finish(&mut self, _ctx: &mut Context, out: &mut dyn Write) -> Result<()> {
        for path in &self.ordered {
            writeln!(out, "{path}")?;
        }
        Ok(())
    }
}
