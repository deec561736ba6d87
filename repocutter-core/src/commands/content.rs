//! Content and metadata rewriting: `replace`, `strip`, `obscure`,
//! `testify`

use crate::commands::{any_match, PathPattern};
use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::{DumpError, Result};
use crate::properties::{svn_props, Properties};
use crate::range::SelectionRange;

/// Prefix marking a symlink blob; such contents carry a path, not data.
const LINK_PREFIX: &[u8] = b"link ";

/// Regex replacement on content blobs.
///
/// The argument's first character is the delimiter, as in `/RE/REP/`.
pub struct Replace {
    regex: regex::bytes::Regex,
    replacement: Vec<u8>,
    range: SelectionRange,
}

impl Replace {
    pub fn new(spec: &str, range: SelectionRange) -> Result<Self> {
        let bad = || DumpError::argument(format!("replace wants dREdREPd, got {spec:?}"));
        let delim = spec.chars().next().ok_or_else(bad)?;
        let parts: Vec<&str> = spec[delim.len_utf8()..].split(delim).collect();
        if parts.len() != 3 || !parts[2].is_empty() {
            return Err(bad());
        }
        let regex = regex::bytes::Regex::new(parts[0])
            .map_err(|e| DumpError::argument(format!("bad pattern {:?}: {e}", parts[0])))?;
        Ok(Replace {
            regex,
            replacement: parts[1].as_bytes().to_vec(),
            range,
        })
    }
}

impl Surgeon for Replace {
    fn content(&mut self, ctx: &mut Context, content: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(content);
        }
        Ok(content.map(|c| {
            self.regex
                .replace_all(&c, self.replacement.as_slice())
                .into_owned()
        }))
    }
}

/// Replace file contents with a cookie naming the revision and path.
///
/// Symlink blobs are left alone so a converted repository still passes
/// downstream sanity checks.
pub struct Strip {
    patterns: Vec<PathPattern>,
    range: SelectionRange,
}

impl Strip {
    pub fn new(patterns: Vec<PathPattern>, range: SelectionRange) -> Self {
        Strip { patterns, range }
    }
}

impl Surgeon for Strip {
    fn content(&mut self, ctx: &mut Context, content: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        let Some(content) = content else {
            return Ok(None);
        };
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(Some(content));
        }
        let path = ctx.node_path.clone().unwrap_or_default();
        if !self.patterns.is_empty() && !any_match(&self.patterns, &path) {
            return Ok(Some(content));
        }
        if content.starts_with(LINK_PREFIX) {
            return Ok(Some(content));
        }
        let cookie = format!("Revision is {}, file path is {}.\n", ctx.revision, path);
        Ok(Some(cookie.into_bytes()))
    }
}

const COLORS: [&str; 16] = [
    "amber", "aqua", "beige", "coral", "ebony", "gold", "green", "ivory", "jade", "lilac", "mauve",
    "ochre", "pearl", "rose", "teal", "umber",
];

const ITEMS: [&str; 16] = [
    "anchor", "basin", "candle", "dial", "easel", "flask", "gable", "hinge", "ingot", "joist",
    "kettle", "ladle", "mallet", "nozzle", "oarlock", "pulley",
];

/// Deterministic replacement-name sequence: every color crossed with
/// every item, then the same ring again with a numeric suffix.
struct NameSequence {
    assigned: std::collections::HashMap<String, String>,
    counter: usize,
}

impl NameSequence {
    fn new() -> Self {
        NameSequence {
            assigned: std::collections::HashMap::new(),
            counter: 0,
        }
    }

    fn obscure(&mut self, original: &str) -> String {
        if let Some(name) = self.assigned.get(original) {
            return name.clone();
        }
        let i = self.counter;
        self.counter += 1;
        let color = COLORS[i % COLORS.len()];
        let item = ITEMS[(i / COLORS.len()) % ITEMS.len()];
        let cycle = i / (COLORS.len() * ITEMS.len());
        let name = if cycle == 0 {
            format!("{color}-{item}")
        } else {
            format!("{color}-{item}-{cycle}")
        };
        self.assigned.insert(original.to_string(), name.clone());
        name
    }
}

/// Structural path segments that keep their meaning and must survive.
const STRUCTURAL_SEGMENTS: [&str; 3] = ["trunk", "branches", "tags"];

/// Rename non-structural path segments and author ids deterministically.
pub struct Obscure {
    names: NameSequence,
    range: SelectionRange,
}

impl Obscure {
    pub fn new(range: SelectionRange) -> Self {
        Obscure {
            names: NameSequence::new(),
            range,
        }
    }

    fn obscure_path(&mut self, path: &str) -> String {
        obscure_path_with(&mut self.names, path)
    }
}

fn obscure_path_with(names: &mut NameSequence, path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .map(|seg| {
            if seg.is_empty() || STRUCTURAL_SEGMENTS.contains(&seg) {
                seg.to_string()
            } else {
                names.obscure(seg)
            }
        })
        .collect();
    segments.join("/")
}

impl Surgeon for Obscure {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(PropVerdict::Keep);
        }
        if ctx.index == 0 {
            if let Some(author) = props.get_str(svn_props::AUTHOR) {
                let obscured = self.names.obscure(&author);
                props.set(svn_props::AUTHOR, obscured);
            }
        }
        let names = &mut self.names;
        props.mutate_mergeinfo(|path, ranges| {
            let rebuilt = match path.strip_prefix('/') {
                Some(rest) => format!("/{}", obscure_path_with(names, rest)),
                None => obscure_path_with(names, path),
            };
            Some((rebuilt, ranges.to_string()))
        });
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            for field in ["Node-path", "Node-copyfrom-path"] {
                let current = node.header.payload_str(field).map(str::to_string);
                if let Some(path) = current {
                    let obscured = self.obscure_path(&path);
                    node.header.set_field(field, &obscured);
                }
            }
        }
        Ok(vec![node])
    }

    fn content(&mut self, ctx: &mut Context, content: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(content);
        }
        let Some(mut content) = content else {
            return Ok(None);
        };
        // Symlink targets are paths too, but the blob size must not move:
        // overwrite in place, clamped to the original target length.
        if content.starts_with(LINK_PREFIX) {
            let target = content[LINK_PREFIX.len()..].to_vec();
            let trimmed_len = target
                .iter()
                .position(|&b| b == b'\n')
                .unwrap_or(target.len());
            if let Ok(target_str) = std::str::from_utf8(&target[..trimmed_len]) {
                let obscured = self.obscure_path(target_str).into_bytes();
                let n = obscured.len().min(trimmed_len);
                content[LINK_PREFIX.len()..LINK_PREFIX.len() + n].copy_from_slice(&obscured[..n]);
            }
        }
        Ok(Some(content))
    }
}

/// Make a stream reproducible for test fixtures: timestamps at the epoch
/// plus ten seconds per revision, a fixed author, no repository UUID.
pub struct Testify {
    next_index: u64,
}

impl Testify {
    pub fn new(base: u64) -> Self {
        Testify { next_index: base }
    }
}

impl Surgeon for Testify {
    fn preamble(&mut self, _ctx: &mut Context, header: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut out = Vec::with_capacity(header.len());
        let mut skip_blank = false;
        for line in header.split_inclusive(|&b| b == b'\n') {
            if line.starts_with(b"UUID:") {
                skip_blank = true;
                continue;
            }
            if skip_blank && line == b"\n" {
                skip_blank = false;
                continue;
            }
            skip_blank = false;
            out.extend_from_slice(line);
        }
        Ok(Some(out))
    }

    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if ctx.index != 0 {
            return Ok(PropVerdict::Keep);
        }
        let index = self.next_index;
        self.next_index += 1;
        let date = chrono::DateTime::from_timestamp((index * 10) as i64, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S.000000Z").to_string())
            .unwrap_or_default();
        props.set(svn_props::DATE, date);
        if props.contains(svn_props::AUTHOR) {
            props.set(svn_props::AUTHOR, "fred");
        }
        Ok(PropVerdict::Keep)
    }
}
