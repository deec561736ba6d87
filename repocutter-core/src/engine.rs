//! The dump engine
//!
//! One pass over the stream: preamble, then revisions, then for each
//! revision its nodes. For every record the engine calls the command's
//! hooks in a fixed order (revision line, property block, node header,
//! content), re-derives the dependent length fields from whatever the
//! hooks left behind, and re-emits. Revision headers are stashed and
//! written lazily so a command can make a whole revision disappear by
//! dropping all of its nodes.
//!
//! Cross-revision bookkeeping lives in the [`Context`] handed to every
//! hook: the emitted-revision set drives both copyfrom pruning and
//! mergeinfo filtering, the kind tracker classifies nodes whose
//! `Node-kind` is omitted, and the wildcard table serves the
//! layout-swapping command.

use std::io::{self, BufRead, Write};

use crate::error::{DumpError, Result};
use crate::properties::Properties;
use crate::section::{NodeKind, Section};
use crate::source::LineSource;
use crate::state::{DirTracker, EmittedRevisions, WildcardTable};

/// Answer of the property hook for a revision property block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropVerdict {
    /// Emit the revision header even if no node of the revision survives.
    Keep,
    /// Omit the revision header unless some node of the revision is
    /// emitted.
    Suppress,
}

/// One node record as handed to and returned by the header hook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub header: Section,
    pub properties: Option<Properties>,
    pub content: Option<Vec<u8>>,
}

impl Node {
    pub fn new(header: Section) -> Self {
        Node {
            header,
            properties: None,
            content: None,
        }
    }
}

/// Live state the engine exposes to hooks
#[derive(Debug, Default)]
pub struct Context {
    /// Revision currently being parsed, as read from the stream.
    pub revision: u64,
    /// One-origin node index within the revision; 0 while the revision
    /// property block is on the table.
    pub index: u32,
    /// Path of the node currently being parsed.
    pub node_path: Option<String>,
    /// Revisions whose headers have gone out.
    pub emitted: EmittedRevisions,
    /// Last observed node kind per path.
    pub dirs: DirTracker,
    /// Subbranch names tracked per project prefix.
    pub wildcards: WildcardTable,
    /// Debug verbosity, adjustable mid-stream via `Debug-level:`.
    pub debug: u32,
}

/// A transformation command: up to six hooks over the engine, each with a
/// pass-through default
///
/// Hooks run in stream order and may keep private state between calls;
/// the engine never reorders records. Returning `None` (or an empty block
/// list) means "drop"; the engine owns all emission and bookkeeping.
pub trait Surgeon {
    /// Everything before the first `Revision-number:` line.
    fn preamble(&mut self, _ctx: &mut Context, header: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(Some(header))
    }

    /// The `Revision-number:` line itself; `None` drops the revision and
    /// everything in it.
    fn revision(&mut self, _ctx: &mut Context, line: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(Some(line))
    }

    /// Every property block: the revision's own (node index 0) and each
    /// node's. The verdict is consulted only for revision blocks.
    fn properties(&mut self, _ctx: &mut Context, _props: &mut Properties) -> Result<PropVerdict> {
        Ok(PropVerdict::Keep)
    }

    /// The parsed node, property block already applied and lengths
    /// already consistent. Return zero blocks to drop the node, one to
    /// keep it, several to expand it.
    fn header(&mut self, _ctx: &mut Context, node: Node) -> Result<Vec<Node>> {
        Ok(vec![node])
    }

    /// Content of each kept block; absent content may be materialized by
    /// returning `Some`.
    fn content(&mut self, _ctx: &mut Context, content: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        Ok(content)
    }

    /// Called once after the stream is consumed; report-style commands
    /// print here.
    fn finish(&mut self, _ctx: &mut Context, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }
}

/// The identity command; also what a bare `select 0:HEAD` amounts to.
pub struct PassThrough;

impl Surgeon for PassThrough {}

/// Progress indicator on stderr, ticking once per emitted revision
struct Baton {
    enabled: bool,
    active: bool,
}

impl Baton {
    fn tick(&mut self, rev: u64) {
        if self.enabled {
            eprint!("\r{rev:>10}");
            let _ = io::stderr().flush();
            self.active = true;
        }
    }

    fn finish(&mut self) {
        if self.active {
            eprintln!();
            self.active = false;
        }
    }
}

/// One-pass driver over a dump stream
pub struct DumpEngine<R, W> {
    source: LineSource<R>,
    out: W,
    ctx: Context,
    emit: bool,
    baton: Baton,
    stash: Option<Vec<u8>>,
    stash_rev: u64,
    stash_keep: bool,
    revision_dropped: bool,
    last_emitted: bool,
}

impl<R: BufRead, W: Write> DumpEngine<R, W> {
    pub fn new(reader: R, out: W) -> Self {
        DumpEngine {
            source: LineSource::new(reader),
            out,
            ctx: Context::default(),
            emit: true,
            baton: Baton {
                enabled: false,
                active: false,
            },
            stash: None,
            stash_rev: 0,
            stash_keep: false,
            revision_dropped: false,
            last_emitted: false,
        }
    }

    /// Parse and run hooks without writing the stream; the
    /// emitted-revision set is still maintained as if emitting, so
    /// report-style commands observe the same headers a filter would.
    pub fn report_only(mut self) -> Self {
        self.emit = false;
        self
    }

    /// Enable the stderr progress indicator.
    pub fn progress(mut self, enabled: bool) -> Self {
        self.baton.enabled = enabled;
        self
    }

    pub fn debug(mut self, level: u32) -> Self {
        self.ctx.debug = level;
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Drive the whole stream through the command.
    pub fn run(&mut self, surgeon: &mut dyn Surgeon) -> Result<()> {
        self.copy_preamble(surgeon)?;
        loop {
            let line = self.source.peek()?;
            if line.is_empty() {
                break;
            }
            if line.starts_with(b"Revision-number:") {
                self.process_revision(surgeon)?;
            } else {
                return Err(self.malformed("expected a Revision-number header"));
            }
        }
        surgeon.finish(&mut self.ctx, &mut self.out)?;
        self.baton.finish();
        self.out.flush()?;
        Ok(())
    }

    fn copy_preamble(&mut self, surgeon: &mut dyn Surgeon) -> Result<()> {
        let mut pre = Vec::new();
        loop {
            let line = self.source.peek()?;
            if line.is_empty() || line.starts_with(b"Revision-number:") {
                break;
            }
            pre.extend(self.source.read_line()?);
        }
        if let Some(bytes) = surgeon.preamble(&mut self.ctx, pre)? {
            if self.emit {
                self.out.write_all(&bytes)?;
            }
        }
        Ok(())
    }

    fn process_revision(&mut self, surgeon: &mut dyn Surgeon) -> Result<()> {
        let revline = self.source.read_line()?;
        let rev: u64 = std::str::from_utf8(&revline)
            .ok()
            .and_then(|s| s.strip_prefix("Revision-number:"))
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| self.malformed("unparsable Revision-number"))?;
        self.ctx.revision = rev;
        self.ctx.index = 0;
        self.ctx.node_path = None;

        // Undocumented extension: a Debug-level line may ride directly
        // after the revision header. It is consumed, never forwarded.
        let next = self.source.peek()?;
        if next.starts_with(b"Debug-level:") {
            let line = self.source.read_line()?;
            if let Some(level) = std::str::from_utf8(&line)
                .ok()
                .and_then(|s| s.strip_prefix("Debug-level:"))
                .and_then(|s| s.trim().parse().ok())
            {
                self.ctx.debug = level;
                tracing::debug!(revision = rev, level, "debug level changed mid-stream");
            }
        }

        let revline = surgeon.revision(&mut self.ctx, revline)?;
        self.revision_dropped = revline.is_none();

        let mut header = revline.unwrap_or_default();
        loop {
            let line = self.source.read_line()?;
            if line.is_empty() {
                return Err(self.malformed("EOF inside revision header"));
            }
            if line == b"\n" {
                break;
            }
            header.extend_from_slice(&line);
        }
        let mut section = Section::new(header);
        let prop_len = section
            .payload_u64("Prop-content-length")
            .map_err(|e| self.remap(e))?
            .ok_or_else(|| self.malformed("revision header without Prop-content-length"))?;
        let prop_bytes = self.read_exact(prop_len as usize)?;
        let mut props = Properties::parse(&prop_bytes).map_err(|e| self.remap(e))?;

        let verdict = surgeon.properties(&mut self.ctx, &mut props)?;
        let prop_out = props.to_bytes();
        section.set_length("Prop-content", prop_out.len());
        section.set_length("Content", prop_out.len());

        let mut unit = section.into_bytes();
        unit.push(b'\n');
        unit.extend_from_slice(&prop_out);
        // The blank separator lines that follow travel with the header.
        loop {
            let line = self.source.peek()?;
            if line != b"\n" {
                break;
            }
            self.source.read_line()?;
            unit.push(b'\n');
        }
        self.stash = (!self.revision_dropped).then_some(unit);
        self.stash_rev = rev;
        self.stash_keep = verdict == PropVerdict::Keep && !self.revision_dropped;
        self.last_emitted = false;

        loop {
            let line = self.source.peek()?;
            if line.is_empty() || line.starts_with(b"Revision-number:") {
                break;
            }
            if line == b"\n" {
                // Stray separator: forward only when the record before it
                // went out.
                self.source.read_line()?;
                if let Some(stash) = &mut self.stash {
                    stash.push(b'\n');
                } else if self.emit && !self.revision_dropped && self.last_emitted {
                    self.out.write_all(b"\n")?;
                }
                continue;
            }
            if line.starts_with(b"Node-") {
                self.process_node(surgeon)?;
            } else {
                return Err(self.malformed("unexpected line between records"));
            }
        }

        if self.stash_keep {
            self.flush_stash()?;
        }
        self.stash = None;
        Ok(())
    }

    fn process_node(&mut self, surgeon: &mut dyn Surgeon) -> Result<()> {
        self.ctx.index += 1;
        let mut header = Vec::new();
        loop {
            let line = self.source.read_line()?;
            if line.is_empty() {
                return Err(self.malformed("EOF inside node header"));
            }
            if line == b"\n" {
                break;
            }
            if line.starts_with(b"Node-copyfrom-rev:") {
                let source_rev: Option<u64> = std::str::from_utf8(&line)
                    .ok()
                    .and_then(|s| s.strip_prefix("Node-copyfrom-rev:"))
                    .and_then(|s| s.trim().parse().ok());
                if let Some(source_rev) = source_rev {
                    if !self.ctx.emitted.contains(source_rev) {
                        // The copy source was dropped upstream; retaining
                        // the reference would leave the output unloadable.
                        let next = self.source.peek()?;
                        if next.starts_with(b"Node-copyfrom-path:") {
                            self.source.read_line()?;
                        }
                        tracing::debug!(
                            revision = self.ctx.revision,
                            copyfrom = source_rev,
                            "elided copyfrom reference to a dropped revision"
                        );
                        continue;
                    }
                }
            }
            header.extend_from_slice(&line);
        }
        let mut section = Section::new(header);
        let path = section.path();
        self.ctx.node_path = path.clone();
        if let (Some(path), Some(kind)) = (&path, section.kind()) {
            self.ctx.dirs.note(path, kind == NodeKind::Dir);
        }

        let prop_len = section
            .payload_u64("Prop-content-length")
            .map_err(|e| self.remap(e))?;
        let text_len = section
            .payload_u64("Text-content-length")
            .map_err(|e| self.remap(e))?;

        let mut properties = match prop_len {
            Some(n) => {
                let bytes = self.read_exact(n as usize)?;
                Some(Properties::parse(&bytes).map_err(|e| self.remap(e))?)
            }
            None => None,
        };
        let content = match text_len {
            Some(n) => Some(self.read_exact(n as usize)?),
            None => None,
        };

        if let Some(props) = &mut properties {
            // The verdict only matters on revision property blocks.
            let _ = surgeon.properties(&mut self.ctx, props)?;
            let prop_out = props.to_bytes();
            section.set_length("Prop-content", prop_out.len());
            section.set_length(
                "Content",
                prop_out.len() + content.as_ref().map_or(0, Vec::len),
            );
        }

        let original_content = content.clone();
        let node = Node {
            header: section,
            properties,
            content,
        };
        let blocks = surgeon.header(&mut self.ctx, node)?;

        let mut emitted_any = false;
        for mut block in blocks {
            block.content = surgeon.content(&mut self.ctx, block.content.take())?;
            if block.content != original_content {
                block.header.strip_checksums();
            }

            let prop_bytes = block.properties.as_ref().map(Properties::to_bytes);
            let plen = prop_bytes.as_ref().map_or(0, Vec::len);
            let tlen = block.content.as_ref().map_or(0, Vec::len);
            if prop_bytes.is_some() {
                block.header.set_length("Prop-content", plen);
            } else {
                block.header.delete_field("Prop-content-length");
            }
            if block.content.is_some() {
                block.header.set_length("Text-content", tlen);
            } else {
                block.header.delete_field("Text-content-length");
            }
            if prop_bytes.is_some() || block.content.is_some() {
                block.header.set_length("Content", plen + tlen);
            } else {
                block.header.delete_field("Content-length");
            }

            self.flush_stash()?;
            if self.emit && !self.revision_dropped {
                if emitted_any {
                    self.out.write_all(b"\n\n")?;
                }
                self.out.write_all(block.header.as_bytes())?;
                self.out.write_all(b"\n")?;
                if let Some(bytes) = &prop_bytes {
                    self.out.write_all(bytes)?;
                }
                if let Some(bytes) = &block.content {
                    self.out.write_all(bytes)?;
                }
            }
            emitted_any = true;
        }

        // Trailing separator blanks travel with the node they follow.
        loop {
            let line = self.source.peek()?;
            if line != b"\n" {
                break;
            }
            self.source.read_line()?;
            if emitted_any && self.emit && !self.revision_dropped {
                self.out.write_all(b"\n")?;
            }
        }
        self.last_emitted = emitted_any;
        Ok(())
    }

    fn flush_stash(&mut self) -> Result<()> {
        if let Some(unit) = self.stash.take() {
            self.ctx.emitted.insert(self.stash_rev);
            if self.emit {
                self.out.write_all(&unit)?;
            }
            self.baton.tick(self.stash_rev);
        }
        Ok(())
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        self.source
            .read(n)
            .map_err(|_| self.malformed("unexpected end of stream inside a sized block"))
    }

    fn malformed(&self, message: impl Into<String>) -> DumpError {
        DumpError::malformed(self.source.line(), self.ctx.revision, message)
    }

    fn remap(&self, err: DumpError) -> DumpError {
        match err {
            DumpError::Malformed { message, .. } => self.malformed(message),
            other => other,
        }
    }
}
