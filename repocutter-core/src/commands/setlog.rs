//! Log-message replacement from a prepared file

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::engine::{Context, PropVerdict, Surgeon};
use crate::error::{DumpError, Result};
use crate::logmsg::{self, LogEntry};
use crate::properties::{svn_props, Properties};
use crate::range::SelectionRange;

/// Replace `svn:log` on selected revisions from a file in the display
/// format the `log` command emits.
///
/// The file's author for a revision must agree with the stream's author;
/// a mismatch means the file was prepared against different history and
/// is fatal.
pub struct SetLog {
    entries: HashMap<u64, LogEntry>,
    range: SelectionRange,
}

impl SetLog {
    pub fn new(entries: Vec<LogEntry>, range: SelectionRange) -> Self {
        let entries = entries.into_iter().map(|e| (e.revision, e)).collect();
        SetLog { entries, range }
    }

    pub fn from_file(path: &Path, range: SelectionRange) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::new(logmsg::parse(&text)?, range))
    }
}

impl Surgeon for SetLog {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if ctx.index != 0 || !self.range.contains_node(ctx.revision, 0) {
            return Ok(PropVerdict::Keep);
        }
        if let Some(entry) = self.entries.get(&ctx.revision) {
            let author = props.get_str(svn_props::AUTHOR).unwrap_or_default();
            if author != entry.author {
                return Err(DumpError::conflict(format!(
                    "author mismatch at revision {}: stream has {:?}, log file has {:?}",
                    ctx.revision, author, entry.author
                )));
            }
            props.set(svn_props::LOG, entry.text.as_bytes());
        }
        Ok(PropVerdict::Keep)
    }
}
