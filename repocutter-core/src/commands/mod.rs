//! Transformation commands
//!
//! Every command is one value implementing [`Surgeon`](crate::engine::Surgeon);
//! whatever state its hooks share lives in its fields. The helpers here
//! are the two things almost every command needs: segment-anchored path
//! patterns and the emitted-set mergeinfo filter.

use regex::Regex;

use crate::error::{DumpError, Result};
use crate::mergeinfo::MergeRanges;
use crate::properties::Properties;
use crate::state::EmittedRevisions;

pub mod content;
pub mod filecopy;
pub mod paths;
pub mod props;
pub mod renumber;
pub mod select;
pub mod setlog;
pub mod sift;
pub mod swapsvn;
pub mod view;

pub use content::{Obscure, Replace, Strip, Testify};
pub use filecopy::{FileCopy, Reduce, SkipCopy};
pub use paths::{PathRename, Pop, Push, SetCopyfrom, SetPath, Swap};
pub use props::{PropClean, PropDel, PropRename, PropSet};
pub use renumber::Renumber;
pub use select::Select;
pub use setlog::SetLog;
pub use sift::Sift;
pub use swapsvn::SwapSvn;
pub use view::{Closure, LogReport, PathList, See};

/// A user path pattern, compiled once
///
/// Unless the user anchored the pattern with `^` or `$`, a match must
/// cover whole `/`-delimited segments: its left end at the string start
/// or just after a slash, its right end at the string end or just before
/// one. Fixed mode quotes the pattern before compiling, so anchors typed
/// there are literal.
#[derive(Debug)]
pub struct PathPattern {
    regex: Regex,
    anchored: bool,
}

impl PathPattern {
    pub fn compile(pattern: &str, fixed: bool) -> Result<Self> {
        let anchored = !fixed && (pattern.starts_with('^') || pattern.ends_with('$'));
        let source = if fixed {
            regex::escape(pattern)
        } else {
            pattern.to_string()
        };
        let regex = Regex::new(&source)
            .map_err(|e| DumpError::argument(format!("bad pattern {pattern:?}: {e}")))?;
        Ok(PathPattern { regex, anchored })
    }

    pub fn compile_all(patterns: &[String], fixed: bool) -> Result<Vec<Self>> {
        patterns.iter().map(|p| Self::compile(p, fixed)).collect()
    }

    fn segment_aligned(text: &str, start: usize, end: usize) -> bool {
        (start == 0 || text.as_bytes()[start - 1] == b'/')
            && (end == text.len() || text.as_bytes()[end] == b'/')
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.anchored {
            return self.regex.is_match(text);
        }
        self.regex
            .find_iter(text)
            .any(|m| Self::segment_aligned(text, m.start(), m.end()))
    }

    /// Replace every segment-aligned match, expanding `$n` references in
    /// the replacement.
    pub fn replace(&self, text: &str, replacement: &str) -> String {
        if self.anchored {
            return self.regex.replace_all(text, replacement).into_owned();
        }
        let mut out = String::new();
        let mut last = 0;
        for caps in self.regex.captures_iter(text) {
            let m = caps.get(0).expect("whole-match group");
            if m.start() < last || !Self::segment_aligned(text, m.start(), m.end()) {
                continue;
            }
            out.push_str(&text[last..m.start()]);
            caps.expand(replacement, &mut out);
            last = m.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

/// True when any pattern matches; an empty pattern list matches nothing.
pub fn any_match(patterns: &[PathPattern], text: &str) -> bool {
    patterns.iter().any(|p| p.matches(text))
}

/// Drop from the merge-tracking properties every revision that was not
/// emitted, removing lines and properties that end up empty.
pub fn filter_mergeinfo(props: &mut Properties, emitted: &EmittedRevisions) {
    props.mutate_mergeinfo(|path, ranges| {
        let Ok(mut parsed) = MergeRanges::parse(ranges) else {
            // Leave lines we cannot parse untouched.
            return Some((path.to_string(), ranges.to_string()));
        };
        parsed.retain_revisions(|rev| emitted.contains(rev));
        if parsed.is_empty() {
            None
        } else {
            Some((path.to_string(), parsed.to_string()))
        }
    });
}
