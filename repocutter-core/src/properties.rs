//! Property block codec
//!
//! Parses and re-serializes the `K`/`V`/`D` property wire form. Values are
//! binary-safe and may contain newlines, so parsing is driven entirely by
//! the declared lengths, never by line structure. Re-serialization emits
//! the set entries in their original order, then the delete keys in their
//! original order, then `PROPS-END`.

use std::fmt;

use crate::error::{DumpError, Result};

/// Well-known Subversion property names
pub mod svn_props {
    /// Commit log message
    pub const LOG: &str = "svn:log";

    /// Commit author
    pub const AUTHOR: &str = "svn:author";

    /// Commit timestamp (RFC 3339)
    pub const DATE: &str = "svn:date";

    /// Merge tracking data
    pub const MERGE_INFO: &str = "svn:mergeinfo";

    /// Legacy svnmerge.py merge tracking data
    pub const SVNMERGE_INTEGRATED: &str = "svnmerge-integrated";

    /// Executable flag
    pub const EXECUTABLE: &str = "svn:executable";

    /// Revision metadata carried on every revision property block
    pub const METADATA: [&str; 3] = [LOG, AUTHOR, DATE];
}

/// The bare marker block: a property section that sets and deletes nothing
pub const EMPTY_MARKER: &[u8] = b"PROPS-END\n";

/// One revision's or node's properties
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, Vec<u8>)>,
    deleted: Vec<String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a property block of exactly the bytes the enclosing header
    /// declared.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut props = Properties::new();
        let mut pos = 0;

        let bad = |message: &str| DumpError::malformed(0, 0, format!("property block: {message}"));

        while pos < data.len() {
            let line_end = data[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| pos + i)
                .ok_or_else(|| bad("unterminated line"))?;
            let line = &data[pos..line_end];
            pos = line_end + 1;

            if line == b"PROPS-END" {
                return Ok(props);
            }
            let (tag, count) = match line.split_first() {
                Some((&tag, rest)) if (tag == b'K' || tag == b'D') && rest.starts_with(b" ") => {
                    (tag, &rest[1..])
                }
                _ => return Err(bad("expected K, D or PROPS-END")),
            };
            let count: usize = std::str::from_utf8(count)
                .ok()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| bad("non-integer key length"))?;

            let key = data
                .get(pos..pos + count)
                .ok_or_else(|| bad("truncated key"))?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|_| bad("property key is not UTF-8"))?;
            pos += count;
            if data.get(pos) != Some(&b'\n') {
                return Err(bad("missing newline after key"));
            }
            pos += 1;

            if tag == b'D' {
                props.deleted.push(key);
                continue;
            }

            let line_end = data[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| pos + i)
                .ok_or_else(|| bad("unterminated value header"))?;
            let vline = &data[pos..line_end];
            pos = line_end + 1;
            let count: usize = vline
                .strip_prefix(b"V ")
                .and_then(|t| std::str::from_utf8(t).ok())
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| bad("expected V after K"))?;
            let value = data
                .get(pos..pos + count)
                .ok_or_else(|| bad("truncated value"))?
                .to_vec();
            pos += count;
            if data.get(pos) != Some(&b'\n') {
                return Err(bad("missing newline after value"));
            }
            pos += 1;

            props.entries.push((key, value));
        }
        Err(bad("missing PROPS-END"))
    }

    /// The exact wire form, `PROPS-END` included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.entries {
            out.extend_from_slice(format!("K {}\n", key.len()).as_bytes());
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(format!("\nV {}\n", value.len()).as_bytes());
            out.extend_from_slice(value);
            out.push(b'\n');
        }
        for key in &self.deleted {
            out.extend_from_slice(format!("D {}\n", key.len()).as_bytes());
            out.extend_from_slice(key.as_bytes());
            out.push(b'\n');
        }
        out.extend_from_slice(EMPTY_MARKER);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.deleted.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key) || self.deleted.iter().any(|k| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Value as text, lossily; property values are usually UTF-8 but the
    /// wire form does not promise it.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// Set a value, replacing in place or appending in order.
    pub fn set(&mut self, key: &str, value: impl Into<Vec<u8>>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Remove a key from both the set entries and the delete list.
    pub fn delete(&mut self, key: &str) -> bool {
        let before = self.entries.len() + self.deleted.len();
        self.entries.retain(|(k, _)| k != key);
        self.deleted.retain(|k| k != key);
        before != self.entries.len() + self.deleted.len()
    }

    /// Rename a key in both lists, keeping its position.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let mut hit = false;
        for (k, _) in &mut self.entries {
            if k == old {
                *k = new.to_string();
                hit = true;
            }
        }
        for k in &mut self.deleted {
            if k == old {
                *k = new.to_string();
                hit = true;
            }
        }
        hit
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Keys other than the standard revision metadata trio.
    pub fn user_keys(&self) -> Vec<&str> {
        self.keys()
            .filter(|k| !svn_props::METADATA.contains(k))
            .collect()
    }

    /// Apply `f` to every `PATH:RANGELIST` line of the merge-tracking
    /// properties. A line mapped to `None` is dropped; a property whose
    /// lines are all dropped is deleted outright.
    pub fn mutate_mergeinfo<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &str) -> Option<(String, String)>,
    {
        for prop in [svn_props::MERGE_INFO, svn_props::SVNMERGE_INTEGRATED] {
            let Some(value) = self.get_str(prop) else {
                continue;
            };
            let mut lines = Vec::new();
            for line in value.lines() {
                let Some((path, ranges)) = line.rsplit_once(':') else {
                    // Not in PATH:RANGELIST shape; keep it untouched.
                    lines.push(line.to_string());
                    continue;
                };
                if let Some((path, ranges)) = f(path, ranges) {
                    lines.push(format!("{path}:{ranges}"));
                }
            }
            if lines.is_empty() {
                self.delete(prop);
            } else {
                self.set(prop, lines.join("\n"));
            }
        }
    }
}

/// Human display form, distinct from the wire form.
impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{} = {}", key, String::from_utf8_lossy(value))?;
        }
        for key in &self.deleted {
            writeln!(f, "{key} (deleted)")?;
        }
        Ok(())
    }
}
