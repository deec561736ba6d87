//! Stream sections: the textual header block of a revision or node record
//!
//! A section is the run of `Name: value` lines up to (not including) the
//! blank line that terminates the block. It is held as one owned byte
//! buffer; field operations work line-wise on that buffer, so no borrowed
//! views survive a mutation.

use crate::error::{DumpError, Result};
use crate::state::DirTracker;

/// Node kind as carried by `Node-kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
}

impl NodeKind {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "file" => Some(NodeKind::File),
            "dir" => Some(NodeKind::Dir),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
        }
    }
}

/// Node action as carried by `Node-action`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Add,
    Change,
    Delete,
    Replace,
}

impl NodeAction {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "add" => Some(NodeAction::Add),
            "change" => Some(NodeAction::Change),
            "delete" => Some(NodeAction::Delete),
            "replace" => Some(NodeAction::Replace),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeAction::Add => "add",
            NodeAction::Change => "change",
            NodeAction::Delete => "delete",
            NodeAction::Replace => "replace",
        }
    }
}

const CHECKSUM_FIELDS: [&str; 4] = [
    "Text-content-md5",
    "Text-content-sha1",
    "Text-copy-source-md5",
    "Text-copy-source-sha1",
];

/// One revision or node header block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    buf: Vec<u8>,
}

impl Section {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Build a section from `(name, value)` pairs, mostly for synthetic
    /// nodes.
    pub fn build(fields: &[(&str, &str)]) -> Self {
        let mut buf = Vec::new();
        for (name, value) in fields {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.push(b'\n');
        }
        Self { buf }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.buf.split_inclusive(|&b| b == b'\n')
    }

    /// Value slice of the first `field:` line, newline excluded.
    pub fn payload(&self, field: &str) -> Option<&[u8]> {
        let prefix = format!("{field}: ");
        for line in self.lines() {
            if line.starts_with(prefix.as_bytes()) {
                let value = &line[prefix.len()..];
                return Some(value.strip_suffix(b"\n").unwrap_or(value));
            }
        }
        None
    }

    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload(field).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn payload_u64(&self, field: &str) -> Result<Option<u64>> {
        match self.payload_str(field) {
            None => Ok(None),
            Some(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| DumpError::malformed(0, 0, format!("non-integer {field}: {text}"))),
        }
    }

    /// Replace the value of `field` through `f`; returns the old and new
    /// values when the field was present.
    pub fn replace_field<F>(&mut self, field: &str, f: F) -> Option<(Vec<u8>, Vec<u8>)>
    where
        F: FnOnce(&[u8]) -> Vec<u8>,
    {
        let prefix = format!("{field}: ");
        let mut out = Vec::with_capacity(self.buf.len());
        let mut change = None;
        let mut f = Some(f);
        for line in self.buf.split_inclusive(|&b| b == b'\n') {
            if f.is_some() && line.starts_with(prefix.as_bytes()) {
                let old = line[prefix.len()..]
                    .strip_suffix(b"\n")
                    .unwrap_or(&line[prefix.len()..])
                    .to_vec();
                let new = (f.take().unwrap())(&old);
                out.extend_from_slice(prefix.as_bytes());
                out.extend_from_slice(&new);
                out.push(b'\n');
                change = Some((old, new));
            } else {
                out.extend_from_slice(line);
            }
        }
        if change.is_some() {
            self.buf = out;
        }
        change
    }

    /// Set `field` to `value`, replacing the existing line or appending a
    /// new one at the end of the block.
    pub fn set_field(&mut self, field: &str, value: &str) {
        if self
            .replace_field(field, |_| value.as_bytes().to_vec())
            .is_none()
        {
            self.buf.extend_from_slice(field.as_bytes());
            self.buf.extend_from_slice(b": ");
            self.buf.extend_from_slice(value.as_bytes());
            self.buf.push(b'\n');
        }
    }

    /// Rewrite `name-length: N`. An absent header is appended only when
    /// `n` is nonzero.
    pub fn set_length(&mut self, name: &str, n: usize) {
        let field = format!("{name}-length");
        let value = n.to_string();
        if self
            .replace_field(&field, |_| value.as_bytes().to_vec())
            .is_none()
            && n > 0
        {
            self.set_field(&field, &value);
        }
    }

    pub fn delete_field(&mut self, field: &str) -> bool {
        let prefix = format!("{field}: ");
        let before = self.buf.len();
        let mut out = Vec::with_capacity(before);
        for line in self.buf.split_inclusive(|&b| b == b'\n') {
            if !line.starts_with(prefix.as_bytes()) {
                out.extend_from_slice(line);
            }
        }
        self.buf = out;
        self.buf.len() != before
    }

    /// Remove all content and copy-source checksum headers.
    pub fn strip_checksums(&mut self) {
        for field in CHECKSUM_FIELDS {
            self.delete_field(field);
        }
    }

    pub fn path(&self) -> Option<String> {
        self.payload_str("Node-path").map(str::to_string)
    }

    pub fn action(&self) -> Option<NodeAction> {
        self.payload_str("Node-action").and_then(NodeAction::parse)
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.payload_str("Node-kind").and_then(NodeKind::parse)
    }

    /// Copy source as `(rev, path)` when both headers are present.
    pub fn copyfrom(&self) -> Option<(u64, String)> {
        let rev = self
            .payload_str("Node-copyfrom-rev")
            .and_then(|v| v.trim().parse().ok())?;
        let path = self.payload_str("Node-copyfrom-path")?;
        Some((rev, path.to_string()))
    }

    /// Whether the node is a directory, consulting the kind tracker when
    /// `Node-kind` is absent. Unknown on both sides is treated as a file.
    pub fn is_dir(&self, dirs: &DirTracker) -> bool {
        match self.kind() {
            Some(kind) => kind == NodeKind::Dir,
            None => {
                let fallback = self.path().and_then(|p| dirs.is_dir(&p));
                if fallback.is_none() {
                    tracing::debug!(
                        path = %self.path().unwrap_or_default(),
                        "node kind unknown, assuming file"
                    );
                }
                fallback.unwrap_or(false)
            }
        }
    }

    /// True when a property block exists and is more than the bare
    /// `PROPS-END` marker (whose length is exactly 10).
    pub fn has_properties(&self) -> bool {
        matches!(
            self.payload_u64("Prop-content-length"),
            Ok(Some(n)) if n != 10
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_section() -> Section {
        Section::new(
            b"Node-path: trunk/file\n\
Node-kind: file\n\
Node-action: add\n\
Prop-content-length: 10\n\
Text-content-length: 5\n\
Text-content-md5: 5d41402abc4b2a76b9719d911017c592\n\
Content-length: 15\n"
                .to_vec(),
        )
    }

    #[test]
    fn test_payload() {
        let sec = node_section();
        assert_eq!(sec.payload("Node-path").unwrap(), b"trunk/file");
        assert_eq!(sec.payload_u64("Text-content-length").unwrap(), Some(5));
        assert_eq!(sec.payload("Node-copyfrom-rev"), None);
    }

    #[test]
    fn test_payload_does_not_cross_match() {
        let sec = node_section();
        // "Content-length" must not match inside "Prop-content-length".
        assert_eq!(sec.payload_u64("Content-length").unwrap(), Some(15));
    }

    #[test]
    fn test_replace_field_reports_old_and_new() {
        let mut sec = node_section();
        let (old, new) = sec
            .replace_field("Node-path", |_| b"trunk/other".to_vec())
            .unwrap();
        assert_eq!(old, b"trunk/file");
        assert_eq!(new, b"trunk/other");
        assert_eq!(sec.payload("Node-path").unwrap(), b"trunk/other");
    }

    #[test]
    fn test_set_length_rewrites_in_place() {
        let mut sec = node_section();
        sec.set_length("Text-content", 42);
        assert_eq!(sec.payload_u64("Text-content-length").unwrap(), Some(42));
        // Line order is preserved.
        let text = String::from_utf8(sec.into_bytes()).unwrap();
        let kind_at = text.find("Node-kind").unwrap();
        let len_at = text.find("Text-content-length").unwrap();
        assert!(kind_at < len_at);
    }

    #[test]
    fn test_set_length_appends_when_absent() {
        let mut sec = Section::new(b"Node-path: a\nNode-action: add\n".to_vec());
        sec.set_length("Text-content", 0);
        assert_eq!(sec.payload("Text-content-length"), None);
        sec.set_length("Text-content", 3);
        assert_eq!(sec.payload_u64("Text-content-length").unwrap(), Some(3));
    }

    #[test]
    fn test_strip_checksums() {
        let mut sec = node_section();
        sec.strip_checksums();
        assert_eq!(sec.payload("Text-content-md5"), None);
        assert_eq!(sec.payload("Node-path").unwrap(), b"trunk/file");
    }

    #[test]
    fn test_is_dir_falls_back_to_tracker() {
        let mut dirs = DirTracker::default();
        dirs.note("trunk", true);
        let sec = Section::new(b"Node-path: trunk\nNode-action: change\n".to_vec());
        assert!(sec.is_dir(&dirs));
        let sec = Section::new(b"Node-path: unseen\nNode-action: change\n".to_vec());
        assert!(!sec.is_dir(&dirs));
    }

    #[test]
    fn test_has_properties_excludes_empty_marker() {
        let sec = node_section();
        assert!(!sec.has_properties());
        let mut sec = node_section();
        sec.set_length("Prop-content", 56);
        assert!(sec.has_properties());
        let sec = Section::new(b"Node-path: a\nNode-action: delete\n".to_vec());
        assert!(!sec.has_properties());
    }

    #[test]
    fn test_build() {
        let sec = Section::build(&[
            ("Node-path", "trunk"),
            ("Node-kind", "dir"),
            ("Node-action", "add"),
        ]);
        assert_eq!(sec.path().unwrap(), "trunk");
        assert_eq!(sec.kind(), Some(NodeKind::Dir));
        assert_eq!(sec.action(), Some(NodeAction::Add));
    }
}
