//! Selection polyranges
//!
//! A selection is a comma-separated list of closed intervals over
//! `rev[.node]` endpoints: `1`, `2:5`, `3:HEAD`, `7.2`, `4.1:4.3`. Node
//! numbers are one-origin within their revision; a node-less endpoint is
//! written with node 0 and matches every node as well as the
//! revision-properties pseudo-node. Intervals must be given in
//! non-decreasing lower-bound order.

use std::fmt;

use crate::error::{DumpError, Result};

/// Revision number standing for "end of stream"
pub const HEAD: u64 = u64::MAX;

/// One `rev[.node]` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub rev: u64,
    pub node: u32,
}

impl Endpoint {
    fn parse(text: &str) -> Result<Self> {
        if text == "HEAD" {
            return Ok(Endpoint { rev: HEAD, node: 0 });
        }
        let (rev, node) = match text.split_once('.') {
            Some((rev, node)) => (rev, Some(node)),
            None => (text, None),
        };
        let bad = || DumpError::argument(format!("not a revision endpoint: {text:?}"));
        let rev = rev.parse().map_err(|_| bad())?;
        let node = match node {
            Some(node) => node.parse().map_err(|_| bad())?,
            None => 0,
        };
        Ok(Endpoint { rev, node })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rev == HEAD {
            write!(f, "HEAD")
        } else if self.node == 0 {
            write!(f, "{}", self.rev)
        } else {
            write!(f, "{}.{}", self.rev, self.node)
        }
    }
}

/// A sorted list of closed `rev[.node]` intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRange {
    intervals: Vec<(Endpoint, Endpoint)>,
}

impl SelectionRange {
    /// The full stream, `0:HEAD`.
    pub fn all() -> Self {
        SelectionRange {
            intervals: vec![(Endpoint { rev: 0, node: 0 }, Endpoint { rev: HEAD, node: 0 })],
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut intervals: Vec<(Endpoint, Endpoint)> = Vec::new();
        for part in text.split(',') {
            let (lo, hi) = match part.split_once(':') {
                Some((lo, hi)) => (Endpoint::parse(lo)?, Endpoint::parse(hi)?),
                None => {
                    let only = Endpoint::parse(part)?;
                    (only, only)
                }
            };
            if hi.rev < lo.rev {
                return Err(DumpError::argument(format!("empty interval: {part:?}")));
            }
            if let Some(&(prev, _)) = intervals.last() {
                if (lo.rev, lo.node) < (prev.rev, prev.node) {
                    return Err(DumpError::argument(format!(
                        "range intervals must have non-decreasing lower bounds: {text:?}"
                    )));
                }
            }
            intervals.push((lo, hi));
        }
        if intervals.is_empty() {
            return Err(DumpError::argument("empty range"));
        }
        Ok(SelectionRange { intervals })
    }

    pub fn contains_revision(&self, rev: u64) -> bool {
        self.intervals
            .iter()
            .any(|(lo, hi)| lo.rev <= rev && rev <= hi.rev)
    }

    /// Whether `(rev, node)` is selected. Node 0 is the
    /// revision-properties pseudo-node.
    pub fn contains_node(&self, rev: u64, node: u32) -> bool {
        match self
            .intervals
            .iter()
            .find(|(lo, hi)| lo.rev <= rev && rev <= hi.rev)
        {
            Some((lo, hi)) => node >= lo.node && (hi.node == 0 || node <= hi.node),
            None => false,
        }
    }

    pub fn lower(&self) -> Endpoint {
        self.intervals[0].0
    }

    pub fn upper(&self) -> Endpoint {
        self.intervals[self.intervals.len() - 1].1
    }
}

impl fmt::Display for SelectionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (lo, hi)) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}:{hi}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_single_revision() {
        let range = SelectionRange::parse("5").unwrap();
        assert!(range.contains_revision(5));
        assert!(!range.contains_revision(4));
        assert!(range.contains_node(5, 0));
        assert!(range.contains_node(5, 7));
    }

    #[test]
    fn test_parse_interval_and_head() {
        let range = SelectionRange::parse("3:HEAD").unwrap();
        assert!(!range.contains_revision(2));
        assert!(range.contains_revision(3));
        assert!(range.contains_revision(1_000_000));
        assert_eq!(range.upper().rev, HEAD);
    }

    #[test]
    fn test_node_endpoints() {
        let range = SelectionRange::parse("4.2:4.3").unwrap();
        assert!(range.contains_revision(4));
        assert!(!range.contains_node(4, 1));
        assert!(range.contains_node(4, 2));
        assert!(range.contains_node(4, 3));
        assert!(!range.contains_node(4, 4));
        assert!(!range.contains_node(4, 0));
    }

    #[test]
    fn test_multiple_intervals() {
        let range = SelectionRange::parse("1:2,5,9:HEAD").unwrap();
        assert!(range.contains_revision(1));
        assert!(!range.contains_revision(3));
        assert!(range.contains_revision(5));
        assert!(range.contains_revision(9));
        assert_eq!(range.lower().rev, 1);
    }

    #[test]
    fn test_decreasing_lower_bounds_are_fatal() {
        assert!(SelectionRange::parse("5,3").is_err());
    }

    #[test]
    fn test_garbage_is_fatal() {
        assert!(SelectionRange::parse("").is_err());
        assert!(SelectionRange::parse("x").is_err());
        assert!(SelectionRange::parse("5:1").is_err());
        assert!(SelectionRange::parse("1..2").is_err());
    }

    #[test]
    fn test_display_roundtrip_fixed() {
        for text in ["0:HEAD", "1:2,5,9:HEAD", "4.2:4.3", "7"] {
            let range = SelectionRange::parse(text).unwrap();
            assert_eq!(range.to_string(), text);
        }
    }

    proptest! {
        #[test]
        fn test_display_parse_roundtrip(spans in prop::collection::vec((1u64..500, 0u32..4, 0u64..50, 0u32..4), 1..6)) {
            let mut rev = 0u64;
            let mut intervals = Vec::new();
            for (gap, lo_node, span, hi_node) in spans {
                rev += gap;
                let lo = Endpoint { rev, node: lo_node };
                let hi = if span == 0 {
                    lo
                } else {
                    Endpoint { rev: rev + span, node: hi_node }
                };
                intervals.push((lo, hi));
            }
            let range = SelectionRange { intervals };
            let reparsed = SelectionRange::parse(&range.to_string()).unwrap();
            prop_assert_eq!(range, reparsed);
        }
    }
}
