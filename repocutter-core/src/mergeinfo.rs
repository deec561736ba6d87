//! Mergeinfo range algebra
//!
//! The `svn:mergeinfo` property stores lines of `PATH:RANGELIST`, where a
//! rangelist is a comma-separated sequence of single revisions or `LO-HI`
//! intervals, each optionally flagged non-inheritable with a trailing `*`.
//! The algebra here parses, filters, remaps and re-coalesces those lists;
//! the path side of each line (leading slash included) is preserved by the
//! callers verbatim.

use std::fmt;

use crate::error::{DumpError, Result};

/// One closed interval of merged revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRange {
    pub lo: u64,
    pub hi: u64,
    pub noninheritable: bool,
}

/// A rangelist: ordered merge intervals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRanges {
    ranges: Vec<MergeRange>,
}

impl MergeRanges {
    pub fn parse(text: &str) -> Result<Self> {
        let mut ranges = Vec::new();
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (body, noninheritable) = match part.strip_suffix('*') {
                Some(body) => (body, true),
                None => (part, false),
            };
            let bad = || DumpError::argument(format!("not a mergeinfo range: {part:?}"));
            let (lo, hi) = match body.split_once('-') {
                Some((lo, hi)) => (
                    lo.parse().map_err(|_| bad())?,
                    hi.parse().map_err(|_| bad())?,
                ),
                None => {
                    let only: u64 = body.parse().map_err(|_| bad())?;
                    (only, only)
                }
            };
            if hi < lo {
                return Err(bad());
            }
            ranges.push(MergeRange {
                lo,
                hi,
                noninheritable,
            });
        }
        Ok(MergeRanges { ranges })
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Coalesce adjacent intervals. Two intervals merge only when their
    /// non-inheritable flags agree and the second starts exactly one past
    /// the first.
    pub fn optimize(&mut self) {
        let mut out: Vec<MergeRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match out.last_mut() {
                Some(prev)
                    if prev.noninheritable == range.noninheritable
                        && range.lo == prev.hi + 1 =>
                {
                    prev.hi = range.hi;
                }
                _ => out.push(range),
            }
        }
        self.ranges = out;
    }

    /// Keep only the revisions accepted by `keep`, splitting intervals as
    /// needed, then re-coalesce.
    pub fn retain_revisions<F>(&mut self, keep: F)
    where
        F: Fn(u64) -> bool,
    {
        let mut singles = Vec::new();
        for range in &self.ranges {
            for rev in range.lo..=range.hi {
                if keep(rev) {
                    singles.push(MergeRange {
                        lo: rev,
                        hi: rev,
                        noninheritable: range.noninheritable,
                    });
                }
            }
        }
        self.ranges = singles;
        self.optimize();
    }

    /// Rewrite every revision through `f`, dropping those it rejects,
    /// then re-coalesce.
    pub fn map_revisions<F>(&mut self, f: F)
    where
        F: Fn(u64) -> Option<u64>,
    {
        let mut singles = Vec::new();
        for range in &self.ranges {
            for rev in range.lo..=range.hi {
                if let Some(mapped) = f(rev) {
                    singles.push(MergeRange {
                        lo: mapped,
                        hi: mapped,
                        noninheritable: range.noninheritable,
                    });
                }
            }
        }
        singles.sort_by_key(|r| r.lo);
        self.ranges = singles;
        self.optimize();
    }
}

impl fmt::Display for MergeRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if range.lo == range.hi {
                write!(f, "{}", range.lo)?;
            } else {
                write!(f, "{}-{}", range.lo, range.hi)?;
            }
            if range.noninheritable {
                write!(f, "*")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for text in ["1-3", "5", "1-3,5,9-12*", "4*"] {
            let ranges = MergeRanges::parse(text).unwrap();
            assert_eq!(ranges.to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(MergeRanges::parse("x").is_err());
        assert!(MergeRanges::parse("9-3").is_err());
    }

    #[test]
    fn test_optimize_joins_adjacent() {
        let mut ranges = MergeRanges::parse("1-3,4,5-7").unwrap();
        ranges.optimize();
        assert_eq!(ranges.to_string(), "1-7");
    }

    #[test]
    fn test_optimize_respects_flag_and_gaps() {
        let mut ranges = MergeRanges::parse("1-3,4*,5-7").unwrap();
        ranges.optimize();
        assert_eq!(ranges.to_string(), "1-3,4*,5-7");

        let mut ranges = MergeRanges::parse("1-3,5-7").unwrap();
        ranges.optimize();
        assert_eq!(ranges.to_string(), "1-3,5-7");
    }

    #[test]
    fn test_retain_revisions_splits() {
        let mut ranges = MergeRanges::parse("1-3").unwrap();
        ranges.retain_revisions(|rev| rev != 2);
        assert_eq!(ranges.to_string(), "1,3");
    }

    #[test]
    fn test_retain_keeps_flag() {
        let mut ranges = MergeRanges::parse("1-4*").unwrap();
        ranges.retain_revisions(|rev| rev != 3);
        assert_eq!(ranges.to_string(), "1-2*,4*");
    }

    #[test]
    fn test_map_revisions_recoalesces() {
        let mut ranges = MergeRanges::parse("1,3,7").unwrap();
        ranges.map_revisions(|rev| match rev {
            1 => Some(0),
            3 => Some(1),
            7 => Some(2),
            _ => None,
        });
        assert_eq!(ranges.to_string(), "0-2");
    }

    #[test]
    fn test_map_revisions_drops_unknown() {
        let mut ranges = MergeRanges::parse("1-3").unwrap();
        ranges.map_revisions(|rev| (rev != 2).then_some(rev));
        assert_eq!(ranges.to_string(), "1,3");
    }
}
