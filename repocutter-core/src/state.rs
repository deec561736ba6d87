//! Cross-revision state
//!
//! Three small tables live for the whole run and are owned by the engine:
//! the set of revisions whose headers have been written, the last observed
//! node kind per path, and (for the layout-swapping command only) the
//! subbranch names tracked under each `PROJECT/branches` or `PROJECT/tags`
//! prefix. Hooks borrow them through the engine context.

use std::collections::{HashMap, HashSet};

/// Revisions whose `Revision-number:` header has been emitted
#[derive(Debug, Default)]
pub struct EmittedRevisions {
    revisions: HashSet<u64>,
}

impl EmittedRevisions {
    pub fn insert(&mut self, rev: u64) {
        self.revisions.insert(rev);
    }

    pub fn contains(&self, rev: u64) -> bool {
        self.revisions.contains(&rev)
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}

/// Last observed `Node-kind` per path
///
/// Directory operations may omit the kind; later consumers fall back to
/// whatever kind the path carried when it was last seen.
#[derive(Debug, Default)]
pub struct DirTracker {
    kinds: HashMap<String, bool>,
}

impl DirTracker {
    pub fn note(&mut self, path: &str, is_dir: bool) {
        self.kinds.insert(path.to_string(), is_dir);
    }

    /// `None` when the path has never carried a kind.
    pub fn is_dir(&self, path: &str) -> Option<bool> {
        self.kinds.get(path).copied()
    }
}

/// Ordered subbranch names tracked under `PROJECT/branches` and
/// `PROJECT/tags` prefixes
#[derive(Debug, Default)]
pub struct WildcardTable {
    subbranches: HashMap<String, Vec<String>>,
}

impl WildcardTable {
    /// Begin tracking a prefix (idempotent).
    pub fn open(&mut self, prefix: &str) {
        self.subbranches.entry(prefix.to_string()).or_default();
    }

    /// Stop tracking a prefix and drop its names.
    pub fn close(&mut self, prefix: &str) {
        self.subbranches.remove(prefix);
    }

    pub fn is_tracked(&self, prefix: &str) -> bool {
        self.subbranches.contains_key(prefix)
    }

    /// Record a subbranch name, opening the prefix if needed. Insertion
    /// order is preserved; duplicates are ignored.
    pub fn insert(&mut self, prefix: &str, name: &str) {
        let names = self.subbranches.entry(prefix.to_string()).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    pub fn remove(&mut self, prefix: &str, name: &str) {
        if let Some(names) = self.subbranches.get_mut(prefix) {
            names.retain(|n| n != name);
        }
    }

    pub fn names(&self, prefix: &str) -> &[String] {
        self.subbranches
            .get(prefix)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Copy one prefix's names under another, as happens when a whole
    /// project directory is copied.
    pub fn duplicate(&mut self, from: &str, to: &str) {
        let names = self.subbranches.get(from).cloned().unwrap_or_default();
        self.subbranches.insert(to.to_string(), names);
    }
}
