//! Layout swap for multi-project Subversion repositories
//!
//! Converts `PROJECT/{trunk,branches/X,tags/Y}/…` into the standard
//! `{trunk,branches/X,tags/Y}/PROJECT/…`. The awkward residue of that
//! transformation is handled here: bare `PROJECT/branches` operations
//! expand over the subbranches tracked for that project, top-level
//! project directories dissolve into one-time creation nodes for the
//! universal `trunk`/`branches`/`tags`, whole-project copies split into
//! per-subtree copies, and the per-project copies a branch rename leaves
//! behind are coalesced back into one branch-level copy.

use crate::commands::paths::swap_two;
use crate::engine::{Context, Node, PropVerdict, Surgeon};
use crate::error::{DumpError, Result};
use crate::properties::Properties;
use crate::range::SelectionRange;
use crate::section::{NodeAction, Section};
use crate::state::WildcardTable;

const STRUCTURAL: [&str; 3] = ["trunk", "branches", "tags"];

fn is_structural(segment: &str) -> bool {
    STRUCTURAL.contains(&segment)
}

/// Pure path swapper, also applied to copy sources and mergeinfo paths.
pub(crate) fn swap_standard(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 2 || is_structural(parts[0]) {
        return path.to_string();
    }
    match parts[1] {
        "branches" | "tags" if parts.len() >= 3 => {
            let mut out = format!("{}/{}/{}", parts[1], parts[2], parts[0]);
            if parts.len() > 3 {
                out.push('/');
                out.push_str(&parts[3..].join("/"));
            }
            out
        }
        _ => swap_two(path),
    }
}

fn creation_node(name: &str) -> Node {
    let mut node = Node::new(Section::build(&[
        ("Node-path", name),
        ("Node-kind", "dir"),
        ("Node-action", "add"),
    ]));
    node.properties = Some(Properties::new());
    node
}

/// The layout-swapping command
pub struct SwapSvn {
    range: SelectionRange,
    structure_created: bool,
    promoted_copy: Option<(String, String)>,
    promoted_delete: Option<String>,
}

impl SwapSvn {
    pub fn new(range: SelectionRange) -> Self {
        SwapSvn {
            range,
            structure_created: false,
            promoted_copy: None,
            promoted_delete: None,
        }
    }

    /// A whole-project copy becomes one copy per standard subtree, with
    /// the tracked subbranches of the source enumerated individually.
    fn split_project_copy(
        &mut self,
        wildcards: &mut WildcardTable,
        node: &Node,
        project: &str,
        source: &str,
    ) -> Vec<Node> {
        let mut out = Vec::new();
        let mut trunk = node.clone();
        trunk
            .header
            .set_field("Node-path", &format!("trunk/{project}"));
        trunk
            .header
            .set_field("Node-copyfrom-path", &format!("trunk/{source}"));
        out.push(trunk);

        for family in ["branches", "tags"] {
            let source_prefix = format!("{source}/{family}");
            for sub in wildcards.names(&source_prefix).to_vec() {
                let mut clone = node.clone();
                clone
                    .header
                    .set_field("Node-path", &format!("{family}/{sub}/{project}"));
                clone
                    .header
                    .set_field("Node-copyfrom-path", &format!("{family}/{sub}/{source}"));
                out.push(clone);
            }
            wildcards.duplicate(&source_prefix, &format!("{project}/{family}"));
        }
        out
    }

    /// Per-project branch copies that the swap folded onto the same
    /// branch pair collapse into one branch-level copy.
    fn try_promote_copy(&mut self, node: &mut Node, path: &str, source: &str) -> Option<Vec<Node>> {
        let t: Vec<&str> = path.split('/').collect();
        let s: Vec<&str> = source.split('/').collect();
        let spans_branch = t.len() == 3
            && s.len() == 3
            && matches!(t[0], "branches" | "tags")
            && matches!(s[0], "branches" | "tags")
            && t[2] == s[2]
            && (t[0], t[1]) != (s[0], s[1]);
        if !spans_branch {
            return None;
        }
        let target_prefix = format!("{}/{}", t[0], t[1]);
        let source_prefix = format!("{}/{}", s[0], s[1]);
        if self.promoted_copy == Some((target_prefix.clone(), source_prefix.clone())) {
            return Some(vec![]);
        }
        node.header.set_field("Node-path", &target_prefix);
        node.header.set_field("Node-copyfrom-path", &source_prefix);
        self.promoted_copy = Some((target_prefix, source_prefix));
        self.promoted_delete = None;
        Some(vec![node.clone()])
    }

    /// The deletes that follow a promoted branch copy collapse the same
    /// way; trunk deletes never do.
    fn try_promote_delete(&mut self, node: &mut Node, path: &str) -> Option<Vec<Node>> {
        let p: Vec<&str> = path.split('/').collect();
        if p.len() != 3 || p[0] == "trunk" {
            return None;
        }
        let parent = format!("{}/{}", p[0], p[1]);
        match &self.promoted_copy {
            Some((_, source_prefix)) if *source_prefix == parent => {
                if self.promoted_delete.as_deref() == Some(parent.as_str()) {
                    return Some(vec![]);
                }
                node.header.set_field("Node-path", &parent);
                self.promoted_delete = Some(parent);
                Some(vec![node.clone()])
            }
            _ => None,
        }
    }
}

impl Surgeon for SwapSvn {
    fn properties(&mut self, ctx: &mut Context, props: &mut Properties) -> Result<PropVerdict> {
        if self.range.contains_node(ctx.revision, ctx.index) {
            props.mutate_mergeinfo(|path, ranges| {
                let rebuilt = match path.strip_prefix('/') {
                    Some(rest) => format!("/{}", swap_standard(rest)),
                    None => swap_standard(path),
                };
                Some((rebuilt, ranges.to_string()))
            });
        }
        Ok(PropVerdict::Keep)
    }

    fn header(&mut self, ctx: &mut Context, mut node: Node) -> Result<Vec<Node>> {
        if !self.range.contains_node(ctx.revision, ctx.index) {
            return Ok(vec![node]);
        }
        let Some(path) = node.header.path() else {
            return Ok(vec![node]);
        };
        let parts: Vec<String> = path.split('/').map(str::to_string).collect();
        let action = node.header.action();
        let copyfrom = node.header.copyfrom();

        // Streams already in standard layout pass through untouched.
        if is_structural(&parts[0]) {
            return Ok(vec![node]);
        }

        // Three-segment branch directories feed the wildcard tables.
        if parts.len() == 3 && matches!(parts[1].as_str(), "branches" | "tags") {
            let prefix = format!("{}/{}", parts[0], parts[1]);
            match action {
                Some(NodeAction::Add) => ctx.wildcards.insert(&prefix, &parts[2]),
                Some(NodeAction::Delete) => ctx.wildcards.remove(&prefix, &parts[2]),
                _ => {}
            }
        }

        // Top-level project directories dissolve.
        if parts.len() == 1 {
            if let Some((_, source)) = &copyfrom {
                return Ok(self.split_project_copy(&mut ctx.wildcards, &node, &path, source));
            }
            if node.header.has_properties()
                || node.content.as_ref().is_some_and(|c| !c.is_empty())
            {
                return Err(DumpError::conflict(format!(
                    "cannot swap top-level directory {path:?} carrying properties or content \
                     at revision {}",
                    ctx.revision
                )));
            }
            if action == Some(NodeAction::Add) && !self.structure_created {
                self.structure_created = true;
                return Ok(STRUCTURAL.iter().map(|name| creation_node(name)).collect());
            }
            return Ok(vec![]);
        }

        // Bare PROJECT/branches or PROJECT/tags cannot be swapped as one
        // path; they expand over the tracked subbranches.
        if parts.len() == 2 && matches!(parts[1].as_str(), "branches" | "tags") {
            let (project, family) = (&parts[0], &parts[1]);
            match action {
                Some(NodeAction::Add) if copyfrom.is_none() => {
                    ctx.wildcards.open(&path);
                    return Ok(vec![]);
                }
                Some(NodeAction::Delete) => {
                    let names = ctx.wildcards.names(&path).to_vec();
                    ctx.wildcards.close(&path);
                    let clones = names
                        .iter()
                        .map(|sub| {
                            let mut clone = node.clone();
                            clone
                                .header
                                .set_field("Node-path", &format!("{family}/{sub}/{project}"));
                            clone
                        })
                        .collect();
                    return Ok(clones);
                }
                _ => {
                    let mut out = Vec::new();
                    for sub in ctx.wildcards.names(&path).to_vec() {
                        let mut clone = node.clone();
                        clone
                            .header
                            .set_field("Node-path", &format!("{family}/{sub}/{project}"));
                        if let Some((_, source)) = &copyfrom {
                            let sparts: Vec<&str> = source.split('/').collect();
                            let new_source = if sparts.len() == 2 && sparts[1] == family {
                                format!("{family}/{sub}/{}", sparts[0])
                            } else {
                                swap_standard(source)
                            };
                            clone.header.set_field("Node-copyfrom-path", &new_source);
                        }
                        out.push(clone);
                    }
                    return Ok(out);
                }
            }
        }

        let new_path = swap_standard(&path);
        node.header.set_field("Node-path", &new_path);
        let new_source = copyfrom.as_ref().map(|(_, source)| swap_standard(source));
        if let Some(new_source) = &new_source {
            node.header.set_field("Node-copyfrom-path", new_source);
        }

        if action == Some(NodeAction::Add) {
            if let Some(new_source) = &new_source {
                if let Some(out) = self.try_promote_copy(&mut node, &new_path, new_source) {
                    return Ok(out);
                }
            }
        }
        if action == Some(NodeAction::Delete) {
            if let Some(out) = self.try_promote_delete(&mut node, &new_path) {
                return Ok(out);
            }
        }
        Ok(vec![node])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_node(path: &str, action: &str) -> Node {
        Node::new(Section::build(&[
            ("Node-path", path),
            ("Node-kind", "dir"),
            ("Node-action", action),
        ]))
    }

    fn copy_node(path: &str, src_rev: u64, src_path: &str) -> Node {
        Node::new(Section::build(&[
            ("Node-path", path),
            ("Node-kind", "dir"),
            ("Node-action", "add"),
            ("Node-copyfrom-rev", &src_rev.to_string()),
            ("Node-copyfrom-path", src_path),
        ]))
    }

    fn cmd() -> SwapSvn {
        SwapSvn::new(SelectionRange::all())
    }

    #[test]
    fn test_swap_standard_rules() {
        assert_eq!(swap_standard("proj/trunk/src/main.c"), "trunk/proj/src/main.c");
        assert_eq!(swap_standard("proj/branches/v1/src"), "branches/v1/proj/src");
        assert_eq!(swap_standard("proj/tags/r1"), "tags/r1/proj");
        assert_eq!(swap_standard("trunk/anything"), "trunk/anything");
        assert_eq!(swap_standard("branches/v1/x"), "branches/v1/x");
        assert_eq!(swap_standard("proj"), "proj");
        // Nonstandard second segments fall back to the plain swap.
        assert_eq!(swap_standard("proj/doc/x"), "doc/proj/x");
    }

    #[test]
    fn test_swap_roundtrips_with_its_inverse() {
        // Restoring project-first order undoes the swap exactly.
        fn unswap(path: &str) -> String {
            let parts: Vec<&str> = path.split('/').collect();
            match parts[0] {
                "branches" | "tags" if parts.len() >= 3 => {
                    let mut out = format!("{}/{}/{}", parts[2], parts[0], parts[1]);
                    if parts.len() > 3 {
                        out.push('/');
                        out.push_str(&parts[3..].join("/"));
                    }
                    out
                }
                _ => swap_two(path),
            }
        }
        for path in [
            "proj/trunk/src/main.c",
            "proj/trunk",
            "proj/branches/v1/src",
            "other/tags/r2/doc/x",
        ] {
            assert_eq!(unswap(&swap_standard(path)), path);
        }
    }

    #[test]
    fn test_first_project_add_creates_structure() {
        let mut swapper = cmd();
        let mut ctx = Context::default();
        let out = swapper.header(&mut ctx, dir_node("proj", "add")).unwrap();
        let paths: Vec<String> = out.iter().filter_map(|n| n.header.path()).collect();
        assert_eq!(paths, ["trunk", "branches", "tags"]);

        // The next project dissolves silently.
        let out = swapper.header(&mut ctx, dir_node("other", "add")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_project_dir_with_properties_is_fatal() {
        let mut swapper = cmd();
        let mut ctx = Context::default();
        let mut node = dir_node("proj", "add");
        node.header.set_field("Prop-content-length", "40");
        assert!(swapper.header(&mut ctx, node).is_err());
    }

    #[test]
    fn test_wildcard_expansion_of_bare_branches() {
        let mut swapper = cmd();
        let mut ctx = Context::default();

        swapper
            .header(&mut ctx, dir_node("proj/branches", "add"))
            .unwrap();
        swapper
            .header(&mut ctx, dir_node("proj/branches/v1", "add"))
            .unwrap();
        swapper
            .header(&mut ctx, dir_node("proj/branches/v2", "add"))
            .unwrap();

        let out = swapper
            .header(&mut ctx, dir_node("proj/branches", "change"))
            .unwrap();
        let paths: Vec<String> = out.iter().filter_map(|n| n.header.path()).collect();
        assert_eq!(paths, ["branches/v1/proj", "branches/v2/proj"]);

        let out = swapper
            .header(&mut ctx, dir_node("proj/branches", "delete"))
            .unwrap();
        let paths: Vec<String> = out.iter().filter_map(|n| n.header.path()).collect();
        assert_eq!(paths, ["branches/v1/proj", "branches/v2/proj"]);
        assert!(!ctx.wildcards.is_tracked("proj/branches"));
    }

    #[test]
    fn test_three_segment_delete_drains_tracking() {
        let mut swapper = cmd();
        let mut ctx = Context::default();
        swapper
            .header(&mut ctx, dir_node("proj/branches/v1", "add"))
            .unwrap();
        assert_eq!(ctx.wildcards.names("proj/branches"), ["v1"]);
        let out = swapper
            .header(&mut ctx, dir_node("proj/branches/v1", "delete"))
            .unwrap();
        assert_eq!(out[0].header.path().unwrap(), "branches/v1/proj");
        assert!(ctx.wildcards.names("proj/branches").is_empty());
    }

    #[test]
    fn test_project_copy_splits_per_subtree() {
        let mut swapper = cmd();
        let mut ctx = Context::default();
        swapper
            .header(&mut ctx, dir_node("old/branches/v1", "add"))
            .unwrap();

        let out = swapper.header(&mut ctx, copy_node("new", 4, "old")).unwrap();
        let pairs: Vec<(String, String)> = out
            .iter()
            .map(|n| {
                (
                    n.header.path().unwrap(),
                    n.header.copyfrom().unwrap().1,
                )
            })
            .collect();
        assert_eq!(
            pairs,
            [
                ("trunk/new".to_string(), "trunk/old".to_string()),
                ("branches/v1/new".to_string(), "branches/v1/old".to_string()),
            ]
        );
        // The new project inherits the tracked subbranches.
        assert_eq!(ctx.wildcards.names("new/branches"), ["v1"]);
    }

    #[test]
    fn test_branch_rename_span_coalesces() {
        let mut swapper = cmd();
        let mut ctx = Context::default();

        let out = swapper
            .header(&mut ctx, copy_node("p1/branches/new", 7, "p1/branches/old"))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].header.path().unwrap(), "branches/new");
        assert_eq!(out[0].header.copyfrom().unwrap().1, "branches/old");

        // The second project's copy of the same rename is redundant.
        let out = swapper
            .header(&mut ctx, copy_node("p2/branches/new", 7, "p2/branches/old"))
            .unwrap();
        assert!(out.is_empty());

        // The per-project deletes of the old branch collapse the same way.
        let out = swapper
            .header(&mut ctx, dir_node("p1/branches/old", "delete"))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].header.path().unwrap(), "branches/old");
        let out = swapper
            .header(&mut ctx, dir_node("p2/branches/old", "delete"))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_trunk_deletes_are_never_promoted() {
        let mut swapper = cmd();
        let mut ctx = Context::default();
        let out = swapper
            .header(&mut ctx, dir_node("p1/trunk/obsolete", "delete"))
            .unwrap();
        assert_eq!(out[0].header.path().unwrap(), "trunk/p1/obsolete");
    }

    #[test]
    fn test_mergeinfo_goes_through_the_swapper() {
        let mut swapper = cmd();
        let mut ctx = Context::default();
        let mut props = Properties::new();
        props.set("svn:mergeinfo", "/proj/trunk:1-3\n/proj/branches/v1:5");
        swapper.properties(&mut ctx, &mut props).unwrap();
        assert_eq!(
            props.get_str("svn:mergeinfo").unwrap(),
            "/trunk/proj:1-3\n/branches/v1/proj:5"
        );
    }

    #[test]
    fn test_standard_layout_passes_through() {
        let mut swapper = cmd();
        let mut ctx = Context::default();
        let out = swapper
            .header(&mut ctx, dir_node("trunk/src", "change"))
            .unwrap();
        assert_eq!(out[0].header.path().unwrap(), "trunk/src");
    }
}
