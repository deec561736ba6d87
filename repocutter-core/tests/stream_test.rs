//! End-to-end tests over literal dump streams

use repocutter_core::commands::{
    FileCopy, PathPattern, PathRename, Pop, PropDel, Push, Renumber, Replace, See, Select, Sift,
    Strip, SwapSvn,
};
use repocutter_core::{DumpEngine, PassThrough, Properties, SelectionRange, Surgeon};

fn prop_block(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut props = Properties::new();
    for (key, value) in entries {
        props.set(key, value.as_bytes());
    }
    props.to_bytes()
}

fn revision(rev: u64, entries: &[(&str, &str)]) -> Vec<u8> {
    let block = prop_block(entries);
    let mut out = format!(
        "Revision-number: {rev}\nProp-content-length: {}\nContent-length: {}\n\n",
        block.len(),
        block.len()
    )
    .into_bytes();
    out.extend_from_slice(&block);
    out.push(b'\n');
    out
}

fn node(
    headers: &[(&str, &str)],
    props: Option<&[(&str, &str)]>,
    content: Option<&[u8]>,
) -> Vec<u8> {
    let block = props.map(prop_block);
    let mut out = Vec::new();
    for (name, value) in headers {
        out.extend_from_slice(format!("{name}: {value}\n").as_bytes());
    }
    let plen = block.as_ref().map_or(0, Vec::len);
    let tlen = content.map_or(0, <[u8]>::len);
    if block.is_some() {
        out.extend_from_slice(format!("Prop-content-length: {plen}\n").as_bytes());
    }
    if content.is_some() {
        out.extend_from_slice(format!("Text-content-length: {tlen}\n").as_bytes());
    }
    if block.is_some() || content.is_some() {
        out.extend_from_slice(format!("Content-length: {}\n", plen + tlen).as_bytes());
    }
    out.push(b'\n');
    if let Some(block) = &block {
        out.extend_from_slice(block);
    }
    if let Some(content) = content {
        out.extend_from_slice(content);
    }
    out.extend_from_slice(b"\n\n");
    out
}

fn dir_add(path: &str) -> Vec<u8> {
    node(
        &[
            ("Node-path", path),
            ("Node-kind", "dir"),
            ("Node-action", "add"),
        ],
        Some(&[]),
        None,
    )
}

fn file_add(path: &str, content: &[u8]) -> Vec<u8> {
    node(
        &[
            ("Node-path", path),
            ("Node-kind", "file"),
            ("Node-action", "add"),
        ],
        Some(&[]),
        Some(content),
    )
}

fn preamble() -> Vec<u8> {
    b"SVN-fs-dump-format-version: 2\n\nUUID: 1aa1fa48-d10d-44a0-93e4-f5b17c41bf29\n\n".to_vec()
}

fn minimal_stream() -> Vec<u8> {
    let mut dump = preamble();
    dump.extend(revision(0, &[("svn:date", "2024-01-01T00:00:00.000000Z")]));
    dump.extend(revision(
        1,
        &[
            ("svn:log", "first"),
            ("svn:author", "alice"),
            ("svn:date", "2024-01-01T00:01:00.000000Z"),
        ],
    ));
    dump.extend(dir_add("trunk"));
    dump.extend(file_add("trunk/file", b"hello"));
    dump
}

fn filter(surgeon: &mut dyn Surgeon, input: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut engine = DumpEngine::new(input, &mut out);
    engine.run(surgeon).unwrap();
    out
}

fn report(surgeon: &mut dyn Surgeon, input: &[u8]) -> String {
    let mut out = Vec::new();
    let mut engine = DumpEngine::new(input, &mut out).report_only();
    engine.run(surgeon).unwrap();
    String::from_utf8(out).unwrap()
}

/// Every no-op filter must reproduce its input byte for byte.
#[test]
fn test_identity_of_full_range_select() {
    let input = minimal_stream();
    let out = filter(&mut Select::new(SelectionRange::all()), &input);
    assert_eq!(out, input);
    let out = filter(&mut PassThrough, &input);
    assert_eq!(out, input);
}

#[test]
fn test_length_consistency_after_rewrite() {
    let input = minimal_stream();
    let mut cmd = Replace::new("/hello/a longer text/", SelectionRange::all()).unwrap();
    let out = filter(&mut cmd, &input);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("a longer text"));
    assert!(text.contains("Text-content-length: 13\n"));
    assert!(text.contains("Content-length: 23\n"));
}

// S1: one-line-per-node summary of the minimal stream.
#[test]
fn test_see_minimal_stream() {
    let out = report(&mut See::new(SelectionRange::all()), &minimal_stream());
    assert_eq!(out, "1.1   add      trunk/\n1.2   add      trunk/file\n");
}

// S2: renumbering closes the gaps and remaps copy sources.
#[test]
fn test_renumber_gapped_revisions() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "one"), ("svn:author", "a")]));
    dump.extend(dir_add("trunk"));
    dump.extend(revision(3, &[("svn:log", "three"), ("svn:author", "a")]));
    dump.extend(file_add("trunk/file", b"v1"));
    dump.extend(revision(7, &[("svn:log", "seven"), ("svn:author", "a")]));
    dump.extend(node(
        &[
            ("Node-path", "branches/b"),
            ("Node-kind", "dir"),
            ("Node-action", "add"),
            ("Node-copyfrom-rev", "3"),
            ("Node-copyfrom-path", "trunk"),
        ],
        Some(&[]),
        None,
    ));

    let out = filter(&mut Renumber::new(0), &dump);
    let text = String::from_utf8(out.clone()).unwrap();
    assert!(text.contains("Revision-number: 0\n"));
    assert!(text.contains("Revision-number: 1\n"));
    assert!(text.contains("Revision-number: 2\n"));
    assert!(!text.contains("Revision-number: 3\n"));
    assert!(!text.contains("Revision-number: 7\n"));
    assert!(text.contains("Node-copyfrom-rev: 1\n"));

    // Renumbering an already-contiguous stream is the identity.
    let again = filter(&mut Renumber::new(0), &out);
    assert_eq!(again, out);
}

// S3: deselecting a revision trims it out of later mergeinfo.
#[test]
fn test_mergeinfo_after_deselect() {
    let mut dump = preamble();
    dump.extend(revision(0, &[]));
    for rev in 1..=4u64 {
        dump.extend(revision(rev, &[("svn:log", "change"), ("svn:author", "a")]));
        dump.extend(file_add(&format!("trunk/f{rev}"), b"x"));
    }
    dump.extend(revision(
        5,
        &[
            ("svn:log", "merge"),
            ("svn:author", "a"),
            ("svn:mergeinfo", "/trunk:1-3"),
        ],
    ));
    dump.extend(file_add("branches/merged", b"y"));

    let out = filter(
        &mut Select::inverted(SelectionRange::parse("2").unwrap()),
        &dump,
    );
    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("Revision-number: 2\n"));
    assert!(text.contains("/trunk:1,3\n"));
}

// S4: expunge matches whole path segments only.
#[test]
fn test_expunge_segment_boundary() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "add"), ("svn:author", "a")]));
    dump.extend(file_add("trunk/foo", b"1"));
    dump.extend(file_add("trunk/foobar", b"2"));

    let patterns = PathPattern::compile_all(&["foo".to_string()], false).unwrap();
    let out = filter(&mut Sift::expunge(patterns, SelectionRange::all()), &dump);
    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("Node-path: trunk/foo\n"));
    assert!(text.contains("Node-path: trunk/foobar\n"));
}

// S5: strip cookies plain files, spares symlinks, drops checksums.
#[test]
fn test_strip_preserves_symlinks() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "add"), ("svn:author", "a")]));
    dump.extend(node(
        &[
            ("Node-path", "trunk/data"),
            ("Node-kind", "file"),
            ("Node-action", "add"),
            ("Text-content-md5", "eb733a00c0c9d336e65691a37ab54293"),
        ],
        Some(&[]),
        Some(b"payload\n"),
    ));
    dump.extend(node(
        &[
            ("Node-path", "trunk/alias"),
            ("Node-kind", "file"),
            ("Node-action", "add"),
        ],
        Some(&[]),
        Some(b"link trunk/data"),
    ));

    let out = filter(&mut Strip::new(Vec::new(), SelectionRange::all()), &dump);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Revision is 1, file path is trunk/data.\n"));
    assert!(!text.contains("Text-content-md5"));
    assert!(text.contains("link trunk/data"));
}

// S6: a pure file copy is materialized from the cached source content.
#[test]
fn test_filecopy_materializes_content() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "add"), ("svn:author", "a")]));
    dump.extend(file_add("a/file", b"X"));
    dump.extend(revision(2, &[("svn:log", "copy"), ("svn:author", "a")]));
    dump.extend(node(
        &[
            ("Node-path", "b/file"),
            ("Node-kind", "file"),
            ("Node-action", "add"),
            ("Node-copyfrom-rev", "1"),
            ("Node-copyfrom-path", "a/file"),
        ],
        None,
        None,
    ));

    let out = filter(&mut FileCopy::new(SelectionRange::all(), false), &dump);
    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("Node-copyfrom-rev"));
    assert!(!text.contains("Node-copyfrom-path"));
    let node_at = text.find("Node-path: b/file").unwrap();
    let tail = &text[node_at..];
    assert!(tail.contains("Text-content-length: 1\n"));
    assert!(tail.contains("Content-length: 1\n"));
    assert!(tail.contains("\n\nX"));
}

// Property 4: dropping a revision elides copy references into it.
#[test]
fn test_copyfrom_closure_after_deselect() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "one"), ("svn:author", "a")]));
    dump.extend(dir_add("trunk"));
    dump.extend(revision(2, &[("svn:log", "two"), ("svn:author", "a")]));
    dump.extend(file_add("trunk/file", b"v"));
    dump.extend(revision(3, &[("svn:log", "three"), ("svn:author", "a")]));
    dump.extend(node(
        &[
            ("Node-path", "branches/b"),
            ("Node-kind", "dir"),
            ("Node-action", "add"),
            ("Node-copyfrom-rev", "2"),
            ("Node-copyfrom-path", "trunk"),
        ],
        Some(&[]),
        None,
    ));

    let out = filter(
        &mut Select::inverted(SelectionRange::parse("2").unwrap()),
        &dump,
    );
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Node-path: branches/b\n"));
    assert!(!text.contains("Node-copyfrom-rev"));
    assert!(!text.contains("Node-copyfrom-path"));
}

// Property 8: deleting a node's only property deletes the node, and an
// emptied revision disappears with it.
#[test]
fn test_empty_property_collapse() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "add"), ("svn:author", "a")]));
    dump.extend(file_add("trunk/file", b"v"));
    dump.extend(revision(2, &[("svn:log", "prop only"), ("svn:author", "a")]));
    dump.extend(node(
        &[("Node-path", "trunk/file"), ("Node-action", "change")],
        Some(&[("doomed:prop", "value")]),
        None,
    ));

    let out = filter(
        &mut PropDel::new(vec!["doomed:prop".to_string()], SelectionRange::all()),
        &dump,
    );
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Revision-number: 1\n"));
    assert!(!text.contains("Revision-number: 2\n"));
    assert!(!text.contains("Node-action: change"));
}

// Property 6 end to end: pathrename only touches whole segments.
#[test]
fn test_pathrename_segments() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "add"), ("svn:author", "u")]));
    for path in ["a", "ab", "a/x", "x/a", "x/a/y"] {
        dump.extend(file_add(path, b"c"));
    }
    let pairs = vec![(PathPattern::compile("a", false).unwrap(), "b".to_string())];
    let out = filter(&mut PathRename::new(pairs, SelectionRange::all()), &dump);
    let text = String::from_utf8(out).unwrap();
    for expect in ["b", "ab", "b/x", "x/b", "x/b/y"] {
        assert!(
            text.contains(&format!("Node-path: {expect}\n")),
            "missing {expect}"
        );
    }
    assert!(!text.contains("Node-path: a\n"));
}

#[test]
fn test_pop_then_push_restores_paths() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "add"), ("svn:author", "u")]));
    dump.extend(dir_add("proj/trunk"));
    dump.extend(file_add("proj/trunk/file", b"c"));

    let popped = filter(&mut Pop, &dump);
    let text = String::from_utf8(popped.clone()).unwrap();
    assert!(text.contains("Node-path: trunk\n"));
    assert!(text.contains("Node-path: trunk/file\n"));

    let pushed = filter(&mut Push::new("proj"), &popped);
    assert_eq!(pushed, dump);
}

// Property 7: swapsvn on a well-formed multi-project stream.
#[test]
fn test_swapsvn_end_to_end() {
    let mut dump = preamble();
    dump.extend(revision(1, &[("svn:log", "layout"), ("svn:author", "u")]));
    dump.extend(dir_add("proj"));
    dump.extend(dir_add("proj/trunk"));
    dump.extend(file_add("proj/trunk/main.c", b"int main;\n"));
    dump.extend(revision(2, &[("svn:log", "branch"), ("svn:author", "u")]));
    dump.extend(dir_add("proj/branches"));
    dump.extend(node(
        &[
            ("Node-path", "proj/branches/v1"),
            ("Node-kind", "dir"),
            ("Node-action", "add"),
            ("Node-copyfrom-rev", "1"),
            ("Node-copyfrom-path", "proj/trunk"),
        ],
        Some(&[]),
        None,
    ));

    let out = filter(&mut SwapSvn::new(SelectionRange::all()), &dump);
    let text = String::from_utf8(out).unwrap();

    // The dissolved project dir became the universal structure nodes.
    assert!(text.contains("Node-path: trunk\n"));
    assert!(text.contains("Node-path: branches\n"));
    assert!(text.contains("Node-path: tags\n"));
    assert!(!text.contains("Node-path: proj\n"));

    assert!(text.contains("Node-path: trunk/proj\n"));
    assert!(text.contains("Node-path: trunk/proj/main.c\n"));
    assert!(text.contains("Node-path: branches/v1/proj\n"));
    assert!(text.contains("Node-copyfrom-path: trunk/proj\n"));
}
