// tests/fingerprint_header.rs

use datamill::cache::compute_str_hash;
use datamill::handlers::fingerprint::{build_fingerprint, comment_data};
use datamill::handlers::render::{indent_str, render_name_to_key};
use datamill::types::{PKG_NAME, VERSION};

#[test]
fn hash_style_header_for_scripts_and_yaml() {
    let header = build_fingerprint("body", "yaml", false, "\n");
    let lines: Vec<String> = header.lines().map(str::to_string).collect();

    let hash_line = format!("hash={}", compute_str_hash("body"));
    let barrier = format!("# {}", "=".repeat(hash_line.len()));
    assert_eq!(
        lines,
        vec![
            barrier.clone(),
            format!("# generator={PKG_NAME}"),
            format!("# {hash_line}"),
            barrier,
        ]
    );
    assert!(header.ends_with("=\n"));
    assert_eq!(build_fingerprint("body", "SH", false, "\n"), build_fingerprint("body", "py", false, "\n"));
}

#[test]
fn markup_header_is_a_block_comment() {
    let header = build_fingerprint("body", "md", true, "\n");

    assert!(header.starts_with("<!--\n    ="));
    assert!(header.contains(&format!("\n    version={VERSION}\n")));
    assert!(header.ends_with("=\n-->\n\n"), "{header:?}");
}

#[test]
fn unknown_extensions_get_no_header() {
    assert_eq!(build_fingerprint("body", "txt", true, "\n"), "");
    assert_eq!(build_fingerprint("body", "", true, "\n"), "");
}

#[test]
fn version_only_appears_in_dynamic_headers() {
    let stable = comment_data("x", false);
    let dynamic = comment_data("x", true);

    assert!(stable.iter().all(|(key, _)| *key != "version"));
    assert!(dynamic.iter().any(|(key, value)| *key == "version" && value == VERSION));
    assert_eq!(stable.last(), dynamic.last());
}

#[test]
fn header_tracks_the_content() {
    assert_ne!(
        build_fingerprint("one", "yaml", false, "\n"),
        build_fingerprint("two", "yaml", false, "\n")
    );
}

#[test]
fn windows_newlines_are_respected() {
    let header = build_fingerprint("body", "py", false, "\r\n");
    assert_eq!(header.matches("\r\n").count(), 4);
    assert!(!header.replace("\r\n", "").contains('\n'));
}

#[test]
fn indent_pads_non_empty_lines() {
    assert_eq!(indent_str("a\n\nb\n", 2, "\n"), "  a\n\n  b");
    assert_eq!(indent_str("a  \n", 0, "\n"), "a");
    assert_eq!(indent_str("", 4, "\n"), "");
}

#[test]
fn render_keys_replace_dots() {
    assert_eq!(render_name_to_key("README.md"), "README_md");
    assert_eq!(render_name_to_key("a.b.c"), "a_b_c");
    assert_eq!(render_name_to_key("plain"), "plain");
}
