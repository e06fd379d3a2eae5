use std::path::PathBuf;

use vmconf_xml::{parse, parse_file, write, write_document, write_file};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn parse_write_parse_round_trip_preserves_tree_shape() {
    let first = parse_file(&fixture("fixtures/sample.xml")).expect("initial parse should succeed");

    let written = write(&first).expect("write should succeed");
    let second = parse(&written).expect("re-parse should succeed");

    assert_eq!(first, second);
}

#[test]
fn document_round_trip_keeps_declaration_out_of_tree() {
    let first = parse_file(&fixture("fixtures/sample.xml")).expect("parse");
    let text = write_document(&first).expect("write document");

    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<domain"));
    assert_eq!(parse(text.as_bytes()).expect("re-parse"), first);
}

#[test]
fn parse_and_write_file_round_trip() {
    let out_dir = tempfile::tempdir().expect("tempdir should be created");
    let out_path = out_dir.path().join("roundtrip.xml");

    let node = parse_file(&fixture("fixtures/sample.xml")).expect("parse should succeed");
    write_file(&node, &out_path).expect("write_file should succeed");

    let reparsed = parse_file(&out_path).expect("parse_file should succeed");
    assert_eq!(node, reparsed);
}
