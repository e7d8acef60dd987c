//! Smoke test for the `rng` binary: a hand-written compact schema (the
//! `{"v":3,...}` format `relaxng_model::schema::load` reads) validated
//! against a clean and a broken document on disk, checking the process
//! exit code the same way a shell caller would.

use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

// element doc { empty }
const SCHEMA: &str = r#"{"v":3,"o":0,"d":[[0,"empty"],[7,[0,"","doc"],0,"doc"]],"start":1,"defines":{}}"#;

fn write_temp(contents: &str, suffix: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

fn rng_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rng"))
}

#[test]
fn valid_document_exits_zero() {
    let schema = write_temp(SCHEMA, ".rngc");
    let xml = write_temp("<doc/>", ".xml");
    let status = rng_cmd()
        .arg("validate")
        .arg(schema.path())
        .arg(xml.path())
        .status()
        .expect("failed to run rng");
    assert!(status.success());
}

#[test]
fn invalid_document_exits_nonzero() {
    let schema = write_temp(SCHEMA, ".rngc");
    let xml = write_temp("<doc><unexpected/></doc>", ".xml");
    let status = rng_cmd()
        .arg("validate")
        .arg(schema.path())
        .arg(xml.path())
        .status()
        .expect("failed to run rng");
    assert!(!status.success());
    assert_eq!(status.code(), Some(2));
}

#[test]
fn missing_schema_file_exits_nonzero() {
    let status = rng_cmd()
        .arg("validate")
        .arg("/nonexistent/schema.rngc")
        .arg("/nonexistent/doc.xml")
        .status()
        .expect("failed to run rng");
    assert!(!status.success());
    assert_eq!(status.code(), Some(1));
}
