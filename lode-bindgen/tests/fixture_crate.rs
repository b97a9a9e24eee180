// End-to-end extractor runs against a fixture crate on disk.

use std::fs;
use std::path::Path;

use lode_bindgen::{extract, BindgenOptions};

fn write_fixture_crate(dir: &Path) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("Cargo.toml"),
        r#"[package]
name = "geo"
version = "0.4.2"
edition = "2021"
"#,
    )
    .unwrap();
    fs::write(
        dir.join("src/lib.rs"),
        r#"
pub mod math;

/// A point on the integer grid.
#[derive(Debug, Clone)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn sum(&self) -> i32 {
        self.x + self.y
    }
}

pub fn add(a: i32, b: i32) -> i32 {
    a + b
}
"#,
    )
    .unwrap();
    fs::write(
        dir.join("src/math.rs"),
        r#"
pub fn mul(a: i32, b: i32) -> i32 {
    a * b
}

pub enum Sign {
    Negative,
    Zero,
    Positive,
}
"#,
    )
    .unwrap();
}

fn options(crate_dir: &Path, out_dir: &Path) -> BindgenOptions {
    BindgenOptions {
        manifest_path: crate_dir.join("Cargo.toml"),
        out_dir: out_dir.to_path_buf(),
        package_name: None,
        features: vec![],
        bundle: false,
    }
}

/// Collect `(relative path, contents)` for every file under `dir`.
fn snapshot_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        let mut entries: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push((
                    rel.to_string_lossy().replace('\\', "/"),
                    fs::read(&path).unwrap(),
                ));
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out
}

#[test]
fn test_facade_and_manifest_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let crate_dir = tmp.path().join("geo");
    let out_dir = tmp.path().join("out");
    write_fixture_crate(&crate_dir);

    let output = extract(&options(&crate_dir, &out_dir)).unwrap();
    assert_eq!(output.modules, vec!["geo".to_string(), "geo.math".to_string()]);

    let index = fs::read_to_string(out_dir.join("index.d.ls")).unwrap();
    assert!(index.contains("export declare class Point {"));
    assert!(index.contains("constructor(x: i32, y: i32);"));
    assert!(index.contains("sum(): i32;"));
    assert!(index.contains("export function add(a: i32, b: i32): i32;"));

    let math = fs::read_to_string(out_dir.join("math.d.ls")).unwrap();
    assert!(math.contains("export function mul(a: i32, b: i32): i32;"));
    assert!(math.contains("static Negative: Sign;"));

    // Bindings manifest maps specifiers to dotted native paths.
    let manifest = output.manifest;
    assert_eq!(manifest.schema, 1);
    assert_eq!(manifest.kind, "crate");
    assert_eq!(manifest.crate_.name, "geo");
    assert_eq!(manifest.crate_.version.as_deref(), Some("0.4.2"));
    assert_eq!(manifest.modules["geo/index.ls"], "geo");
    assert_eq!(manifest.modules["geo/math.ls"], "geo.math");

    // The descriptor's exports table names both modules.
    let descriptor = fs::read_to_string(out_dir.join("geo.json")).unwrap();
    assert!(descriptor.contains("\"./math\""));
    assert!(descriptor.contains("\"types\": \"./index.d.ls\""));
}

#[test]
fn test_reruns_are_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let crate_dir = tmp.path().join("geo");
    write_fixture_crate(&crate_dir);

    let out_a = tmp.path().join("out_a");
    let out_b = tmp.path().join("out_b");
    extract(&options(&crate_dir, &out_a)).unwrap();
    extract(&options(&crate_dir, &out_b)).unwrap();

    assert_eq!(snapshot_tree(&out_a), snapshot_tree(&out_b));
}

#[test]
fn test_bundle_records_path_instead_of_version() {
    let tmp = tempfile::tempdir().unwrap();
    let crate_dir = tmp.path().join("geo");
    let out_dir = tmp.path().join("out");
    write_fixture_crate(&crate_dir);

    let mut opts = options(&crate_dir, &out_dir);
    opts.bundle = true;
    let output = extract(&opts).unwrap();

    assert_eq!(output.manifest.crate_.version, None);
    assert_eq!(output.manifest.crate_.path.as_deref(), Some("./crate"));
    assert!(out_dir.join("crate/src/lib.rs").is_file());
}

#[test]
fn test_skipped_report_for_payload_variants() {
    let tmp = tempfile::tempdir().unwrap();
    let crate_dir = tmp.path().join("mixed");
    let out_dir = tmp.path().join("out");
    fs::create_dir_all(crate_dir.join("src")).unwrap();
    fs::write(
        crate_dir.join("Cargo.toml"),
        "[package]\nname = \"mixed\"\nversion = \"0.1.0\"\n",
    )
    .unwrap();
    fs::write(
        crate_dir.join("src/lib.rs"),
        r#"
pub enum Event {
    Started,
    Data(Vec<u8>),
}

pub fn emit(event: Event) {}

pub use missing::Nothing;
"#,
    )
    .unwrap();

    let output = extract(&options(&crate_dir, &out_dir)).unwrap();
    let kinds: Vec<String> = output
        .report
        .skipped
        .iter()
        .map(|s| format!("{:?}", s.kind))
        .collect();
    assert!(kinds.iter().any(|k| k == "Enum"), "kinds: {kinds:?}");
    assert!(kinds.iter().any(|k| k == "Reexport"), "kinds: {kinds:?}");

    let report_text = fs::read_to_string(out_dir.join("lode.bindgen.report.json")).unwrap();
    assert!(report_text.contains("\"schema\": 1"));
}
