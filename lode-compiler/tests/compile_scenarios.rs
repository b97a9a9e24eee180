// End-to-end compiles over on-disk fixtures.

use std::fs;
use std::path::Path;

use lode_compiler::{codes, compile, CompileOptions, RuntimeKind};

fn write_project(dir: &Path, files: &[(&str, &str)]) {
    for (rel, text) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }
}

fn compile_project(dir: &Path, entry: &str) -> lode_compiler::CompileOutput {
    compile(&CompileOptions {
        entry_file: dir.join(entry),
        runtime_kind: RuntimeKind::None,
    })
    .expect("project should compile")
}

fn compile_err(dir: &Path, entry: &str) -> lode_compiler::CompileError {
    compile(&CompileOptions {
        entry_file: dir.join(entry),
        runtime_kind: RuntimeKind::None,
    })
    .expect_err("project should be rejected")
}

#[test]
fn test_scenario_minimal_entry() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[("main.ls", "export function main(): void { return; }\n")],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("fn main() {"));
    assert!(output.main_text.contains("return;"));
    assert!(output.kernels.is_empty());
    assert!(output.external_crates.is_empty());
}

#[test]
fn test_scenario_result_main_with_core_markers() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
import { q, unsafe } from "lode/core";

function mayFail(): Result<i32, i32> {
  return Ok(7);
}

export function main(): Result<void, i32> {
  const x = unsafe(() => 1 as i32);
  const y = q(mayFail());
  return Ok();
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output
        .main_text
        .contains("fn main() -> std::result::Result<(), i32>"));
    assert!(output.main_text.contains("unsafe { (1) as i32 }"));
    assert!(output.main_text.contains(")?"));
    assert!(output.main_text.contains("return Ok(())"));
}

#[test]
fn test_scenario_discriminated_union() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
type Shape = { kind: "circle"; radius: f64 } | { kind: "square"; side: i32 };

function area(s: Shape): f64 {
  switch (s.kind) {
    case "circle":
      return s.radius;
    case "square":
      return 1.0;
  }
  return 0.0;
}

export function main(): void {
  const c: Shape = { kind: "circle", radius: 2.0 };
  area(c);
  return;
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("pub enum Shape {"));
    assert!(output.main_text.contains("Circle { radius: f64 }"));
    assert!(output.main_text.contains("Square { side: i32 }"));
    assert!(output.main_text.contains("match s {"));
    // Arm order mirrors source order.
    let circle_at = output.main_text.find("Shape::Circle").unwrap();
    let square_at = output.main_text.find("Shape::Square").unwrap();
    assert!(circle_at < square_at);
    // Construction uses the variant path.
    assert!(output
        .main_text
        .contains("Shape::Circle { radius: 2.0 }"));
    // Field access in the arm body is rewritten to the binding.
    assert!(output.main_text.contains("return radius;"));
}

const KERNEL_PROJECT: &str = r#"
const add = kernel({ name: "add" } as const, (a: global_ptr<f32>, b: global_ptr<f32>, c: global_ptr<f32>, n: i32): void => {
  const i = threadIdxX();
  if ((i as i32) < n) {
    c[i] = a[i] + b[i];
  }
});

export function main(): void {
  add.launch({ grid: [1, 1, 1], block: [16, 1, 1] } as const, 0, 0, 0, 16);
  return;
}
"#;

#[test]
fn test_scenario_kernel_launch() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(tmp.path(), &[("main.ls", KERNEL_PROJECT)]);
    let output = compile_project(tmp.path(), "main.ls");

    assert!(output
        .main_text
        .contains("gpu_runtime::launch_add(1, 1, 1, 16, 1, 1"));
    assert!(output.main_text.contains("mod gpu_runtime {"));
    assert!(output.main_text.contains("libcuda.so.1"));

    assert_eq!(output.kernels.len(), 1);
    let kernel = &output.kernels[0];
    assert_eq!(kernel.name, "add");
    assert!(kernel
        .cuda_source
        .contains("extern \"C\" __global__ void add("));
    assert!(kernel.cuda_source.contains("threadIdx.x"));
    assert!(kernel.spec_text.contains("\"add\""));
}

#[test]
fn test_scenario_uncontextual_literal_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            "export function main(): void {\n  const p = { x: 1, y: 2 };\n  return;\n}\n",
        )],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::OBJECT_LITERAL_FIELD_CAST);
    let span = err.span.expect("span");
    assert_eq!(span.file, "main.ls");
    assert!(span.start < span.end);
}

#[test]
fn test_uncontextual_literal_with_casts_gets_anon_struct() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            "export function main(): void {\n  const p = { x: 1 as i32, y: 2 as i32 };\n  return;\n}\n",
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("struct Anon_"));
    assert!(output.main_text.contains("Anon_"));
}

#[test]
fn test_borrow_insertion() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
function inc(x: ref<i32>, y: mutref<i32>): void {
  return;
}

export function main(): void {
  let a: i32 = 1;
  let b: mut<i32> = 2;
  inc(a, b);
  return;
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("fn inc(x: &i32, y: &mut i32)"));
    assert!(output.main_text.contains("inc(&(a), &mut (b));"));
    assert!(output.main_text.contains("let mut b: i32 = 2;"));
}

#[test]
fn test_module_wiring() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[
            (
                "main.ls",
                r#"
import { double } from "./util.ls";

export function main(): void {
  double(2);
  return;
}
"#,
            ),
            (
                "util.ls",
                r#"
export function double(x: i32): i32 {
  return x * 2;
}
"#,
            ),
        ],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("use crate::util::double;"));
    assert!(output.main_text.contains("mod util {"));
    assert!(output.main_text.contains("pub fn double(x: i32) -> i32 {"));
}

#[test]
fn test_classes_and_interfaces() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
interface Measurable {
  norm(this: ref<Self>): i32;
}

class Point implements Measurable {
  x: i32;
  y: i32;
  constructor(x: i32, y: i32) {
    this.x = x;
    this.y = y;
  }
  norm(this: ref<Point>): i32 {
    return this.x * this.x + this.y * this.y;
  }
}

export function main(): void {
  const p = new Point(3, 4);
  p.norm();
  return;
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("pub trait Measurable {"));
    assert!(output
        .main_text
        .contains("fn norm(&self) -> i32;"));
    assert!(output.main_text.contains("pub struct Point {"));
    assert!(output.main_text.contains("impl Point {"));
    assert!(output
        .main_text
        .contains("pub fn new(x: i32, y: i32) -> Self {"));
    assert!(output
        .main_text
        .contains("return Self { x: x, y: y };"));
    assert!(output.main_text.contains("impl Measurable for Point {"));
    assert!(output.main_text.contains("let p = Point::new(3, 4);"));
    assert!(output.main_text.contains("p.norm();"));
}

#[test]
fn test_annotation_statement_renders_attribute() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
class Point {
  x: i32;
  constructor(x: i32) { this.x = x; }
}
annotate(Point, attr("derive", `Debug, Clone`));

export function main(): void {
  return;
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("#[derive(Debug, Clone)]"));
    let attr_at = output.main_text.find("#[derive(Debug, Clone)]").unwrap();
    let struct_at = output.main_text.find("pub struct Point").unwrap();
    assert!(attr_at < struct_at);
}

#[test]
fn test_bindings_manifest_import() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[
            (
                "main.ls",
                r#"
import { Point } from "geo/index.ls";

export function main(): void {
  return;
}
"#,
            ),
            (
                "geo/lode.bindings.json",
                r#"{
  "schema": 1,
  "kind": "crate",
  "crate": { "name": "geo", "version": "0.4.2", "features": ["serde"] },
  "modules": { "geo/index.ls": "geo" }
}"#,
            ),
        ],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("use geo::Point;"));
    assert_eq!(output.external_crates.len(), 1);
    let krate = &output.external_crates[0];
    assert_eq!(krate.name, "geo");
    assert_eq!(krate.version.as_deref(), Some("0.4.2"));
    assert_eq!(krate.features, vec!["serde".to_string()]);
}

#[test]
fn test_manifest_error_branches() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[
            (
                "main.ls",
                "import { Point } from \"geo/index.ls\";\nexport function main(): void { return; }\n",
            ),
            (
                "geo/lode.bindings.json",
                r#"{
  "schema": 1,
  "kind": "crate",
  "crate": { "name": "geo", "version": "0.4.2", "path": "./crate" },
  "modules": { "geo/index.ls": "geo" }
}"#,
            ),
        ],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::MANIFEST_CRATE_SOURCE);
}

#[test]
fn test_missing_manifest_mapping() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[
            (
                "main.ls",
                "import { Point } from \"geo/other.ls\";\nexport function main(): void { return; }\n",
            ),
            (
                "geo/lode.bindings.json",
                r#"{
  "schema": 1,
  "kind": "crate",
  "crate": { "name": "geo", "version": "0.4.2" },
  "modules": { "geo/index.ls": "geo" }
}"#,
            ),
        ],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::IMPORT_MISSING_MAPPING);
}

#[test]
fn test_unresolved_package() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            "import { x } from \"nowhere/index.ls\";\nexport function main(): void { return; }\n",
        )],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::IMPORT_UNRESOLVED_PACKAGE);
}

#[test]
fn test_missing_main_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[("main.ls", "export function helper(): void { return; }\n")],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::MISSING_MAIN);
}

#[test]
fn test_kernel_value_escape_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
const add = kernel({ name: "add" } as const, (n: i32): void => {
  return;
});

export function main(): void {
  const k = add;
  return;
}
"#,
        )],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::KERNEL_VALUE_ESCAPES);
}

#[test]
fn test_kernel_intrinsic_on_host_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            "export function main(): void {\n  const i = threadIdxX();\n  return;\n}\n",
        )],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::KERNEL_INTRINSIC_ON_HOST);
}

#[test]
fn test_determinism_and_relocation_invariance() {
    let source = KERNEL_PROJECT;

    let tmp_a = tempfile::tempdir().unwrap();
    let nested = tmp_a.path().join("deeply/nested/project");
    fs::create_dir_all(&nested).unwrap();
    write_project(&nested, &[("main.ls", source)]);

    let tmp_b = tempfile::tempdir().unwrap();
    write_project(tmp_b.path(), &[("main.ls", source)]);

    let first = compile_project(&nested, "main.ls");
    let again = compile_project(&nested, "main.ls");
    let moved = compile_project(tmp_b.path(), "main.ls");

    // Identical reruns in place.
    assert_eq!(first.main_text, again.main_text);
    assert_eq!(first.external_crates, again.external_crates);
    assert_eq!(first.kernels.len(), again.kernels.len());
    assert_eq!(first.kernels[0].cuda_source, again.kernels[0].cuda_source);

    // Byte-identical across project roots; no absolute paths leak.
    assert_eq!(first.main_text, moved.main_text);
    assert!(!first.main_text.contains(tmp_a.path().to_str().unwrap()));
    assert!(!first.main_text.contains(tmp_b.path().to_str().unwrap()));
}

#[test]
fn test_span_comments_and_map() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[("main.ls", "export function main(): void { return; }\n")],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("// lode-span: main.ls:"));
    assert!(!output.source_map.is_empty());
    let entry = &output.source_map.entries()[0];
    assert_eq!(entry.source_file, "main.ls");
    assert_eq!(entry.target_column, 1);
    // The mapped line is the statement right after the comment.
    let lines: Vec<&str> = output.main_text.lines().collect();
    assert!(lines[entry.target_line - 2]
        .trim()
        .starts_with("// lode-span:"));
}

#[test]
fn test_module_name_collision_fails_fast() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[
            (
                "main.ls",
                "import { a } from \"./x-y.ls\";\nimport { b } from \"./x_y.ls\";\nexport function main(): void { return; }\n",
            ),
            ("x-y.ls", "export function a(): void { return; }\n"),
            ("x_y.ls", "export function b(): void { return; }\n"),
        ],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::MODULE_NAME_COLLISION);
}

#[test]
fn test_scalar_switch_lowering() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
function pick(n: i32): i32 {
  switch (n) {
    case 1:
      return 10;
    case 2:
      return 20;
    default:
      return 0;
  }
}

export function main(): void {
  pick(1);
  return;
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("let __scrutinee = n;"));
    assert!(output.main_text.contains("if __scrutinee == 1 {"));
    assert!(output.main_text.contains("if __scrutinee == 2 {"));
    assert!(output.main_text.contains("return 0;"));
}

#[test]
fn test_union_switch_default_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
type Shape = { kind: "circle"; radius: f64 } | { kind: "square"; side: i32 };

function f(s: Shape): void {
  switch (s.kind) {
    case "circle":
      return;
    default:
      return;
  }
}

export function main(): void { return; }
"#,
        )],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::UNION_SWITCH_DEFAULT);
}

#[test]
fn test_for_loop_desugars_to_while() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
function sum(n: i32): i32 {
  let total: mut<i32> = 0;
  for (let i: mut<i32> = 0; i < n; i++) {
    total += i;
  }
  return total;
}

export function main(): void {
  sum(3);
  return;
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("let mut i: i32 = 0;"));
    assert!(output.main_text.contains("while i < n {"));
    assert!(output.main_text.contains("i = i + 1;"));
    assert!(output.main_text.contains("total = total + i;"));
}

#[test]
fn test_template_literal_lowering() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            r#"
function describe(n: i32): String {
  return `value: ${n}!`;
}

export function main(): void {
  describe(1);
  return;
}
"#,
        )],
    );
    let output = compile_project(tmp.path(), "main.ls");
    assert!(output.main_text.contains("format!(\"value: {}!\", n)"));
}

#[test]
fn test_async_main_requires_runtime_policy() {
    let tmp = tempfile::tempdir().unwrap();
    write_project(
        tmp.path(),
        &[(
            "main.ls",
            "export async function main(): Promise<void> { return; }\n",
        )],
    );
    let err = compile_err(tmp.path(), "main.ls");
    assert_eq!(err.code, codes::MAIN_SIGNATURE);

    let output = compile(&CompileOptions {
        entry_file: tmp.path().join("main.ls"),
        runtime_kind: RuntimeKind::Tokio,
    })
    .unwrap();
    assert!(output.main_text.contains("#[tokio::main]"));
    assert!(output.main_text.contains("async fn main() {"));
}
