// Kernel-dialect rejections and artifacts.

use std::fs;
use std::path::Path;

use lode_compiler::{codes, compile, CompileOptions, KernelParamSig, RuntimeKind, ScalarKind};

fn try_compile(source: &str) -> Result<lode_compiler::CompileOutput, lode_compiler::CompileError> {
    let tmp = tempfile::tempdir().unwrap();
    write_main(tmp.path(), source);
    compile(&CompileOptions {
        entry_file: tmp.path().join("main.ls"),
        runtime_kind: RuntimeKind::None,
    })
}

fn write_main(dir: &Path, source: &str) {
    fs::write(dir.join("main.ls"), source).unwrap();
}

fn expect_code(source: &str, code: &str) {
    let err = try_compile(source).expect_err("kernel should be rejected");
    assert_eq!(err.code, code, "message: {}", err.message);
    assert!(err.span.is_some(), "kernel diagnostics carry spans");
}

const MAIN_STUB: &str = "\nexport function main(): void { return; }\n";

#[test]
fn test_kernel_must_be_const() {
    expect_code(
        &format!(
            "let k = kernel({{ name: \"k\" }} as const, (n: i32): void => {{ return; }});{MAIN_STUB}"
        ),
        codes::KERNEL_NOT_CONST,
    );
}

#[test]
fn test_kernel_inside_function_rejected() {
    expect_code(
        &format!(
            "export function main(): void {{\n  const k = kernel({{ name: \"k\" }} as const, (n: i32): void => {{ return; }});\n  return;\n}}\n"
        ),
        codes::KERNEL_NOT_TOP_LEVEL,
    );
}

#[test]
fn test_duplicate_kernel_name() {
    expect_code(
        &format!(
            "const a = kernel({{ name: \"k\" }} as const, (n: i32): void => {{ return; }});\nconst b = kernel({{ name: \"k\" }} as const, (n: i32): void => {{ return; }});{MAIN_STUB}"
        ),
        codes::KERNEL_DUPLICATE_NAME,
    );
}

#[test]
fn test_kernel_name_must_be_identifier() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"bad name\" }} as const, (n: i32): void => {{ return; }});{MAIN_STUB}"
        ),
        codes::KERNEL_NAME_IDENT,
    );
}

#[test]
fn test_numeric_literal_needs_cast() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"k\" }} as const, (n: i32): void => {{\n  const x = 1;\n}});{MAIN_STUB}"
        ),
        codes::KERNEL_LITERAL_CAST,
    );
}

#[test]
fn test_kernel_param_must_be_scalar_or_global_ptr() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"k\" }} as const, (s: String): void => {{ return; }});{MAIN_STUB}"
        ),
        codes::KERNEL_PARAM,
    );
}

#[test]
fn test_kernel_return_type_must_be_void() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"k\" }} as const, (n: i32): i32 => {{ return; }});{MAIN_STUB}"
        ),
        codes::KERNEL_FN_SHAPE,
    );
}

#[test]
fn test_atomic_add_is_u32_only() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"k\" }} as const, (h: global_ptr<f32>): void => {{\n  atomicAdd(addr(h, 0 as u32), 1 as u32);\n}});{MAIN_STUB}"
        ),
        codes::KERNEL_ATOMIC_ADD,
    );
}

#[test]
fn test_shared_array_needs_positive_literal_length() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"k\" }} as const, (n: i32): void => {{\n  const tile = sharedArray<f32, 0>();\n}});{MAIN_STUB}"
        ),
        codes::KERNEL_SHARED_ARRAY,
    );
}

#[test]
fn test_operand_types_must_match() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"k\" }} as const, (n: i32): void => {{\n  const x = (1 as i32) + (1 as u32);\n}});{MAIN_STUB}"
        ),
        codes::KERNEL_TYPE_MISMATCH,
    );
}

#[test]
fn test_for_loop_shape_enforced() {
    expect_code(
        &format!(
            "const k = kernel({{ name: \"k\" }} as const, (n: i32): void => {{\n  for (let i = 0 as i32; i < n; n--) {{ syncthreads(); }}\n}});{MAIN_STUB}"
        ),
        codes::KERNEL_FOR_SHAPE,
    );
}

#[test]
fn test_histogram_kernel_round_trip() {
    let source = format!(
        r#"
const hist = kernel({{ name: "hist" }} as const, (data: global_ptr<u32>, out: global_ptr<u32>, n: i32): void => {{
  const tile = sharedArray<u32, 64>();
  const i = threadIdxX();
  if ((i as i32) < n) {{
    tile[i] = data[i];
    syncthreads();
    atomicAdd(addr(out, tile[i]), 1 as u32);
  }}
  for (let j = 0 as i32; j < n; j += 1 as i32) {{
    out[j as u32] = out[j as u32] + (0 as u32);
  }}
  return;
}});
{MAIN_STUB}"#
    );
    let output = try_compile(&source).expect("kernel should lower");
    let kernel = &output.kernels[0];
    assert_eq!(kernel.name, "hist");
    assert_eq!(
        kernel.params,
        vec![
            KernelParamSig::GlobalPtr(ScalarKind::U32),
            KernelParamSig::GlobalPtr(ScalarKind::U32),
            KernelParamSig::Scalar(ScalarKind::I32),
        ]
    );
    let cuda = &kernel.cuda_source;
    assert!(cuda.contains("__shared__ uint32_t tile[64];"));
    assert!(cuda.contains("atomicAdd(&out["));
    assert!(cuda.contains("__syncthreads();"));
    assert!(cuda.contains("for (int32_t j = 0; (j < n); j = (j + 1)) {"));
    assert!(cuda.contains("extern \"C\" __global__ void hist(uint32_t* data, uint32_t* out, int32_t n) {"));
}
