//! CUDA C renderer for validated kernels.

use super::validate::{KExpr, KStmt, KernelIr};
use super::{KernelParamSig, ScalarKind};

const INDENT: &str = "  ";

/// Render one kernel translation unit.
pub fn render_kernel(ir: &KernelIr) -> String {
    let mut out = String::new();
    out.push_str("#include <stdint.h>\n");
    out.push_str("#include <stdbool.h>\n");
    out.push_str("#include <math.h>\n");
    out.push('\n');

    let params: Vec<String> = ir
        .params
        .iter()
        .map(|(name, sig)| match sig {
            KernelParamSig::Scalar(kind) => format!("{} {}", kind.cuda_name(), name),
            KernelParamSig::GlobalPtr(kind) => format!("{}* {}", kind.cuda_name(), name),
        })
        .collect();

    out.push_str(&format!(
        "extern \"C\" __global__ void {}({}) {{\n",
        ir.name,
        params.join(", ")
    ));

    for (name, kind, len) in &ir.shared {
        out.push_str(&format!(
            "{}__shared__ {} {}[{}];\n",
            INDENT,
            kind.cuda_name(),
            name,
            len
        ));
    }

    for stmt in &ir.body {
        write_stmt(&mut out, stmt, 1);
    }

    out.push_str("}\n");
    out
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_stmt(out: &mut String, stmt: &KStmt, depth: usize) {
    match stmt {
        KStmt::Let { name, kind, init } => {
            push_indent(out, depth);
            out.push_str(&format!(
                "{} {} = {};\n",
                kind.cuda_name(),
                name,
                render_expr(init)
            ));
        }
        KStmt::Assign { target, value } => {
            push_indent(out, depth);
            out.push_str(&format!("{} = {};\n", render_expr(target), render_expr(value)));
        }
        KStmt::If {
            cond,
            then_stmts,
            else_stmts,
        } => {
            push_indent(out, depth);
            out.push_str(&format!("if ({}) {{\n", render_expr(cond)));
            for inner in then_stmts {
                write_stmt(out, inner, depth + 1);
            }
            push_indent(out, depth);
            match else_stmts {
                Some(else_stmts) => {
                    out.push_str("} else {\n");
                    for inner in else_stmts {
                        write_stmt(out, inner, depth + 1);
                    }
                    push_indent(out, depth);
                    out.push_str("}\n");
                }
                None => out.push_str("}\n"),
            }
        }
        KStmt::For {
            var,
            var_kind,
            init,
            cond,
            step,
            body,
        } => {
            push_indent(out, depth);
            out.push_str(&format!(
                "for ({} {} = {}; {}; {}) {{\n",
                var_kind.cuda_name(),
                var,
                render_expr(init),
                render_expr(cond),
                render_step(step)
            ));
            for inner in body {
                write_stmt(out, inner, depth + 1);
            }
            push_indent(out, depth);
            out.push_str("}\n");
        }
        KStmt::Return => {
            push_indent(out, depth);
            out.push_str("return;\n");
        }
        KStmt::Sync => {
            push_indent(out, depth);
            out.push_str("__syncthreads();\n");
        }
        KStmt::Expr(expr) => {
            push_indent(out, depth);
            out.push_str(&format!("{};\n", render_expr(expr)));
        }
        KStmt::Block(stmts) => {
            push_indent(out, depth);
            out.push_str("{\n");
            for inner in stmts {
                write_stmt(out, inner, depth + 1);
            }
            push_indent(out, depth);
            out.push_str("}\n");
        }
    }
}

fn render_step(step: &KStmt) -> String {
    match step {
        KStmt::Assign { target, value } => {
            format!("{} = {}", render_expr(target), render_expr(value))
        }
        _ => String::new(),
    }
}

fn render_expr(expr: &KExpr) -> String {
    match expr {
        KExpr::Lit { kind, text } => render_lit(*kind, text),
        KExpr::Var(name) => name.clone(),
        KExpr::Index { ptr, index } => {
            format!("{}[{}]", render_expr(ptr), render_expr(index))
        }
        KExpr::Coord(rendered) => rendered.to_string(),
        KExpr::Expf(arg) => format!("expf({})", render_expr(arg)),
        KExpr::AtomicAdd { ptr, index, value } => format!(
            "atomicAdd(&{}[{}], {})",
            render_expr(ptr),
            render_expr(index),
            render_expr(value)
        ),
        KExpr::Cast { kind, expr } => {
            format!("({})({})", kind.cuda_name(), render_expr(expr))
        }
        KExpr::Unary { negate, expr } => {
            let symbol = if *negate { "-" } else { "!" };
            format!("{}{}", symbol, render_expr(expr))
        }
        KExpr::Binary { op, left, right } => format!(
            "({} {} {})",
            render_expr(left),
            op.symbol(),
            render_expr(right)
        ),
        KExpr::Paren(inner) => format!("({})", render_expr(inner)),
    }
}

fn render_lit(kind: ScalarKind, text: &str) -> String {
    match kind {
        ScalarKind::I32 => text.to_string(),
        ScalarKind::U32 => format!("{text}u"),
        ScalarKind::F32 => {
            if text.contains('.') || text.contains('e') || text.contains('E') {
                format!("{text}f")
            } else {
                format!("{text}.0f")
            }
        }
        ScalarKind::F64 => {
            if text.contains('.') || text.contains('e') || text.contains('E') {
                text.to_string()
            } else {
                format!("{text}.0")
            }
        }
        ScalarKind::Bool => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::validate::{KBinOp, KExpr, KStmt, KernelIr};

    #[test]
    fn test_render_minimal_kernel() {
        let ir = KernelIr {
            name: "add".to_string(),
            params: vec![
                (
                    "a".to_string(),
                    KernelParamSig::GlobalPtr(ScalarKind::F32),
                ),
                ("n".to_string(), KernelParamSig::Scalar(ScalarKind::I32)),
            ],
            shared: vec![("tile".to_string(), ScalarKind::F32, 256)],
            body: vec![
                KStmt::Let {
                    name: "i".to_string(),
                    kind: ScalarKind::U32,
                    init: KExpr::Coord("threadIdx.x"),
                },
                KStmt::Sync,
                KStmt::Return,
            ],
        };
        let text = render_kernel(&ir);
        assert!(text.starts_with("#include <stdint.h>\n#include <stdbool.h>\n#include <math.h>\n"));
        assert!(text.contains("extern \"C\" __global__ void add(float* a, int32_t n) {"));
        assert!(text.contains("  __shared__ float tile[256];"));
        assert!(text.contains("  uint32_t i = threadIdx.x;"));
        assert!(text.contains("  __syncthreads();"));
        assert!(text.contains("  return;"));
    }

    #[test]
    fn test_literal_suffixes() {
        assert_eq!(render_lit(ScalarKind::F32, "1.5"), "1.5f");
        assert_eq!(render_lit(ScalarKind::F32, "2"), "2.0f");
        assert_eq!(render_lit(ScalarKind::U32, "7"), "7u");
        assert_eq!(render_lit(ScalarKind::I32, "7"), "7");
        assert_eq!(render_lit(ScalarKind::F64, "3"), "3.0");
    }

    #[test]
    fn test_atomic_add_rendering() {
        let expr = KExpr::AtomicAdd {
            ptr: Box::new(KExpr::Var("hist".to_string())),
            index: Box::new(KExpr::Var("i".to_string())),
            value: Box::new(KExpr::Lit {
                kind: ScalarKind::U32,
                text: "1".to_string(),
            }),
        };
        assert_eq!(render_expr(&expr), "atomicAdd(&hist[i], 1u)");
    }

    #[test]
    fn test_binary_parenthesization_is_stable() {
        let expr = KExpr::Binary {
            op: KBinOp::Add,
            left: Box::new(KExpr::Var("a".to_string())),
            right: Box::new(KExpr::Binary {
                op: KBinOp::Mul,
                left: Box::new(KExpr::Var("b".to_string())),
                right: Box::new(KExpr::Var("c".to_string())),
            }),
        };
        assert_eq!(render_expr(&expr), "(a + (b * c))");
    }
}
