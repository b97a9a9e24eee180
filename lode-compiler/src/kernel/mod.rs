//! Kernel dialect: a restricted sub-language inside `kernel(spec, fn)`
//! expressions, validated eagerly and lowered to CUDA C. Host lowering
//! afterwards treats kernel symbols as launch-site only.

mod cuda;
mod validate;

use std::collections::BTreeMap;

use lode_ast::{Expr, VarDecl, VarKind};
use lode_diagnostics::{CompileError, CompileResult, Span};

use crate::codes;

pub use validate::{KBinOp, KExpr, KStmt, KType, KernelIr};

/// Scalar kinds legal in kernel signatures and bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    I32,
    U32,
    F32,
    F64,
    Bool,
}

impl ScalarKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "i32" => Some(ScalarKind::I32),
            "u32" => Some(ScalarKind::U32),
            "f32" => Some(ScalarKind::F32),
            "f64" => Some(ScalarKind::F64),
            "bool" => Some(ScalarKind::Bool),
            _ => None,
        }
    }

    pub fn cuda_name(&self) -> &'static str {
        match self {
            ScalarKind::I32 => "int32_t",
            ScalarKind::U32 => "uint32_t",
            ScalarKind::F32 => "float",
            ScalarKind::F64 => "double",
            ScalarKind::Bool => "bool",
        }
    }

    pub fn rust_name(&self) -> &'static str {
        match self {
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::Bool => "bool",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarKind::I32 | ScalarKind::U32)
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ScalarKind::Bool)
    }
}

/// One kernel parameter's wire signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "scalar")]
pub enum KernelParamSig {
    Scalar(ScalarKind),
    GlobalPtr(ScalarKind),
}

/// A fully lowered kernel, ready for artifact collection.
#[derive(Debug, Clone)]
pub struct KernelArtifact {
    pub name: String,
    /// The spec object literal, verbatim from source.
    pub spec_text: String,
    pub cuda_source: String,
    pub params: Vec<KernelParamSig>,
}

/// Per-compile kernel table: const symbol to kernel name, plus artifacts
/// in declaration order.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    symbols: BTreeMap<String, String>,
    artifacts: Vec<KernelArtifact>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn kernel_of_symbol(&self, symbol: &str) -> Option<&KernelArtifact> {
        let name = self.symbols.get(symbol)?;
        self.artifacts.iter().find(|a| &a.name == name)
    }

    pub fn artifacts(&self) -> &[KernelArtifact] {
        &self.artifacts
    }

    pub fn into_artifacts(self) -> Vec<KernelArtifact> {
        self.artifacts
    }

    /// Extract a kernel from a top-level const declaration whose
    /// initializer calls the kernel constructor.
    pub fn register(&mut self, decl: &VarDecl, source_text: &str) -> CompileResult<()> {
        let Some(init) = &decl.init else {
            return Err(CompileError::with_span(
                codes::KERNEL_FN_SHAPE,
                "kernel declarations need an initializer",
                decl.span.clone(),
            ));
        };
        let Expr::Call { args, span, .. } = init.unparen() else {
            return Err(CompileError::with_span(
                codes::KERNEL_FN_SHAPE,
                "kernel declarations must call the kernel constructor",
                decl.span.clone(),
            ));
        };

        if decl.kind != VarKind::Const {
            return Err(CompileError::with_span(
                codes::KERNEL_NOT_CONST,
                "kernel declarations must be `const`",
                decl.span.clone(),
            ));
        }
        if args.len() != 2 {
            return Err(CompileError::with_span(
                codes::KERNEL_ARG_COUNT,
                format!("kernel constructor takes 2 arguments, found {}", args.len()),
                span.clone(),
            ));
        }

        let name = validate::kernel_name_from_spec(&args[0])?;
        if self.artifacts.iter().any(|a| a.name == name) {
            return Err(CompileError::with_span(
                codes::KERNEL_DUPLICATE_NAME,
                format!("kernel `{name}` is declared more than once"),
                args[0].span().clone(),
            ));
        }

        let ir = validate::validate_kernel_fn(&name, &args[1])?;
        let cuda_source = cuda::render_kernel(&ir);
        let params = ir.params.iter().map(|(_, sig)| *sig).collect();

        let spec_span = args[0].span();
        let spec_text = slice_span(source_text, spec_span);

        self.symbols.insert(decl.name.clone(), name.clone());
        self.artifacts.push(KernelArtifact {
            name,
            spec_text,
            cuda_source,
            params,
        });
        log::debug!("registered kernel `{}`", decl.name);
        Ok(())
    }
}

/// Does this statement look like a kernel declaration? (A const whose
/// initializer calls `kernel`.)
pub fn is_kernel_decl(decl: &VarDecl) -> bool {
    matches!(
        decl.init.as_ref().map(|e| e.unparen()),
        Some(Expr::Call { callee, .. })
            if matches!(callee.unparen(), Expr::Ident { name, .. } if name == "kernel")
    )
}

fn slice_span(source: &str, span: &Span) -> String {
    source
        .get(span.start..span.end)
        .unwrap_or_default()
        .to_string()
}

/// Coordinate intrinsics callable only on the device, name to rendered
/// CUDA expression.
pub const COORD_INTRINSICS: &[(&str, &str)] = &[
    ("threadIdxX", "threadIdx.x"),
    ("threadIdxY", "threadIdx.y"),
    ("threadIdxZ", "threadIdx.z"),
    ("blockIdxX", "blockIdx.x"),
    ("blockIdxY", "blockIdx.y"),
    ("blockIdxZ", "blockIdx.z"),
    ("blockDimX", "blockDim.x"),
    ("blockDimY", "blockDim.y"),
    ("blockDimZ", "blockDim.z"),
    ("gridDimX", "gridDim.x"),
    ("gridDimY", "gridDim.y"),
    ("gridDimZ", "gridDim.z"),
];

pub fn coord_intrinsic(name: &str) -> Option<&'static str> {
    COORD_INTRINSICS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, rendered)| *rendered)
}

/// Device-only callables, for rejecting host-side uses.
pub fn is_device_only_callable(name: &str) -> bool {
    coord_intrinsic(name).is_some()
        || matches!(
            name,
            "syncthreads" | "sharedArray" | "addr" | "atomicAdd" | "expf"
        )
}
