//! Kernel grammar validation and typed lowering.
//!
//! Every construct is checked eagerly against the accepted device subset;
//! the result is a small typed IR the CUDA writer renders verbatim.

use std::collections::HashMap;

use lode_ast::{
    ArrowBody, AssignOp, BinaryOp, Block, Expr, Stmt, TypeExpr, UnaryOp, VarDecl,
};
use lode_diagnostics::{CompileError, CompileResult, Span};

use super::{coord_intrinsic, KernelParamSig, ScalarKind};
use crate::codes;

/// Typed kernel IR.
#[derive(Debug, Clone)]
pub struct KernelIr {
    pub name: String,
    pub params: Vec<(String, KernelParamSig)>,
    /// `__shared__` declarations in declaration order: (name, kind, len).
    pub shared: Vec<(String, ScalarKind, usize)>,
    pub body: Vec<KStmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KType {
    Scalar(ScalarKind),
    GlobalPtr(ScalarKind),
    SharedPtr(ScalarKind),
}

impl KType {
    fn pointee(&self) -> Option<ScalarKind> {
        match self {
            KType::GlobalPtr(kind) | KType::SharedPtr(kind) => Some(*kind),
            KType::Scalar(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum KStmt {
    Let {
        name: String,
        kind: ScalarKind,
        init: KExpr,
    },
    Assign {
        target: KExpr,
        value: KExpr,
    },
    If {
        cond: KExpr,
        then_stmts: Vec<KStmt>,
        else_stmts: Option<Vec<KStmt>>,
    },
    For {
        var: String,
        var_kind: ScalarKind,
        init: KExpr,
        cond: KExpr,
        step: Box<KStmt>,
        body: Vec<KStmt>,
    },
    Return,
    Sync,
    Expr(KExpr),
    Block(Vec<KStmt>),
}

#[derive(Debug, Clone)]
pub enum KExpr {
    Lit {
        kind: ScalarKind,
        text: String,
    },
    Var(String),
    /// `p[i]`
    Index {
        ptr: Box<KExpr>,
        index: Box<KExpr>,
    },
    /// Rendered coordinate expression, e.g. `threadIdx.x`.
    Coord(&'static str),
    Expf(Box<KExpr>),
    /// `atomicAdd(&p[i], v)`
    AtomicAdd {
        ptr: Box<KExpr>,
        index: Box<KExpr>,
        value: Box<KExpr>,
    },
    Cast {
        kind: ScalarKind,
        expr: Box<KExpr>,
    },
    Unary {
        negate: bool,
        expr: Box<KExpr>,
    },
    Binary {
        op: KBinOp,
        left: Box<KExpr>,
        right: Box<KExpr>,
    },
    Paren(Box<KExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl KBinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            KBinOp::Add => "+",
            KBinOp::Sub => "-",
            KBinOp::Mul => "*",
            KBinOp::Div => "/",
            KBinOp::Rem => "%",
            KBinOp::Eq => "==",
            KBinOp::Ne => "!=",
            KBinOp::Lt => "<",
            KBinOp::Le => "<=",
            KBinOp::Gt => ">",
            KBinOp::Ge => ">=",
            KBinOp::And => "&&",
            KBinOp::Or => "||",
        }
    }

    fn is_comparison(&self) -> bool {
        matches!(
            self,
            KBinOp::Eq | KBinOp::Ne | KBinOp::Lt | KBinOp::Le | KBinOp::Gt | KBinOp::Ge
        )
    }

    fn is_logical(&self) -> bool {
        matches!(self, KBinOp::And | KBinOp::Or)
    }
}

type Env = HashMap<String, KType>;

/// Pull the `name` out of the spec object and validate it.
pub fn kernel_name_from_spec(spec: &Expr) -> CompileResult<String> {
    let Expr::AsConst { expr, span } = spec.unparen() else {
        return Err(CompileError::with_span(
            codes::KERNEL_SPEC_SHAPE,
            "kernel spec must be an `as const` object literal",
            spec.span().clone(),
        ));
    };
    let Expr::ObjectLit { fields, .. } = expr.unparen() else {
        return Err(CompileError::with_span(
            codes::KERNEL_SPEC_SHAPE,
            "kernel spec must be an object literal",
            span.clone(),
        ));
    };

    let mut name = None;
    for field in fields {
        match field.name.as_str() {
            "name" => match field.value.unparen() {
                Expr::StringLit { value, span } => {
                    if !is_c_identifier(value) {
                        return Err(CompileError::with_span(
                            codes::KERNEL_NAME_IDENT,
                            format!("kernel name `{value}` is not a valid identifier"),
                            span.clone(),
                        ));
                    }
                    name = Some(value.clone());
                }
                other => {
                    return Err(CompileError::with_span(
                        codes::KERNEL_NAME_IDENT,
                        "kernel `name` must be a string literal",
                        other.span().clone(),
                    ))
                }
            },
            other => {
                return Err(CompileError::with_span(
                    codes::KERNEL_SPEC_SHAPE,
                    format!("unknown kernel spec field `{other}`"),
                    field.span.clone(),
                ))
            }
        }
    }

    name.ok_or_else(|| {
        CompileError::with_span(
            codes::KERNEL_SPEC_SHAPE,
            "kernel spec has no `name`",
            span.clone(),
        )
    })
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate the kernel function argument and lower its body.
pub fn validate_kernel_fn(name: &str, fn_expr: &Expr) -> CompileResult<KernelIr> {
    let Expr::Arrow {
        params,
        return_type,
        body,
        is_async,
        span,
    } = fn_expr.unparen()
    else {
        return Err(CompileError::with_span(
            codes::KERNEL_FN_SHAPE,
            "kernel function must be an arrow function",
            fn_expr.span().clone(),
        ));
    };
    if *is_async {
        return Err(CompileError::with_span(
            codes::KERNEL_FN_SHAPE,
            "kernel functions cannot be async",
            span.clone(),
        ));
    }
    match return_type {
        Some(TypeExpr::Named { name, args, .. }) if name == "void" && args.is_empty() => {}
        _ => {
            return Err(CompileError::with_span(
                codes::KERNEL_FN_SHAPE,
                "kernel functions must declare a `void` return type",
                span.clone(),
            ))
        }
    }
    let ArrowBody::Block(block) = body else {
        return Err(CompileError::with_span(
            codes::KERNEL_FN_SHAPE,
            "kernel functions need a block body",
            span.clone(),
        ));
    };

    let mut env: Env = HashMap::new();
    let mut sig = Vec::new();
    for param in params {
        let Some(pname) = param.name() else {
            return Err(CompileError::with_span(
                codes::KERNEL_PARAM,
                "kernel parameters cannot be destructured",
                param.span.clone(),
            ));
        };
        if param.optional || param.default.is_some() {
            return Err(CompileError::with_span(
                codes::KERNEL_PARAM,
                "kernel parameters cannot be optional or defaulted",
                param.span.clone(),
            ));
        }
        let Some(ty) = &param.ty else {
            return Err(CompileError::with_span(
                codes::KERNEL_PARAM,
                format!("kernel parameter `{pname}` needs a type annotation"),
                param.span.clone(),
            ));
        };
        let (ktype, psig) = lower_param_type(ty)?;
        env.insert(pname.to_string(), ktype);
        sig.push((pname.to_string(), psig));
    }

    let mut shared = Vec::new();
    let body = validate_block(&mut env, &mut shared, block)?;

    Ok(KernelIr {
        name: name.to_string(),
        params: sig,
        shared,
        body,
    })
}

fn lower_param_type(ty: &TypeExpr) -> CompileResult<(KType, KernelParamSig)> {
    match ty {
        TypeExpr::Named { name, args, span } => {
            if let Some(kind) = ScalarKind::from_name(name) {
                if !args.is_empty() {
                    return Err(kernel_param_error(span));
                }
                return Ok((KType::Scalar(kind), KernelParamSig::Scalar(kind)));
            }
            if name == "global_ptr" {
                if let [TypeExpr::Named {
                    name: inner,
                    args: inner_args,
                    ..
                }] = args.as_slice()
                {
                    if inner_args.is_empty() {
                        if let Some(kind) = ScalarKind::from_name(inner) {
                            return Ok((
                                KType::GlobalPtr(kind),
                                KernelParamSig::GlobalPtr(kind),
                            ));
                        }
                    }
                }
                return Err(kernel_param_error(span));
            }
            Err(kernel_param_error(span))
        }
        other => Err(kernel_param_error(other.span())),
    }
}

fn kernel_param_error(span: &Span) -> CompileError {
    CompileError::with_span(
        codes::KERNEL_PARAM,
        "kernel parameters must be scalars or `global_ptr<scalar>`",
        span.clone(),
    )
}

fn validate_block(
    env: &mut Env,
    shared: &mut Vec<(String, ScalarKind, usize)>,
    block: &Block,
) -> CompileResult<Vec<KStmt>> {
    let mut out = Vec::new();
    for stmt in &block.stmts {
        if let Some(lowered) = validate_stmt(env, shared, stmt)? {
            out.push(lowered);
        }
    }
    Ok(out)
}

fn validate_stmt(
    env: &mut Env,
    shared: &mut Vec<(String, ScalarKind, usize)>,
    stmt: &Stmt,
) -> CompileResult<Option<KStmt>> {
    match stmt {
        Stmt::VarDecl(decl) => validate_let(env, shared, decl),
        Stmt::Expr { expr, span } => validate_expr_stmt(env, expr, span).map(Some),
        Stmt::Return { value, span } => {
            if value.is_some() {
                return Err(CompileError::with_span(
                    codes::KERNEL_RETURN_VALUE,
                    "kernel returns cannot carry a value",
                    span.clone(),
                ));
            }
            Ok(Some(KStmt::Return))
        }
        Stmt::If {
            cond,
            then_block,
            else_branch,
            span: _,
        } => {
            let (kcond, cond_ty) = validate_expr(env, cond)?;
            expect_bool(cond_ty, cond.span())?;
            let then_stmts = validate_block(env, shared, then_block)?;
            let else_stmts = match else_branch.as_deref() {
                None => None,
                Some(lode_ast::ElseBranch::Else(block)) => {
                    Some(validate_block(env, shared, block)?)
                }
                Some(lode_ast::ElseBranch::ElseIf(nested)) => {
                    let lowered = validate_stmt(env, shared, nested)?;
                    Some(lowered.into_iter().collect())
                }
            };
            Ok(Some(KStmt::If {
                cond: kcond,
                then_stmts,
                else_stmts,
            }))
        }
        Stmt::For(for_stmt) => validate_for(env, shared, for_stmt).map(Some),
        Stmt::Block(block) => {
            let mut scoped = env.clone();
            Ok(Some(KStmt::Block(validate_block(
                &mut scoped,
                shared,
                block,
            )?)))
        }
        other => Err(CompileError::with_span(
            codes::KERNEL_STATEMENT,
            "statement is outside the kernel subset",
            other.span().clone(),
        )),
    }
}

fn validate_let(
    env: &mut Env,
    shared: &mut Vec<(String, ScalarKind, usize)>,
    decl: &VarDecl,
) -> CompileResult<Option<KStmt>> {
    let Some(init) = &decl.init else {
        return Err(CompileError::with_span(
            codes::KERNEL_STATEMENT,
            "kernel locals must be initialized",
            decl.span.clone(),
        ));
    };

    // `const tile = sharedArray<f32, 256>();`
    if let Expr::Call {
        callee, type_args, args, span,
    } = init.unparen()
    {
        if matches!(callee.unparen(), Expr::Ident { name, .. } if name == "sharedArray") {
            if !args.is_empty() {
                return Err(shared_array_error(span));
            }
            let [elem_ty, len_ty] = type_args.as_slice() else {
                return Err(shared_array_error(span));
            };
            let TypeExpr::Named { name, args: elem_args, .. } = elem_ty else {
                return Err(shared_array_error(span));
            };
            let (Some(kind), true) = (ScalarKind::from_name(name), elem_args.is_empty()) else {
                return Err(shared_array_error(span));
            };
            let TypeExpr::IntLit { value, .. } = len_ty else {
                return Err(shared_array_error(span));
            };
            if *value <= 0 {
                return Err(CompileError::with_span(
                    codes::KERNEL_SHARED_ARRAY,
                    "shared array length must be a positive integer literal",
                    len_ty.span().clone(),
                ));
            }
            shared.push((decl.name.clone(), kind, *value as usize));
            env.insert(decl.name.clone(), KType::SharedPtr(kind));
            // The declaration renders into the kernel prologue, not here.
            return Ok(None);
        }
    }

    let (kinit, init_ty) = validate_expr(env, init)?;
    let KType::Scalar(kind) = init_ty else {
        return Err(CompileError::with_span(
            codes::KERNEL_STATEMENT,
            "kernel locals must hold scalar values",
            init.span().clone(),
        ));
    };

    if let Some(annotation) = &decl.ty {
        let (annotated, _) = lower_param_type(annotation)?;
        if annotated != KType::Scalar(kind) {
            return Err(CompileError::with_span(
                codes::KERNEL_TYPE_MISMATCH,
                "initializer type does not match the annotation",
                init.span().clone(),
            ));
        }
    }

    env.insert(decl.name.clone(), KType::Scalar(kind));
    Ok(Some(KStmt::Let {
        name: decl.name.clone(),
        kind,
        init: kinit,
    }))
}

fn shared_array_error(span: &Span) -> CompileError {
    CompileError::with_span(
        codes::KERNEL_SHARED_ARRAY,
        "`sharedArray<T, N>()` takes a scalar type and a positive integer literal length",
        span.clone(),
    )
}

fn validate_expr_stmt(env: &mut Env, expr: &Expr, span: &Span) -> CompileResult<KStmt> {
    match expr.unparen() {
        Expr::Assign { op, target, value, .. } => {
            validate_assign(env, op, target, value, span)
        }
        Expr::Update { target, increment, .. } => {
            let (ktarget, ty) = validate_expr(env, target)?;
            let KType::Scalar(kind) = ty else {
                return Err(CompileError::with_span(
                    codes::KERNEL_STATEMENT,
                    "increment target must be scalar",
                    span.clone(),
                ));
            };
            if !kind.is_integer() {
                return Err(CompileError::with_span(
                    codes::KERNEL_OPERATOR,
                    "increment requires an integer scalar",
                    span.clone(),
                ));
            }
            let one = KExpr::Lit {
                kind,
                text: "1".to_string(),
            };
            let op = if *increment { KBinOp::Add } else { KBinOp::Sub };
            Ok(KStmt::Assign {
                target: ktarget.clone(),
                value: KExpr::Binary {
                    op,
                    left: Box::new(ktarget),
                    right: Box::new(one),
                },
            })
        }
        Expr::Call { callee, args, .. } => {
            if let Expr::Ident { name, .. } = callee.unparen() {
                if name == "syncthreads" {
                    if !args.is_empty() {
                        return Err(CompileError::with_span(
                            codes::KERNEL_SYNCTHREADS,
                            "`syncthreads()` takes no arguments",
                            span.clone(),
                        ));
                    }
                    return Ok(KStmt::Sync);
                }
            }
            let (kexpr, _) = validate_expr(env, expr)?;
            Ok(KStmt::Expr(kexpr))
        }
        _ => Err(CompileError::with_span(
            codes::KERNEL_STATEMENT,
            "expression statement is outside the kernel subset",
            span.clone(),
        )),
    }
}

fn validate_assign(
    env: &mut Env,
    op: &AssignOp,
    target: &Expr,
    value: &Expr,
    span: &Span,
) -> CompileResult<KStmt> {
    let (ktarget, target_ty) = validate_expr(env, target)?;
    if !matches!(
        target.unparen(),
        Expr::Ident { .. } | Expr::Index { .. }
    ) {
        return Err(CompileError::with_span(
            codes::KERNEL_STATEMENT,
            "assignment target must be a local or a pointer element",
            span.clone(),
        ));
    }
    let KType::Scalar(kind) = target_ty else {
        return Err(CompileError::with_span(
            codes::KERNEL_STATEMENT,
            "assignment target must be scalar",
            span.clone(),
        ));
    };

    let (kvalue, value_ty) = validate_expr(env, value)?;
    if value_ty != KType::Scalar(kind) {
        return Err(CompileError::with_span(
            codes::KERNEL_TYPE_MISMATCH,
            "assignment operand types do not match",
            value.span().clone(),
        ));
    }

    let combined = match op {
        AssignOp::Assign => kvalue,
        AssignOp::Add | AssignOp::Sub | AssignOp::Mul | AssignOp::Div | AssignOp::Rem => {
            if !kind.is_numeric() {
                return Err(CompileError::with_span(
                    codes::KERNEL_OPERATOR,
                    "compound assignment requires numeric operands",
                    span.clone(),
                ));
            }
            let bin_op = match op {
                AssignOp::Add => KBinOp::Add,
                AssignOp::Sub => KBinOp::Sub,
                AssignOp::Mul => KBinOp::Mul,
                AssignOp::Div => KBinOp::Div,
                _ => KBinOp::Rem,
            };
            KExpr::Binary {
                op: bin_op,
                left: Box::new(ktarget.clone()),
                right: Box::new(kvalue),
            }
        }
    };

    Ok(KStmt::Assign {
        target: ktarget,
        value: combined,
    })
}

fn validate_for(
    env: &mut Env,
    shared: &mut Vec<(String, ScalarKind, usize)>,
    for_stmt: &lode_ast::ForStmt,
) -> CompileResult<KStmt> {
    let shape_err = || {
        CompileError::with_span(
            codes::KERNEL_FOR_SHAPE,
            "kernel `for` needs a let initializer, a condition, and a step on the loop variable",
            for_stmt.span.clone(),
        )
    };

    let Some(init_stmt) = &for_stmt.init else {
        return Err(shape_err());
    };
    let Stmt::VarDecl(decl) = init_stmt.as_ref() else {
        return Err(shape_err());
    };
    let mut loop_env = env.clone();
    let Some(KStmt::Let { name, kind, init }) = validate_let(&mut loop_env, shared, decl)?
    else {
        return Err(shape_err());
    };
    if !kind.is_integer() {
        return Err(CompileError::with_span(
            codes::KERNEL_FOR_SHAPE,
            "kernel loop variables must be integer scalars",
            decl.span.clone(),
        ));
    }

    let Some(cond) = &for_stmt.cond else {
        return Err(shape_err());
    };
    let (kcond, cond_ty) = validate_expr(&mut loop_env, cond)?;
    expect_bool(cond_ty, cond.span())?;

    let Some(update) = &for_stmt.update else {
        return Err(shape_err());
    };
    let step = validate_expr_stmt(&mut loop_env, update, update.span())?;
    let KStmt::Assign { target, .. } = &step else {
        return Err(shape_err());
    };
    if !matches!(target, KExpr::Var(var) if var == &name) {
        return Err(CompileError::with_span(
            codes::KERNEL_FOR_SHAPE,
            "kernel loop step must update the loop variable",
            update.span().clone(),
        ));
    }

    let body = validate_block(&mut loop_env, shared, &for_stmt.body)?;

    Ok(KStmt::For {
        var: name,
        var_kind: kind,
        init,
        cond: kcond,
        step: Box::new(step),
        body,
    })
}

fn expect_bool(ty: KType, span: &Span) -> CompileResult<()> {
    if ty == KType::Scalar(ScalarKind::Bool) {
        Ok(())
    } else {
        Err(CompileError::with_span(
            codes::KERNEL_TYPE_MISMATCH,
            "condition must be a bool",
            span.clone(),
        ))
    }
}

fn validate_expr(env: &mut Env, expr: &Expr) -> CompileResult<(KExpr, KType)> {
    match expr {
        Expr::Paren { expr: inner, .. } => {
            let (kexpr, ty) = validate_expr(env, inner)?;
            Ok((KExpr::Paren(Box::new(kexpr)), ty))
        }
        Expr::NumberLit { span, .. } => Err(CompileError::with_span(
            codes::KERNEL_LITERAL_CAST,
            "numeric literals need an explicit scalar cast",
            span.clone(),
        )),
        Expr::BoolLit { value, .. } => Ok((
            KExpr::Lit {
                kind: ScalarKind::Bool,
                text: value.to_string(),
            },
            KType::Scalar(ScalarKind::Bool),
        )),
        Expr::Cast { expr: inner, ty, span } => validate_cast(env, inner, ty, span),
        Expr::Ident { name, span } => {
            if coord_intrinsic(name).is_some() {
                // Coordinates are functions, not values.
                return Err(CompileError::with_span(
                    codes::KERNEL_CALL,
                    format!("`{name}` must be called"),
                    span.clone(),
                ));
            }
            match env.get(name) {
                Some(ty) => Ok((KExpr::Var(name.clone()), *ty)),
                None => Err(CompileError::with_span(
                    codes::KERNEL_UNKNOWN_IDENT,
                    format!("`{name}` is not defined in this kernel"),
                    span.clone(),
                )),
            }
        }
        Expr::Index { object, index, span } => {
            let (kptr, ptr_ty) = validate_expr(env, object)?;
            let Some(pointee) = ptr_ty.pointee() else {
                return Err(CompileError::with_span(
                    codes::KERNEL_EXPRESSION,
                    "only pointers can be indexed",
                    span.clone(),
                ));
            };
            let (kindex, index_ty) = validate_expr(env, index)?;
            match index_ty {
                KType::Scalar(kind) if kind.is_integer() => {}
                _ => {
                    return Err(CompileError::with_span(
                        codes::KERNEL_EXPRESSION,
                        "pointer index must be an integer scalar",
                        index.span().clone(),
                    ))
                }
            }
            Ok((
                KExpr::Index {
                    ptr: Box::new(kptr),
                    index: Box::new(kindex),
                },
                KType::Scalar(pointee),
            ))
        }
        Expr::Call { callee, args, span, .. } => validate_call(env, callee, args, span),
        Expr::Unary { op, operand, span } => {
            let (kexpr, ty) = validate_expr(env, operand)?;
            let KType::Scalar(kind) = ty else {
                return Err(CompileError::with_span(
                    codes::KERNEL_OPERATOR,
                    "unary operators apply to scalars",
                    span.clone(),
                ));
            };
            match op {
                UnaryOp::Neg if kind.is_numeric() => Ok((
                    KExpr::Unary {
                        negate: true,
                        expr: Box::new(kexpr),
                    },
                    ty,
                )),
                UnaryOp::Not if kind == ScalarKind::Bool => Ok((
                    KExpr::Unary {
                        negate: false,
                        expr: Box::new(kexpr),
                    },
                    ty,
                )),
                _ => Err(CompileError::with_span(
                    codes::KERNEL_OPERATOR,
                    "operator is outside the kernel subset",
                    span.clone(),
                )),
            }
        }
        Expr::Binary { op, left, right, span } => {
            let Some(kop) = lower_bin_op(op) else {
                return Err(CompileError::with_span(
                    codes::KERNEL_OPERATOR,
                    "operator is outside the kernel subset",
                    span.clone(),
                ));
            };
            let (kleft, left_ty) = validate_expr(env, left)?;
            let (kright, right_ty) = validate_expr(env, right)?;
            let (KType::Scalar(lk), KType::Scalar(rk)) = (left_ty, right_ty) else {
                return Err(CompileError::with_span(
                    codes::KERNEL_OPERATOR,
                    "binary operators apply to scalars",
                    span.clone(),
                ));
            };
            if lk != rk {
                return Err(CompileError::with_span(
                    codes::KERNEL_TYPE_MISMATCH,
                    format!(
                        "operand types differ: `{}` vs `{}`",
                        lk.rust_name(),
                        rk.rust_name()
                    ),
                    span.clone(),
                ));
            }
            let result = if kop.is_comparison() {
                if !lk.is_numeric() && !matches!(kop, KBinOp::Eq | KBinOp::Ne) {
                    return Err(CompileError::with_span(
                        codes::KERNEL_OPERATOR,
                        "ordering comparisons need numeric operands",
                        span.clone(),
                    ));
                }
                ScalarKind::Bool
            } else if kop.is_logical() {
                if lk != ScalarKind::Bool {
                    return Err(CompileError::with_span(
                        codes::KERNEL_TYPE_MISMATCH,
                        "logical operators need bool operands",
                        span.clone(),
                    ));
                }
                ScalarKind::Bool
            } else {
                if !lk.is_numeric() {
                    return Err(CompileError::with_span(
                        codes::KERNEL_OPERATOR,
                        "arithmetic needs numeric operands",
                        span.clone(),
                    ));
                }
                lk
            };
            Ok((
                KExpr::Binary {
                    op: kop,
                    left: Box::new(kleft),
                    right: Box::new(kright),
                },
                KType::Scalar(result),
            ))
        }
        other => Err(CompileError::with_span(
            codes::KERNEL_EXPRESSION,
            "expression is outside the kernel subset",
            other.span().clone(),
        )),
    }
}

fn validate_cast(
    env: &mut Env,
    inner: &Expr,
    ty: &TypeExpr,
    span: &Span,
) -> CompileResult<(KExpr, KType)> {
    let TypeExpr::Named { name, args, span: ty_span } = ty else {
        return Err(CompileError::with_span(
            codes::KERNEL_CAST_NON_SCALAR,
            "kernel casts must target scalar types",
            ty.span().clone(),
        ));
    };
    if name == "global_ptr" || name == "shared_ptr" {
        return Err(CompileError::with_span(
            codes::KERNEL_POINTER_CAST,
            "pointer casts are not allowed in kernels",
            ty_span.clone(),
        ));
    }
    let Some(kind) = ScalarKind::from_name(name).filter(|_| args.is_empty()) else {
        return Err(CompileError::with_span(
            codes::KERNEL_CAST_NON_SCALAR,
            format!("`{name}` is not a scalar type"),
            ty_span.clone(),
        ));
    };

    if let Expr::NumberLit { raw, .. } = inner.unparen() {
        if kind == ScalarKind::Bool {
            return Err(CompileError::with_span(
                codes::KERNEL_CAST_NON_SCALAR,
                "numeric literals cannot be cast to bool",
                span.clone(),
            ));
        }
        return Ok((
            KExpr::Lit {
                kind,
                text: raw.clone(),
            },
            KType::Scalar(kind),
        ));
    }

    let (kexpr, inner_ty) = validate_expr(env, inner)?;
    match inner_ty {
        KType::Scalar(inner_kind) if inner_kind.is_numeric() && kind.is_numeric() => Ok((
            KExpr::Cast {
                kind,
                expr: Box::new(kexpr),
            },
            KType::Scalar(kind),
        )),
        KType::Scalar(_) => Err(CompileError::with_span(
            codes::KERNEL_CAST_NON_SCALAR,
            "casts convert between numeric scalars",
            span.clone(),
        )),
        _ => Err(CompileError::with_span(
            codes::KERNEL_POINTER_CAST,
            "pointer casts are not allowed in kernels",
            span.clone(),
        )),
    }
}

fn validate_call(
    env: &mut Env,
    callee: &Expr,
    args: &[Expr],
    span: &Span,
) -> CompileResult<(KExpr, KType)> {
    let Expr::Ident { name, .. } = callee.unparen() else {
        return Err(CompileError::with_span(
            codes::KERNEL_CALL,
            "only intrinsic calls are allowed in kernels",
            span.clone(),
        ));
    };

    if let Some(rendered) = coord_intrinsic(name) {
        if !args.is_empty() {
            return Err(CompileError::with_span(
                codes::KERNEL_CALL,
                format!("`{name}()` takes no arguments"),
                span.clone(),
            ));
        }
        return Ok((KExpr::Coord(rendered), KType::Scalar(ScalarKind::U32)));
    }

    match name.as_str() {
        "expf" => {
            let [arg] = args else {
                return Err(CompileError::with_span(
                    codes::KERNEL_EXPF,
                    "`expf(x)` takes exactly one `f32`",
                    span.clone(),
                ));
            };
            let (kexpr, ty) = validate_expr(env, arg)?;
            if ty != KType::Scalar(ScalarKind::F32) {
                return Err(CompileError::with_span(
                    codes::KERNEL_EXPF,
                    "`expf` requires an `f32` argument",
                    arg.span().clone(),
                ));
            }
            Ok((KExpr::Expf(Box::new(kexpr)), KType::Scalar(ScalarKind::F32)))
        }
        "atomicAdd" => {
            let [addr_arg, value_arg] = args else {
                return Err(CompileError::with_span(
                    codes::KERNEL_ATOMIC_ADD,
                    "`atomicAdd(addr(p, i), v)` takes exactly two arguments",
                    span.clone(),
                ));
            };
            let Expr::Call {
                callee: addr_callee,
                args: addr_args,
                ..
            } = addr_arg.unparen()
            else {
                return Err(atomic_add_error(span));
            };
            if !matches!(addr_callee.unparen(), Expr::Ident { name, .. } if name == "addr") {
                return Err(atomic_add_error(span));
            }
            let [ptr_arg, index_arg] = addr_args.as_slice() else {
                return Err(CompileError::with_span(
                    codes::KERNEL_ADDR,
                    "`addr(p, i)` takes a pointer and an index",
                    addr_arg.span().clone(),
                ));
            };
            let (kptr, ptr_ty) = validate_expr(env, ptr_arg)?;
            if ptr_ty.pointee() != Some(ScalarKind::U32) {
                return Err(CompileError::with_span(
                    codes::KERNEL_ATOMIC_ADD,
                    "`atomicAdd` works on `u32` pointers only",
                    ptr_arg.span().clone(),
                ));
            }
            let (kindex, index_ty) = validate_expr(env, index_arg)?;
            match index_ty {
                KType::Scalar(kind) if kind.is_integer() => {}
                _ => {
                    return Err(CompileError::with_span(
                        codes::KERNEL_ADDR,
                        "`addr` index must be an integer scalar",
                        index_arg.span().clone(),
                    ))
                }
            }
            let (kvalue, value_ty) = validate_expr(env, value_arg)?;
            if value_ty != KType::Scalar(ScalarKind::U32) {
                return Err(CompileError::with_span(
                    codes::KERNEL_ATOMIC_ADD,
                    "`atomicAdd` value must be `u32`",
                    value_arg.span().clone(),
                ));
            }
            Ok((
                KExpr::AtomicAdd {
                    ptr: Box::new(kptr),
                    index: Box::new(kindex),
                    value: Box::new(kvalue),
                },
                KType::Scalar(ScalarKind::U32),
            ))
        }
        "addr" => Err(CompileError::with_span(
            codes::KERNEL_ADDR,
            "`addr` is only valid as the first argument of `atomicAdd`",
            span.clone(),
        )),
        "sharedArray" => Err(CompileError::with_span(
            codes::KERNEL_SHARED_ARRAY,
            "`sharedArray` is only valid as a `const` initializer",
            span.clone(),
        )),
        "syncthreads" => Err(CompileError::with_span(
            codes::KERNEL_SYNCTHREADS,
            "`syncthreads()` is a statement, not a value",
            span.clone(),
        )),
        "kernel" => Err(CompileError::with_span(
            codes::KERNEL_NOT_TOP_LEVEL,
            "kernels must be declared as top-level consts",
            span.clone(),
        )),
        other => Err(CompileError::with_span(
            codes::KERNEL_CALL,
            format!("`{other}` is not a kernel intrinsic"),
            span.clone(),
        )),
    }
}

fn atomic_add_error(span: &Span) -> CompileError {
    CompileError::with_span(
        codes::KERNEL_ATOMIC_ADD,
        "`atomicAdd` takes `addr(p, i)` as its first argument",
        span.clone(),
    )
}

fn lower_bin_op(op: &BinaryOp) -> Option<KBinOp> {
    match op {
        BinaryOp::Add => Some(KBinOp::Add),
        BinaryOp::Sub => Some(KBinOp::Sub),
        BinaryOp::Mul => Some(KBinOp::Mul),
        BinaryOp::Div => Some(KBinOp::Div),
        BinaryOp::Rem => Some(KBinOp::Rem),
        BinaryOp::Eq | BinaryOp::StrictEq => Some(KBinOp::Eq),
        BinaryOp::NotEq | BinaryOp::StrictNotEq => Some(KBinOp::Ne),
        BinaryOp::Lt => Some(KBinOp::Lt),
        BinaryOp::Le => Some(KBinOp::Le),
        BinaryOp::Gt => Some(KBinOp::Gt),
        BinaryOp::Ge => Some(KBinOp::Ge),
        BinaryOp::And => Some(KBinOp::And),
        BinaryOp::Or => Some(KBinOp::Or),
        _ => None,
    }
}
