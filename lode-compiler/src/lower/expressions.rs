//! Expression lowering: markers, borrow insertion, object literals,
//! template literals, and kernel launch rewriting.

use lode_ast::{ArrowBody, BinaryOp, Expr, TemplatePart, UnaryOp};
use lode_diagnostics::{CompileError, CompileResult, Span};
use lode_rir::{
    BinOp, Expr as RExpr, ExprKind, Lit, StmtKind, StructItem, Type, UnOp, Visibility,
};

use super::statements::FnCtx;
use super::{anon_struct_name, Lowering, ParamMode};
use crate::codes;
use crate::kernel;
use crate::type_lowering::{lower_annotation, lower_type};

impl<'p> Lowering<'p> {
    /// Lower one expression. `expected` carries the nominal type name an
    /// object literal in this position would construct.
    pub(super) fn lower_expr(
        &mut self,
        ctx: &mut FnCtx,
        expr: &Expr,
        expected: Option<&str>,
    ) -> CompileResult<RExpr> {
        match expr {
            Expr::NumberLit { raw, span } => {
                let lit = if raw.contains('.') || raw.contains('e') || raw.contains('E') {
                    Lit::Float(raw.clone())
                } else {
                    Lit::Int(raw.clone())
                };
                Ok(RExpr::with_span(ExprKind::Lit(lit), span.clone()))
            }
            Expr::StringLit { value, span } => {
                let lit = RExpr::with_span(ExprKind::Lit(Lit::Str(value.clone())), span.clone());
                if expected == Some("String") {
                    Ok(RExpr::method(lit, "to_string", vec![]))
                } else {
                    Ok(lit)
                }
            }
            Expr::TemplateLit { parts, span } => self.lower_template(ctx, parts, span),
            Expr::BoolLit { value, span } => Ok(RExpr::with_span(
                ExprKind::Lit(Lit::Bool(*value)),
                span.clone(),
            )),
            Expr::NullLit { span } => Err(CompileError::with_span(
                codes::UNSUPPORTED_LITERAL,
                "`null` has no target representation",
                span.clone(),
            )),
            Expr::UndefinedLit { span } => Err(CompileError::with_span(
                codes::UNDEFINED_REJECTED,
                "`undefined` has no target representation",
                span.clone(),
            )),
            Expr::Ident { name, span } => self.lower_ident(ctx, name, span),
            Expr::This { span } => {
                if ctx.self_class.is_none() {
                    return Err(CompileError::with_span(
                        codes::UNSUPPORTED_EXPRESSION,
                        "`this` outside a class body",
                        span.clone(),
                    ));
                }
                Ok(RExpr::with_span(
                    ExprKind::Path(vec!["self".to_string()]),
                    span.clone(),
                ))
            }
            Expr::Member {
                object,
                property,
                span,
            } => self.lower_member(ctx, object, property, span),
            Expr::Index { object, index, span } => {
                let base = self.lower_expr(ctx, object, None)?;
                let idx = self.lower_expr(ctx, index, None)?;
                Ok(RExpr::with_span(
                    ExprKind::Index {
                        base: Box::new(base),
                        index: Box::new(idx),
                    },
                    span.clone(),
                ))
            }
            Expr::Call { .. } => self.lower_call(ctx, expr),
            Expr::New { callee, args, span } => self.lower_new(ctx, callee, args, span),
            Expr::Unary { op, operand, span } => self.lower_unary(ctx, op, operand, span),
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let target_op = lower_bin_op(op);
                let left = self.lower_expr(ctx, left, None)?;
                let right = self.lower_expr(ctx, right, None)?;
                Ok(RExpr::with_span(
                    ExprKind::Binary {
                        op: target_op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span.clone(),
                ))
            }
            Expr::Assign { span, .. } | Expr::Update { span, .. } => {
                Err(CompileError::with_span(
                    codes::UNSUPPORTED_EXPRESSION,
                    "assignments are statements, not expressions",
                    span.clone(),
                ))
            }
            Expr::Arrow { .. } => self.lower_arrow(ctx, expr, false),
            Expr::ObjectLit { fields, span } => {
                self.lower_object_literal(ctx, fields, span, expected)
            }
            Expr::ArrayLit { elements, span } => {
                let lowered: CompileResult<Vec<RExpr>> = elements
                    .iter()
                    .map(|e| self.lower_expr(ctx, e, None))
                    .collect();
                Ok(RExpr::with_span(ExprKind::ArrayLit(lowered?), span.clone()))
            }
            Expr::Cast { expr: inner, ty, span } => {
                let lowered = self.lower_expr(ctx, inner, None)?;
                let scoped = self.type_ctx.clone();
                let target = lower_type(&scoped, ty).map_err(|e| match e.code {
                    c if c == codes::UNSUPPORTED_TYPE => CompileError::with_span(
                        codes::UNSUPPORTED_CAST,
                        e.message,
                        span.clone(),
                    ),
                    _ => e,
                })?;
                Ok(RExpr::with_span(
                    ExprKind::Cast {
                        expr: Box::new(RExpr::paren(lowered)),
                        ty: target,
                    },
                    span.clone(),
                ))
            }
            Expr::AsConst { expr: inner, .. } => {
                // `as const` is a compile-time marker; the value lowers
                // unchanged outside kernel spec and launch positions.
                self.lower_expr(ctx, inner, expected)
            }
            Expr::Await { expr: inner, span } => {
                let lowered = self.lower_expr(ctx, inner, None)?;
                Ok(RExpr::with_span(
                    ExprKind::Await(Box::new(lowered)),
                    span.clone(),
                ))
            }
            Expr::Paren { expr: inner, span } => {
                let lowered = self.lower_expr(ctx, inner, expected)?;
                Ok(RExpr::with_span(
                    ExprKind::Paren(Box::new(lowered)),
                    span.clone(),
                ))
            }
        }
    }

    fn lower_ident(&mut self, ctx: &FnCtx, name: &str, span: &Span) -> CompileResult<RExpr> {
        if self.kernel_symbols.contains(name) && !ctx.is_local(name) {
            return Err(CompileError::with_span(
                codes::KERNEL_VALUE_ESCAPES,
                format!("kernel `{name}` can only be launched"),
                span.clone(),
            ));
        }
        if kernel::is_device_only_callable(name) {
            return Err(CompileError::with_span(
                codes::KERNEL_INTRINSIC_ON_HOST,
                format!("`{name}` is only available inside kernels"),
                span.clone(),
            ));
        }
        if self.markers.contains(name) && is_marker_name(name) {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_EXPRESSION,
                format!("marker `{name}` has no value; it can only be called"),
                span.clone(),
            ));
        }
        Ok(RExpr::with_span(
            ExprKind::Path(vec![name.to_string()]),
            span.clone(),
        ))
    }

    fn lower_member(
        &mut self,
        ctx: &mut FnCtx,
        object: &Expr,
        property: &str,
        span: &Span,
    ) -> CompileResult<RExpr> {
        // Union-switch arms rewrite `s.field` to the bound `field`.
        if let Some((var, fields)) = &ctx.union_subst {
            if let Expr::Ident { name, .. } = object.unparen() {
                if name == var && fields.iter().any(|f| f == property) {
                    return Ok(RExpr::with_span(
                        ExprKind::Path(vec![property.to_string()]),
                        span.clone(),
                    ));
                }
            }
        }
        if let Expr::Ident { name, .. } = object.unparen() {
            if self.kernel_symbols.contains(name) && !ctx.is_local(name) {
                return Err(CompileError::with_span(
                    codes::KERNEL_VALUE_ESCAPES,
                    format!("kernel `{name}` can only be launched"),
                    span.clone(),
                ));
            }
        }
        let base = self.lower_expr(ctx, object, None)?;
        Ok(RExpr::with_span(
            ExprKind::Field {
                base: Box::new(base),
                name: property.to_string(),
            },
            span.clone(),
        ))
    }

    fn lower_unary(
        &mut self,
        ctx: &mut FnCtx,
        op: &UnaryOp,
        operand: &Expr,
        span: &Span,
    ) -> CompileResult<RExpr> {
        match op {
            UnaryOp::Neg => {
                let lowered = self.lower_expr(ctx, operand, None)?;
                Ok(RExpr::with_span(
                    ExprKind::Unary {
                        op: UnOp::Neg,
                        expr: Box::new(lowered),
                    },
                    span.clone(),
                ))
            }
            UnaryOp::Not => {
                let lowered = self.lower_expr(ctx, operand, None)?;
                Ok(RExpr::with_span(
                    ExprKind::Unary {
                        op: UnOp::Not,
                        expr: Box::new(lowered),
                    },
                    span.clone(),
                ))
            }
            UnaryOp::Void => {
                // `void e` evaluates and discards: `{ let _ = e; () }`.
                let lowered = self.lower_expr(ctx, operand, None)?;
                Ok(RExpr::with_span(
                    ExprKind::Block {
                        stmts: vec![lode_rir::Stmt::new(StmtKind::Let {
                            name: "_".to_string(),
                            mutable: false,
                            ty: None,
                            init: Some(lowered),
                        })],
                        tail: Some(Box::new(RExpr::unit())),
                    },
                    span.clone(),
                ))
            }
        }
    }

    fn lower_template(
        &mut self,
        ctx: &mut FnCtx,
        parts: &[TemplatePart],
        span: &Span,
    ) -> CompileResult<RExpr> {
        let mut fmt = String::new();
        let mut args = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Text(text) => {
                    fmt.push_str(&text.replace('{', "{{").replace('}', "}}"))
                }
                TemplatePart::Expr(inner) => {
                    if matches!(
                        inner.unparen(),
                        Expr::Arrow { .. } | Expr::ObjectLit { .. }
                    ) {
                        return Err(CompileError::with_span(
                            codes::UNSUPPORTED_TEMPLATE_PART,
                            "this value cannot be interpolated into a template literal",
                            inner.span().clone(),
                        ));
                    }
                    fmt.push_str("{}");
                    args.push(self.lower_expr(ctx, inner, None)?);
                }
            }
        }
        if args.is_empty() {
            return Ok(RExpr::with_span(
                ExprKind::Call {
                    callee: Box::new(RExpr::new(ExprKind::Field {
                        base: Box::new(RExpr::str_lit(
                            parts
                                .iter()
                                .map(|p| match p {
                                    TemplatePart::Text(text) => text.as_str(),
                                    TemplatePart::Expr(_) => "",
                                })
                                .collect::<String>(),
                        )),
                        name: "to_string".to_string(),
                    })),
                    args: vec![],
                },
                span.clone(),
            ));
        }
        let mut macro_args = vec![RExpr::str_lit(fmt)];
        macro_args.extend(args);
        Ok(RExpr::with_span(
            ExprKind::MacroCall {
                name: "format".to_string(),
                args: macro_args,
            },
            span.clone(),
        ))
    }

    fn lower_arrow(
        &mut self,
        ctx: &mut FnCtx,
        expr: &Expr,
        is_move: bool,
    ) -> CompileResult<RExpr> {
        let Expr::Arrow {
            params, body, span, ..
        } = expr.unparen()
        else {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_EXPRESSION,
                "expected an arrow function",
                expr.span().clone(),
            ));
        };
        let ArrowBody::Expr(body_expr) = body else {
            return Err(CompileError::with_span(
                codes::BLOCK_BODIED_ARROW,
                "block-bodied arrow functions are not supported",
                span.clone(),
            ));
        };

        let scoped = self.type_ctx.clone();
        let mut lowered_params = Vec::new();
        for param in params {
            let Some(name) = param.name() else {
                return Err(CompileError::with_span(
                    codes::DESTRUCTURED_PARAM,
                    "destructured parameters are not supported",
                    param.span.clone(),
                ));
            };
            let ty = match &param.ty {
                Some(annotation) => Some(lower_annotation(&scoped, annotation)?.ty),
                None => None,
            };
            lowered_params.push((name.to_string(), ty));
        }

        let lowered_body = self.lower_expr(ctx, body_expr, None)?;
        Ok(RExpr::with_span(
            ExprKind::Closure {
                is_move,
                params: lowered_params,
                body: Box::new(lowered_body),
            },
            span.clone(),
        ))
    }

    fn lower_new(
        &mut self,
        ctx: &mut FnCtx,
        callee: &str,
        args: &[Expr],
        span: &Span,
    ) -> CompileResult<RExpr> {
        let modes = self
            .classes
            .get(callee)
            .and_then(|c| c.ctor_modes.clone())
            .unwrap_or_default();
        let lowered = self.lower_args(ctx, &modes, args)?;
        if !self.type_ctx.nominals.contains(callee) {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_EXPRESSION,
                format!("`new {callee}` does not name a declared class"),
                span.clone(),
            ));
        }
        Ok(RExpr::with_span(
            ExprKind::AssocCall {
                ty: Type::path(callee),
                func: "new".to_string(),
                generics: vec![],
                args: lowered,
            },
            span.clone(),
        ))
    }

    // ==================== Calls ====================

    fn lower_call(&mut self, ctx: &mut FnCtx, expr: &Expr) -> CompileResult<RExpr> {
        let Expr::Call {
            callee,
            type_args,
            args,
            span,
        } = expr.unparen()
        else {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_EXPRESSION,
                "expected a call expression",
                expr.span().clone(),
            ));
        };

        if let Expr::Ident { name, span: ident_span } = callee.unparen() {
            match name.as_str() {
                "kernel" => {
                    return Err(CompileError::with_span(
                        codes::KERNEL_NOT_TOP_LEVEL,
                        "kernels must be declared as top-level consts",
                        span.clone(),
                    ))
                }
                "annotate" | "attr" => {
                    return Err(CompileError::with_span(
                        codes::UNSUPPORTED_EXPRESSION,
                        format!("`{name}` is only valid as a top-level statement"),
                        span.clone(),
                    ))
                }
                "q" if self.markers.contains("q") => {
                    let [arg] = &args[..] else {
                        return Err(CompileError::with_span(
                            codes::UNSUPPORTED_EXPRESSION,
                            "`q(expr)` takes exactly one argument",
                            span.clone(),
                        ));
                    };
                    let lowered = self.lower_expr(ctx, arg, None)?;
                    return Ok(RExpr::with_span(
                        ExprKind::Try(Box::new(RExpr::paren(lowered))),
                        span.clone(),
                    ));
                }
                "unsafe" if self.markers.contains("unsafe") => {
                    let [arg] = &args[..] else {
                        return Err(CompileError::with_span(
                            codes::UNSUPPORTED_EXPRESSION,
                            "`unsafe(() => expr)` takes exactly one arrow",
                            span.clone(),
                        ));
                    };
                    let Expr::Arrow { params, body, .. } = arg.unparen() else {
                        return Err(CompileError::with_span(
                            codes::UNSUPPORTED_EXPRESSION,
                            "`unsafe` takes an arrow function",
                            arg.span().clone(),
                        ));
                    };
                    if !params.is_empty() {
                        return Err(CompileError::with_span(
                            codes::UNSUPPORTED_EXPRESSION,
                            "the `unsafe` arrow takes no parameters",
                            arg.span().clone(),
                        ));
                    }
                    let ArrowBody::Expr(body_expr) = body else {
                        return Err(CompileError::with_span(
                            codes::BLOCK_BODIED_ARROW,
                            "block-bodied arrow functions are not supported",
                            arg.span().clone(),
                        ));
                    };
                    let lowered = self.lower_expr(ctx, &body_expr, None)?;
                    return Ok(RExpr::with_span(
                        ExprKind::Unsafe(Box::new(lowered)),
                        span.clone(),
                    ));
                }
                "move" if self.markers.contains("move") => {
                    let [arg] = &args[..] else {
                        return Err(CompileError::with_span(
                            codes::UNSUPPORTED_EXPRESSION,
                            "`move(arrow)` takes exactly one arrow",
                            span.clone(),
                        ));
                    };
                    return self.lower_arrow(ctx, arg, true);
                }
                "Ok" => {
                    let unit_ok = args.is_empty()
                        || (args.len() == 1
                            && matches!(args[0].unparen(), Expr::UndefinedLit { .. }));
                    if unit_ok {
                        return Ok(RExpr::with_span(
                            ExprKind::Call {
                                callee: Box::new(RExpr::path("Ok")),
                                args: vec![RExpr::unit()],
                            },
                            span.clone(),
                        ));
                    }
                }
                other if kernel::is_device_only_callable(other) => {
                    return Err(CompileError::with_span(
                        codes::KERNEL_INTRINSIC_ON_HOST,
                        format!("`{other}` is only available inside kernels"),
                        ident_span.clone(),
                    ))
                }
                _ => {}
            }

            // Plain function call, with borrow insertion and an optional
            // turbofish for imported generic declarations.
            let name = name.clone();
            let modes = self.fn_sigs.get(&name).cloned().unwrap_or_default();
            let lowered_args = self.lower_args(ctx, &modes, args)?;
            if !type_args.is_empty() {
                let scoped = self.type_ctx.clone();
                let generics: CompileResult<Vec<Type>> = type_args
                    .iter()
                    .map(|t| lower_type(&scoped, t))
                    .collect();
                return Ok(RExpr::with_span(
                    ExprKind::PathCall {
                        path: vec![name],
                        generics: generics?,
                        args: lowered_args,
                    },
                    span.clone(),
                ));
            }
            return Ok(RExpr::with_span(
                ExprKind::Call {
                    callee: Box::new(RExpr::path(&name)),
                    args: lowered_args,
                },
                span.clone(),
            ));
        }

        // Method calls.
        if let Expr::Member {
            object, property, ..
        } = callee.unparen()
        {
            // Kernel launches rewrite to the loader runtime.
            if let Expr::Ident { name, .. } = object.unparen() {
                if self.kernel_symbols.contains(name) && !ctx.is_local(name) {
                    if property == "launch" {
                        let kernel_name = self
                            .kernels
                            .kernel_of_symbol(name)
                            .map(|a| a.name.clone());
                        if let Some(kernel_name) = kernel_name {
                            return self.lower_launch(ctx, &kernel_name, args, span);
                        }
                    }
                    return Err(CompileError::with_span(
                        codes::KERNEL_VALUE_ESCAPES,
                        format!("kernel `{name}` can only be launched"),
                        span.clone(),
                    ));
                }
            }

            let modes = self.method_modes(ctx, object, property);
            let base = self.lower_expr(ctx, object, None)?;
            let lowered_args = self.lower_args(ctx, &modes, args)?;
            return Ok(RExpr::with_span(
                ExprKind::Call {
                    callee: Box::new(RExpr::new(ExprKind::Field {
                        base: Box::new(base),
                        name: property.to_string(),
                    })),
                    args: lowered_args,
                },
                span.clone(),
            ));
        }

        Err(CompileError::with_span(
            codes::UNSUPPORTED_EXPRESSION,
            "unsupported call target",
            span.clone(),
        ))
    }

    fn method_modes(&self, ctx: &FnCtx, object: &Expr, method: &str) -> Vec<ParamMode> {
        let head = match object.unparen() {
            Expr::This { .. } => ctx.self_class.clone(),
            Expr::Ident { name, .. } => ctx.type_head_of(name).map(str::to_string),
            _ => None,
        };
        head.and_then(|h| self.classes.get(&h))
            .and_then(|c| c.methods.get(method).cloned())
            .unwrap_or_default()
    }

    /// Lower call arguments, inserting `&`/`&mut` borrows where the
    /// callee's parameter is a reference marker.
    fn lower_args(
        &mut self,
        ctx: &mut FnCtx,
        modes: &[ParamMode],
        args: &[Expr],
    ) -> CompileResult<Vec<RExpr>> {
        let mut out = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            let mode = modes.get(i).copied().unwrap_or(ParamMode::Value);
            let lowered = self.lower_expr(ctx, arg, None)?;
            match mode {
                ParamMode::Value => out.push(lowered),
                ParamMode::Ref => out.push(RExpr::borrow(RExpr::paren(lowered), false)),
                ParamMode::MutRef => {
                    if !is_place_expr(arg) {
                        return Err(CompileError::with_span(
                            codes::INVALID_BORROW,
                            "a mutable borrow needs a named place, not a temporary",
                            arg.span().clone(),
                        ));
                    }
                    out.push(RExpr::borrow(RExpr::paren(lowered), true));
                }
            }
        }
        Ok(out)
    }

    /// `K.launch({grid: [gx,gy,gz], block: [bx,by,bz]} as const, a0, …)`
    /// rewrites to `gpu_runtime::launch_<name>(gx, gy, gz, bx, by, bz, a0, …)`.
    fn lower_launch(
        &mut self,
        ctx: &mut FnCtx,
        kernel_name: &str,
        args: &[Expr],
        span: &Span,
    ) -> CompileResult<RExpr> {
        let Some((config, rest)) = args.split_first() else {
            return Err(launch_shape_error(span));
        };
        let Expr::AsConst { expr: config_obj, .. } = config.unparen() else {
            return Err(launch_shape_error(config.span()));
        };
        let Expr::ObjectLit { fields, .. } = config_obj.unparen() else {
            return Err(launch_shape_error(config.span()));
        };

        let mut grid = None;
        let mut block = None;
        for field in fields {
            match field.name.as_str() {
                "grid" => grid = Some(&field.value),
                "block" => block = Some(&field.value),
                _ => return Err(launch_shape_error(&field.span)),
            }
        }
        let (Some(grid), Some(block)) = (grid, block) else {
            return Err(launch_shape_error(config.span()));
        };

        let mut call_args = Vec::new();
        for dims in [grid, block] {
            let Expr::ArrayLit { elements, .. } = dims.unparen() else {
                return Err(launch_shape_error(dims.span()));
            };
            if elements.len() != 3 {
                return Err(launch_shape_error(dims.span()));
            }
            for element in elements {
                call_args.push(self.lower_expr(ctx, element, None)?);
            }
        }
        for arg in rest {
            call_args.push(self.lower_expr(ctx, arg, None)?);
        }

        Ok(RExpr::with_span(
            ExprKind::PathCall {
                path: vec![
                    "gpu_runtime".to_string(),
                    format!("launch_{kernel_name}"),
                ],
                generics: vec![],
                args: call_args,
            },
            span.clone(),
        ))
    }

    // ==================== Object literals ====================

    fn lower_object_literal(
        &mut self,
        ctx: &mut FnCtx,
        fields: &[lode_ast::ObjectLitField],
        span: &Span,
        expected: Option<&str>,
    ) -> CompileResult<RExpr> {
        // Contextual union literal: the `kind` field picks the variant.
        if let Some(union) = expected.and_then(|e| self.unions.get(e)).cloned() {
            let Some(kind_field) = fields.iter().find(|f| f.name == "kind") else {
                return Err(CompileError::with_span(
                    codes::UNION_SHAPE,
                    format!("`{}` literals need a `kind` field", union.name),
                    span.clone(),
                ));
            };
            let Expr::StringLit { value: kind, .. } = kind_field.value.unparen() else {
                return Err(CompileError::with_span(
                    codes::UNION_SHAPE,
                    "`kind` must be a string literal",
                    kind_field.value.span().clone(),
                ));
            };
            let Some(variant) = union.variant_for_kind(kind) else {
                return Err(CompileError::with_span(
                    codes::UNION_SWITCH_UNKNOWN_KIND,
                    format!("`{kind}` is not a variant of `{}`", union.name),
                    kind_field.value.span().clone(),
                ));
            };
            let mut lowered_fields = Vec::new();
            for field in fields.iter().filter(|f| f.name != "kind") {
                lowered_fields.push((
                    field.name.clone(),
                    self.lower_expr(ctx, &field.value, None)?,
                ));
            }
            return Ok(RExpr::with_span(
                ExprKind::StructLit {
                    path: vec![union.name.clone(), variant.variant.clone()],
                    fields: lowered_fields,
                },
                span.clone(),
            ));
        }

        // Contextual struct literal.
        if let Some(name) = expected.filter(|e| self.type_ctx.nominals.contains(*e)) {
            let mut lowered_fields = Vec::new();
            for field in fields {
                lowered_fields.push((
                    field.name.clone(),
                    self.lower_expr(ctx, &field.value, None)?,
                ));
            }
            return Ok(RExpr::with_span(
                ExprKind::StructLit {
                    path: vec![name.to_string()],
                    fields: lowered_fields,
                },
                span.clone(),
            ));
        }

        // Uncontextual: every field needs an explicit cast, and the
        // literal gets a synthesized nominal type.
        let scoped = self.type_ctx.clone();
        let mut struct_fields = Vec::new();
        let mut lowered_fields = Vec::new();
        for field in fields {
            let Expr::Cast { expr: value, ty, .. } = field.value.unparen() else {
                return Err(CompileError::with_span(
                    codes::OBJECT_LITERAL_FIELD_CAST,
                    format!(
                        "field `{}` of an uncontextual object literal needs an explicit type assertion",
                        field.name
                    ),
                    field.span.clone(),
                ));
            };
            let field_ty = lower_type(&scoped, ty)?;
            struct_fields.push((field.name.clone(), field_ty));
            lowered_fields.push((
                field.name.clone(),
                self.lower_expr(ctx, &field.value, None)?,
            ));
        }

        let name = anon_struct_name(span);
        if !self.anon_structs.iter().any(|s| s.name == name) {
            self.anon_structs.push(StructItem {
                vis: Visibility::Private,
                name: name.clone(),
                attrs: vec![],
                generics: vec![],
                fields: struct_fields,
                span: Some(span.clone()),
            });
        }
        Ok(RExpr::with_span(
            ExprKind::StructLit {
                path: vec![name],
                fields: lowered_fields,
            },
            span.clone(),
        ))
    }
}

fn launch_shape_error(span: &Span) -> CompileError {
    CompileError::with_span(
        codes::KERNEL_LAUNCH_SHAPE,
        "launches take `{grid: [gx, gy, gz], block: [bx, by, bz]} as const` and the kernel arguments",
        span.clone(),
    )
}

/// Whether the source expression names a place a `&mut` can point at.
fn is_place_expr(expr: &Expr) -> bool {
    matches!(
        expr.unparen(),
        Expr::Ident { .. } | Expr::Member { .. } | Expr::Index { .. } | Expr::This { .. }
    )
}

/// Source operators map 1:1; strict equality folds onto `==`/`!=`.
fn lower_bin_op(op: &BinaryOp) -> BinOp {
    match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Rem => BinOp::Rem,
        BinaryOp::Eq | BinaryOp::StrictEq => BinOp::Eq,
        BinaryOp::NotEq | BinaryOp::StrictNotEq => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Le => BinOp::Le,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Ge => BinOp::Ge,
        BinaryOp::And => BinOp::And,
        BinaryOp::Or => BinOp::Or,
        BinaryOp::BitAnd => BinOp::BitAnd,
        BinaryOp::BitOr => BinOp::BitOr,
        BinaryOp::BitXor => BinOp::BitXor,
        BinaryOp::Shl => BinOp::Shl,
        BinaryOp::Shr => BinOp::Shr,
    }
}

/// Names reserved by the curated marker modules.
fn is_marker_name(name: &str) -> bool {
    matches!(
        name,
        "q" | "unsafe" | "move" | "Ok" | "annotate" | "attr" | "kernel"
    )
}
