//! Statement lowering, including the two switch forms and the classic
//! `for` desugaring.

use std::collections::HashMap;

use lode_ast::{
    AssignOp, Block, ElseBranch, Expr, ForOfStmt, ForStmt, Stmt, SwitchStmt, VarKind,
};
use lode_diagnostics::{CompileError, CompileResult, Span};
use lode_rir::{
    BinOp, Expr as RExpr, ExprKind, MatchArm, Pattern, Stmt as RStmt, StmtKind,
};

use super::{Lowering, UnionInfo};
use crate::codes;
use crate::type_lowering::lower_annotation;

/// Per-body lowering context: scoped locals with their nominal type head
/// (used for union-switch detection and launch rewriting), the enclosing
/// class for `this`, and the arm substitution for union switches.
pub struct FnCtx {
    pub self_class: Option<String>,
    scopes: Vec<HashMap<String, Option<String>>>,
    /// Inside a union-switch arm: (scrutinee variable, bound fields).
    pub union_subst: Option<(String, Vec<String>)>,
}

impl FnCtx {
    pub fn new(self_class: Option<String>) -> Self {
        Self {
            self_class,
            scopes: vec![HashMap::new()],
            union_subst: None,
        }
    }

    pub fn declare(&mut self, name: &str, type_head: Option<String>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), type_head);
        }
    }

    pub fn type_head_of(&self, name: &str) -> Option<&str> {
        for scope in self.scopes.iter().rev() {
            if let Some(head) = scope.get(name) {
                return head.as_deref();
            }
        }
        None
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains_key(name))
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }
}

impl<'p> Lowering<'p> {
    pub(super) fn lower_block(
        &mut self,
        ctx: &mut FnCtx,
        block: &Block,
    ) -> CompileResult<Vec<RStmt>> {
        ctx.push_scope();
        let mut out = Vec::new();
        for stmt in &block.stmts {
            out.extend(self.lower_stmt(ctx, stmt)?);
        }
        ctx.pop_scope();
        Ok(out)
    }

    fn lower_stmts(&mut self, ctx: &mut FnCtx, stmts: &[Stmt]) -> CompileResult<Vec<RStmt>> {
        ctx.push_scope();
        let mut out = Vec::new();
        for stmt in stmts {
            out.extend(self.lower_stmt(ctx, stmt)?);
        }
        ctx.pop_scope();
        Ok(out)
    }

    pub(super) fn lower_stmt(
        &mut self,
        ctx: &mut FnCtx,
        stmt: &Stmt,
    ) -> CompileResult<Vec<RStmt>> {
        match stmt {
            Stmt::VarDecl(decl) => self.lower_var_decl(ctx, decl).map(|s| vec![s]),
            Stmt::Expr { expr, span } => self.lower_expr_stmt(ctx, expr, span).map(|s| vec![s]),
            Stmt::Return { value, span } => {
                let lowered = match value {
                    Some(value) => Some(self.lower_expr(ctx, value, None)?),
                    None => None,
                };
                Ok(vec![RStmt::with_span(
                    StmtKind::Return(lowered),
                    span.clone(),
                )])
            }
            Stmt::If {
                cond,
                then_block,
                else_branch,
                span,
            } => {
                let cond = self.lower_expr(ctx, cond, None)?;
                let then_stmts = self.lower_block(ctx, then_block)?;
                let else_stmts = match else_branch.as_deref() {
                    None => None,
                    Some(ElseBranch::Else(block)) => Some(self.lower_block(ctx, block)?),
                    Some(ElseBranch::ElseIf(nested)) => Some(self.lower_stmt(ctx, nested)?),
                };
                Ok(vec![RStmt::with_span(
                    StmtKind::If {
                        cond,
                        then_stmts,
                        else_stmts,
                    },
                    span.clone(),
                )])
            }
            Stmt::While { cond, body, span } => {
                let cond = self.lower_expr(ctx, cond, None)?;
                let body = self.lower_block(ctx, body)?;
                Ok(vec![RStmt::with_span(
                    StmtKind::While { cond, body },
                    span.clone(),
                )])
            }
            Stmt::For(for_stmt) => self.lower_for(ctx, for_stmt).map(|s| vec![s]),
            Stmt::ForOf(for_of) => Err(self.for_of_error(for_of)),
            Stmt::Switch(switch) => self.lower_switch(ctx, switch).map(|s| vec![s]),
            Stmt::Break { span } => Ok(vec![RStmt::with_span(StmtKind::Break, span.clone())]),
            Stmt::Continue { span } => {
                Ok(vec![RStmt::with_span(StmtKind::Continue, span.clone())])
            }
            Stmt::Block(block) => {
                let body = self.lower_block(ctx, block)?;
                Ok(vec![RStmt::with_span(
                    StmtKind::Block(body),
                    block.span.clone(),
                )])
            }
        }
    }

    fn lower_var_decl(
        &mut self,
        ctx: &mut FnCtx,
        decl: &lode_ast::VarDecl,
    ) -> CompileResult<RStmt> {
        if decl.kind == VarKind::Var {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_STATEMENT,
                "`var` declarations are not supported",
                decl.span.clone(),
            ));
        }
        let Some(init) = &decl.init else {
            return Err(CompileError::with_span(
                codes::UNINITIALIZED_LOCAL,
                format!("local `{}` must be initialized", decl.name),
                decl.span.clone(),
            ));
        };

        let (ty, mutable, expected) = match &decl.ty {
            Some(annotation) => {
                let scoped = self.type_ctx.clone();
                let lowered = lower_annotation(&scoped, annotation)?;
                let expected = lowered.ty.head().map(str::to_string);
                (Some(lowered.ty), lowered.mutable, expected)
            }
            None => (None, false, None),
        };

        let value = self.lower_expr(ctx, init, expected.as_deref())?;
        let type_head = expected.or_else(|| self.infer_head(ctx, init));
        ctx.declare(&decl.name, type_head);

        Ok(RStmt::with_span(
            StmtKind::Let {
                name: decl.name.clone(),
                mutable,
                ty,
                init: Some(value),
            },
            decl.span.clone(),
        ))
    }

    /// Best-effort nominal head of an initializer, for later union-switch
    /// and method-call resolution.
    fn infer_head(&self, ctx: &FnCtx, init: &Expr) -> Option<String> {
        match init.unparen() {
            Expr::New { callee, .. } => Some(callee.clone()),
            Expr::Ident { name, .. } => ctx.type_head_of(name).map(str::to_string),
            Expr::Cast { ty, .. } => match ty {
                lode_ast::TypeExpr::Named { name, .. } => Some(name.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    fn lower_expr_stmt(
        &mut self,
        ctx: &mut FnCtx,
        expr: &Expr,
        span: &Span,
    ) -> CompileResult<RStmt> {
        match expr.unparen() {
            Expr::Assign { op, target, value, .. } => {
                let target_lowered = self.lower_expr(ctx, target, None)?;
                let value_expected = self.infer_head(ctx, target.unparen());
                let value_lowered =
                    self.lower_expr(ctx, value, value_expected.as_deref())?;
                let value_final = match op {
                    AssignOp::Assign => value_lowered,
                    compound => {
                        let bin_op = match compound {
                            AssignOp::Add => BinOp::Add,
                            AssignOp::Sub => BinOp::Sub,
                            AssignOp::Mul => BinOp::Mul,
                            AssignOp::Div => BinOp::Div,
                            _ => BinOp::Rem,
                        };
                        RExpr::new(ExprKind::Binary {
                            op: bin_op,
                            left: Box::new(target_lowered.clone()),
                            right: Box::new(value_lowered),
                        })
                    }
                };
                Ok(RStmt::with_span(
                    StmtKind::Assign {
                        target: target_lowered,
                        value: value_final,
                    },
                    span.clone(),
                ))
            }
            Expr::Update { target, increment, .. } => {
                let target_lowered = self.lower_expr(ctx, target, None)?;
                let op = if *increment { BinOp::Add } else { BinOp::Sub };
                Ok(RStmt::with_span(
                    StmtKind::Assign {
                        target: target_lowered.clone(),
                        value: RExpr::new(ExprKind::Binary {
                            op,
                            left: Box::new(target_lowered),
                            right: Box::new(RExpr::int("1")),
                        }),
                    },
                    span.clone(),
                ))
            }
            _ => {
                let lowered = self.lower_expr(ctx, expr, None)?;
                Ok(RStmt::with_span(StmtKind::Expr(lowered), span.clone()))
            }
        }
    }

    /// `for (let i = …; cond; step) { … }` desugars to a block holding a
    /// mutable binding and a `while` loop with the step appended.
    fn lower_for(&mut self, ctx: &mut FnCtx, for_stmt: &ForStmt) -> CompileResult<RStmt> {
        ctx.push_scope();

        let mut prologue = Vec::new();
        if let Some(init) = &for_stmt.init {
            match init.as_ref() {
                Stmt::VarDecl(decl) => {
                    if decl.kind == VarKind::Var {
                        ctx.pop_scope();
                        return Err(CompileError::with_span(
                            codes::FOR_VAR_REJECTED,
                            "`for (var …)` is not supported; use `let`",
                            decl.span.clone(),
                        ));
                    }
                    let mut lowered = self.lower_var_decl(ctx, decl)?;
                    // The loop variable is updated by the step.
                    if let StmtKind::Let { mutable, .. } = &mut lowered.kind {
                        *mutable = true;
                    }
                    prologue.push(lowered);
                }
                other => prologue.extend(self.lower_stmt(ctx, other)?),
            }
        }

        let cond = match &for_stmt.cond {
            Some(cond) => self.lower_expr(ctx, cond, None)?,
            None => RExpr::new(ExprKind::Lit(lode_rir::Lit::Bool(true))),
        };

        let mut body = self.lower_block(ctx, &for_stmt.body)?;
        if let Some(update) = &for_stmt.update {
            body.push(self.lower_expr_stmt(ctx, update, update.span())?);
        }

        ctx.pop_scope();

        prologue.push(RStmt::new(StmtKind::While { cond, body }));
        Ok(RStmt::with_span(
            StmtKind::Block(prologue),
            for_stmt.span.clone(),
        ))
    }

    fn for_of_error(&self, for_of: &ForOfStmt) -> CompileError {
        CompileError::with_span(
            codes::FOR_OF_REJECTED,
            "`for…of` loops are not supported",
            for_of.span.clone(),
        )
    }

    // ==================== Switch ====================

    fn lower_switch(&mut self, ctx: &mut FnCtx, switch: &SwitchStmt) -> CompileResult<RStmt> {
        // A switch over `<var>.kind` where the variable's declared type is
        // a union alias lowers to a `match`; everything else is a scalar
        // switch.
        if let Expr::Member { object, property, .. } = switch.scrutinee.unparen() {
            if property == "kind" {
                if let Expr::Ident { name, .. } = object.unparen() {
                    if let Some(union) = ctx
                        .type_head_of(name)
                        .and_then(|head| self.unions.get(head))
                        .cloned()
                    {
                        let var = name.clone();
                        return self.lower_union_switch(ctx, switch, &var, &union);
                    }
                }
            }
        }
        self.lower_scalar_switch(ctx, switch)
    }

    fn lower_union_switch(
        &mut self,
        ctx: &mut FnCtx,
        switch: &SwitchStmt,
        scrutinee_var: &str,
        union: &UnionInfo,
    ) -> CompileResult<RStmt> {
        if let Some(default) = &switch.default {
            return Err(CompileError::with_span(
                codes::UNION_SWITCH_DEFAULT,
                "`default` is not allowed when switching on a union discriminant",
                default.span.clone(),
            ));
        }

        let mut seen: Vec<String> = Vec::new();
        let mut arms = Vec::new();
        for case in &switch.cases {
            let Expr::StringLit { value: kind, .. } = case.label.unparen() else {
                return Err(CompileError::with_span(
                    codes::UNION_SWITCH_NON_LITERAL_CASE,
                    "union-switch cases must be string literals",
                    case.label.span().clone(),
                ));
            };
            if seen.contains(kind) {
                return Err(CompileError::with_span(
                    codes::UNION_SWITCH_DUPLICATE_CASE,
                    format!("duplicate case `{kind}`"),
                    case.span.clone(),
                ));
            }
            seen.push(kind.clone());

            let Some(variant) = union.variant_for_kind(kind) else {
                return Err(CompileError::with_span(
                    codes::UNION_SWITCH_UNKNOWN_KIND,
                    format!("`{kind}` is not a variant of `{}`", union.name),
                    case.label.span().clone(),
                ));
            };
            if case.body.is_empty() {
                return Err(CompileError::with_span(
                    codes::UNION_SWITCH_FALLTHROUGH,
                    "union-switch cases cannot fall through",
                    case.span.clone(),
                ));
            }

            let fields: Vec<String> = variant.fields.iter().map(|(n, _)| n.clone()).collect();
            let previous = ctx.union_subst.replace((
                scrutinee_var.to_string(),
                fields.clone(),
            ));
            let body = self.lower_case_body(ctx, &case.body)?;
            ctx.union_subst = previous;

            arms.push(MatchArm {
                pattern: Pattern::Struct {
                    path: vec![union.name.clone(), variant.variant.clone()],
                    fields,
                },
                body,
            });
        }

        Ok(RStmt::with_span(
            StmtKind::Match {
                scrutinee: RExpr::path(scrutinee_var),
                arms,
            },
            switch.span.clone(),
        ))
    }

    /// Scalar switches compare labels lazily against a fresh scrutinee
    /// binding, in source order.
    fn lower_scalar_switch(
        &mut self,
        ctx: &mut FnCtx,
        switch: &SwitchStmt,
    ) -> CompileResult<RStmt> {
        let mut literal_labels: Vec<String> = Vec::new();
        for case in &switch.cases {
            let key = match case.label.unparen() {
                Expr::StringLit { value, .. } => Some(format!("s:{value}")),
                Expr::NumberLit { raw, .. } => Some(format!("n:{raw}")),
                Expr::BoolLit { value, .. } => Some(format!("b:{value}")),
                _ => None,
            };
            if let Some(key) = key {
                if literal_labels.contains(&key) {
                    return Err(CompileError::with_span(
                        codes::SWITCH_DUPLICATE_LABEL,
                        "duplicate switch label",
                        case.label.span().clone(),
                    ));
                }
                literal_labels.push(key);
            }
        }

        let scrutinee = self.lower_expr(ctx, &switch.scrutinee, None)?;
        let binding = "__scrutinee".to_string();

        let mut chain: Option<Vec<RStmt>> = match &switch.default {
            Some(default) => Some(self.lower_case_body(ctx, &default.body)?),
            None => None,
        };

        for case in switch.cases.iter().rev() {
            let label = self.lower_expr(ctx, &case.label, None)?;
            let body = self.lower_case_body(ctx, &case.body)?;
            let cond = RExpr::new(ExprKind::Binary {
                op: BinOp::Eq,
                left: Box::new(RExpr::path(&binding)),
                right: Box::new(label),
            });
            chain = Some(vec![RStmt::new(StmtKind::If {
                cond,
                then_stmts: body,
                else_stmts: chain,
            })]);
        }

        let mut block = vec![RStmt::new(StmtKind::Let {
            name: binding,
            mutable: false,
            ty: None,
            init: Some(scrutinee),
        })];
        block.extend(chain.unwrap_or_default());

        Ok(RStmt::with_span(
            StmtKind::Block(block),
            switch.span.clone(),
        ))
    }

    /// Case bodies drop one trailing `break;` (leaving the switch) and
    /// lower the rest normally.
    fn lower_case_body(&mut self, ctx: &mut FnCtx, body: &[Stmt]) -> CompileResult<Vec<RStmt>> {
        let trimmed = match body.last() {
            Some(Stmt::Break { .. }) => &body[..body.len() - 1],
            _ => body,
        };
        self.lower_stmts(ctx, trimmed)
    }
}
