//! Declaration lowering: type aliases (including discriminated unions),
//! interfaces, classes, functions, and annotation statements.

use lode_ast::{
    Class, Expr, Function, Interface, InterfaceMember, Param, TemplatePart, TypeAlias, TypeExpr,
};
use lode_diagnostics::{CompileError, CompileResult, Span};
use lode_rir::{
    EnumItem, EnumVariant, Expr as RExpr, ExprKind, FnItem, GenericParam, ImplItem,
    Item as RItem, Receiver, Stmt as RStmt, StmtKind, StructItem, TraitItem, Type,
    TypeAliasItem, Visibility,
};

use super::statements::FnCtx;
use super::{pascal_case, Lowering, ParamMode, TraitMembers, UnionInfo, VariantInfo};
use crate::codes;
use crate::orchestrator::RuntimeKind;
use crate::type_lowering::{lower_annotation, lower_constraint, lower_type, TypeCtx};

impl<'p> Lowering<'p> {
    // ==================== Collect details ====================

    pub(super) fn collect_alias_details(&mut self, alias: &TypeAlias) -> CompileResult<()> {
        let TypeExpr::Union { members, .. } = &alias.body else {
            return Ok(());
        };

        let ctx = self.scoped_ctx(&alias.type_params);
        let mut variants: Vec<VariantInfo> = Vec::new();
        for member in members {
            let TypeExpr::Object { fields, span } = member else {
                return Err(CompileError::with_span(
                    codes::UNION_SHAPE,
                    "union members must be object types with a `kind` discriminant",
                    member.span().clone(),
                ));
            };
            let mut kind = None;
            let mut data_fields = Vec::new();
            for field in fields {
                if field.optional {
                    return Err(CompileError::with_span(
                        codes::UNION_SHAPE,
                        "union member fields cannot be optional",
                        field.span.clone(),
                    ));
                }
                if field.name == "kind" {
                    let TypeExpr::StringLit { value, .. } = &field.ty else {
                        return Err(CompileError::with_span(
                            codes::UNION_SHAPE,
                            "`kind` must be a string-literal type",
                            field.ty.span().clone(),
                        ));
                    };
                    kind = Some(value.clone());
                } else {
                    data_fields.push((field.name.clone(), lower_type(&ctx, &field.ty)?));
                }
            }
            let Some(kind) = kind else {
                return Err(CompileError::with_span(
                    codes::UNION_SHAPE,
                    "union members need a `kind` discriminant",
                    span.clone(),
                ));
            };
            if variants.iter().any(|v| v.kind == kind) {
                return Err(CompileError::with_span(
                    codes::UNION_DUPLICATE_KIND,
                    format!("duplicate union kind `{kind}`"),
                    span.clone(),
                ));
            }
            variants.push(VariantInfo {
                variant: pascal_case(&kind),
                kind,
                fields: data_fields,
            });
        }

        self.unions.insert(
            alias.name.clone(),
            UnionInfo {
                name: alias.name.clone(),
                variants,
            },
        );
        Ok(())
    }

    pub(super) fn collect_interface_details(&mut self, iface: &Interface) {
        let mut members = TraitMembers::default();
        for member in &iface.members {
            if let InterfaceMember::Method { name, .. } = member {
                members.methods.insert(name.clone());
            }
        }
        self.interface_members.insert(iface.name.clone(), members);
    }

    pub(super) fn collect_class_details(&mut self, class: &Class) -> CompileResult<()> {
        let Some(name) = &class.name else {
            return Ok(());
        };
        let mut info = super::ClassInfo {
            field_names: class.fields.iter().map(|f| f.name.clone()).collect(),
            ctor_modes: None,
            methods: Default::default(),
        };
        if let Some(ctor) = &class.constructor {
            info.ctor_modes = Some(param_modes(&ctor.params));
        }
        for method in &class.methods {
            if let Some(mname) = &method.function.name {
                info.methods
                    .insert(mname.clone(), param_modes(&method.function.params));
            }
        }
        self.classes.insert(name.clone(), info);
        Ok(())
    }

    // ==================== Type aliases ====================

    pub(super) fn scoped_ctx(&self, type_params: &[lode_ast::TypeParam]) -> TypeCtx {
        let mut ctx = self.type_ctx.clone();
        for param in type_params {
            ctx.generics.insert(param.name.clone());
        }
        ctx
    }

    fn lower_generics(
        &self,
        ctx: &TypeCtx,
        type_params: &[lode_ast::TypeParam],
        reject_defaults: Option<&'static str>,
    ) -> CompileResult<Vec<GenericParam>> {
        let mut out = Vec::new();
        for param in type_params {
            if let (Some(code), Some(_)) = (reject_defaults, &param.default) {
                return Err(CompileError::with_span(
                    code,
                    "generic parameter defaults are not supported",
                    param.span.clone(),
                ));
            }
            let bounds = match &param.constraint {
                Some(constraint) => lower_constraint(ctx, constraint)?,
                None => Vec::new(),
            };
            out.push(GenericParam {
                name: param.name.clone(),
                bounds,
            });
        }
        Ok(out)
    }

    pub(super) fn lower_type_alias(
        &mut self,
        _rel: &str,
        alias: &TypeAlias,
    ) -> CompileResult<Vec<RItem>> {
        let ctx = self.scoped_ctx(&alias.type_params);
        let generics =
            self.lower_generics(&ctx, &alias.type_params, None)?;

        if let Some(union) = self.unions.get(&alias.name).cloned() {
            let variants = union
                .variants
                .iter()
                .map(|v| EnumVariant {
                    name: v.variant.clone(),
                    fields: v.fields.clone(),
                })
                .collect();
            return Ok(vec![RItem::Enum(EnumItem {
                vis: Visibility::Pub,
                name: alias.name.clone(),
                attrs: self.attrs_for(&alias.name),
                generics,
                variants,
                span: Some(alias.span.clone()),
            })]);
        }

        let ty = lower_type(&ctx, &alias.body)?;
        Ok(vec![RItem::TypeAlias(TypeAliasItem {
            vis: Visibility::Pub,
            name: alias.name.clone(),
            generics,
            ty,
            span: Some(alias.span.clone()),
        })])
    }

    // ==================== Interfaces ====================

    pub(super) fn lower_interface(
        &mut self,
        _rel: &str,
        iface: &Interface,
    ) -> CompileResult<TraitItem> {
        let ctx = self.scoped_ctx(&iface.type_params);
        let generics = self.lower_generics(
            &ctx,
            &iface.type_params,
            Some(codes::TRAIT_GENERIC_DEFAULT),
        )?;

        for supertrait in &iface.extends {
            if !self.type_ctx.interfaces.contains(supertrait) {
                return Err(CompileError::with_span(
                    codes::UNKNOWN_INTERFACE,
                    format!("`{supertrait}` is not a declared interface"),
                    iface.span.clone(),
                ));
            }
        }

        let mut methods = Vec::new();
        for member in &iface.members {
            match member {
                InterfaceMember::Property { optional, span, name, .. } => {
                    let what = if *optional {
                        "optional interface members"
                    } else {
                        "interface property members"
                    };
                    return Err(CompileError::with_span(
                        codes::TRAIT_OPTIONAL_MEMBER,
                        format!("{what} are not supported (`{name}`)"),
                        span.clone(),
                    ));
                }
                InterfaceMember::Method {
                    name,
                    optional,
                    params,
                    return_type,
                    span,
                } => {
                    if *optional {
                        return Err(CompileError::with_span(
                            codes::TRAIT_OPTIONAL_MEMBER,
                            format!("optional interface members are not supported (`{name}`)"),
                            span.clone(),
                        ));
                    }
                    let (receiver, rest) = self.split_this_param(params, span)?;
                    let mut lowered_params = Vec::new();
                    for param in rest {
                        if param.optional || param.default.is_some() {
                            return Err(CompileError::with_span(
                                codes::TRAIT_OPTIONAL_METHOD_PARAM,
                                "optional method parameters are not supported",
                                param.span.clone(),
                            ));
                        }
                        lowered_params.push(self.lower_param(&ctx, param)?);
                    }
                    let ret = match return_type {
                        Some(ty) => lower_type(&ctx, ty)?,
                        None => Type::Unit,
                    };
                    methods.push(FnItem {
                        vis: Visibility::Private,
                        name: name.clone(),
                        attrs: vec![],
                        generics: vec![],
                        receiver,
                        is_async: false,
                        params: lowered_params,
                        ret,
                        body: None,
                        span: Some(span.clone()),
                    });
                }
            }
        }

        Ok(TraitItem {
            vis: Visibility::Pub,
            name: iface.name.clone(),
            attrs: self.attrs_for(&iface.name),
            generics,
            supertraits: iface.extends.clone(),
            methods,
            span: Some(iface.span.clone()),
        })
    }

    /// Split off the `this` receiver parameter. Accepts
    /// `this: ref<Self>` / `this: mutref<Self>` (or the interface's own
    /// name, or `this`, in the reference position).
    fn split_this_param<'a>(
        &self,
        params: &'a [Param],
        span: &Span,
    ) -> CompileResult<(Receiver, &'a [Param])> {
        let Some(first) = params.first() else {
            return Err(CompileError::with_span(
                codes::METHOD_THIS_TYPE,
                "methods need an explicit `this: ref<Self>` or `this: mutref<Self>` parameter",
                span.clone(),
            ));
        };
        if first.name() != Some("this") {
            return Err(CompileError::with_span(
                codes::METHOD_THIS_TYPE,
                "the first method parameter must be `this`",
                first.span.clone(),
            ));
        }
        let Some(TypeExpr::Named { name, args, .. }) = &first.ty else {
            return Err(CompileError::with_span(
                codes::METHOD_THIS_TYPE,
                "`this` needs a `ref<Self>` or `mutref<Self>` annotation",
                first.span.clone(),
            ));
        };
        let mutable = match name.as_str() {
            "ref" => false,
            "mutref" => true,
            _ => {
                return Err(CompileError::with_span(
                    codes::METHOD_THIS_TYPE,
                    "`this` must be typed `ref<...>` or `mutref<...>`",
                    first.span.clone(),
                ))
            }
        };
        if args.len() != 1 {
            return Err(CompileError::with_span(
                codes::METHOD_THIS_TYPE,
                "`this` reference takes exactly one type argument",
                first.span.clone(),
            ));
        }
        Ok((
            Receiver::RefSelf {
                mutable,
                lifetime: None,
            },
            &params[1..],
        ))
    }

    fn lower_param(&self, ctx: &TypeCtx, param: &Param) -> CompileResult<(String, Type)> {
        let Some(name) = param.name() else {
            return Err(CompileError::with_span(
                codes::DESTRUCTURED_PARAM,
                "destructured parameters are not supported",
                param.span.clone(),
            ));
        };
        let Some(ty) = &param.ty else {
            return Err(CompileError::with_span(
                codes::MISSING_TYPE_ANNOTATION,
                format!("parameter `{name}` needs a type annotation"),
                param.span.clone(),
            ));
        };
        let lowered = lower_annotation(ctx, ty)?;
        Ok((name.to_string(), lowered.ty))
    }

    // ==================== Classes ====================

    pub(super) fn lower_class(&mut self, _rel: &str, class: &Class) -> CompileResult<Vec<RItem>> {
        let Some(name) = class.name.clone() else {
            return Err(CompileError::with_span(
                codes::ANONYMOUS_CLASS,
                "classes must be named",
                class.span.clone(),
            ));
        };
        let ctx = self.type_ctx.clone();

        let mut fields = Vec::new();
        for field in &class.fields {
            if field.optional {
                return Err(CompileError::with_span(
                    codes::MISSING_FIELD_TYPE,
                    format!("optional fields are not supported (`{}`)", field.name),
                    field.span.clone(),
                ));
            }
            let Some(ty) = &field.ty else {
                return Err(CompileError::with_span(
                    codes::MISSING_FIELD_TYPE,
                    format!("field `{}` needs a type annotation", field.name),
                    field.span.clone(),
                ));
            };
            fields.push((field.name.clone(), lower_type(&ctx, ty)?));
        }

        let mut out = Vec::new();
        out.push(RItem::Struct(StructItem {
            vis: Visibility::Pub,
            name: name.clone(),
            attrs: self.attrs_for(&name),
            generics: vec![],
            fields,
            span: Some(class.span.clone()),
        }));

        for implemented in &class.implements {
            if !self.type_ctx.interfaces.contains(implemented) {
                return Err(CompileError::with_span(
                    codes::UNKNOWN_INTERFACE,
                    format!("`{implemented}` is not a declared interface"),
                    class.span.clone(),
                ));
            }
        }

        // Inherent impl: constructor first, then methods that are not
        // required by an implemented interface.
        let mut inherent = Vec::new();
        if let Some(ctor) = &class.constructor {
            inherent.push(self.lower_constructor(&name, class, ctor)?);
        }

        // Which implemented interface (if any) requires each method name;
        // resolved up front so lowering below can borrow freely.
        let mut method_homes: std::collections::BTreeMap<String, String> = Default::default();
        for iface in &class.implements {
            if let Some(members) = self.interface_members.get(iface) {
                for method_name in &members.methods {
                    method_homes
                        .entry(method_name.clone())
                        .or_insert_with(|| iface.clone());
                }
            }
        }

        let mut per_trait: Vec<(String, Vec<FnItem>)> = class
            .implements
            .iter()
            .map(|i| (i.clone(), Vec::new()))
            .collect();

        for method in &class.methods {
            if method.is_static {
                return Err(CompileError::with_span(
                    codes::STATIC_METHOD,
                    "static methods are not supported",
                    method.span.clone(),
                ));
            }
            let lowered = self.lower_method(&name, &method.function)?;
            let target = method
                .function
                .name
                .as_deref()
                .and_then(|n| method_homes.get(n).cloned());
            match target {
                Some(iface) => {
                    if let Some((_, bucket)) =
                        per_trait.iter_mut().find(|(i, _)| *i == iface)
                    {
                        bucket.push(lowered);
                    }
                }
                None => inherent.push(lowered),
            }
        }

        if !inherent.is_empty() {
            out.push(RItem::Impl(ImplItem {
                trait_path: None,
                ty: Type::path(&name),
                fns: inherent,
                span: Some(class.span.clone()),
            }));
        }
        for (iface, fns) in per_trait {
            out.push(RItem::Impl(ImplItem {
                trait_path: Some(vec![iface]),
                ty: Type::path(&name),
                fns,
                span: Some(class.span.clone()),
            }));
        }

        Ok(out)
    }

    fn lower_constructor(
        &mut self,
        class_name: &str,
        class: &Class,
        ctor: &lode_ast::Constructor,
    ) -> CompileResult<FnItem> {
        let ctx = self.type_ctx.clone();
        let mut params = Vec::new();
        for param in &ctor.params {
            if param.optional || param.default.is_some() {
                return Err(CompileError::with_span(
                    codes::CONSTRUCTOR_OPTIONAL_PARAM,
                    "constructor parameters cannot be optional or defaulted",
                    param.span.clone(),
                ));
            }
            params.push(self.lower_param(&ctx, param)?);
        }

        // The body must assign every field exactly once, from `this`.
        let mut ctx_fn = FnCtx::new(Some(class_name.to_string()));
        for (pname, pty) in &params {
            ctx_fn.declare(pname, pty.head().map(str::to_string));
        }

        let mut field_inits: Vec<(String, RExpr)> = Vec::new();
        for stmt in &ctor.body.stmts {
            let lode_ast::Stmt::Expr { expr, span } = stmt else {
                return Err(CompileError::with_span(
                    codes::UNSUPPORTED_STATEMENT,
                    "constructor bodies may only assign fields",
                    stmt.span().clone(),
                ));
            };
            let Expr::Assign { op, target, value, .. } = expr.unparen() else {
                return Err(CompileError::with_span(
                    codes::UNSUPPORTED_STATEMENT,
                    "constructor bodies may only assign fields",
                    span.clone(),
                ));
            };
            let (lode_ast::AssignOp::Assign, Expr::Member { object, property, .. }) =
                (op, target.unparen())
            else {
                return Err(CompileError::with_span(
                    codes::UNSUPPORTED_STATEMENT,
                    "constructor bodies may only assign fields",
                    span.clone(),
                ));
            };
            if !matches!(object.unparen(), Expr::This { .. }) {
                return Err(CompileError::with_span(
                    codes::UNSUPPORTED_STATEMENT,
                    "constructor assignments must target `this`",
                    span.clone(),
                ));
            }
            if field_inits.iter().any(|(f, _)| f == property) {
                return Err(CompileError::with_span(
                    codes::MISSING_FIELD_TYPE,
                    format!("field `{property}` is assigned twice in the constructor"),
                    span.clone(),
                ));
            }
            let lowered = self.lower_expr(&mut ctx_fn, value, None)?;
            field_inits.push((property.clone(), lowered));
        }

        for field in &class.fields {
            if !field_inits.iter().any(|(f, _)| f == &field.name) {
                return Err(CompileError::with_span(
                    codes::MISSING_FIELD_TYPE,
                    format!("constructor does not assign field `{}`", field.name),
                    ctor.span.clone(),
                ));
            }
        }

        let body = vec![RStmt::with_span(
            StmtKind::Return(Some(RExpr::new(ExprKind::StructLit {
                path: vec!["Self".to_string()],
                fields: field_inits,
            }))),
            ctor.span.clone(),
        )];

        Ok(FnItem {
            vis: Visibility::Pub,
            name: "new".to_string(),
            attrs: vec![],
            generics: vec![],
            receiver: Receiver::None,
            is_async: false,
            params,
            ret: Type::path("Self"),
            body: Some(body),
            span: Some(ctor.span.clone()),
        })
    }

    fn lower_method(
        &mut self,
        class_name: &str,
        func: &Function,
    ) -> CompileResult<FnItem> {
        let Some(name) = func.name.clone() else {
            return Err(CompileError::with_span(
                codes::UNNAMED_FUNCTION,
                "methods must be named",
                func.span.clone(),
            ));
        };
        let (receiver, rest) = self.split_this_param(&func.params, &func.span)?;

        let ctx = self.type_ctx.clone();
        let mut params = Vec::new();
        for param in rest {
            if param.optional || param.default.is_some() {
                return Err(CompileError::with_span(
                    codes::OPTIONAL_METHOD_PARAM,
                    "optional method parameters are not supported",
                    param.span.clone(),
                ));
            }
            params.push(self.lower_param(&ctx, param)?);
        }

        let ret = self.lower_return_type(&ctx, func)?;

        let mut ctx_fn = FnCtx::new(Some(class_name.to_string()));
        for (pname, pty) in &params {
            ctx_fn.declare(pname, pty.head().map(str::to_string));
        }
        let Some(body_ast) = &func.body else {
            return Err(CompileError::with_span(
                codes::MISSING_BODY,
                format!("method `{name}` needs a body"),
                func.span.clone(),
            ));
        };
        let body = self.lower_block(&mut ctx_fn, body_ast)?;

        Ok(FnItem {
            vis: Visibility::Private,
            name,
            attrs: vec![],
            generics: vec![],
            receiver,
            is_async: func.is_async,
            params,
            ret,
            body: Some(body),
            span: Some(func.span.clone()),
        })
    }

    // ==================== Functions ====================

    fn lower_return_type(&self, ctx: &TypeCtx, func: &Function) -> CompileResult<Type> {
        match &func.return_type {
            None => Ok(Type::Unit),
            Some(TypeExpr::Named { name, args, span }) if name == "Promise" => {
                if !func.is_async {
                    return Err(CompileError::with_span(
                        codes::UNSUPPORTED_TYPE,
                        "`Promise<T>` is only valid on async functions",
                        span.clone(),
                    ));
                }
                let [inner] = args.as_slice() else {
                    return Err(CompileError::with_span(
                        codes::UNSUPPORTED_TYPE,
                        "`Promise<T>` takes exactly one type argument",
                        span.clone(),
                    ));
                };
                lower_type(ctx, inner)
            }
            Some(other) => {
                if func.is_async {
                    return Err(CompileError::with_span(
                        codes::UNSUPPORTED_TYPE,
                        "async functions must return `Promise<T>`",
                        other.span().clone(),
                    ));
                }
                lower_type(ctx, other)
            }
        }
    }

    pub(super) fn lower_function(&mut self, _rel: &str, func: &Function) -> CompileResult<FnItem> {
        let Some(name) = func.name.clone() else {
            return Err(CompileError::with_span(
                codes::UNNAMED_FUNCTION,
                "top-level functions must be named",
                func.span.clone(),
            ));
        };
        if !func.type_params.is_empty() {
            return Err(CompileError::with_span(
                codes::GENERIC_FUNCTION,
                format!("generic function declarations are not supported (`{name}`)"),
                func.span.clone(),
            ));
        }
        let Some(body_ast) = &func.body else {
            return Err(CompileError::with_span(
                codes::MISSING_BODY,
                format!("function `{name}` needs a body"),
                func.span.clone(),
            ));
        };

        let ctx = self.type_ctx.clone();
        let mut params = Vec::new();
        for param in &func.params {
            if param.name() == Some("this") {
                return Err(CompileError::with_span(
                    codes::METHOD_THIS_TYPE,
                    "free functions cannot take `this`",
                    param.span.clone(),
                ));
            }
            if param.optional || param.default.is_some() {
                return Err(CompileError::with_span(
                    codes::OPTIONAL_OR_DEFAULT_PARAM,
                    "optional and defaulted parameters are not supported",
                    param.span.clone(),
                ));
            }
            params.push(self.lower_param(&ctx, param)?);
        }

        let ret = self.lower_return_type(&ctx, func)?;

        let mut ctx_fn = FnCtx::new(None);
        for (pname, pty) in &params {
            ctx_fn.declare(pname, pty.head().map(str::to_string));
        }
        let body = self.lower_block(&mut ctx_fn, body_ast)?;

        Ok(FnItem {
            vis: if func.is_exported {
                Visibility::Pub
            } else {
                Visibility::Private
            },
            name: name.clone(),
            attrs: self.attrs_for(&name),
            generics: vec![],
            receiver: Receiver::None,
            is_async: func.is_async,
            params,
            ret,
            body: Some(body),
            span: Some(func.span.clone()),
        })
    }

    pub(super) fn lower_main(&mut self, rel: &str, func: &Function) -> CompileResult<FnItem> {
        if !func.is_exported {
            return Err(CompileError::with_span(
                codes::MISSING_MAIN,
                "`main` must be exported",
                func.span.clone(),
            ));
        }
        if !func.params.is_empty() {
            return Err(CompileError::with_span(
                codes::MAIN_SIGNATURE,
                "`main` takes no parameters",
                func.span.clone(),
            ));
        }

        let mut lowered = self.lower_function(rel, func)?;
        lowered.vis = Visibility::Private;

        match &lowered.ret {
            Type::Unit => {}
            Type::Path { segments, .. }
                if segments.join("::") == "std::result::Result" => {}
            other => {
                return Err(CompileError::with_span(
                    codes::MAIN_SIGNATURE,
                    format!("`main` must return `void` or `Result<void, E>`, found `{other}`"),
                    func.span.clone(),
                ))
            }
        }

        if func.is_async {
            match self.runtime {
                RuntimeKind::Tokio => lowered.attrs.push("#[tokio::main]".to_string()),
                RuntimeKind::None => {
                    return Err(CompileError::with_span(
                        codes::MAIN_SIGNATURE,
                        "async `main` requires a runtime policy",
                        func.span.clone(),
                    ))
                }
            }
        }

        Ok(lowered)
    }

    // ==================== Annotations ====================

    pub(super) fn lower_annotation_stmt(
        &mut self,
        _rel: &str,
        expr: &Expr,
        span: &Span,
    ) -> CompileResult<()> {
        let Expr::Call { callee, args, .. } = expr.unparen() else {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_TOP_LEVEL,
                "statement is not allowed at the top level",
                span.clone(),
            ));
        };
        if !matches!(callee.unparen(), Expr::Ident { name, .. } if name == "annotate") {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_TOP_LEVEL,
                "statement is not allowed at the top level",
                span.clone(),
            ));
        }

        let [target, attr_call] = args.as_slice() else {
            return Err(CompileError::with_span(
                codes::ANNOTATION_SHAPE,
                "`annotate(target, attr(...))` takes exactly two arguments",
                span.clone(),
            ));
        };
        let Expr::Ident { name: target_name, span: target_span } = target.unparen() else {
            return Err(CompileError::with_span(
                codes::ANNOTATION_SHAPE,
                "annotation target must be an identifier",
                target.span().clone(),
            ));
        };
        if !self.type_ctx.nominals.contains(target_name)
            && !self.type_ctx.interfaces.contains(target_name)
            && !self.fn_sigs.contains_key(target_name)
        {
            return Err(CompileError::with_span(
                codes::ANNOTATION_TARGET,
                format!("annotation target `{target_name}` is not declared in this project"),
                target_span.clone(),
            ));
        }

        let Expr::Call { callee: attr_callee, args: attr_args, .. } = attr_call.unparen()
        else {
            return Err(CompileError::with_span(
                codes::ANNOTATION_SHAPE,
                "the second argument must be an `attr(...)` call",
                attr_call.span().clone(),
            ));
        };
        if !matches!(attr_callee.unparen(), Expr::Ident { name, .. } if name == "attr") {
            return Err(CompileError::with_span(
                codes::ANNOTATION_SHAPE,
                "the second argument must be an `attr(...)` call",
                attr_call.span().clone(),
            ));
        }

        let attr_line = match attr_args.as_slice() {
            [name_arg] => {
                let Expr::StringLit { value, .. } = name_arg.unparen() else {
                    return Err(annotation_shape_error(name_arg.span()));
                };
                format!("#[{value}]")
            }
            [name_arg, tokens_arg] => {
                let Expr::StringLit { value, .. } = name_arg.unparen() else {
                    return Err(annotation_shape_error(name_arg.span()));
                };
                let Expr::TemplateLit { parts, span: tspan } = tokens_arg.unparen() else {
                    return Err(annotation_shape_error(tokens_arg.span()));
                };
                let mut tokens = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => tokens.push_str(text),
                        TemplatePart::Expr(_) => {
                            return Err(CompileError::with_span(
                                codes::ANNOTATION_SHAPE,
                                "attribute tokens cannot interpolate",
                                tspan.clone(),
                            ))
                        }
                    }
                }
                format!("#[{value}({tokens})]")
            }
            _ => return Err(annotation_shape_error(attr_call.span())),
        };

        self.attrs
            .entry(target_name.clone())
            .or_default()
            .push(attr_line);
        Ok(())
    }
}

/// An expression statement of the form `annotate(...)`.
pub(super) fn is_annotation_stmt(expr: &Expr) -> bool {
    matches!(
        expr.unparen(),
        Expr::Call { callee, .. }
            if matches!(callee.unparen(), Expr::Ident { name, .. } if name == "annotate")
    )
}

fn annotation_shape_error(span: &Span) -> CompileError {
    CompileError::with_span(
        codes::ANNOTATION_SHAPE,
        "`attr(name, tokens`...`)` takes a string name and a template-literal token list",
        span.clone(),
    )
}

pub(super) fn param_modes(params: &[Param]) -> Vec<ParamMode> {
    params
        .iter()
        .filter(|p| p.name() != Some("this"))
        .map(|p| match &p.ty {
            Some(TypeExpr::Named { name, .. }) if name == "mutref" || name == "mutrefLt" => {
                ParamMode::MutRef
            }
            Some(TypeExpr::Named { name, .. }) if name == "ref" || name == "refLt" => {
                ParamMode::Ref
            }
            _ => ParamMode::Value,
        })
        .collect()
}
