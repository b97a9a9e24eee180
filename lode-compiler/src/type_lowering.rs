//! Source type annotations to target types.
//!
//! The mapping is a fixed table: primitives map to same-named target
//! primitives, the marker aliases (`ref`, `mutref`, `refLt`, `mutrefLt`,
//! `mut`) recover reference and mutability semantics, and the standard
//! containers map to canonical target paths. Anything outside the table
//! is a catalog diagnostic with the offending span.

use std::collections::BTreeSet;

use lode_ast::TypeExpr;
use lode_diagnostics::{fuzzy, CompileError, CompileResult};
use lode_rir::Type;

use crate::codes;

const PRIMITIVES: &[&str] = &[
    "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "f32", "f64", "bool", "usize", "isize",
];

/// Names visible to type lowering.
#[derive(Debug, Default, Clone)]
pub struct TypeCtx {
    /// Declared interfaces (legal as generic constraints).
    pub interfaces: BTreeSet<String>,
    /// Nominal types: classes, enums from union aliases, plain aliases,
    /// and imported native types.
    pub nominals: BTreeSet<String>,
    /// Generic parameters currently in scope.
    pub generics: BTreeSet<String>,
}

impl TypeCtx {
    fn known(&self, name: &str) -> bool {
        self.nominals.contains(name)
            || self.interfaces.contains(name)
            || self.generics.contains(name)
    }

    fn suggestion_for(&self, name: &str) -> String {
        let candidates: Vec<String> = self
            .nominals
            .iter()
            .chain(self.interfaces.iter())
            .chain(self.generics.iter())
            .cloned()
            .collect();
        fuzzy::suggestion_suffix(name, &candidates)
    }
}

/// A lowered annotation: the target type plus whether a surrounding `let`
/// must be mutable (the `mut<T>` marker erases to `T`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredType {
    pub ty: Type,
    pub mutable: bool,
}

/// Lower an annotation, accepting a top-level `mut<T>` marker.
pub fn lower_annotation(ctx: &TypeCtx, te: &TypeExpr) -> CompileResult<LoweredType> {
    if let TypeExpr::Named { name, args, span } = te {
        if name == "mut" {
            if args.len() != 1 {
                return Err(CompileError::with_span(
                    codes::MUT_ARITY,
                    format!("`mut<T>` takes exactly one type argument, found {}", args.len()),
                    span.clone(),
                ));
            }
            return Ok(LoweredType {
                ty: lower_type(ctx, &args[0])?,
                mutable: true,
            });
        }
    }
    Ok(LoweredType {
        ty: lower_type(ctx, te)?,
        mutable: false,
    })
}

/// Lower a type expression with no marker handling at the top.
pub fn lower_type(ctx: &TypeCtx, te: &TypeExpr) -> CompileResult<Type> {
    match te {
        TypeExpr::Named { name, args, span } => lower_named(ctx, name, args, span),
        TypeExpr::Tuple { members, span: _ } => {
            let lowered: CompileResult<Vec<Type>> =
                members.iter().map(|m| lower_type(ctx, m)).collect();
            Ok(Type::Tuple(lowered?))
        }
        TypeExpr::Intersection { span, .. } => Err(CompileError::with_span(
            codes::ALIAS_INTERSECTION,
            "intersection types are only supported as generic constraints",
            span.clone(),
        )),
        TypeExpr::Union { span, .. } => Err(CompileError::with_span(
            codes::UNSUPPORTED_TYPE,
            "union types are only supported as discriminated-union type aliases",
            span.clone(),
        )),
        TypeExpr::Object { span, .. } => Err(CompileError::with_span(
            codes::UNSUPPORTED_TYPE,
            "object types are only supported inside discriminated-union aliases",
            span.clone(),
        )),
        TypeExpr::StringLit { span, .. } => Err(CompileError::with_span(
            codes::UNSUPPORTED_TYPE,
            "string-literal types are only supported as union discriminants and lifetimes",
            span.clone(),
        )),
        TypeExpr::IntLit { span, .. } => Err(CompileError::with_span(
            codes::UNSUPPORTED_TYPE,
            "numeric-literal types are only supported as fixed array lengths",
            span.clone(),
        )),
        TypeExpr::Unsupported { description, span } => Err(CompileError::with_span(
            codes::ALIAS_UNSUPPORTED,
            format!("{description} is not supported"),
            span.clone(),
        )),
    }
}

fn expect_arity(
    code: &'static str,
    name: &str,
    args: &[TypeExpr],
    want: usize,
    span: &lode_diagnostics::Span,
) -> CompileResult<()> {
    if args.len() != want {
        return Err(CompileError::with_span(
            code,
            format!(
                "`{}` takes {} type argument{}, found {}",
                name,
                want,
                if want == 1 { "" } else { "s" },
                args.len()
            ),
            span.clone(),
        ));
    }
    Ok(())
}

fn lower_named(
    ctx: &TypeCtx,
    name: &str,
    args: &[TypeExpr],
    span: &lode_diagnostics::Span,
) -> CompileResult<Type> {
    if PRIMITIVES.contains(&name) {
        if !args.is_empty() {
            return Err(CompileError::with_span(
                codes::UNSUPPORTED_TYPE,
                format!("primitive `{name}` takes no type arguments"),
                span.clone(),
            ));
        }
        return Ok(Type::path(name));
    }

    match name {
        "void" => Ok(Type::Unit),
        "Str" => Ok(Type::path("str")),
        "String" => Ok(Type::path("std::string::String")),
        "undefined" | "null" => Err(CompileError::with_span(
            codes::UNDEFINED_REJECTED,
            format!("`{name}` has no target representation"),
            span.clone(),
        )),
        "Option" => {
            expect_arity(codes::OPTION_ARITY, name, args, 1, span)?;
            Ok(Type::generic(
                "std::option::Option",
                vec![lower_type(ctx, &args[0])?],
            ))
        }
        "Result" => {
            expect_arity(codes::RESULT_ARITY, name, args, 2, span)?;
            Ok(Type::generic(
                "std::result::Result",
                vec![lower_type(ctx, &args[0])?, lower_type(ctx, &args[1])?],
            ))
        }
        "Vec" => {
            expect_arity(codes::VEC_ARITY, name, args, 1, span)?;
            Ok(Type::generic(
                "std::vec::Vec",
                vec![lower_type(ctx, &args[0])?],
            ))
        }
        "HashMap" => {
            expect_arity(codes::HASHMAP_ARITY, name, args, 2, span)?;
            Ok(Type::generic(
                "std::collections::HashMap",
                vec![lower_type(ctx, &args[0])?, lower_type(ctx, &args[1])?],
            ))
        }
        "Slice" => {
            expect_arity(codes::SLICE_ARITY, name, args, 1, span)?;
            Ok(Type::Slice(Box::new(lower_type(ctx, &args[0])?)))
        }
        "ArrayN" => {
            expect_arity(codes::ARRAYN_ARITY, name, args, 2, span)?;
            let TypeExpr::IntLit { value, span: len_span } = &args[1] else {
                return Err(CompileError::with_span(
                    codes::ARRAYN_LENGTH,
                    "`ArrayN<T, N>` requires an integer literal length",
                    args[1].span().clone(),
                ));
            };
            if *value < 0 {
                return Err(CompileError::with_span(
                    codes::ARRAYN_LENGTH,
                    format!("array length must be non-negative, found {value}"),
                    len_span.clone(),
                ));
            }
            Ok(Type::Array {
                elem: Box::new(lower_type(ctx, &args[0])?),
                len: *value as usize,
            })
        }
        "ref" | "mutref" => {
            expect_arity(codes::REF_ARITY, name, args, 1, span)?;
            Ok(Type::Ref {
                inner: Box::new(lower_type(ctx, &args[0])?),
                mutable: name == "mutref",
                lifetime: None,
            })
        }
        "refLt" | "mutrefLt" => {
            expect_arity(codes::REF_ARITY, name, args, 2, span)?;
            let TypeExpr::StringLit { value, .. } = &args[0] else {
                return Err(CompileError::with_span(
                    codes::LIFETIME_NOT_LITERAL,
                    "lifetime argument must be a string literal",
                    args[0].span().clone(),
                ));
            };
            Ok(Type::Ref {
                inner: Box::new(lower_type(ctx, &args[1])?),
                mutable: name == "mutrefLt",
                lifetime: Some(value.clone()),
            })
        }
        "mut" => Err(CompileError::with_span(
            codes::UNSUPPORTED_TYPE,
            "`mut<T>` is only valid at the top of a binding annotation",
            span.clone(),
        )),
        _ => {
            if ctx.known(name) {
                let lowered: CompileResult<Vec<Type>> =
                    args.iter().map(|a| lower_type(ctx, a)).collect();
                Ok(Type::Path {
                    segments: vec![name.to_string()],
                    generics: lowered?,
                })
            } else {
                Err(CompileError::with_span(
                    codes::UNSUPPORTED_TYPE,
                    format!(
                        "unknown type `{}`{}",
                        name,
                        ctx.suggestion_for(name)
                    ),
                    span.clone(),
                ))
            }
        }
    }
}

/// Resolve a generic-parameter constraint to trait bounds. Plain named
/// interfaces and intersections of them are accepted.
pub fn lower_constraint(ctx: &TypeCtx, te: &TypeExpr) -> CompileResult<Vec<String>> {
    match te {
        TypeExpr::Named { name, args, span } => {
            if !args.is_empty() || !ctx.interfaces.contains(name) {
                return Err(CompileError::with_span(
                    codes::UNKNOWN_CONSTRAINT,
                    format!(
                        "constraint `{}` does not name a declared interface{}",
                        name,
                        ctx.suggestion_for(name)
                    ),
                    span.clone(),
                ));
            }
            Ok(vec![name.clone()])
        }
        TypeExpr::Intersection { members, .. } => {
            let mut bounds = Vec::new();
            for member in members {
                bounds.extend(lower_constraint(ctx, member)?);
            }
            Ok(bounds)
        }
        other => Err(CompileError::with_span(
            codes::UNKNOWN_CONSTRAINT,
            "constraints must name declared interfaces",
            other.span().clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_diagnostics::Span;

    fn span() -> Span {
        Span::new("t.ls", 0, 1)
    }

    fn named(name: &str, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::Named {
            name: name.to_string(),
            args,
            span: span(),
        }
    }

    fn ctx() -> TypeCtx {
        let mut ctx = TypeCtx::default();
        ctx.interfaces.insert("Printable".to_string());
        ctx.nominals.insert("Point".to_string());
        ctx
    }

    #[test]
    fn test_primitive_and_containers() {
        let ctx = ctx();
        assert_eq!(
            lower_type(&ctx, &named("i32", vec![])).unwrap(),
            Type::path("i32")
        );
        assert_eq!(
            lower_type(&ctx, &named("Vec", vec![named("f64", vec![])]))
                .unwrap()
                .to_string(),
            "std::vec::Vec<f64>"
        );
        assert_eq!(
            lower_type(
                &ctx,
                &named(
                    "Result",
                    vec![named("void", vec![]), named("i32", vec![])]
                )
            )
            .unwrap()
            .to_string(),
            "std::result::Result<(), i32>"
        );
    }

    #[test]
    fn test_markers() {
        let ctx = ctx();
        assert_eq!(
            lower_type(&ctx, &named("ref", vec![named("Str", vec![])]))
                .unwrap()
                .to_string(),
            "&str"
        );
        assert_eq!(
            lower_type(
                &ctx,
                &named(
                    "mutrefLt",
                    vec![
                        TypeExpr::StringLit {
                            value: "a".to_string(),
                            span: span()
                        },
                        named("Point", vec![])
                    ]
                )
            )
            .unwrap()
            .to_string(),
            "&'a mut Point"
        );

        let lowered = lower_annotation(&ctx, &named("mut", vec![named("i32", vec![])])).unwrap();
        assert!(lowered.mutable);
        assert_eq!(lowered.ty, Type::path("i32"));
    }

    #[test]
    fn test_arity_codes() {
        let ctx = ctx();
        let err = lower_type(&ctx, &named("Option", vec![])).unwrap_err();
        assert_eq!(err.code, codes::OPTION_ARITY);
        let err = lower_type(&ctx, &named("HashMap", vec![named("i32", vec![])])).unwrap_err();
        assert_eq!(err.code, codes::HASHMAP_ARITY);
    }

    #[test]
    fn test_arrayn_requires_literal_length() {
        let ctx = ctx();
        let ok = lower_type(
            &ctx,
            &named(
                "ArrayN",
                vec![
                    named("f32", vec![]),
                    TypeExpr::IntLit {
                        value: 4,
                        span: span(),
                    },
                ],
            ),
        )
        .unwrap();
        assert_eq!(ok.to_string(), "[f32; 4]");

        let err = lower_type(
            &ctx,
            &named(
                "ArrayN",
                vec![
                    named("f32", vec![]),
                    TypeExpr::IntLit {
                        value: -1,
                        span: span(),
                    },
                ],
            ),
        )
        .unwrap_err();
        assert_eq!(err.code, codes::ARRAYN_LENGTH);
    }

    #[test]
    fn test_unknown_type_suggests() {
        let ctx = ctx();
        let err = lower_type(&ctx, &named("Poin", vec![])).unwrap_err();
        assert_eq!(err.code, codes::UNSUPPORTED_TYPE);
        assert!(err.message.contains("Point"));
    }

    #[test]
    fn test_constraints() {
        let ctx = ctx();
        assert_eq!(
            lower_constraint(&ctx, &named("Printable", vec![])).unwrap(),
            vec!["Printable".to_string()]
        );
        let err = lower_constraint(&ctx, &named("Missing", vec![])).unwrap_err();
        assert_eq!(err.code, codes::UNKNOWN_CONSTRAINT);

        let both = TypeExpr::Intersection {
            members: vec![named("Printable", vec![]), named("Printable", vec![])],
            span: span(),
        };
        assert_eq!(lower_constraint(&ctx, &both).unwrap().len(), 2);
    }
}
