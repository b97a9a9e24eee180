//! Deterministic pretty-printer from IR to target source text.
//!
//! Two runs over the same program must produce byte-identical output, so
//! everything here is a pure function of the IR: no timestamps, no
//! environment lookups, no map iteration.

use lode_diagnostics::span_map::SPAN_COMMENT_PREFIX;
use lode_diagnostics::Span;

use crate::expr::{Expr, ExprKind, Lit, UnOp};
use crate::item::{
    EnumItem, FnItem, ImplItem, Item, ModItem, Program, Receiver, StructItem, TraitItem,
    TypeAliasItem, UseItem,
};
use crate::stmt::{MatchArm, Pattern, Stmt, StmtKind};

const INDENT: &str = "  ";

/// Render a whole program.
pub fn write_program(program: &Program) -> String {
    let mut out = String::new();
    for (i, item) in program.items.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_item(&mut out, item, 0);
    }
    out
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_span_comment(out: &mut String, span: &Span, depth: usize) {
    push_indent(out, depth);
    out.push_str(SPAN_COMMENT_PREFIX);
    out.push_str(&format!("{}:{}:{}\n", span.file, span.start, span.end));
}

fn write_attrs(out: &mut String, attrs: &[String], depth: usize) {
    for attr in attrs {
        push_indent(out, depth);
        out.push_str(attr);
        out.push('\n');
    }
}

fn render_generics(generics: &[crate::item::GenericParam]) -> String {
    if generics.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = generics
        .iter()
        .map(|g| {
            if g.bounds.is_empty() {
                g.name.clone()
            } else {
                format!("{}: {}", g.name, g.bounds.join(" + "))
            }
        })
        .collect();
    format!("<{}>", rendered.join(", "))
}

fn write_item(out: &mut String, item: &Item, depth: usize) {
    match item {
        Item::Use(use_item) => write_use(out, use_item, depth),
        Item::Mod(mod_item) => write_mod(out, mod_item, depth),
        Item::TypeAlias(alias) => write_type_alias(out, alias, depth),
        Item::Struct(s) => write_struct(out, s, depth),
        Item::Enum(e) => write_enum(out, e, depth),
        Item::Trait(t) => write_trait(out, t, depth),
        Item::Impl(i) => write_impl(out, i, depth),
        Item::Fn(f) => write_fn(out, f, depth),
    }
}

fn write_use(out: &mut String, item: &UseItem, depth: usize) {
    push_indent(out, depth);
    out.push_str("use ");
    out.push_str(&item.path.join("::"));
    if let Some(alias) = &item.alias {
        out.push_str(" as ");
        out.push_str(alias);
    }
    out.push_str(";\n");
}

fn write_mod(out: &mut String, item: &ModItem, depth: usize) {
    push_indent(out, depth);
    out.push_str("mod ");
    out.push_str(&item.name);
    out.push_str(" {\n");
    for (i, inner) in item.items.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_item(out, inner, depth + 1);
    }
    push_indent(out, depth);
    out.push_str("}\n");
}

fn write_type_alias(out: &mut String, item: &TypeAliasItem, depth: usize) {
    push_indent(out, depth);
    out.push_str(&format!(
        "{}type {}{} = {};\n",
        item.vis.prefix(),
        item.name,
        render_generics(&item.generics),
        item.ty
    ));
}

fn write_struct(out: &mut String, item: &StructItem, depth: usize) {
    write_attrs(out, &item.attrs, depth);
    push_indent(out, depth);
    out.push_str(&format!(
        "{}struct {}{}",
        item.vis.prefix(),
        item.name,
        render_generics(&item.generics)
    ));
    if item.fields.is_empty() {
        out.push_str(";\n");
        return;
    }
    out.push_str(" {\n");
    for (name, ty) in &item.fields {
        push_indent(out, depth + 1);
        out.push_str(&format!("pub {}: {},\n", name, ty));
    }
    push_indent(out, depth);
    out.push_str("}\n");
}

fn write_enum(out: &mut String, item: &EnumItem, depth: usize) {
    write_attrs(out, &item.attrs, depth);
    push_indent(out, depth);
    out.push_str(&format!(
        "{}enum {}{} {{\n",
        item.vis.prefix(),
        item.name,
        render_generics(&item.generics)
    ));
    for variant in &item.variants {
        push_indent(out, depth + 1);
        if variant.fields.is_empty() {
            out.push_str(&format!("{},\n", variant.name));
        } else {
            let fields: Vec<String> = variant
                .fields
                .iter()
                .map(|(name, ty)| format!("{}: {}", name, ty))
                .collect();
            out.push_str(&format!("{} {{ {} }},\n", variant.name, fields.join(", ")));
        }
    }
    push_indent(out, depth);
    out.push_str("}\n");
}

fn write_trait(out: &mut String, item: &TraitItem, depth: usize) {
    write_attrs(out, &item.attrs, depth);
    push_indent(out, depth);
    out.push_str(&format!(
        "{}trait {}{}",
        item.vis.prefix(),
        item.name,
        render_generics(&item.generics)
    ));
    if !item.supertraits.is_empty() {
        out.push_str(": ");
        out.push_str(&item.supertraits.join(" + "));
    }
    if item.methods.is_empty() {
        out.push_str(" {}\n");
        return;
    }
    out.push_str(" {\n");
    for method in &item.methods {
        write_fn(out, method, depth + 1);
    }
    push_indent(out, depth);
    out.push_str("}\n");
}

fn write_impl(out: &mut String, item: &ImplItem, depth: usize) {
    push_indent(out, depth);
    match &item.trait_path {
        Some(trait_path) => out.push_str(&format!(
            "impl {} for {} {{\n",
            trait_path.join("::"),
            item.ty
        )),
        None => out.push_str(&format!("impl {} {{\n", item.ty)),
    }
    for (i, f) in item.fns.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_fn(out, f, depth + 1);
    }
    push_indent(out, depth);
    out.push_str("}\n");
}

fn write_fn(out: &mut String, item: &FnItem, depth: usize) {
    write_attrs(out, &item.attrs, depth);
    push_indent(out, depth);
    out.push_str(item.vis.prefix());
    if item.is_async {
        out.push_str("async ");
    }
    out.push_str("fn ");
    out.push_str(&item.name);
    out.push_str(&render_generics(&item.generics));
    out.push('(');

    let mut first = true;
    if let Receiver::RefSelf { mutable, lifetime } = &item.receiver {
        out.push('&');
        if let Some(lt) = lifetime {
            out.push_str(&format!("'{} ", lt));
        }
        if *mutable {
            out.push_str("mut ");
        }
        out.push_str("self");
        first = false;
    }
    for (name, ty) in &item.params {
        if !first {
            out.push_str(", ");
        }
        out.push_str(&format!("{}: {}", name, ty));
        first = false;
    }
    out.push(')');

    if !item.ret.is_unit() {
        out.push_str(&format!(" -> {}", item.ret));
    }

    match &item.body {
        None => out.push_str(";\n"),
        Some(body) => {
            out.push_str(" {\n");
            write_stmts(out, body, depth + 1);
            push_indent(out, depth);
            out.push_str("}\n");
        }
    }
}

fn write_stmts(out: &mut String, stmts: &[Stmt], depth: usize) {
    for stmt in stmts {
        write_stmt(out, stmt, depth);
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    if let Some(span) = &stmt.span {
        write_span_comment(out, span, depth);
    }
    match &stmt.kind {
        StmtKind::Let {
            name,
            mutable,
            ty,
            init,
        } => {
            push_indent(out, depth);
            out.push_str("let ");
            if *mutable {
                out.push_str("mut ");
            }
            out.push_str(name);
            if let Some(ty) = ty {
                out.push_str(&format!(": {}", ty));
            }
            if let Some(init) = init {
                out.push_str(" = ");
                out.push_str(&render_expr(init));
            }
            out.push_str(";\n");
        }
        StmtKind::Assign { target, value } => {
            push_indent(out, depth);
            out.push_str(&format!("{} = {};\n", render_expr(target), render_expr(value)));
        }
        StmtKind::Expr(expr) => {
            push_indent(out, depth);
            out.push_str(&render_expr(expr));
            out.push_str(";\n");
        }
        StmtKind::If {
            cond,
            then_stmts,
            else_stmts,
        } => {
            push_indent(out, depth);
            out.push_str(&format!("if {} {{\n", render_expr(cond)));
            write_stmts(out, then_stmts, depth + 1);
            push_indent(out, depth);
            match else_stmts {
                Some(else_stmts) => {
                    out.push_str("} else {\n");
                    write_stmts(out, else_stmts, depth + 1);
                    push_indent(out, depth);
                    out.push_str("}\n");
                }
                None => out.push_str("}\n"),
            }
        }
        StmtKind::While { cond, body } => {
            push_indent(out, depth);
            out.push_str(&format!("while {} {{\n", render_expr(cond)));
            write_stmts(out, body, depth + 1);
            push_indent(out, depth);
            out.push_str("}\n");
        }
        StmtKind::Match { scrutinee, arms } => {
            push_indent(out, depth);
            out.push_str(&format!("match {} {{\n", render_expr(scrutinee)));
            for arm in arms {
                write_match_arm(out, arm, depth + 1);
            }
            push_indent(out, depth);
            out.push_str("}\n");
        }
        StmtKind::Break => {
            push_indent(out, depth);
            out.push_str("break;\n");
        }
        StmtKind::Continue => {
            push_indent(out, depth);
            out.push_str("continue;\n");
        }
        StmtKind::Return(value) => {
            push_indent(out, depth);
            match value {
                Some(value) => out.push_str(&format!("return {};\n", render_expr(value))),
                None => out.push_str("return;\n"),
            }
        }
        StmtKind::Block(stmts) => {
            push_indent(out, depth);
            out.push_str("{\n");
            write_stmts(out, stmts, depth + 1);
            push_indent(out, depth);
            out.push_str("}\n");
        }
    }
}

fn write_match_arm(out: &mut String, arm: &MatchArm, depth: usize) {
    push_indent(out, depth);
    out.push_str(&format!("{} => {{\n", render_pattern(&arm.pattern)));
    write_stmts(out, &arm.body, depth + 1);
    push_indent(out, depth);
    out.push_str("}\n");
}

fn render_pattern(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Wildcard => "_".to_string(),
        Pattern::Path(path) => path.join("::"),
        Pattern::Struct { path, fields } => {
            if fields.is_empty() {
                path.join("::")
            } else {
                format!("{} {{ {} }}", path.join("::"), fields.join(", "))
            }
        }
        Pattern::Lit(expr) => render_expr(expr),
    }
}

fn escape_str(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Render a statement on a single line, for block expressions.
fn render_stmt_inline(stmt: &Stmt) -> String {
    let mut out = String::new();
    write_stmt(&mut out, &Stmt::new(stmt.kind.clone()), 0);
    // Collapse the multi-line rendering into one line.
    let parts: Vec<&str> = out.lines().map(str::trim).collect();
    parts.join(" ")
}

pub fn render_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Lit(lit) => match lit {
            Lit::Int(raw) | Lit::Float(raw) => raw.clone(),
            Lit::Bool(value) => value.to_string(),
            Lit::Str(value) => format!("\"{}\"", escape_str(value)),
            Lit::Unit => "()".to_string(),
        },
        ExprKind::Path(path) => path.join("::"),
        ExprKind::Call { callee, args } => {
            format!("{}({})", render_expr(callee), render_args(args))
        }
        ExprKind::PathCall {
            path,
            generics,
            args,
        } => {
            let turbofish = render_turbofish(generics);
            format!("{}{}({})", path.join("::"), turbofish, render_args(args))
        }
        ExprKind::AssocCall {
            ty,
            func,
            generics,
            args,
        } => {
            let turbofish = render_turbofish(generics);
            format!("{}::{}{}({})", ty, func, turbofish, render_args(args))
        }
        ExprKind::Borrow { inner, mutable } => {
            if *mutable {
                format!("&mut {}", render_expr(inner))
            } else {
                format!("&{}", render_expr(inner))
            }
        }
        ExprKind::Cast { expr, ty } => format!("{} as {}", render_expr(expr), ty),
        ExprKind::Field { base, name } => format!("{}.{}", render_expr(base), name),
        ExprKind::Index { base, index } => {
            format!("{}[{}]", render_expr(base), render_expr(index))
        }
        ExprKind::Unary { op, expr } => {
            let symbol = match op {
                UnOp::Neg => "-",
                UnOp::Not => "!",
            };
            format!("{}{}", symbol, render_expr(expr))
        }
        ExprKind::Binary { op, left, right } => {
            format!(
                "{} {} {}",
                render_expr(left),
                op.symbol(),
                render_expr(right)
            )
        }
        ExprKind::Closure {
            is_move,
            params,
            body,
        } => {
            let rendered: Vec<String> = params
                .iter()
                .map(|(name, ty)| match ty {
                    Some(ty) => format!("{}: {}", name, ty),
                    None => name.clone(),
                })
                .collect();
            let prefix = if *is_move { "move " } else { "" };
            format!("{}|{}| {}", prefix, rendered.join(", "), render_expr(body))
        }
        ExprKind::MacroCall { name, args } => {
            format!("{}!({})", name, render_args(args))
        }
        ExprKind::StructLit { path, fields } => {
            if fields.is_empty() {
                format!("{} {{}}", path.join("::"))
            } else {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(name, value)| format!("{}: {}", name, render_expr(value)))
                    .collect();
                format!("{} {{ {} }}", path.join("::"), rendered.join(", "))
            }
        }
        ExprKind::Try(inner) => format!("{}?", render_expr(inner)),
        ExprKind::Await(inner) => format!("{}.await", render_expr(inner)),
        ExprKind::Unsafe(inner) => format!("unsafe {{ {} }}", render_expr(inner)),
        ExprKind::Block { stmts, tail } => {
            let mut parts: Vec<String> = stmts.iter().map(render_stmt_inline).collect();
            if let Some(tail) = tail {
                parts.push(render_expr(tail));
            }
            if parts.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", parts.join(" "))
            }
        }
        ExprKind::Paren(inner) => format!("({})", render_expr(inner)),
        ExprKind::ArrayLit(elements) => format!("[{}]", render_args(elements)),
        ExprKind::TupleLit(elements) => {
            if elements.len() == 1 {
                format!("({},)", render_expr(&elements[0]))
            } else {
                format!("({})", render_args(elements))
            }
        }
    }
}

fn render_args(args: &[Expr]) -> String {
    args.iter()
        .map(render_expr)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_turbofish(generics: &[crate::types::Type]) -> String {
    if generics.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = generics.iter().map(|t| t.to_string()).collect();
    format!("::<{}>", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinOp;
    use crate::item::{EnumVariant, GenericParam, Visibility};
    use crate::types::Type;

    fn minimal_main(body: Vec<Stmt>) -> Program {
        let mut main = FnItem::new("main");
        main.body = Some(body);
        Program {
            items: vec![Item::Fn(main)],
        }
    }

    #[test]
    fn test_minimal_main() {
        let program = minimal_main(vec![Stmt::new(StmtKind::Return(None))]);
        let text = write_program(&program);
        assert!(text.contains("fn main() {"));
        assert!(text.contains("  return;"));
    }

    #[test]
    fn test_span_comment_precedes_statement() {
        let stmt = Stmt::with_span(
            StmtKind::Return(None),
            Span::new("src/main.ls", 31, 38),
        );
        let text = write_program(&minimal_main(vec![stmt]));
        let lines: Vec<&str> = text.lines().collect();
        let comment_idx = lines
            .iter()
            .position(|l| l.trim() == "// lode-span: src/main.ls:31:38")
            .expect("span comment");
        assert_eq!(lines[comment_idx + 1].trim(), "return;");
    }

    #[test]
    fn test_enum_variants() {
        let program = Program {
            items: vec![Item::Enum(EnumItem {
                vis: Visibility::Pub,
                name: "Shape".to_string(),
                attrs: vec!["#[derive(Debug)]".to_string()],
                generics: vec![],
                variants: vec![
                    EnumVariant {
                        name: "Empty".to_string(),
                        fields: vec![],
                    },
                    EnumVariant {
                        name: "Circle".to_string(),
                        fields: vec![("radius".to_string(), Type::path("f64"))],
                    },
                ],
                span: None,
            })],
        };
        let text = write_program(&program);
        assert!(text.contains("#[derive(Debug)]"));
        assert!(text.contains("pub enum Shape {"));
        assert!(text.contains("  Empty,"));
        assert!(text.contains("  Circle { radius: f64 },"));
    }

    #[test]
    fn test_turbofish_rendering() {
        let expr = Expr::new(ExprKind::PathCall {
            path: vec!["collect_into".to_string()],
            generics: vec![Type::generic("Vec", vec![Type::path("i32")])],
            args: vec![Expr::path("xs")],
        });
        assert_eq!(render_expr(&expr), "collect_into::<Vec<i32>>(xs)");
    }

    #[test]
    fn test_block_expr_single_line() {
        let expr = Expr::new(ExprKind::Block {
            stmts: vec![Stmt::new(StmtKind::Let {
                name: "_".to_string(),
                mutable: false,
                ty: None,
                init: Some(Expr::path("e")),
            })],
            tail: Some(Box::new(Expr::unit())),
        });
        assert_eq!(render_expr(&expr), "{ let _ = e; () }");
    }

    #[test]
    fn test_move_closure() {
        let expr = Expr::new(ExprKind::Closure {
            is_move: true,
            params: vec![("x".to_string(), Some(Type::path("i32")))],
            body: Box::new(Expr::new(ExprKind::Binary {
                op: BinOp::Add,
                left: Box::new(Expr::path("x")),
                right: Box::new(Expr::int("1")),
            })),
        });
        assert_eq!(render_expr(&expr), "move |x: i32| x + 1");
    }

    #[test]
    fn test_trait_with_signature_only_methods() {
        let mut method = FnItem::new("area");
        method.receiver = Receiver::RefSelf {
            mutable: false,
            lifetime: None,
        };
        method.ret = Type::path("f64");
        method.body = None;
        let program = Program {
            items: vec![Item::Trait(TraitItem {
                vis: Visibility::Pub,
                name: "Measurable".to_string(),
                attrs: vec![],
                generics: vec![],
                supertraits: vec!["Base".to_string()],
                methods: vec![method],
                span: None,
            })],
        };
        let text = write_program(&program);
        assert!(text.contains("pub trait Measurable: Base {"));
        assert!(text.contains("  fn area(&self) -> f64;"));
    }

    #[test]
    fn test_generic_bounds_rendering() {
        let mut f = FnItem::new("show");
        f.generics = vec![GenericParam {
            name: "T".to_string(),
            bounds: vec!["Printable".to_string(), "Sized".to_string()],
        }];
        f.params = vec![("value".to_string(), Type::path("T"))];
        let text = write_program(&Program {
            items: vec![Item::Fn(f)],
        });
        assert!(text.contains("fn show<T: Printable + Sized>(value: T) {"));
    }

    #[test]
    fn test_tuple_literals_and_match_patterns() {
        let expr = Expr::new(ExprKind::TupleLit(vec![Expr::int("1")]));
        assert_eq!(render_expr(&expr), "(1,)");
        let expr = Expr::new(ExprKind::TupleLit(vec![Expr::int("1"), Expr::int("2")]));
        assert_eq!(render_expr(&expr), "(1, 2)");

        let stmt = Stmt::new(StmtKind::Match {
            scrutinee: Expr::path("shape"),
            arms: vec![
                MatchArm {
                    pattern: Pattern::Struct {
                        path: vec!["Shape".to_string(), "Circle".to_string()],
                        fields: vec!["radius".to_string()],
                    },
                    body: vec![Stmt::new(StmtKind::Break)],
                },
                MatchArm {
                    pattern: Pattern::Path(vec!["Shape".to_string(), "Empty".to_string()]),
                    body: vec![],
                },
                MatchArm {
                    pattern: Pattern::Lit(Expr::int("3")),
                    body: vec![],
                },
                MatchArm {
                    pattern: Pattern::Wildcard,
                    body: vec![Stmt::new(StmtKind::Continue)],
                },
            ],
        });
        let text = write_program(&minimal_main(vec![stmt]));
        assert!(text.contains("match shape {"));
        assert!(text.contains("Shape::Circle { radius } => {"));
        assert!(text.contains("Shape::Empty => {"));
        assert!(text.contains("3 => {"));
        assert!(text.contains("_ => {"));
    }

    #[test]
    fn test_byte_identical_reruns() {
        let program = minimal_main(vec![
            Stmt::new(StmtKind::Let {
                name: "x".to_string(),
                mutable: true,
                ty: Some(Type::path("i32")),
                init: Some(Expr::int("1")),
            }),
            Stmt::new(StmtKind::Return(None)),
        ]);
        assert_eq!(write_program(&program), write_program(&program));
    }
}
