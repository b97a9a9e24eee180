// Parser coverage for the accepted source subset.

use lode_ast::*;
use lode_parser::parse_module;

fn parse(source: &str) -> Module {
    parse_module("src/main.ls", source).expect("source should parse")
}

#[test]
fn test_import_forms() {
    let module = parse(
        r#"
import { q, unsafe } from "lode/core";
import { Point as P } from "geo/index.ls";
import * as ns from "pkg";
import side from "pkg2";
import "effects";
"#,
    );
    assert_eq!(module.imports.len(), 5);
    let ImportClause::Named(bindings) = &module.imports[0].clause else {
        panic!("expected named clause");
    };
    assert_eq!(bindings.len(), 2);
    assert_eq!(module.imports[1].specifier, "geo/index.ls");
    let ImportClause::Named(renamed) = &module.imports[1].clause else {
        panic!("expected named clause");
    };
    assert_eq!(renamed[0].alias.as_deref(), Some("P"));
    assert!(matches!(
        module.imports[2].clause,
        ImportClause::Namespace(_)
    ));
    assert!(matches!(module.imports[3].clause, ImportClause::Default(_)));
    assert!(matches!(module.imports[4].clause, ImportClause::SideEffect));
}

#[test]
fn test_function_with_params_and_return_type() {
    let module = parse("function add(a: i32, b: i32): i32 { return a + b; }");
    let Item::Function(func) = &module.items[0] else {
        panic!("expected function");
    };
    assert_eq!(func.name.as_deref(), Some("add"));
    assert_eq!(func.params.len(), 2);
    assert!(matches!(
        func.return_type,
        Some(TypeExpr::Named { ref name, .. }) if name == "i32"
    ));
    let body = func.body.as_ref().unwrap();
    assert!(matches!(body.stmts[0], Stmt::Return { value: Some(_), .. }));
}

#[test]
fn test_async_function_promise_return() {
    let module = parse("export async function main(): Promise<void> { return; }");
    let Item::Function(func) = &module.items[0] else {
        panic!("expected function");
    };
    assert!(func.is_async);
    assert!(func.is_exported);
}

#[test]
fn test_class_with_constructor_and_methods() {
    let module = parse(
        r#"
class Point implements Printable {
  x: i32;
  y: i32;
  constructor(x: i32, y: i32) { this.x = x; this.y = y; }
  norm(this: ref<Point>): i32 { return this.x * this.x + this.y * this.y; }
}
"#,
    );
    let Item::Class(class) = &module.items[0] else {
        panic!("expected class");
    };
    assert_eq!(class.name.as_deref(), Some("Point"));
    assert_eq!(class.implements, vec!["Printable".to_string()]);
    assert_eq!(class.fields.len(), 2);
    assert!(class.constructor.is_some());
    assert_eq!(class.methods.len(), 1);
    let method = &class.methods[0];
    assert_eq!(method.function.params[0].name(), Some("this"));
}

#[test]
fn test_interface_members() {
    let module = parse(
        r#"
interface Printable extends Base {
  print(this: ref<this>): void;
}
"#,
    );
    let Item::Interface(iface) = &module.items[0] else {
        panic!("expected interface");
    };
    assert_eq!(iface.extends, vec!["Base".to_string()]);
    assert!(matches!(iface.members[0], InterfaceMember::Method { .. }));
}

#[test]
fn test_discriminated_union_alias() {
    let module = parse(
        r#"type Shape = { kind: "circle"; radius: f64 } | { kind: "square"; side: i32 };"#,
    );
    let Item::TypeAlias(alias) = &module.items[0] else {
        panic!("expected alias");
    };
    let TypeExpr::Union { members, .. } = &alias.body else {
        panic!("expected union");
    };
    assert_eq!(members.len(), 2);
    let TypeExpr::Object { fields, .. } = &members[0] else {
        panic!("expected object member");
    };
    assert_eq!(fields[0].name, "kind");
    assert!(matches!(
        fields[0].ty,
        TypeExpr::StringLit { ref value, .. } if value == "circle"
    ));
}

#[test]
fn test_nested_generic_types_split_shr() {
    let module = parse("function f(v: Vec<Vec<i32>>): void { return; }");
    let Item::Function(func) = &module.items[0] else {
        panic!("expected function");
    };
    let Some(TypeExpr::Named { name, args, .. }) = &func.params[0].ty else {
        panic!("expected named type");
    };
    assert_eq!(name, "Vec");
    assert!(matches!(
        args[0],
        TypeExpr::Named { ref name, .. } if name == "Vec"
    ));
}

#[test]
fn test_switch_statement() {
    let module = parse(
        r#"
function area(s: Shape): f64 {
  switch (s.kind) {
    case "circle":
      return 1.0;
    case "square":
      return 2.0;
  }
  return 0.0;
}
"#,
    );
    let Item::Function(func) = &module.items[0] else {
        panic!("expected function");
    };
    let Stmt::Switch(switch) = &func.body.as_ref().unwrap().stmts[0] else {
        panic!("expected switch");
    };
    assert_eq!(switch.cases.len(), 2);
    assert!(switch.default.is_none());
}

#[test]
fn test_arrow_and_cast_expressions() {
    let module = parse("const x = unsafe(() => 1 as i32);");
    let Item::Statement(Stmt::VarDecl(decl)) = &module.items[0] else {
        panic!("expected const");
    };
    let Some(Expr::Call { callee, args, .. }) = &decl.init else {
        panic!("expected call");
    };
    assert!(matches!(
        callee.as_ref(),
        Expr::Ident { name, .. } if name == "unsafe"
    ));
    let Expr::Arrow { body, .. } = &args[0] else {
        panic!("expected arrow");
    };
    let ArrowBody::Expr(inner) = body else {
        panic!("expected expression body");
    };
    assert!(matches!(inner.as_ref(), Expr::Cast { .. }));
}

#[test]
fn test_turbofish_call() {
    let module = parse("const s = sharedArray<f32, 256>();");
    let Item::Statement(Stmt::VarDecl(decl)) = &module.items[0] else {
        panic!("expected const");
    };
    let Some(Expr::Call { type_args, .. }) = &decl.init else {
        panic!("expected call");
    };
    assert_eq!(type_args.len(), 2);
    assert!(matches!(type_args[1], TypeExpr::IntLit { value: 256, .. }));
}

#[test]
fn test_less_than_still_parses() {
    let module = parse("function f(a: i32, n: i32): bool { return a < n; }");
    let Item::Function(func) = &module.items[0] else {
        panic!("expected function");
    };
    let Stmt::Return { value: Some(expr), .. } = &func.body.as_ref().unwrap().stmts[0] else {
        panic!("expected return");
    };
    assert!(matches!(
        expr,
        Expr::Binary { op: BinaryOp::Lt, .. }
    ));
}

#[test]
fn test_template_literal_interpolation_spans() {
    let source = "const msg = `count: ${n + 1} done`;";
    let module = parse(source);
    let Item::Statement(Stmt::VarDecl(decl)) = &module.items[0] else {
        panic!("expected const");
    };
    let Some(Expr::TemplateLit { parts, .. }) = &decl.init else {
        panic!("expected template");
    };
    assert_eq!(parts.len(), 3);
    assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "count: "));
    let TemplatePart::Expr(expr) = &parts[1] else {
        panic!("expected interpolation");
    };
    // The interpolated expression's span points back into the file.
    let span = expr.span();
    assert_eq!(&source[span.start..span.end], "n + 1");
    assert!(matches!(&parts[2], TemplatePart::Text(t) if t == " done"));
}

#[test]
fn test_kernel_declaration_shape() {
    let module = parse(
        r#"
const add = kernel({ name: "add" } as const, (a: global_ptr<f32>, n: i32): void => {
  const i = threadIdxX();
});
"#,
    );
    let Item::Statement(Stmt::VarDecl(decl)) = &module.items[0] else {
        panic!("expected const");
    };
    assert_eq!(decl.kind, VarKind::Const);
    let Some(Expr::Call { callee, args, .. }) = &decl.init else {
        panic!("expected kernel call");
    };
    assert!(matches!(
        callee.as_ref(),
        Expr::Ident { name, .. } if name == "kernel"
    ));
    assert!(matches!(args[0], Expr::AsConst { .. }));
    let Expr::Arrow {
        return_type, body, ..
    } = &args[1]
    else {
        panic!("expected kernel arrow");
    };
    assert!(matches!(
        return_type,
        Some(TypeExpr::Named { name, .. }) if name == "void"
    ));
    assert!(matches!(body, ArrowBody::Block(_)));
}

#[test]
fn test_classic_for_and_for_of() {
    let module = parse(
        r#"
function f(n: i32): void {
  for (let i = 0 as i32; i < n; i++) { g(i); }
  for (const x of xs) { g(x); }
}
"#,
    );
    let Item::Function(func) = &module.items[0] else {
        panic!("expected function");
    };
    let stmts = &func.body.as_ref().unwrap().stmts;
    assert!(matches!(stmts[0], Stmt::For(_)));
    assert!(matches!(stmts[1], Stmt::ForOf(_)));
}

#[test]
fn test_annotation_statement() {
    let module = parse("annotate(Point, attr(\"derive\", `Debug, Clone`));");
    let Item::Statement(Stmt::Expr { expr, .. }) = &module.items[0] else {
        panic!("expected expression statement");
    };
    let Expr::Call { callee, args, .. } = expr else {
        panic!("expected call");
    };
    assert!(matches!(
        callee.as_ref(),
        Expr::Ident { name, .. } if name == "annotate"
    ));
    assert_eq!(args.len(), 2);
}

#[test]
fn test_export_markers() {
    let module = parse("export {};");
    assert!(matches!(module.items[0], Item::ExportMarker { .. }));

    let module = parse("export { a, b };");
    let Item::ExportNamed { names, .. } = &module.items[0] else {
        panic!("expected named export");
    };
    assert_eq!(names.len(), 2);
}
