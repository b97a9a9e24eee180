use lode_diagnostics::Span;
use serde::{Deserialize, Serialize};

/// One parsed source file.
///
/// The parser accepts a slightly wider grammar than the compiler lowers;
/// rejections with catalog codes happen during lowering, where the context
/// (entry vs module, union vs scalar switch, host vs kernel) is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Project-relative file name, forward slashes.
    pub file: String,
    pub imports: Vec<Import>,
    pub items: Vec<Item>,
}

/// Import statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub clause: ImportClause,
    pub specifier: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportClause {
    /// `import { a, b as c } from "m"`
    Named(Vec<ImportBinding>),
    /// `import d from "m"`
    Default(String),
    /// `import * as ns from "m"`
    Namespace(String),
    /// `import "m"`
    SideEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

/// Top-level items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Function(Function),
    Class(Class),
    Interface(Interface),
    TypeAlias(TypeAlias),
    /// Any other top-level statement (const kernels, annotation calls,
    /// and everything the lowering will reject).
    Statement(Stmt),
    /// `export {}` marker
    ExportMarker { span: Span },
    /// `export { a, b }` (rejected later as a barrel re-export)
    ExportNamed { names: Vec<String>, span: Span },
}

impl Item {
    pub fn span(&self) -> &Span {
        match self {
            Item::Function(f) => &f.span,
            Item::Class(c) => &c.span,
            Item::Interface(i) => &i.span,
            Item::TypeAlias(a) => &a.span,
            Item::Statement(s) => s.span(),
            Item::ExportMarker { span } => span,
            Item::ExportNamed { span, .. } => span,
        }
    }
}

/// Generic type parameter: `T`, `T extends Display`, `T extends A & B`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Option<TypeExpr>,
    pub default: Option<TypeExpr>,
    pub span: Span,
}

/// Function declaration (or method, when owned by a class)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: Option<String>,
    pub is_async: bool,
    pub is_exported: bool,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Option<Block>,
    pub span: Span,
}

/// Parameter pattern: only plain identifiers lower; destructurings are
/// carried so the rejection can point at them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamPattern {
    Ident(String),
    Destructured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub pattern: ParamPattern,
    pub ty: Option<TypeExpr>,
    pub optional: bool,
    pub default: Option<Expr>,
    pub span: Span,
}

impl Param {
    pub fn name(&self) -> Option<&str> {
        match &self.pattern {
            ParamPattern::Ident(name) => Some(name),
            ParamPattern::Destructured => None,
        }
    }
}

/// Class declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: Option<String>,
    pub is_exported: bool,
    pub implements: Vec<String>,
    pub fields: Vec<ClassField>,
    pub constructor: Option<Constructor>,
    pub methods: Vec<Method>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassField {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub is_static: bool,
    pub function: Function,
    pub span: Span,
}

/// Interface declaration (lowers to a trait)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub is_exported: bool,
    pub type_params: Vec<TypeParam>,
    pub extends: Vec<String>,
    pub members: Vec<InterfaceMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterfaceMember {
    Method {
        name: String,
        optional: bool,
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
        span: Span,
    },
    Property {
        name: String,
        optional: bool,
        ty: Option<TypeExpr>,
        span: Span,
    },
}

impl InterfaceMember {
    pub fn span(&self) -> &Span {
        match self {
            InterfaceMember::Method { span, .. } => span,
            InterfaceMember::Property { span, .. } => span,
        }
    }
}

/// Type alias declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAlias {
    pub name: String,
    pub is_exported: bool,
    pub type_params: Vec<TypeParam>,
    pub body: TypeExpr,
    pub span: Span,
}

/// Type expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// `i32`, `Option<T>`, `ref<T>`, `Promise<void>`
    Named {
        name: String,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// `"circle"` (union discriminants, lifetime names)
    StringLit { value: String, span: Span },
    /// `3` (fixed array lengths)
    IntLit { value: i64, span: Span },
    /// `{ kind: "circle"; radius: f64 }`
    Object {
        fields: Vec<ObjectTypeField>,
        span: Span,
    },
    /// `A | B`
    Union {
        members: Vec<TypeExpr>,
        span: Span,
    },
    /// `A & B` (only as a generic constraint)
    Intersection {
        members: Vec<TypeExpr>,
        span: Span,
    },
    /// `[A, B]`
    Tuple {
        members: Vec<TypeExpr>,
        span: Span,
    },
    /// Conditional, mapped, infer and friends: parsed far enough to be
    /// rejected with a span.
    Unsupported { description: String, span: Span },
}

impl TypeExpr {
    pub fn span(&self) -> &Span {
        match self {
            TypeExpr::Named { span, .. }
            | TypeExpr::StringLit { span, .. }
            | TypeExpr::IntLit { span, .. }
            | TypeExpr::Object { span, .. }
            | TypeExpr::Union { span, .. }
            | TypeExpr::Intersection { span, .. }
            | TypeExpr::Tuple { span, .. }
            | TypeExpr::Unsupported { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTypeField {
    pub name: String,
    pub ty: TypeExpr,
    pub optional: bool,
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    VarDecl(VarDecl),
    Expr { expr: Expr, span: Span },
    Return { value: Option<Expr>, span: Span },
    If {
        cond: Expr,
        then_block: Block,
        else_branch: Option<Box<ElseBranch>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    For(ForStmt),
    ForOf(ForOfStmt),
    Switch(SwitchStmt),
    Break { span: Span },
    Continue { span: Span },
    Block(Block),
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Stmt::VarDecl(d) => &d.span,
            Stmt::Expr { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span } => span,
            Stmt::For(f) => &f.span,
            Stmt::ForOf(f) => &f.span,
            Stmt::Switch(s) => &s.span,
            Stmt::Block(b) => &b.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub kind: VarKind,
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElseBranch {
    ElseIf(Stmt),
    Else(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForOfStmt {
    pub decl_kind: VarKind,
    pub binding: String,
    pub iterable: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    pub scrutinee: Expr,
    pub cases: Vec<SwitchCase>,
    pub default: Option<SwitchDefault>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub label: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchDefault {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Raw numeric literal text; typing comes from a surrounding cast.
    NumberLit { raw: String, span: Span },
    StringLit { value: String, span: Span },
    TemplateLit {
        parts: Vec<TemplatePart>,
        span: Span,
    },
    BoolLit { value: bool, span: Span },
    NullLit { span: Span },
    UndefinedLit { span: Span },
    Ident { name: String, span: Span },
    This { span: Span },
    Member {
        object: Box<Expr>,
        property: String,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
        span: Span,
    },
    New {
        callee: String,
        args: Vec<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    /// `i++` / `--i`
    Update {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
        span: Span,
    },
    Arrow {
        is_async: bool,
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
        body: ArrowBody,
        span: Span,
    },
    ObjectLit {
        fields: Vec<ObjectLitField>,
        span: Span,
    },
    ArrayLit { elements: Vec<Expr>, span: Span },
    /// `expr as T`
    Cast {
        expr: Box<Expr>,
        ty: TypeExpr,
        span: Span,
    },
    /// `expr as const`
    AsConst { expr: Box<Expr>, span: Span },
    Await { expr: Box<Expr>, span: Span },
    Paren { expr: Box<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::NumberLit { span, .. }
            | Expr::StringLit { span, .. }
            | Expr::TemplateLit { span, .. }
            | Expr::BoolLit { span, .. }
            | Expr::NullLit { span }
            | Expr::UndefinedLit { span }
            | Expr::Ident { span, .. }
            | Expr::This { span }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Update { span, .. }
            | Expr::Arrow { span, .. }
            | Expr::ObjectLit { span, .. }
            | Expr::ArrayLit { span, .. }
            | Expr::Cast { span, .. }
            | Expr::AsConst { span, .. }
            | Expr::Await { span, .. }
            | Expr::Paren { span, .. } => span,
        }
    }

    /// Strip parenthesis wrappers.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren { expr, .. } => expr.unparen(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLitField {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ast_round_trips_through_json() {
        let module = Module {
            file: "src/main.ls".to_string(),
            imports: vec![Import {
                clause: ImportClause::Named(vec![ImportBinding {
                    name: "q".to_string(),
                    alias: None,
                    span: Span::new("src/main.ls", 9, 10),
                }]),
                specifier: "lode/core".to_string(),
                span: Span::new("src/main.ls", 0, 30),
            }],
            items: vec![Item::Function(Function {
                name: Some("main".to_string()),
                is_async: false,
                is_exported: true,
                type_params: vec![],
                params: vec![],
                return_type: None,
                body: Some(Block {
                    stmts: vec![],
                    span: Span::new("src/main.ls", 60, 62),
                }),
                span: Span::new("src/main.ls", 31, 62),
            })],
        };

        let json = serde_json::to_string(&module).unwrap();
        let back: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(module, back);
    }

    #[test]
    fn test_unparen() {
        let span = Span::new("t.ls", 0, 3);
        let inner = Expr::Ident {
            name: "x".to_string(),
            span: span.clone(),
        };
        let wrapped = Expr::Paren {
            expr: Box::new(Expr::Paren {
                expr: Box::new(inner.clone()),
                span: span.clone(),
            }),
            span,
        };
        assert_eq!(wrapped.unparen(), &inner);
    }
}
