use lode_diagnostics::Span;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::types::Type;

/// Target statement with an optional source span. The writer drops a span
/// comment before every statement that carries one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Option<Span>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { kind, span: None }
    }

    pub fn with_span(kind: StmtKind, span: Span) -> Self {
        Self {
            kind,
            span: Some(span),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Let {
        name: String,
        mutable: bool,
        ty: Option<Type>,
        init: Option<Expr>,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    /// Expression statement, rendered with a trailing semicolon.
    Expr(Expr),
    If {
        cond: Expr,
        then_stmts: Vec<Stmt>,
        else_stmts: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// `_`
    Wildcard,
    /// `Shape::Circle`
    Path(Vec<String>),
    /// `Shape::Circle { radius }`
    Struct {
        path: Vec<String>,
        fields: Vec<String>,
    },
    /// Literal pattern
    Lit(Expr),
}
