use lode_diagnostics::Span;
use serde::{Deserialize, Serialize};

use crate::stmt::Stmt;
use crate::types::Type;

/// Target expression with an optional source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Option<Span>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, span: None }
    }

    pub fn with_span(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span: Some(span),
        }
    }

    pub fn unit() -> Self {
        Self::new(ExprKind::Lit(Lit::Unit))
    }

    pub fn path(name: &str) -> Self {
        Self::new(ExprKind::Path(
            name.split("::").map(str::to_string).collect(),
        ))
    }

    pub fn int(raw: impl Into<String>) -> Self {
        Self::new(ExprKind::Lit(Lit::Int(raw.into())))
    }

    pub fn str_lit(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Lit(Lit::Str(value.into())))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn method(recv: Expr, name: &str, args: Vec<Expr>) -> Self {
        Self::call(
            Self::new(ExprKind::Field {
                base: Box::new(recv),
                name: name.to_string(),
            }),
            args,
        )
    }

    pub fn borrow(inner: Expr, mutable: bool) -> Self {
        Self::new(ExprKind::Borrow {
            inner: Box::new(inner),
            mutable,
        })
    }

    pub fn paren(inner: Expr) -> Self {
        Self::new(ExprKind::Paren(Box::new(inner)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lit {
    /// Raw integer text, suffix included when the lowering adds one.
    Int(String),
    /// Raw float text.
    Float(String),
    Bool(bool),
    /// String literal; escaped at render time.
    Str(String),
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
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
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Lit(Lit),
    /// `a::b::c`
    Path(Vec<String>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `path::<T1, T2>(args)`
    PathCall {
        path: Vec<String>,
        generics: Vec<Type>,
        args: Vec<Expr>,
    },
    /// `Type::func(args)` / `Type::func::<T>(args)`
    AssocCall {
        ty: Type,
        func: String,
        generics: Vec<Type>,
        args: Vec<Expr>,
    },
    Borrow {
        inner: Box<Expr>,
        mutable: bool,
    },
    Cast {
        expr: Box<Expr>,
        ty: Type,
    },
    Field {
        base: Box<Expr>,
        name: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Closure {
        is_move: bool,
        params: Vec<(String, Option<Type>)>,
        body: Box<Expr>,
    },
    /// `name!(args)`
    MacroCall {
        name: String,
        args: Vec<Expr>,
    },
    StructLit {
        path: Vec<String>,
        fields: Vec<(String, Expr)>,
    },
    /// `expr?`
    Try(Box<Expr>),
    /// `expr.await`
    Await(Box<Expr>),
    /// `unsafe { expr }`
    Unsafe(Box<Expr>),
    /// `{ stmt; stmt; tail }`, rendered on one line for embedding
    Block {
        stmts: Vec<Stmt>,
        tail: Option<Box<Expr>>,
    },
    /// `(expr)`
    Paren(Box<Expr>),
    /// `[a, b, c]`
    ArrayLit(Vec<Expr>),
    /// `(a, b)`
    TupleLit(Vec<Expr>),
}
