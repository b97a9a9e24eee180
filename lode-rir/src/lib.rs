//! Rust-target intermediate representation.
//!
//! Host lowering produces this IR; the writer renders it to source text;
//! the MIR pass round-trips function bodies through basic blocks for
//! deterministic re-emission. The IR is deliberately small: it models the
//! subset of the target language the compiler actually emits, nothing more.

pub mod expr;
pub mod item;
pub mod mir;
pub mod stmt;
pub mod types;
pub mod writer;

pub use expr::{BinOp, Expr, ExprKind, Lit, UnOp};
pub use item::{
    EnumItem, EnumVariant, FnItem, GenericParam, ImplItem, Item, ModItem, Program, Receiver,
    StructItem, TraitItem, TypeAliasItem, UseItem, Visibility,
};
pub use mir::{lower_body, overlay_spans, reemit_body, Mir, MirBlock, Terminator};
pub use stmt::{MatchArm, Pattern, Stmt, StmtKind};
pub use types::Type;
pub use writer::write_program;
