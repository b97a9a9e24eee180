use lode_diagnostics::Span;
use serde::{Deserialize, Serialize};

use crate::stmt::Stmt;
use crate::types::Type;

/// A complete target program: an ordered list of items. Ordering is the
/// caller's responsibility; the writer renders exactly what it is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Private,
    Pub,
}

impl Visibility {
    pub fn prefix(&self) -> &'static str {
        match self {
            Visibility::Private => "",
            Visibility::Pub => "pub ",
        }
    }
}

/// Generic parameter with trait bounds: `T`, `T: Display + Clone`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericParam {
    pub name: String,
    pub bounds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Use(UseItem),
    Mod(ModItem),
    TypeAlias(TypeAliasItem),
    Struct(StructItem),
    Enum(EnumItem),
    Trait(TraitItem),
    Impl(ImplItem),
    Fn(FnItem),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseItem {
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModItem {
    pub name: String,
    pub items: Vec<Item>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasItem {
    pub vis: Visibility,
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub ty: Type,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructItem {
    pub vis: Visibility,
    pub name: String,
    /// Already-rendered attribute lines, e.g. `#[derive(Debug)]`.
    pub attrs: Vec<String>,
    pub generics: Vec<GenericParam>,
    pub fields: Vec<(String, Type)>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumItem {
    pub vis: Visibility,
    pub name: String,
    pub attrs: Vec<String>,
    pub generics: Vec<GenericParam>,
    pub variants: Vec<EnumVariant>,
    pub span: Option<Span>,
}

/// Variants with no fields render as bare identifiers; otherwise in
/// named-field form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitItem {
    pub vis: Visibility,
    pub name: String,
    pub attrs: Vec<String>,
    pub generics: Vec<GenericParam>,
    pub supertraits: Vec<String>,
    /// Method signatures; bodies are `None` for requirements.
    pub methods: Vec<FnItem>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplItem {
    /// `Some(path)` for `impl Trait for Type`, `None` for inherent impls.
    pub trait_path: Option<Vec<String>>,
    pub ty: Type,
    pub fns: Vec<FnItem>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Receiver {
    None,
    RefSelf {
        mutable: bool,
        lifetime: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnItem {
    pub vis: Visibility,
    pub name: String,
    pub attrs: Vec<String>,
    pub generics: Vec<GenericParam>,
    pub receiver: Receiver,
    pub is_async: bool,
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    /// `None` for trait method requirements.
    pub body: Option<Vec<Stmt>>,
    pub span: Option<Span>,
}

impl FnItem {
    /// Bare function skeleton; callers fill in what differs.
    pub fn new(name: &str) -> Self {
        Self {
            vis: Visibility::Private,
            name: name.to_string(),
            attrs: Vec::new(),
            generics: Vec::new(),
            receiver: Receiver::None,
            is_async: false,
            params: Vec::new(),
            ret: Type::Unit,
            body: Some(Vec::new()),
            span: None,
        }
    }
}
