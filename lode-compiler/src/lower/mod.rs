//! Host lowering: the source program to the target IR.
//!
//! Two passes. The collect pass walks every file for declarations
//! (aliases, unions, interfaces, classes, function signatures, imports)
//! so that lowering can resolve names and insert borrows without forward
//! references. The lower pass then produces items in the fixed emission
//! order: external uses, kernel marker, aliases, traits, structs and
//! enums, helper functions, module blocks, and `main` last.

mod expressions;
mod items;
mod statements;

use std::collections::{BTreeMap, BTreeSet};

use lode_ast::{Item, Stmt, VarKind};
use lode_diagnostics::{CompileError, CompileResult};
use lode_rir::{
    FnItem, Item as RItem, ModItem, Program as RProgram, StructItem, Type, UseItem,
};

use crate::codes;
use crate::imports::{self, ExternalCrate, ResolvedImport};
use crate::kernel::KernelRegistry;
use crate::orchestrator::RuntimeKind;
use crate::program::Program;
use crate::type_lowering::TypeCtx;

/// How an argument position receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Value,
    Ref,
    MutRef,
}

#[derive(Debug, Clone)]
pub struct VariantInfo {
    /// Discriminant value as written (`"circle"`).
    pub kind: String,
    /// PascalCased variant name (`Circle`).
    pub variant: String,
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug, Clone)]
pub struct UnionInfo {
    pub name: String,
    pub variants: Vec<VariantInfo>,
}

impl UnionInfo {
    pub fn variant_for_kind(&self, kind: &str) -> Option<&VariantInfo> {
        self.variants.iter().find(|v| v.kind == kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    pub field_names: Vec<String>,
    pub ctor_modes: Option<Vec<ParamMode>>,
    /// Method name to parameter modes (receiver excluded).
    pub methods: BTreeMap<String, Vec<ParamMode>>,
}

/// What an interface requires, for splitting class methods into trait
/// impl blocks.
#[derive(Debug, Clone, Default)]
pub struct TraitMembers {
    pub methods: BTreeSet<String>,
}

pub struct Lowering<'p> {
    pub program: &'p Program,
    pub runtime: RuntimeKind,
    pub kernels: KernelRegistry,
    pub type_ctx: TypeCtx,
    pub unions: BTreeMap<String, UnionInfo>,
    pub classes: BTreeMap<String, ClassInfo>,
    pub interface_members: BTreeMap<String, TraitMembers>,
    pub fn_sigs: BTreeMap<String, Vec<ParamMode>>,
    /// Marker names imported from the curated modules.
    pub markers: BTreeSet<String>,
    /// Const symbols bound to kernels, per the extraction pass.
    pub kernel_symbols: BTreeSet<String>,
    /// `#[...]` lines attached by annotation statements, per target name.
    pub attrs: BTreeMap<String, Vec<String>>,
    /// Anonymous structs synthesized for uncontextual object literals.
    pub anon_structs: Vec<StructItem>,
    pub external_crates: Vec<ExternalCrate>,
    /// Use items per file (entry file's land at the top level).
    pub uses_per_file: BTreeMap<String, Vec<UseItem>>,
}

impl<'p> Lowering<'p> {
    pub fn new(
        program: &'p Program,
        runtime: RuntimeKind,
        kernels: KernelRegistry,
        kernel_symbols: BTreeSet<String>,
    ) -> Self {
        Self {
            program,
            runtime,
            kernels,
            type_ctx: TypeCtx::default(),
            unions: BTreeMap::new(),
            classes: BTreeMap::new(),
            interface_members: BTreeMap::new(),
            fn_sigs: BTreeMap::new(),
            markers: BTreeSet::new(),
            kernel_symbols,
            attrs: BTreeMap::new(),
            anon_structs: Vec::new(),
            external_crates: Vec::new(),
            uses_per_file: BTreeMap::new(),
        }
    }

    /// Attribute lines for an item, consumed at emission.
    pub fn attrs_for(&self, name: &str) -> Vec<String> {
        self.attrs.get(name).cloned().unwrap_or_default()
    }

    /// The whole lowering: collect, then emit per the fixed order.
    pub fn run(mut self) -> CompileResult<(RProgram, Vec<ExternalCrate>)> {
        self.collect()?;

        let mut items: Vec<RItem> = Vec::new();

        // External and user `use` items of the entry file come first.
        let entry_rel = self.program.entry_rel.clone();
        for use_item in self.uses_per_file.get(&entry_rel).cloned().unwrap_or_default() {
            items.push(RItem::Use(use_item));
        }

        // Kernel placeholder marker.
        if !self.kernels.is_empty() {
            items.push(RItem::Struct(StructItem {
                vis: lode_rir::Visibility::Private,
                name: "KernelArtifacts".to_string(),
                attrs: vec!["#[allow(dead_code)]".to_string()],
                generics: vec![],
                fields: vec![],
                span: None,
            }));
        }

        // Entry-file declarations, grouped by kind.
        let entry = self.program.entry().clone();
        let mut aliases = Vec::new();
        let mut traits = Vec::new();
        let mut adts = Vec::new();
        let mut helpers = Vec::new();
        let mut main_fn: Option<FnItem> = None;

        for item in &entry.module.items {
            match item {
                Item::TypeAlias(alias) => {
                    aliases.extend(self.lower_type_alias(&entry.rel, alias)?)
                }
                Item::Interface(iface) => {
                    traits.push(RItem::Trait(self.lower_interface(&entry.rel, iface)?))
                }
                Item::Class(class) => adts.extend(self.lower_class(&entry.rel, class)?),
                Item::Function(func) => {
                    if func.name.as_deref() == Some("main") {
                        main_fn = Some(self.lower_main(&entry.rel, func)?);
                    } else {
                        helpers.push(RItem::Fn(self.lower_function(&entry.rel, func)?));
                    }
                }
                Item::Statement(stmt) => self.lower_top_level_stmt(&entry.rel, stmt)?,
                Item::ExportMarker { .. } => {}
                Item::ExportNamed { span, .. } => {
                    return Err(CompileError::with_span(
                        codes::BARREL_REEXPORT,
                        "re-exporting symbols is not supported",
                        span.clone(),
                    ))
                }
            }
        }

        let Some(main_fn) = main_fn else {
            return Err(CompileError::new(
                codes::MISSING_MAIN,
                "the entry file must export a `main` function",
            ));
        };

        items.append(&mut aliases);
        items.append(&mut traits);
        items.append(&mut adts);
        for anon in std::mem::take(&mut self.anon_structs) {
            items.push(RItem::Struct(anon));
        }
        items.append(&mut helpers);

        // Module blocks for non-entry files, ordered by file name.
        let files: Vec<_> = self
            .program
            .files
            .keys()
            .filter(|rel| **rel != entry_rel)
            .cloned()
            .collect();
        for rel in files {
            items.push(RItem::Mod(self.lower_module_block(&rel)?));
        }

        items.push(RItem::Fn(main_fn));

        let crates = imports::dedup_crates(std::mem::take(&mut self.external_crates));
        Ok((RProgram { items }, crates))
    }

    // ==================== Collect pass ====================

    fn collect(&mut self) -> CompileResult<()> {
        // Imports first: markers and external names feed the type context.
        let rels: Vec<String> = self.program.files.keys().cloned().collect();
        for rel in &rels {
            let file = &self.program.files[rel];
            let mut uses = Vec::new();
            for import in &file.module.imports {
                match imports::resolve_import(self.program, rel, import)? {
                    ResolvedImport::Markers(names) => {
                        self.markers.extend(names);
                    }
                    ResolvedImport::User {
                        module_ident,
                        bindings,
                    } => {
                        for (name, alias) in bindings {
                            let local = alias.clone().unwrap_or_else(|| name.clone());
                            if starts_upper(&local) {
                                self.type_ctx.nominals.insert(local);
                            }
                            uses.push(UseItem {
                                path: vec![
                                    "crate".to_string(),
                                    module_ident.clone(),
                                    name,
                                ],
                                alias,
                                span: Some(import.span.clone()),
                            });
                        }
                    }
                    ResolvedImport::External { uses: ext_uses, krate } => {
                        for use_item in &ext_uses {
                            if let Some(last) = use_item.path.last() {
                                let local =
                                    use_item.alias.clone().unwrap_or_else(|| last.clone());
                                if starts_upper(&local) {
                                    self.type_ctx.nominals.insert(local);
                                }
                            }
                        }
                        uses.extend(ext_uses);
                        self.external_crates.push(krate);
                    }
                }
            }
            self.uses_per_file.insert(rel.clone(), uses);
        }

        // Names first, so later declarations can reference earlier files
        // and vice versa.
        for rel in &rels {
            let file = self.program.files[rel].clone();
            for item in &file.module.items {
                match item {
                    Item::TypeAlias(alias) => {
                        self.type_ctx.nominals.insert(alias.name.clone());
                    }
                    Item::Interface(iface) => {
                        self.type_ctx.interfaces.insert(iface.name.clone());
                    }
                    Item::Class(class) => {
                        if let Some(name) = &class.name {
                            self.type_ctx.nominals.insert(name.clone());
                        }
                    }
                    _ => {}
                }
            }
        }

        // Details: union variants, class signatures, trait members,
        // function parameter modes.
        for rel in &rels {
            let file = self.program.files[rel].clone();
            let mut fn_names: BTreeSet<String> = BTreeSet::new();
            for item in &file.module.items {
                match item {
                    Item::TypeAlias(alias) => self.collect_alias_details(alias)?,
                    Item::Interface(iface) => self.collect_interface_details(iface),
                    Item::Class(class) => self.collect_class_details(class)?,
                    Item::Function(func) => {
                        let Some(name) = &func.name else { continue };
                        if !fn_names.insert(name.clone()) {
                            return Err(CompileError::with_span(
                                codes::DUPLICATE_HELPER,
                                format!("function `{name}` is declared twice"),
                                func.span.clone(),
                            ));
                        }
                        let modes = items::param_modes(&func.params);
                        self.fn_sigs.insert(name.clone(), modes);
                    }
                    Item::Statement(Stmt::VarDecl(decl))
                        if self.kernel_symbols.contains(&decl.name) => {}
                    Item::Statement(Stmt::Expr { expr, span }) => {
                        if items::is_annotation_stmt(expr) {
                            self.lower_annotation_stmt(rel, expr, span)?;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Top-level statements: kernel consts, annotation calls, and the
    /// rejections for everything else.
    fn lower_top_level_stmt(&mut self, _rel: &str, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::VarDecl(decl) => {
                if self.kernel_symbols.contains(&decl.name) {
                    return Ok(());
                }
                if decl.kind == VarKind::Const {
                    Err(CompileError::with_span(
                        codes::UNSUPPORTED_TOP_LEVEL,
                        "top-level consts must be kernel declarations",
                        decl.span.clone(),
                    ))
                } else {
                    Err(CompileError::with_span(
                        codes::TOP_LEVEL_NON_CONST,
                        "top-level variables must be `const`",
                        decl.span.clone(),
                    ))
                }
            }
            Stmt::Expr { expr, span } => {
                // Annotation statements were registered during collect;
                // anything else expression-shaped is rejected here.
                if items::is_annotation_stmt(expr) {
                    Ok(())
                } else {
                    Err(CompileError::with_span(
                        codes::UNSUPPORTED_TOP_LEVEL,
                        "statement is not allowed at the top level",
                        span.clone(),
                    ))
                }
            }
            other => Err(CompileError::with_span(
                codes::UNSUPPORTED_TOP_LEVEL,
                "statement is not allowed at the top level",
                other.span().clone(),
            )),
        }
    }

    fn lower_module_block(&mut self, rel: &str) -> CompileResult<ModItem> {
        let file = self.program.files[rel].clone();
        let Some(ident) = self.program.module_ident(rel) else {
            return Err(CompileError::new(
                codes::MODULE_NAME_COLLISION,
                format!("no module identifier for `{rel}`"),
            ));
        };
        let ident = ident.to_string();

        let mut inner: Vec<RItem> = Vec::new();
        for use_item in self.uses_per_file.get(rel).cloned().unwrap_or_default() {
            inner.push(RItem::Use(use_item));
        }

        for item in &file.module.items {
            match item {
                Item::TypeAlias(alias) => inner.extend(self.lower_type_alias(rel, alias)?),
                Item::Interface(iface) => {
                    inner.push(RItem::Trait(self.lower_interface(rel, iface)?))
                }
                Item::Class(class) => inner.extend(self.lower_class(rel, class)?),
                Item::Function(func) => {
                    inner.push(RItem::Fn(self.lower_function(rel, func)?))
                }
                Item::Statement(stmt) => self.lower_top_level_stmt(rel, stmt)?,
                Item::ExportMarker { .. } => {}
                Item::ExportNamed { span, .. } => {
                    return Err(CompileError::with_span(
                        codes::BARREL_REEXPORT,
                        "re-exporting symbols is not supported",
                        span.clone(),
                    ))
                }
            }
        }

        // Anonymous structs referenced by this module's bodies live with it.
        for anon in std::mem::take(&mut self.anon_structs) {
            inner.push(RItem::Struct(anon));
        }

        Ok(ModItem {
            name: ident,
            items: inner,
            span: None,
        })
    }
}

pub fn starts_upper(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Deterministic PascalCase for union variant names.
pub fn pascal_case(kind: &str) -> String {
    let mut out = String::with_capacity(kind.len());
    let mut upper_next = true;
    for ch in kind.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Anonymous struct name from the construction span. The digest covers
/// the normalized file name and byte range, so relocating the project
/// does not change the name, but two identical literals at different
/// positions get distinct types.
pub fn anon_struct_name(span: &lode_diagnostics::Span) -> String {
    let key = format!("{}:{}:{}", span.file, span.start, span.end);
    let digest = blake3::hash(key.as_bytes());
    let hex = digest.to_hex();
    format!("Anon_{}", &hex.as_str()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_diagnostics::Span;

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("circle"), "Circle");
        assert_eq!(pascal_case("two_words"), "TwoWords");
        assert_eq!(pascal_case("kebab-case"), "KebabCase");
    }

    #[test]
    fn test_anon_struct_name_is_stable_and_position_sensitive() {
        let a = anon_struct_name(&Span::new("src/main.ls", 10, 20));
        let b = anon_struct_name(&Span::new("src/main.ls", 10, 20));
        let c = anon_struct_name(&Span::new("src/main.ls", 30, 40));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("Anon_"));
        assert_eq!(a.len(), "Anon_".len() + 8);
    }
}
