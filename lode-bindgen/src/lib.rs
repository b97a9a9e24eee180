//! Binding extractor: reads a native crate and produces a
//! declarations-only facade package, a bindings manifest for the import
//! resolver, and a report of everything the lenient scan skipped.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub mod emit;
pub mod manifest;
pub mod report;
pub mod scan;
pub mod types;

pub use manifest::{BindingsManifest, CrateDescriptor, BINDINGS_MANIFEST_NAME};
pub use report::{GenerationReport, SkipKind, Skipped};

use emit::{
    FacadeClass, FacadeDecl, FacadeFn, FacadeInterface, FacadeMethod, FacadeModule,
};
use scan::{RawFn, RawReceiver, ScannedModule};
use types::rewrite_type;

/// File name of the generation report written next to the facade.
pub const REPORT_NAME: &str = "lode.bindgen.report.json";

#[derive(Debug, Clone)]
pub struct BindgenOptions {
    /// Path to the native crate's `Cargo.toml`.
    pub manifest_path: PathBuf,
    /// Output directory for the facade package.
    pub out_dir: PathBuf,
    /// Facade package name; defaults to the crate name.
    pub package_name: Option<String>,
    /// Feature set recorded in the bindings manifest.
    pub features: Vec<String>,
    /// Copy the whole crate into `<out>/crate/` and record `path`
    /// instead of `version`.
    pub bundle: bool,
}

#[derive(Debug)]
pub struct BindgenOutput {
    pub manifest: BindingsManifest,
    pub report: GenerationReport,
    /// Modules emitted, in output order.
    pub modules: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CargoManifest {
    package: CargoPackage,
    lib: Option<CargoLib>,
}

#[derive(Debug, Deserialize)]
struct CargoPackage {
    name: String,
    #[serde(default)]
    version: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct CargoLib {
    path: Option<String>,
}

/// Run the extractor.
pub fn extract(options: &BindgenOptions) -> Result<BindgenOutput> {
    let manifest_text = fs::read_to_string(&options.manifest_path)
        .with_context(|| format!("Failed to read {}", options.manifest_path.display()))?;
    let cargo: CargoManifest =
        toml::from_str(&manifest_text).context("Failed to parse native crate manifest")?;

    let crate_name = cargo.package.name.clone();
    let crate_ident = crate_name.replace('-', "_");
    let version = cargo
        .package
        .version
        .as_ref()
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0")
        .to_string();

    let crate_dir = options
        .manifest_path
        .parent()
        .context("Native manifest has no parent directory")?
        .to_path_buf();
    let lib_path = cargo
        .lib
        .and_then(|l| l.path)
        .unwrap_or_else(|| "src/lib.rs".to_string());
    let root_file = crate_dir.join(lib_path);

    let mut report = GenerationReport::new();

    // Phase 1: traverse the module tree.
    let mut scanned: Vec<(Vec<String>, ScannedModule)> = Vec::new();
    collect_modules(&root_file, Vec::new(), &mut scanned)?;

    // Phase 2: clone re-exported declarations into their new homes.
    resolve_reexports(&mut scanned, &mut report);

    // Phase 3: build the facade model, attaching impls as we go.
    let mut facades: Vec<FacadeModule> = scanned
        .iter()
        .map(|(segments, module)| build_facade(&crate_ident, segments, module, &mut report))
        .collect();
    facades.sort_by(|a, b| a.dotted_path.cmp(&b.dotted_path));

    // Phase 4: write the output tree.
    let pkg = options
        .package_name
        .clone()
        .unwrap_or_else(|| crate_name.clone());
    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("Failed to create {}", options.out_dir.display()))?;

    for facade in &facades {
        let decls_path = options.out_dir.join(format!("{}.d.ls", facade.stem));
        fs::write(&decls_path, emit::render_module(facade))
            .with_context(|| format!("Failed to write {}", decls_path.display()))?;
        // Runtime stub so the descriptor's default paths resolve.
        let runtime_path = options.out_dir.join(format!("{}.ls", facade.stem));
        fs::write(&runtime_path, "export {};\n")
            .with_context(|| format!("Failed to write {}", runtime_path.display()))?;
    }

    let descriptor_path = options.out_dir.join(format!("{}.json", pkg));
    fs::write(
        &descriptor_path,
        emit::render_package_descriptor(&pkg, &version, &facades),
    )
    .with_context(|| format!("Failed to write {}", descriptor_path.display()))?;

    if options.bundle {
        copy_crate_tree(&crate_dir, &options.out_dir.join("crate"))?;
    }

    let mut modules_table = BTreeMap::new();
    for facade in &facades {
        modules_table.insert(
            format!("{}/{}.ls", pkg, facade.stem),
            facade.dotted_path.clone(),
        );
    }

    let manifest = BindingsManifest {
        schema: 1,
        kind: "crate".to_string(),
        crate_: CrateDescriptor {
            name: crate_name,
            package: None,
            version: if options.bundle {
                None
            } else {
                Some(version)
            },
            path: if options.bundle {
                Some("./crate".to_string())
            } else {
                None
            },
            features: options.features.clone(),
        },
        modules: modules_table,
    };
    manifest.to_file(options.out_dir.join(BINDINGS_MANIFEST_NAME))?;

    fs::write(options.out_dir.join(REPORT_NAME), report.to_json())
        .context("Failed to write bindgen report")?;

    log::debug!(
        "bindgen emitted {} module(s), {} skip(s)",
        facades.len(),
        report.skipped.len()
    );

    Ok(BindgenOutput {
        manifest,
        report,
        modules: facades.iter().map(|f| f.dotted_path.clone()).collect(),
    })
}

/// Recurse through `pub mod name;` declarations.
fn collect_modules(
    file: &Path,
    segments: Vec<String>,
    out: &mut Vec<(Vec<String>, ScannedModule)>,
) -> Result<()> {
    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read module file {}", file.display()))?;
    let module = scan::scan_module(&source);

    // Submodules resolve relative to this file's directory; `lib.rs` and
    // `mod.rs` resolve siblings, `name.rs` resolves into `name/`.
    let base_dir = module_child_dir(file, &segments)?;

    let mut submodules = module.submodules.clone();
    submodules.sort();
    out.push((segments.clone(), module));

    for name in submodules {
        let flat = base_dir.join(format!("{}.rs", name));
        let nested = base_dir.join(&name).join("mod.rs");
        let child = if flat.is_file() {
            flat
        } else if nested.is_file() {
            nested
        } else {
            log::warn!("module `{}` not found under {}", name, base_dir.display());
            continue;
        };
        let mut child_segments = segments.clone();
        child_segments.push(name);
        collect_modules(&child, child_segments, out)?;
    }
    Ok(())
}

fn module_child_dir(file: &Path, segments: &[String]) -> Result<PathBuf> {
    let parent = file
        .parent()
        .context("Module file has no parent directory")?;
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if segments.is_empty() || stem == "mod" {
        Ok(parent.to_path_buf())
    } else {
        Ok(parent.join(stem))
    }
}

/// Clone re-exported declarations into the re-exporting module; demote
/// anything unresolved to the skipped report.
fn resolve_reexports(
    scanned: &mut [(Vec<String>, ScannedModule)],
    report: &mut GenerationReport,
) {
    let snapshot: Vec<(Vec<String>, ScannedModule)> = scanned.to_vec();

    for (segments, module) in scanned.iter_mut() {
        let reexports = module.reexports.clone();
        for reexport in reexports {
            let Some((target_segments, symbol)) =
                normalize_reexport_path(segments, &reexport.path)
            else {
                report.skip(
                    SkipKind::Reexport,
                    "unresolved re-export path",
                    Some(reexport.snippet.clone()),
                );
                continue;
            };
            let Some((_, target)) = snapshot.iter().find(|(s, _)| *s == target_segments) else {
                report.skip(
                    SkipKind::Reexport,
                    "re-export target module not found",
                    Some(reexport.snippet.clone()),
                );
                continue;
            };

            let local = reexport.alias.clone().unwrap_or_else(|| symbol.clone());
            if !clone_decl(target, &symbol, &local, module) {
                report.skip(
                    SkipKind::Reexport,
                    "re-exported symbol not found",
                    Some(reexport.snippet.clone()),
                );
            }
        }
    }
}

/// Resolve a re-export path to (module segments, symbol name). Handles
/// `crate::`, `self::`, `super::`, and plain child paths.
fn normalize_reexport_path(
    current: &[String],
    path: &[String],
) -> Option<(Vec<String>, String)> {
    if path.len() < 2 {
        return None;
    }
    let symbol = path.last()?.clone();
    if symbol == "*" || !symbol.chars().next()?.is_ascii_alphabetic() {
        return None;
    }
    let middle = &path[..path.len() - 1];

    let mut segments: Vec<String> = match middle.first().map(String::as_str) {
        Some("crate") => Vec::new(),
        Some("self") => current.to_vec(),
        Some("super") => {
            let mut base = current.to_vec();
            base.pop()?;
            base
        }
        _ => current.to_vec(),
    };
    let skip = matches!(
        middle.first().map(String::as_str),
        Some("crate") | Some("self") | Some("super")
    ) as usize;
    for seg in &middle[skip..] {
        segments.push(seg.clone());
    }
    Some((segments, symbol))
}

/// Copy one declaration (by kind lookup) under a new name.
fn clone_decl(
    source: &ScannedModule,
    symbol: &str,
    local: &str,
    dest: &mut ScannedModule,
) -> bool {
    if let Some(s) = source.structs.iter().find(|s| s.name == symbol) {
        let mut cloned = s.clone();
        cloned.name = local.to_string();
        // Impl methods travel with the type.
        for imp in source.impls.iter().filter(|i| i.target == symbol) {
            let mut imp = imp.clone();
            imp.target = local.to_string();
            dest.impls.push(imp);
        }
        dest.structs.push(cloned);
        return true;
    }
    if let Some(e) = source.enums.iter().find(|e| e.name == symbol) {
        let mut cloned = e.clone();
        cloned.name = local.to_string();
        dest.enums.push(cloned);
        return true;
    }
    if let Some(t) = source.traits.iter().find(|t| t.name == symbol) {
        let mut cloned = t.clone();
        cloned.name = local.to_string();
        dest.traits.push(cloned);
        return true;
    }
    if let Some(f) = source.fns.iter().find(|f| f.name == symbol) {
        let mut cloned = f.clone();
        cloned.name = local.to_string();
        dest.fns.push(cloned);
        return true;
    }
    if let Some(c) = source.consts.iter().find(|c| c.name == symbol) {
        let mut cloned = c.clone();
        cloned.name = local.to_string();
        dest.consts.push(cloned);
        return true;
    }
    false
}

fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for ch in name.chars() {
        if ch == '_' || ch == '-' {
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

/// Keep type generic parameters; report lifetimes and const generics.
fn filter_generics(raw: &[String], report: &mut GenerationReport) -> Vec<String> {
    let mut kept = Vec::new();
    for param in raw {
        let trimmed = param.trim();
        if trimmed.starts_with('\'') || trimmed.starts_with("const ") {
            report.skip(
                SkipKind::Generic,
                "lifetime or const generic parameter",
                Some(trimmed.to_string()),
            );
            continue;
        }
        let name = trimmed.split(':').next().unwrap_or(trimmed).trim();
        if !name.is_empty() {
            kept.push(name.to_string());
        }
    }
    kept
}

fn convert_fn(raw: &RawFn, report: &mut GenerationReport) -> Option<FacadeFn> {
    let generics = filter_generics(&raw.generics, report);
    let mut params = Vec::new();
    for (name, ty) in &raw.params {
        match rewrite_type(ty) {
            Ok(rewritten) => params.push((name.clone(), rewritten)),
            Err(reason) => {
                report.skip(SkipKind::Param, reason, Some(format!("{}: {}", name, ty)));
                return None;
            }
        }
    }
    let ret = match &raw.ret {
        Some(ty) => match rewrite_type(ty) {
            Ok(rewritten) => rewritten,
            Err(reason) => {
                report.skip(SkipKind::Type, reason, Some(ty.clone()));
                return None;
            }
        },
        None => "void".to_string(),
    };
    Some(FacadeFn {
        name: raw.name.clone(),
        generics,
        params,
        ret,
    })
}

fn build_facade(
    crate_ident: &str,
    segments: &[String],
    module: &ScannedModule,
    report: &mut GenerationReport,
) -> FacadeModule {
    let dotted_path = if segments.is_empty() {
        crate_ident.to_string()
    } else {
        format!("{}.{}", crate_ident, segments.join("."))
    };
    let stem = if segments.is_empty() {
        "index".to_string()
    } else {
        segments.join("_")
    };

    let mut decls = Vec::new();

    for c in &module.consts {
        match rewrite_type(&c.ty) {
            Ok(ty) => decls.push(FacadeDecl::Const {
                name: c.name.clone(),
                ty,
            }),
            Err(reason) => report.skip(SkipKind::Type, reason, Some(c.ty.clone())),
        }
    }

    for f in &module.fns {
        if let Some(converted) = convert_fn(f, report) {
            decls.push(FacadeDecl::Function(converted));
        }
    }

    for s in &module.structs {
        if s.is_tuple {
            report.skip(
                SkipKind::Type,
                "tuple struct fields are not representable",
                Some(s.name.clone()),
            );
        }
        let generics = filter_generics(&s.generics, report);

        let mut fields = Vec::new();
        for (fname, fty) in &s.fields {
            match rewrite_type(fty) {
                Ok(ty) => fields.push((fname.clone(), ty)),
                Err(reason) => {
                    report.skip(SkipKind::Type, reason, Some(format!("{}: {}", fname, fty)))
                }
            }
        }

        let mut constructor = None;
        let mut methods = Vec::new();
        let mut statics = Vec::new();

        for imp in module.impls.iter().filter(|i| i.target == s.name) {
            for m in &imp.methods {
                let Some(converted) = convert_fn(m, report) else {
                    continue;
                };
                if m.receiver.is_none() && (m.name == "new" || m.name == "new_") {
                    constructor = Some(converted.params);
                } else if m.receiver.is_some() {
                    if methods.iter().all(|existing: &FacadeFn| existing.name != converted.name) {
                        methods.push(converted);
                    }
                } else if statics
                    .iter()
                    .all(|existing: &FacadeFn| existing.name != converted.name)
                {
                    statics.push(converted);
                }
            }
        }

        methods.sort_by(|a, b| a.name.cmp(&b.name));
        statics.sort_by(|a, b| a.name.cmp(&b.name));

        decls.push(FacadeDecl::Class(FacadeClass {
            name: s.name.clone(),
            generics,
            fields,
            constructor,
            methods,
            statics,
        }));
    }

    for e in &module.enums {
        let _ = filter_generics(&e.generics, report);
        let mut members = Vec::new();
        for (vname, has_payload) in &e.variants {
            if *has_payload {
                report.skip(
                    SkipKind::Enum,
                    "variant payload dropped",
                    Some(format!("{}::{}", e.name, vname)),
                );
            }
            members.push(pascal_case(vname));
        }
        decls.push(FacadeDecl::EnumClass {
            name: e.name.clone(),
            members,
        });
    }

    for t in &module.traits {
        let mut generics = filter_generics(&t.generics, report);
        generics.extend(t.assoc_types.iter().cloned());

        let mut methods = Vec::new();
        for m in &t.methods {
            let this_ty = match m.receiver {
                Some(RawReceiver::Ref) => "ref<this>".to_string(),
                Some(RawReceiver::RefMut) => "mutref<this>".to_string(),
                _ => {
                    report.skip(
                        SkipKind::TraitMethod,
                        "method without a reference receiver",
                        Some(format!("{}::{}", t.name, m.name)),
                    );
                    continue;
                }
            };
            let mut ok = true;
            let mut params = Vec::new();
            for (pname, pty) in &m.params {
                match rewrite_type(pty) {
                    Ok(ty) => params.push((pname.clone(), ty)),
                    Err(reason) => {
                        report.skip(
                            SkipKind::TraitMethod,
                            reason,
                            Some(format!("{}: {}", pname, pty)),
                        );
                        ok = false;
                        break;
                    }
                }
            }
            if !ok {
                continue;
            }
            let ret = match &m.ret {
                Some(ty) => match rewrite_type(ty) {
                    Ok(rewritten) => rewritten,
                    Err(reason) => {
                        report.skip(SkipKind::TraitMethod, reason, Some(ty.clone()));
                        continue;
                    }
                },
                None => "void".to_string(),
            };
            methods.push(FacadeMethod {
                name: m.name.clone(),
                this_ty,
                params,
                ret,
            });
        }
        methods.sort_by(|a, b| a.name.cmp(&b.name));

        decls.push(FacadeDecl::Interface(FacadeInterface {
            name: t.name.clone(),
            generics,
            methods,
        }));
    }

    // Impls whose target never materialized in this module.
    for imp in &module.impls {
        let attached = module.structs.iter().any(|s| s.name == imp.target);
        if !attached && imp.target != "Self" {
            report.skip(
                SkipKind::Impl,
                "impl target not declared in this module",
                Some(imp.target.clone()),
            );
        }
    }

    FacadeModule {
        dotted_path,
        stem,
        decls,
    }
}

/// Recursive copy, skipping build output and VCS metadata.
fn copy_crate_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).with_context(|| format!("Failed to create {}", to.display()))?;
    let mut entries: Vec<_> = fs::read_dir(from)
        .with_context(|| format!("Failed to read {}", from.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        if name == "target" || name == ".git" {
            continue;
        }
        let src = entry.path();
        let dst = to.join(&name);
        if src.is_dir() {
            copy_crate_tree(&src, &dst)?;
        } else {
            fs::copy(&src, &dst)
                .with_context(|| format!("Failed to copy {}", src.display()))?;
        }
    }
    Ok(())
}
