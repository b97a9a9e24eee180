//! Import resolution.
//!
//! Three families of specifier: curated marker modules (erased), relative
//! user files (module wiring), and non-relative package specifiers
//! (resolved through a bindings manifest into native `use` items plus an
//! external-crate record).

use std::fs;
use std::path::{Path, PathBuf};

use lode_ast::Import;
use lode_diagnostics::{CompileError, CompileResult, Span};
use lode_rir::UseItem;
use serde_json::Value;

use crate::codes;
use crate::program::{self, Program};

/// Marker import specifiers: their symbols exist only at compile time.
pub const MARKER_SPECIFIERS: &[&str] = &["lode/core", "lode/types", "lode/std", "lode/gpu"];

/// File name of the bindings manifest inside a package root.
pub const BINDINGS_MANIFEST_NAME: &str = "lode.bindings.json";

/// A native crate dependency recorded for the downstream build tool.
/// Deduplicated by `name` across the compile.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExternalCrate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub features: Vec<String>,
}

/// What one import contributes to the compile.
#[derive(Debug, Clone)]
pub enum ResolvedImport {
    /// Marker symbols, erased from output.
    Markers(Vec<String>),
    /// Another user file: `use crate::<module>::<symbol> [as alias]`.
    User {
        module_ident: String,
        bindings: Vec<(String, Option<String>)>,
    },
    /// A native package via its bindings manifest.
    External {
        uses: Vec<UseItem>,
        krate: ExternalCrate,
    },
}

pub fn resolve_import(
    program: &Program,
    importer_rel: &str,
    import: &Import,
) -> CompileResult<ResolvedImport> {
    if MARKER_SPECIFIERS.contains(&import.specifier.as_str()) {
        let bindings = program::named_bindings(&import.clause, &import.span)?;
        return Ok(ResolvedImport::Markers(
            bindings.into_iter().map(|(name, _)| name).collect(),
        ));
    }

    if program::is_relative(&import.specifier) {
        return resolve_user_import(program, importer_rel, import);
    }

    resolve_package_import(program, importer_rel, import)
}

fn resolve_user_import(
    program: &Program,
    importer_rel: &str,
    import: &Import,
) -> CompileResult<ResolvedImport> {
    let bindings = program::named_bindings(&import.clause, &import.span)?;
    let target = program::resolve_relative(importer_rel, &import.specifier)
        .map_err(|e| e.at(import.span.clone()))?;

    if target == program.entry_rel {
        return Err(CompileError::with_span(
            codes::IMPORT_ENTRY_MODULE,
            "the entry module cannot be imported",
            import.span.clone(),
        ));
    }
    let Some(module_ident) = program.module_ident(&target) else {
        return Err(CompileError::with_span(
            codes::IMPORT_UNRESOLVED_PACKAGE,
            format!("relative import `{}` does not resolve to a user file", import.specifier),
            import.span.clone(),
        ));
    };

    Ok(ResolvedImport::User {
        module_ident: module_ident.to_string(),
        bindings,
    })
}

fn resolve_package_import(
    program: &Program,
    importer_rel: &str,
    import: &Import,
) -> CompileResult<ResolvedImport> {
    let bindings = program::named_bindings(&import.clause, &import.span)?;

    let Some(pkg) = import.specifier.split('/').next().filter(|p| !p.is_empty()) else {
        return Err(CompileError::with_span(
            codes::IMPORT_UNRESOLVED_PACKAGE,
            format!("malformed package specifier `{}`", import.specifier),
            import.span.clone(),
        ));
    };

    let package_root = find_package_root(program, importer_rel, pkg).ok_or_else(|| {
        CompileError::with_span(
            codes::IMPORT_UNRESOLVED_PACKAGE,
            format!("no package `{pkg}` found above the importing file"),
            import.span.clone(),
        )
    })?;

    let manifest_path = package_root.join(BINDINGS_MANIFEST_NAME);
    if !manifest_path.is_file() {
        return Err(CompileError::with_span(
            codes::IMPORT_MISSING_MANIFEST,
            format!(
                "package `{pkg}` has no {BINDINGS_MANIFEST_NAME}"
            ),
            import.span.clone(),
        ));
    }

    let manifest = read_manifest(&manifest_path, &import.span)?;

    let Some(native_path) = manifest.modules.get(&import.specifier) else {
        return Err(CompileError::with_span(
            codes::IMPORT_MISSING_MAPPING,
            format!(
                "bindings manifest of `{pkg}` has no mapping for `{}`",
                import.specifier
            ),
            import.span.clone(),
        ));
    };

    let base_segments: Vec<String> = native_path.split('.').map(str::to_string).collect();
    let mut uses = Vec::new();
    for (name, alias) in bindings {
        let mut path = base_segments.clone();
        path.push(name);
        uses.push(UseItem {
            path,
            alias,
            span: Some(import.span.clone()),
        });
    }

    Ok(ResolvedImport::External {
        uses,
        krate: manifest.krate,
    })
}

/// Walk ancestors of the importing file looking for `<dir>/<pkg>/`.
fn find_package_root(program: &Program, importer_rel: &str, pkg: &str) -> Option<PathBuf> {
    let importer_abs = program.root.join(importer_rel);
    let mut dir = importer_abs.parent()?.to_path_buf();
    loop {
        let candidate = dir.join(pkg);
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

struct ParsedManifest {
    modules: std::collections::BTreeMap<String, String>,
    krate: ExternalCrate,
}

/// Read and validate a bindings manifest. Validation is by hand so every
/// failure branch carries its own catalog code.
fn read_manifest(path: &Path, span: &Span) -> CompileResult<ParsedManifest> {
    let text = fs::read_to_string(path).map_err(|e| {
        CompileError::with_span(
            codes::IMPORT_MISSING_MANIFEST,
            format!("cannot read {}: {e}", path.display()),
            span.clone(),
        )
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|e| {
        CompileError::with_span(
            codes::IMPORT_MISSING_MANIFEST,
            format!("bindings manifest is not valid JSON: {e}"),
            span.clone(),
        )
    })?;

    let crate_obj = value.get("crate").and_then(Value::as_object).ok_or_else(|| {
        CompileError::with_span(
            codes::IMPORT_MISSING_MANIFEST,
            "bindings manifest has no `crate` object",
            span.clone(),
        )
    })?;

    let name = crate_obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CompileError::with_span(
                codes::IMPORT_MISSING_MANIFEST,
                "crate descriptor has no `name`",
                span.clone(),
            )
        })?
        .to_string();

    let version = crate_obj
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);
    let crate_path = crate_obj
        .get("path")
        .and_then(Value::as_str)
        .map(str::to_string);
    match (&version, &crate_path) {
        (Some(_), Some(_)) => {
            return Err(CompileError::with_span(
                codes::MANIFEST_CRATE_SOURCE,
                format!("crate `{name}` declares both `version` and `path`"),
                span.clone(),
            ))
        }
        (None, None) => {
            return Err(CompileError::with_span(
                codes::MANIFEST_CRATE_SOURCE,
                format!("crate `{name}` declares neither `version` nor `path`"),
                span.clone(),
            ))
        }
        _ => {}
    }

    let features = match crate_obj.get("features") {
        None => Vec::new(),
        Some(Value::Array(values)) => {
            let mut features = Vec::new();
            for value in values {
                let Some(feature) = value.as_str() else {
                    return Err(CompileError::with_span(
                        codes::MANIFEST_FEATURES_TYPE,
                        format!("crate `{name}` has a non-string feature entry"),
                        span.clone(),
                    ));
                };
                features.push(feature.to_string());
            }
            features
        }
        Some(_) => {
            return Err(CompileError::with_span(
                codes::MANIFEST_FEATURES_TYPE,
                format!("crate `{name}` has a `features` field that is not an array"),
                span.clone(),
            ))
        }
    };

    let package = crate_obj
        .get("package")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut modules = std::collections::BTreeMap::new();
    if let Some(obj) = value.get("modules").and_then(Value::as_object) {
        for (key, val) in obj {
            if let Some(mapped) = val.as_str() {
                modules.insert(key.clone(), mapped.to_string());
            }
        }
    }

    Ok(ParsedManifest {
        modules,
        krate: ExternalCrate {
            name,
            package,
            version,
            path: crate_path,
            features,
        },
    })
}

/// Deduplicate by crate name, keeping first occurrence, sorted by name.
pub fn dedup_crates(crates: Vec<ExternalCrate>) -> Vec<ExternalCrate> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out: Vec<ExternalCrate> = Vec::new();
    for krate in crates {
        if seen.insert(krate.name.clone()) {
            out.push(krate);
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}
