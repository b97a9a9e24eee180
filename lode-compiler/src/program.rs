//! Program construction: the entry file plus everything reachable through
//! relative imports, with the user module index.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lode_ast::{ImportClause, Module};
use lode_diagnostics::{normalize_path, CompileError, CompileResult, Span};
use lode_parser::ParseError;

use crate::codes;

/// Extension of source files.
pub const SOURCE_EXT: &str = ".ls";
/// Extension a relative specifier may carry instead; mechanically
/// rewritten to the source extension during resolution.
pub const TARGET_EXT: &str = ".rs";

#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Project-relative name, forward slashes (also the span file name).
    pub rel: String,
    pub text: String,
    pub module: Module,
}

#[derive(Debug)]
pub struct Program {
    /// Directory of the entry file; every relative name is against this.
    pub root: PathBuf,
    pub entry_rel: String,
    /// All files, keyed and ordered by relative name.
    pub files: BTreeMap<String, SourceFile>,
    /// Module identifier per non-entry file, keyed by relative name.
    pub module_idents: BTreeMap<String, String>,
}

impl Program {
    pub fn entry(&self) -> &SourceFile {
        // The entry is inserted before anything else; the expect is
        // unreachable by construction.
        #[allow(clippy::expect_used)]
        self.files
            .get(&self.entry_rel)
            .expect("entry file present in program")
    }

    pub fn module_ident(&self, rel: &str) -> Option<&str> {
        self.module_idents.get(rel).map(String::as_str)
    }
}

/// Read, parse, and index the entry file and every user file it reaches
/// through relative imports.
pub fn build_program(entry_file: &Path) -> CompileResult<Program> {
    let root = entry_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let entry_rel = entry_file
        .file_name()
        .and_then(|n| n.to_str())
        .map(normalize_path)
        .ok_or_else(|| {
            CompileError::new(codes::MISSING_MAIN, "entry file name is not valid UTF-8")
        })?;

    let mut files = BTreeMap::new();
    let mut queue = vec![entry_rel.clone()];

    while let Some(rel) = queue.pop() {
        if files.contains_key(&rel) {
            continue;
        }
        let file = load_file(&root, &rel)?;
        for import in &file.module.imports {
            if !is_relative(&import.specifier) {
                continue;
            }
            // Resolution errors (extension, entry import) are reported by
            // the import resolver with full context; here unresolvable
            // specifiers are simply not queued.
            if let Ok(target) = resolve_relative(&rel, &import.specifier) {
                if target != entry_rel && !files.contains_key(&target) {
                    queue.push(target);
                }
            }
        }
        files.insert(rel, file);
    }

    let module_idents = build_module_index(&files, &entry_rel)?;

    log::debug!(
        "program: {} file(s), entry {}",
        files.len(),
        entry_rel
    );

    Ok(Program {
        root,
        entry_rel,
        files,
        module_idents,
    })
}

fn load_file(root: &Path, rel: &str) -> CompileResult<SourceFile> {
    let path = root.join(rel);
    let text = fs::read_to_string(&path).map_err(|e| {
        CompileError::new(
            codes::IMPORT_UNRESOLVED_PACKAGE,
            format!("cannot read source file `{rel}`: {e}"),
        )
    })?;
    let module = lode_parser::parse_module(rel, &text).map_err(|e| parse_to_compile(rel, e))?;
    Ok(SourceFile {
        rel: rel.to_string(),
        text,
        module,
    })
}

/// Wrap a parser failure in the catalog's syntax-error code.
pub fn parse_to_compile(rel: &str, err: ParseError) -> CompileError {
    let (start, end) = err.range();
    CompileError::with_span(
        codes::SYNTAX_ERROR,
        err.to_string(),
        Span::new(rel, start, end),
    )
}

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolve a relative specifier against the importing file, normalizing
/// `.` and `..` segments. The result stays a project-relative name.
pub fn resolve_relative(importer_rel: &str, specifier: &str) -> CompileResult<String> {
    let spec = if let Some(stem) = specifier.strip_suffix(TARGET_EXT) {
        format!("{stem}{SOURCE_EXT}")
    } else {
        specifier.to_string()
    };
    if !spec.ends_with(SOURCE_EXT) {
        return Err(CompileError::new(
            codes::IMPORT_RELATIVE_EXTENSION,
            format!("relative import `{specifier}` must end with `{SOURCE_EXT}`"),
        ));
    }

    let mut segments: Vec<&str> = Vec::new();
    if let Some((dir, _)) = importer_rel.rsplit_once('/') {
        segments.extend(dir.split('/'));
    }
    for part in spec.split('/') {
        match part {
            "." | "" => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

/// Base file name to module identifier: punctuation becomes `_`, leading
/// digits get a `_` prefix. Collisions fail fast.
fn build_module_index(
    files: &BTreeMap<String, SourceFile>,
    entry_rel: &str,
) -> CompileResult<BTreeMap<String, String>> {
    let mut idents: BTreeMap<String, String> = BTreeMap::new();
    let mut seen: BTreeMap<String, String> = BTreeMap::new();

    for rel in files.keys() {
        if rel == entry_rel {
            continue;
        }
        let ident = module_ident_for(rel);
        if let Some(previous) = seen.get(&ident) {
            return Err(CompileError::new(
                codes::MODULE_NAME_COLLISION,
                format!(
                    "files `{previous}` and `{rel}` both map to module `{ident}`"
                ),
            ));
        }
        seen.insert(ident.clone(), rel.clone());
        idents.insert(rel.clone(), ident);
    }
    Ok(idents)
}

pub fn module_ident_for(rel: &str) -> String {
    let base = rel.rsplit('/').next().unwrap_or(rel);
    let stem = base.strip_suffix(SOURCE_EXT).unwrap_or(base);
    let mut ident: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
    {
        ident.insert(0, '_');
    }
    ident.to_lowercase()
}

/// Collect named bindings of an import clause; other clause shapes are
/// rejected with their catalog codes.
pub fn named_bindings(
    clause: &ImportClause,
    span: &Span,
) -> CompileResult<Vec<(String, Option<String>)>> {
    match clause {
        ImportClause::Named(bindings) => Ok(bindings
            .iter()
            .map(|b| (b.name.clone(), b.alias.clone()))
            .collect()),
        ImportClause::Namespace(_) => Err(CompileError::with_span(
            codes::IMPORT_NAMESPACE,
            "namespace imports are not supported",
            span.clone(),
        )),
        ImportClause::Default(_) => Err(CompileError::with_span(
            codes::IMPORT_DEFAULT,
            "default imports are not supported",
            span.clone(),
        )),
        ImportClause::SideEffect => Err(CompileError::with_span(
            codes::IMPORT_SIDE_EFFECT,
            "side-effect-only imports are not supported",
            span.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_normalizes() {
        assert_eq!(
            resolve_relative("main.ls", "./util.ls").unwrap(),
            "util.ls"
        );
        assert_eq!(
            resolve_relative("a/b.ls", "../c.ls").unwrap(),
            "c.ls"
        );
        assert_eq!(
            resolve_relative("a/b.ls", "./d/e.ls").unwrap(),
            "a/d/e.ls"
        );
        // Target extension is mechanically rewritten.
        assert_eq!(
            resolve_relative("main.ls", "./util.rs").unwrap(),
            "util.ls"
        );
    }

    #[test]
    fn test_relative_extension_rejected() {
        let err = resolve_relative("main.ls", "./util.txt").unwrap_err();
        assert_eq!(err.code, codes::IMPORT_RELATIVE_EXTENSION);
    }

    #[test]
    fn test_module_ident_for() {
        assert_eq!(module_ident_for("geo-utils.ls"), "geo_utils");
        assert_eq!(module_ident_for("a/b/2d.ls"), "_2d");
        assert_eq!(module_ident_for("My.Mod.ls"), "my_mod");
    }
}
