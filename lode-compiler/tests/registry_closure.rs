// Catalog closure over the compiler sources: every code constant the
// lowering references is registered, every registered code is actually
// referenced somewhere, and no raw `LO####` literal bypasses the
// constants.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use lode_compiler::diagnostics::registry::{self, codes, Domain};

/// Recursively collect the text of every source file under `dir`.
fn collect_sources(dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_sources(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            if let Ok(text) = fs::read_to_string(&path) {
                out.push(text);
            }
        }
    }
}

/// Constant names referenced as `codes::NAME` in the given text.
fn referenced_constants(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut rest = text;
    while let Some(idx) = rest.find("codes::") {
        rest = &rest[idx + "codes::".len()..];
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() {
            out.insert(name);
        }
    }
    out
}

/// The registry's constant-name to code mapping, parsed from its source.
fn registry_constants() -> Vec<(String, String)> {
    let registry_src = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../lode-diagnostics/src/registry.rs");
    let text = fs::read_to_string(registry_src).expect("registry source");
    let mut out = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix("pub const ") else {
            continue;
        };
        let Some((name, value)) = rest.split_once(": &str = ") else {
            continue;
        };
        let code = value.trim_end_matches(';').trim_matches('"');
        if code.starts_with("LO") {
            out.push((name.trim().to_string(), code.to_string()));
        }
    }
    out
}

#[test]
fn test_every_referenced_code_is_registered() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut sources = Vec::new();
    collect_sources(&src, &mut sources);
    assert!(!sources.is_empty());

    let constants: std::collections::BTreeMap<String, String> =
        registry_constants().into_iter().collect();

    let mut referenced = BTreeSet::new();
    for text in &sources {
        referenced.extend(referenced_constants(text));
    }
    assert!(!referenced.is_empty());

    for name in &referenced {
        let code = constants
            .get(name)
            .unwrap_or_else(|| panic!("codes::{name} is not in the registry"));
        assert!(registry::contains(code), "{code} not registered");
        assert_ne!(registry::domain_of(code), Domain::Other);
    }
}

#[test]
fn test_every_registered_code_is_used_by_the_compiler() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut sources = Vec::new();
    collect_sources(&src, &mut sources);
    let all_text = sources.join("\n");

    let referenced: BTreeSet<String> = referenced_constants(&all_text);
    for (name, code) in registry_constants() {
        assert!(
            referenced.contains(&name),
            "registered code {code} ({name}) is never emitted"
        );
    }
}

#[test]
fn test_no_raw_code_literals_outside_the_registry() {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut sources = Vec::new();
    collect_sources(&src, &mut sources);

    for text in &sources {
        let mut rest = text.as_str();
        while let Some(idx) = rest.find("\"LO") {
            let tail = &rest[idx + 1..];
            let candidate: String = tail.chars().take(6).collect();
            let is_code = candidate.len() == 6
                && candidate[2..].chars().all(|c| c.is_ascii_digit());
            assert!(
                !is_code,
                "raw diagnostic literal {candidate} in compiler sources"
            );
            rest = &rest[idx + 3..];
        }
    }
}

#[test]
fn test_registered_set_matches_catalog_order() {
    // The ALL_CODES table drives `contains`; make sure the constants file
    // and the table agree exactly.
    let from_source: BTreeSet<String> =
        registry_constants().into_iter().map(|(_, c)| c).collect();
    let from_table: BTreeSet<String> =
        registry::ALL_CODES.iter().map(|c| c.to_string()).collect();
    assert_eq!(from_source, from_table);
}

#[test]
fn test_domains_cover_the_six_families() {
    let mut seen = BTreeSet::new();
    for code in registry::ALL_CODES {
        seen.insert(format!("{}", registry::domain_of(code)));
    }
    let expected: BTreeSet<String> = [
        "entry-and-expressions",
        "control-flow",
        "functions-imports-and-annotations",
        "classes-and-methods",
        "types-and-traits",
        "kernel-dialect",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_representative_codes_round_trip() {
    assert!(registry::contains(codes::MISSING_MAIN));
    assert_eq!(
        registry::domain_of(codes::KERNEL_SHARED_ARRAY),
        Domain::KernelDialect
    );
    assert_eq!(
        registry::domain_of(codes::IMPORT_MISSING_MANIFEST),
        Domain::FunctionsImportsAndAnnotations
    );
}
