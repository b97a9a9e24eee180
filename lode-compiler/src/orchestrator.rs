//! One compile per call: program construction, kernel extraction, host
//! lowering, MIR round-trip, writing, and span-map scanning. The caller
//! owns file writes and the downstream build.

use std::collections::BTreeSet;
use std::path::PathBuf;

use lode_ast::{Item, Stmt};
use lode_diagnostics::{CompileResult, SpanMap};
use lode_rir::{lower_body, overlay_spans, reemit_body, write_program, FnItem, Item as RItem};

use crate::imports::ExternalCrate;
use crate::kernel::{self, KernelArtifact, KernelRegistry};
use crate::lower::Lowering;
use crate::program::build_program;
use crate::runtime;

/// Whether `main` gets an async-runtime entry attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeKind {
    #[default]
    None,
    Tokio,
}

impl RuntimeKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(RuntimeKind::None),
            "tokio" => Some(RuntimeKind::Tokio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub entry_file: PathBuf,
    pub runtime_kind: RuntimeKind,
}

#[derive(Debug)]
pub struct CompileOutput {
    /// Complete generated target source.
    pub main_text: String,
    /// Target-line to source-span map scanned from `main_text`.
    pub source_map: SpanMap,
    /// Kernels in declaration order.
    pub kernels: Vec<KernelArtifact>,
    /// Native crate records, deduplicated by name.
    pub external_crates: Vec<ExternalCrate>,
}

pub fn compile(options: &CompileOptions) -> CompileResult<CompileOutput> {
    let program = build_program(&options.entry_file)?;

    // Kernel extraction runs before host lowering: kernels validate
    // eagerly, and the host pass then treats their symbols as
    // launch-site-only.
    let mut registry = KernelRegistry::new();
    let mut kernel_symbols = BTreeSet::new();
    for file in program.files.values() {
        for item in &file.module.items {
            if let Item::Statement(Stmt::VarDecl(decl)) = item {
                if kernel::is_kernel_decl(decl) {
                    registry.register(decl, &file.text)?;
                    kernel_symbols.insert(decl.name.clone());
                }
            }
        }
    }
    let kernels: Vec<KernelArtifact> = registry.artifacts().to_vec();

    let lowering = Lowering::new(&program, options.runtime_kind, registry, kernel_symbols);
    let (mut target, external_crates) = lowering.run()?;

    // MIR round-trip for deterministic re-emission; spans that the block
    // walk loses are restored from the original bodies.
    round_trip_items(&mut target.items);

    let mut main_text = write_program(&target);
    if !kernels.is_empty() {
        main_text.push('\n');
        main_text.push_str(&runtime::render_runtime(&kernels));
    }

    let source_map = SpanMap::scan(&main_text);
    log::debug!(
        "compiled {} file(s): {} bytes, {} kernel(s), {} crate record(s)",
        program.files.len(),
        main_text.len(),
        kernels.len(),
        external_crates.len()
    );

    Ok(CompileOutput {
        main_text,
        source_map,
        kernels,
        external_crates,
    })
}

fn round_trip_items(items: &mut [RItem]) {
    for item in items {
        match item {
            RItem::Fn(f) => round_trip_fn(f),
            RItem::Impl(impl_item) => {
                for f in &mut impl_item.fns {
                    round_trip_fn(f);
                }
            }
            RItem::Trait(trait_item) => {
                for m in &mut trait_item.methods {
                    round_trip_fn(m);
                }
            }
            RItem::Mod(mod_item) => round_trip_items(&mut mod_item.items),
            _ => {}
        }
    }
}

fn round_trip_fn(f: &mut FnItem) {
    let Some(body) = &mut f.body else {
        return;
    };
    let mir = lower_body(body);
    let mut emitted = reemit_body(&mir);
    overlay_spans(&mut emitted, body);
    *body = emitted;
}
