use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use lode_compiler::{compile, CompileError, CompileOptions, RuntimeKind};

#[derive(Parser)]
#[command(name = "lode")]
#[command(version = "0.3.0")]
#[command(about = "Lode compiler toolchain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an entry file to target source
    Build {
        /// Entry .ls file
        #[arg(value_name = "ENTRY")]
        entry: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = "out")]
        out_dir: PathBuf,

        /// Async runtime policy for `main`
        #[arg(long, value_name = "RUNTIME", default_value = "none")]
        runtime: String,
    },

    /// Generate a declarations-only facade for a native crate
    Bindgen {
        /// Path to the native crate's Cargo.toml
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Output directory for the facade package
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,

        /// Facade package name (defaults to the crate name)
        #[arg(long, value_name = "NAME")]
        package: Option<String>,

        /// Feature recorded in the bindings manifest (repeatable)
        #[arg(long, value_name = "FEATURE")]
        feature: Vec<String>,

        /// Copy the crate into the facade and record a path dependency
        #[arg(long)]
        bundle: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            entry,
            out_dir,
            runtime,
        } => build(entry, out_dir, &runtime),
        Commands::Bindgen {
            manifest,
            out,
            package,
            feature,
            bundle,
        } => bindgen(manifest, out, package, feature, bundle),
    }
}

fn build(entry: PathBuf, out_dir: PathBuf, runtime: &str) -> Result<()> {
    let Some(runtime_kind) = RuntimeKind::parse(runtime) else {
        anyhow::bail!("unknown runtime policy `{runtime}` (expected `none` or `tokio`)");
    };

    let options = CompileOptions {
        entry_file: entry.clone(),
        runtime_kind,
    };

    let output = match compile(&options) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("{}", render_diagnostic(&entry, &err));
            std::process::exit(1);
        }
    };

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let main_path = out_dir.join("main.rs");
    fs::write(&main_path, &output.main_text)
        .with_context(|| format!("Failed to write {}", main_path.display()))?;
    fs::write(out_dir.join("main.rs.map"), output.source_map.to_json())
        .context("Failed to write source map")?;

    if !output.kernels.is_empty() {
        let kernels_dir = out_dir.join("kernels");
        fs::create_dir_all(&kernels_dir)
            .with_context(|| format!("Failed to create {}", kernels_dir.display()))?;
        for kernel in &output.kernels {
            let path = kernels_dir.join(format!("{}.cu", kernel.name));
            fs::write(&path, &kernel.cuda_source)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    // Crate records for the downstream build orchestrator.
    let crates_json = serde_json::to_string_pretty(&output.external_crates)
        .context("Failed to serialize crate records")?;
    fs::write(out_dir.join("lode.crates.json"), crates_json)
        .context("Failed to write crate records")?;

    println!(
        "compiled {} -> {} ({} kernel(s), {} crate record(s))",
        entry.display(),
        main_path.display(),
        output.kernels.len(),
        output.external_crates.len()
    );
    Ok(())
}

/// `<source-file>:<line>:<col>: <code>: <message>`, resolved against the
/// file the span points into.
fn render_diagnostic(entry: &std::path::Path, err: &CompileError) -> String {
    let Some(span) = &err.span else {
        return format!("{}: {}", err.code, err.message);
    };
    let root = entry.parent().unwrap_or_else(|| std::path::Path::new("."));
    let source = fs::read_to_string(root.join(&span.file)).unwrap_or_default();
    err.render(&source)
}

fn bindgen(
    manifest: PathBuf,
    out: PathBuf,
    package: Option<String>,
    features: Vec<String>,
    bundle: bool,
) -> Result<()> {
    let options = lode_bindgen::BindgenOptions {
        manifest_path: manifest,
        out_dir: out.clone(),
        package_name: package,
        features,
        bundle,
    };
    let output = lode_bindgen::extract(&options)?;

    println!(
        "generated {} module(s) for `{}` in {} ({} skipped item(s))",
        output.modules.len(),
        output.manifest.crate_.name,
        out.display(),
        output.report.skipped.len()
    );
    Ok(())
}
