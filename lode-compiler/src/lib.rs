pub mod imports; // Import resolution: markers, user modules, native packages
pub mod kernel; // Kernel dialect validation and CUDA emission
pub mod lower; // Host lowering to the target IR
pub mod orchestrator; // One compile() call per build
pub mod program; // Program construction and the user module index
pub mod runtime; // Embedded loader-runtime template
pub mod type_lowering; // Source type annotations to target types

// Re-export diagnostics from lode-diagnostics crate
pub use lode_diagnostics as diagnostics;

pub use diagnostics::registry::codes;
pub use diagnostics::{CompileError, CompileResult, Span};
pub use imports::ExternalCrate;
pub use kernel::{KernelArtifact, KernelParamSig, ScalarKind};
pub use orchestrator::{compile, CompileOptions, CompileOutput, RuntimeKind};
