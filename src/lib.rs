//! Semantic analysis and code generation for a small statically-typed
//! imperative language: the back half of a compiler that consumes an
//! already-parsed AST and emits a Jasmin-like textual assembly listing.
//!
//! Parsing, file I/O, the CLI driver, and the downstream assembler are
//! deliberately outside this crate's scope — `compile` below is the one
//! entry point that threads an already-built [`Program`] through both
//! passes.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod emitter;
pub mod symbol_table;
pub mod types;

pub use analyzer::{AnalysisOutcome, SemanticAnalyzer};
pub use ast::Program;
pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use symbol_table::SymbolTable;

/// The result of compiling a program all the way through: either the
/// emitted listing text (analysis produced no errors — warnings are
/// still surfaced), or the failed [`AnalysisOutcome`] if it did.
///
/// If any errors were collected during analysis, compilation aborts
/// before code generation ever runs — code generation assumes a clean
/// analysis and is never reached otherwise.
pub enum CompileResult {
    Ok { listing: String, diagnostics: Diagnostics },
    AnalysisFailed(Diagnostics),
}

/// Runs the semantic analyzer, then (only if it reported no errors) the
/// code generator, over `program`. `program` is mutated in place: the
/// analyzer annotates every expression node's `ty` and every identifier
/// occurrence's `symbol` as it goes.
pub fn compile(mut program: Program, config: &CompilerConfig) -> CompileResult {
    let outcome = SemanticAnalyzer::new().analyze(&mut program);
    if outcome.has_errors() {
        return CompileResult::AnalysisFailed(outcome.diagnostics);
    }
    let listing = codegen::generate(&program, &outcome.symbols, config);
    CompileResult::Ok { listing, diagnostics: outcome.diagnostics }
}
