//! Quarry connector scripts
//!
//! A small, dynamically typed language for writing search connectors at
//! runtime. Scripts declare a `connector` with properties and methods and
//! may only reach native functionality that the host lists in a
//! [`ReferenceSurface`].
//!
//! ```text
//! use collections;
//!
//! connector Notes {
//!     id = "notes";
//!     name = "Notes";
//!
//!     fn search(query, max_results) {
//!         let hits = [];
//!         for note in ["groceries", "taxes"] {
//!             if contains(note, lower(query)) {
//!                 hits = push(hits, {id: note, title: note});
//!             }
//!         }
//!         return collections.take(hits, max_results);
//!     }
//! }
//! ```
//!
//! Processing is split into [`parser::parse`], [`checker::check`] and the
//! [`Interpreter`]; [`load`] runs the first two.

pub mod ast;
pub mod checker;
pub mod diagnostics;
pub mod interpreter;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod surface;
pub mod value;

use thiserror::Error;

pub use ast::Program;
pub use diagnostics::{codes, Diagnostic, Phase, Position, Severity, Span};
pub use interpreter::{Instance, Interpreter, RuntimeError, RuntimeErrorKind, DEFAULT_MAX_CALL_DEPTH};
pub use lexer::KEYWORDS;
pub use surface::{
    CallContext, ContractShape, LogLevel, MethodShape, NativeError, NativeFunction, NativeModule,
    NativeResult, NullHost, ReferenceSurface, ScriptHost,
};

/// A script that failed to parse or check
#[derive(Debug, Clone, Error)]
#[error("script has {} error(s){}", error_count(.diagnostics), first_error(.diagnostics))]
pub struct ScriptError {
    /// Every diagnostic produced, errors and warnings alike
    pub diagnostics: Vec<Diagnostic>,
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

fn first_error(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .map(|d| format!(", first at {}", d))
        .unwrap_or_default()
}

/// A parsed program that passed semantic checks
#[derive(Debug, Clone)]
pub struct Checked {
    pub program: Program,

    /// Warnings and hints left by the checker
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse and check `source`
///
/// Semantic checks only run when the source parses cleanly, so a failure
/// carries either syntax diagnostics or semantic diagnostics, never both.
pub fn load(source: &str, surface: &ReferenceSurface) -> Result<Checked, ScriptError> {
    let (program, diagnostics) = parser::parse(source);
    if diagnostics::has_errors(&diagnostics) {
        return Err(ScriptError { diagnostics });
    }

    let diagnostics = checker::check(&program, surface);
    if diagnostics::has_errors(&diagnostics) {
        return Err(ScriptError { diagnostics });
    }

    Ok(Checked {
        program,
        diagnostics,
    })
}
