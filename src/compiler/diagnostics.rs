//! Compiler diagnostics as reported to callers

use serde::{Deserialize, Serialize};
use std::fmt;

use quarry_script::{Diagnostic, Phase, Severity};

/// Error id used for failures inside the compiler itself
pub const INTERNAL_ERROR_ID: &str = "QS9000";

/// Error id used when a compiled script yields no usable connector
pub const INSTANTIATION_ERROR_ID: &str = "QS9001";

/// Severity of a reported diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
}

/// Stage that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Syntax,
    Semantic,
    Instantiation,
    Internal,
}

/// A positioned compiler diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationError {
    /// Diagnostic code, e.g. `QS2003`
    pub error_id: String,

    /// Human readable message
    pub message: String,

    /// Line number (1-based, 0 when the error has no position)
    pub line: usize,

    /// Column number (1-based, 0 when the error has no position)
    pub column: usize,

    /// Severity
    pub severity: ErrorSeverity,

    /// Stage that produced the error
    pub kind: ErrorKind,
}

impl CompilationError {
    /// Translate a language diagnostic; `None` for severities below warning
    pub fn from_diagnostic(diagnostic: &Diagnostic) -> Option<Self> {
        let severity = match diagnostic.severity {
            Severity::Error => ErrorSeverity::Error,
            Severity::Warning => ErrorSeverity::Warning,
            Severity::Info | Severity::Hidden => return None,
        };
        let kind = match diagnostic.phase {
            Phase::Syntax => ErrorKind::Syntax,
            Phase::Semantic => ErrorKind::Semantic,
        };
        Some(Self {
            error_id: diagnostic.code.to_string(),
            message: diagnostic.message.clone(),
            line: diagnostic.span.start.line + 1,
            column: diagnostic.span.start.column + 1,
            severity,
            kind,
        })
    }

    /// Failure inside the compiler, with no source position
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error_id: INTERNAL_ERROR_ID.to_string(),
            message: message.into(),
            line: 0,
            column: 0,
            severity: ErrorSeverity::Error,
            kind: ErrorKind::Internal,
        }
    }

    /// The script compiled but no connector could be constructed
    pub fn instantiation(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            error_id: INSTANTIATION_ERROR_ID.to_string(),
            message: message.into(),
            line,
            column,
            severity: ErrorSeverity::Warning,
            kind: ErrorKind::Instantiation,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == ErrorSeverity::Error
    }

    pub fn has_position(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            ErrorSeverity::Error => "error",
            ErrorSeverity::Warning => "warning",
        };
        if self.has_position() {
            write!(
                f,
                "{}:{}: {} {}: {}",
                self.line, self.column, severity, self.error_id, self.message
            )
        } else {
            write!(f, "{} {}: {}", severity, self.error_id, self.message)
        }
    }
}

/// Translate diagnostics, dropping anything below warning severity
pub fn translate(diagnostics: &[Diagnostic]) -> Vec<CompilationError> {
    diagnostics
        .iter()
        .filter_map(CompilationError::from_diagnostic)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_script::{codes, Position, Span};

    fn at(line: usize, column: usize) -> Span {
        let position = Position {
            offset: 0,
            line,
            column,
        };
        Span::new(position, position)
    }

    #[test]
    fn test_positions_become_one_based() {
        let diagnostic = Diagnostic::error(codes::UNKNOWN_NAME, "Unknown name 'x'", at(0, 4));
        let error = CompilationError::from_diagnostic(&diagnostic).unwrap();
        assert_eq!((error.line, error.column), (1, 5));
        assert_eq!(error.kind, ErrorKind::Semantic);
        assert_eq!(error.to_string(), "1:5: error QS2003: Unknown name 'x'");
    }

    #[test]
    fn test_info_is_discarded() {
        let diagnostics = vec![
            Diagnostic::info(codes::UNUSED_IMPORT, "unused", at(0, 0)),
            Diagnostic::warning(codes::UNUSED_VARIABLE, "unused", at(2, 0)),
        ];
        let translated = translate(&diagnostics);
        assert_eq!(translated.len(), 1);
        assert_eq!(translated[0].severity, ErrorSeverity::Warning);
    }

    #[test]
    fn test_synthetic_errors() {
        let internal = CompilationError::internal("boom");
        assert!(internal.is_error());
        assert!(!internal.has_position());
        assert_eq!(internal.to_string(), "error QS9000: boom");

        let instantiation = CompilationError::instantiation("no connector", 0, 0);
        assert!(!instantiation.is_error());
        assert_eq!(instantiation.kind, ErrorKind::Instantiation);
    }
}
