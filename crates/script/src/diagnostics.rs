//! Raw diagnostics produced by the lexer, parser and checker
//!
//! Positions here are 0-based; hosts translate them for display.

use std::fmt;

/// Location in source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// Byte offset
    pub offset: usize,

    /// Line number (0-based)
    pub line: usize,

    /// Column in characters (0-based)
    pub column: usize,
}

/// Half-open source range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Diagnostic severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Hidden,
    Info,
    Warning,
    Error,
}

/// Stage that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Syntax,
    Semantic,
}

/// A compiler-reported issue
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: &'static str,
    pub message: String,
    pub severity: Severity,
    pub phase: Phase,
    pub span: Span,
}

impl Diagnostic {
    pub fn syntax(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            phase: Phase::Syntax,
            span,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Error,
            phase: Phase::Semantic,
            span,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Warning,
            phase: Phase::Semantic,
            span,
        }
    }

    pub fn info(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            severity: Severity::Info,
            phase: Phase::Semantic,
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} {}",
            self.span.start.line + 1,
            self.span.start.column + 1,
            self.code,
            self.message
        )
    }
}

/// True when any diagnostic is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Diagnostic codes
pub mod codes {
    // Syntax
    pub const UNEXPECTED_CHARACTER: &str = "QS1001";
    pub const UNTERMINATED_STRING: &str = "QS1002";
    pub const INVALID_ESCAPE: &str = "QS1003";
    pub const UNTERMINATED_COMMENT: &str = "QS1004";
    pub const INVALID_NUMBER: &str = "QS1005";
    pub const EXPECTED_TOKEN: &str = "QS1010";
    pub const EXPECTED_EXPRESSION: &str = "QS1011";
    pub const EXPECTED_IDENTIFIER: &str = "QS1012";
    pub const EXPECTED_ITEM: &str = "QS1013";
    pub const INVALID_ASSIGNMENT: &str = "QS1014";
    pub const NESTING_TOO_DEEP: &str = "QS1015";

    // Semantic errors
    pub const MODULE_NOT_AVAILABLE: &str = "QS2001";
    pub const MODULE_NOT_IMPORTED: &str = "QS2002";
    pub const UNKNOWN_NAME: &str = "QS2003";
    pub const UNKNOWN_MODULE_MEMBER: &str = "QS2004";
    pub const ARGUMENT_COUNT: &str = "QS2005";
    pub const DUPLICATE_DEFINITION: &str = "QS2006";
    pub const MISSING_MEMBER: &str = "QS2007";
    pub const UNKNOWN_BASE: &str = "QS2008";
    pub const CYCLIC_BASE: &str = "QS2009";
    pub const LOOP_CONTROL_OUTSIDE_LOOP: &str = "QS2010";
    pub const NOT_CALLABLE: &str = "QS2011";
    pub const SELF_OUTSIDE_CONNECTOR: &str = "QS2012";
    pub const UNKNOWN_MEMBER: &str = "QS2013";
    pub const SIGNATURE_MISMATCH: &str = "QS2014";
    pub const DUPLICATE_PARAMETER: &str = "QS2015";
    pub const ASSIGN_TO_CONSTANT: &str = "QS2016";

    // Warnings and hints
    pub const UNUSED_VARIABLE: &str = "QS3001";
    pub const UNREACHABLE_CODE: &str = "QS3002";
    pub const UNUSED_IMPORT: &str = "QS3003";
    pub const DUPLICATE_IMPORT: &str = "QS3004";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert!(Severity::Info > Severity::Hidden);
    }

    #[test]
    fn test_display_is_one_based() {
        let start = Position {
            offset: 4,
            line: 0,
            column: 4,
        };
        let diagnostic = Diagnostic::syntax(codes::EXPECTED_TOKEN, "';' expected", Span::new(start, start));
        assert_eq!(diagnostic.to_string(), "1:5: QS1010 ';' expected");
    }
}
