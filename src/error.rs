//! Error handling for reportq
//!
//! This module defines the error types for the report query engine.
//! Three families of failures come out of the core:
//!
//! - Parse errors raised while compiling a filter expression
//! - Validation errors raised when checking a query specification
//! - Configuration errors raised when a master-detail cursor cannot be re-scoped
//!
//! Everything else (I/O, CSV, JSON, SQL syntax checks, run-time type problems)
//! is folded into the same umbrella enum so callers can use `?` throughout.
//! The module uses thiserror to keep the boilerplate down.

use std::fmt;

use thiserror::Error;

/// The distinct ways a filter expression can fail to compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A `'` string literal was opened but never closed
    UnterminatedString,
    /// An opening `(` has no matching `)`
    MissingParenthesis,
    /// A token appeared where the grammar does not allow it
    UnexpectedToken,
    /// The input ended while more tokens were required
    UnexpectedEnd,
    /// A date literal (or a literal coerced to a date) could not be parsed
    InvalidDate,
    /// A field reference names no property of the record type
    UnknownField,
    /// A literal could not be converted to the type of the other operand
    InvalidLiteral,
    /// A condition was required but the expression yields another type
    NotBoolean,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseErrorKind::UnterminatedString => "unterminated string literal",
            ParseErrorKind::MissingParenthesis => "missing closing parenthesis",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEnd => "unexpected end of expression",
            ParseErrorKind::InvalidDate => "invalid date literal",
            ParseErrorKind::UnknownField => "unknown field",
            ParseErrorKind::InvalidLiteral => "invalid literal",
            ParseErrorKind::NotBoolean => "not a boolean condition",
        };
        f.write_str(text)
    }
}

/// A filter expression compile failure
///
/// Carries the offending token (or substring) and the complete original input
/// so the message can be shown to the user without further context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} '{token}' in expression \"{input}\"")]
pub struct ParseError {
    /// Which rule was violated
    pub kind: ParseErrorKind,
    /// The token or substring at fault
    pub token: String,
    /// The full expression text that was being compiled
    pub input: String,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(kind: ParseErrorKind, token: impl Into<String>, input: impl Into<String>) -> Self {
        ParseError {
            kind,
            token: token.into(),
            input: input.into(),
        }
    }
}

/// Failures reported by `QuerySpecification::validation_check` and `build_from`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The target table is not present in the reference catalog
    #[error("Table '{0}' is unknown")]
    UnknownTable(String),

    /// A filter predicate has no first bound
    #[error("Filter on '{0}' has no value")]
    MissingFilterValue(String),

    /// No output fields were selected
    #[error("No fields selected")]
    EmptySelection,

    /// Balance/Link mode requires every selected field to be aggregated
    #[error("Field '{0}' must have an aggregate in this processing mode")]
    MissingAggregate(String),

    /// No join clause links two adjacent table families
    #[error("No join clause from family '{from}' to family '{to}'")]
    MissingJoin { from: String, to: String },

    /// A parameter placeholder had no value at evaluation time
    #[error("No value supplied for parameter '{0}'")]
    MissingParameter(String),
}

/// ReportError represents all possible errors that can occur in reportq
///
/// Each variant includes a descriptive message. None of them is retried
/// internally: the failing operation aborts and hands the error to its caller.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Filter expression compilation failed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Query specification failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A master-detail cursor could not resolve its base sequence
    #[error("Configuration error: no data source for table '{0}'")]
    Configuration(String),

    /// Error during file system operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error while reading delimited data
    #[error("File parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error when an invalid file specification is provided
    #[error("Invalid file specification: {0}")]
    InvalidFileSpec(String),

    /// Error while reading a query definition
    #[error("Query definition error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generated SQL did not re-parse
    #[error("SQL syntax error: {0}")]
    SqlSyntax(#[from] sqlparser::parser::ParserError),

    /// A macro substitution pattern failed to build
    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    /// A referenced column does not exist
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// Type mismatch or conversion failure at evaluation time
    #[error("Type error: {0}")]
    TypeError(String),

    /// Division by zero in an arithmetic expression
    #[error("Division by zero")]
    DivideByZero,
}

/// Result type alias for operations that can produce a ReportError
pub type ReportResult<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_mentions_token_and_input() {
        let err = ParseError::new(ParseErrorKind::UnterminatedString, "'abc", "[Name] = 'abc");
        let text = err.to_string();
        assert!(text.contains("unterminated string literal"));
        assert!(text.contains("'abc"));
        assert!(text.contains("[Name] = 'abc"));
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: ReportError = ValidationError::EmptySelection.into();
        assert!(matches!(err, ReportError::Validation(ValidationError::EmptySelection)));
        assert_eq!(err.to_string(), "Validation error: No fields selected");
    }
}
