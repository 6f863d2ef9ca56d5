//! Error codes for all parser diagnostics.
//!
//! Each error code is a unique identifier (e.g., `E1001`) with the first digit
//! indicating the category.

use std::fmt;

/// Error codes for all parser diagnostics.
///
/// Format: E#### where first digit indicates category:
/// - E1xxx: Syntax errors (recoverable)
/// - E9xxx: Fatal parse failures
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    /// No alternative of a decision matches the input
    E1001,
    /// Current token does not match the expected one
    E1002,
    /// Extra token deleted during recovery
    E1003,
    /// Missing token conjured during recovery
    E1004,
    /// Semantic or precedence predicate failed
    E1005,
    /// Rule nesting exceeded the configured limit
    E9001,
    /// Parse cancelled on first error
    E9002,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::E1001,
        ErrorCode::E1002,
        ErrorCode::E1003,
        ErrorCode::E1004,
        ErrorCode::E1005,
        ErrorCode::E9001,
        ErrorCode::E9002,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
    }

    /// One-line summary for `--explain`-style listings.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E1001 => "no viable alternative",
            ErrorCode::E1002 => "mismatched input",
            ErrorCode::E1003 => "extraneous input",
            ErrorCode::E1004 => "missing token",
            ErrorCode::E1005 => "failed predicate",
            ErrorCode::E9001 => "rule nesting too deep",
            ErrorCode::E9002 => "parse cancelled",
        }
    }

    /// Syntax errors the parser recovers from.
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E1001
                | ErrorCode::E1002
                | ErrorCode::E1003
                | ErrorCode::E1004
                | ErrorCode::E1005
        )
    }

    /// Errors that abort the parse.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCode::E9001 | ErrorCode::E9002)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or(())
    }
}
