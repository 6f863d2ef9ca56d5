//! Parse error types.
//!
//! Two layers:
//! - [`RecognitionError`]: something in the input did not fit the grammar.
//!   Always recoverable; the error strategy reports it and resynchronizes.
//! - [`ParseFailure`]: what a rule method returns. Wraps a recognition
//!   error while it propagates to the nearest rule boundary, or carries one
//!   of the fatal conditions that abort the whole parse.
//!
//! Reported errors are flattened into [`ParseError`], which owns everything
//! needed to render a [`Diagnostic`] after the parser is gone.

use std::fmt;

use alp_atn::{DecisionId, RuleId, StateId};
use alp_diagnostic::{Diagnostic, ErrorCode};
use alp_ir::{Span, Token, TokenSet};
use thiserror::Error;

use crate::ContextId;

/// Why the input did not match.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RecognitionErrorKind {
    /// No alternative of `decision` accepts the input starting at `start`.
    #[error("no viable alternative for decision {decision}")]
    NoViableAlt { decision: DecisionId, start: Token },
    /// The current token is not one the state can match.
    #[error("mismatched input")]
    InputMismatch,
    /// A predicate guarding the current path evaluated to false.
    #[error("rule {rule} failed predicate {predicate}")]
    FailedPredicate { rule: RuleId, predicate: String },
}

/// A recoverable mismatch between input and grammar, with the parser
/// position it was detected at.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind} at {}:{}", .offending.line, .offending.column)]
pub struct RecognitionError {
    pub kind: RecognitionErrorKind,
    /// Token the parser was looking at.
    pub offending: Token,
    /// ATN state the parser was in.
    pub state: Option<StateId>,
    /// Innermost rule invocation.
    pub ctx: Option<ContextId>,
    /// Tokens that would have been accepted.
    pub expected: TokenSet,
}

impl RecognitionError {
    pub fn code(&self) -> ErrorCode {
        match self.kind {
            RecognitionErrorKind::NoViableAlt { .. } => ErrorCode::E1001,
            RecognitionErrorKind::InputMismatch => ErrorCode::E1002,
            RecognitionErrorKind::FailedPredicate { .. } => ErrorCode::E1005,
        }
    }
}

/// Outcome of a rule method that did not complete normally.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseFailure {
    /// Recoverable; caught at the nearest rule boundary.
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    /// Rule nesting hit [`ParserConfig::max_rule_depth`](crate::ParserConfig).
    #[error("rule `{rule}` nested deeper than {limit} invocations")]
    RecursionDepthExceeded { rule: String, limit: usize },
    /// The error strategy gave up on the first error.
    #[error("parse cancelled: {0}")]
    Cancelled(RecognitionError),
}

impl ParseFailure {
    /// Can a rule boundary report this and carry on?
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ParseFailure::Recognition(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ParseFailure::Recognition(e) => e.code(),
            ParseFailure::RecursionDepthExceeded { .. } => ErrorCode::E9001,
            ParseFailure::Cancelled(_) => ErrorCode::E9002,
        }
    }

    /// The underlying recognition error, if any.
    pub fn recognition(&self) -> Option<&RecognitionError> {
        match self {
            ParseFailure::Recognition(e) | ParseFailure::Cancelled(e) => Some(e),
            ParseFailure::RecursionDepthExceeded { .. } => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = if self.is_recoverable() {
            Diagnostic::error(self.code())
        } else {
            Diagnostic::fatal(self.code())
        };
        let diag = diag.with_message(self.to_string());
        match self.recognition() {
            Some(e) => diag.with_label(e.offending.span, "parsing stopped here"),
            None => diag.with_note("rule nesting is limited to keep the native stack bounded"),
        }
    }
}

/// A reported syntax error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    pub code: ErrorCode,
    /// Fully rendered message, e.g. `mismatched input ';' expecting ')'`.
    pub message: String,
    pub span: Span,
    /// Stream index of the offending token; `None` for conjured tokens.
    pub token_index: Option<usize>,
    pub line: u32,
    pub column: u32,
    /// Rule invocation stack at the error, innermost first.
    pub context: Vec<String>,
    /// Where a decision that ran out of alternatives started, when that is
    /// before the offending token.
    pub decision_start: Option<Span>,
}

impl ParseError {
    pub fn new(code: ErrorCode, message: impl Into<String>, offending: &Token) -> Self {
        ParseError {
            code,
            message: message.into(),
            span: offending.span,
            token_index: offending.index,
            line: offending.line,
            column: offending.column,
            context: Vec::new(),
            decision_start: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    /// Remember `start` as the decision start unless it is the offending
    /// token itself.
    #[must_use]
    pub fn with_decision_start(mut self, start: &Token) -> Self {
        if start.index != self.token_index {
            self.decision_start = Some(start.span);
        }
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let label = match self.code {
            ErrorCode::E1003 => "unexpected token",
            ErrorCode::E1004 => "expected a token here",
            ErrorCode::E1005 => "predicate failed here",
            _ => "",
        };
        let mut diag = Diagnostic::error(self.code)
            .with_message(self.message.clone())
            .with_label(self.span, label);
        if let Some(start) = self.decision_start {
            diag = diag.with_secondary_label(start, "decision started here");
        }
        if let Some(rule) = self.context.first() {
            let path = self
                .context
                .iter()
                .rev()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" > ");
            diag = diag.with_note(format!("while parsing `{rule}` ({path})"));
        }
        diag
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{} {}", self.line, self.column, self.message)
    }
}
